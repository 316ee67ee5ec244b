//! MIME structure on top of `mail-parser`.
//!
//! The parser finds part boundaries and decodes header fields. Part bodies are
//! copied out still transfer-encoded, straight from the document bytes, so the
//! normalizer decides how each one is decoded.

use mail_parser::{Addr, Address, Header, HeaderName, Message, MessageParser, MimeHeaders, PartType};
use thiserror::Error;

/// Nesting limit for multipart bodies (adversarial input protection).
const MAX_DEPTH: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MimeError {
    #[error("empty document")]
    Empty,
    #[error("no blank line between headers and body")]
    MissingHeaderTerminator,
    #[error("no header fields before the body")]
    NoHeaderFields,
    #[error("multipart part has no boundary parameter")]
    MissingBoundary,
    #[error("boundary '{0}' never appears in the body")]
    BoundaryNotFound(String),
    #[error("multipart nesting deeper than {0}")]
    TooDeep(usize),
    #[error("part {0} referenced but not parsed")]
    MissingPart(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimePart {
    /// Lowercased `type/subtype`, without parameters.
    pub content_type: String,
    /// Unfolded raw headers in document order.
    pub headers: Vec<(String, String)>,
    /// Body bytes, still transfer-encoded. Empty for multipart parts.
    pub body: Vec<u8>,
    pub children: Vec<MimePart>,
}

/// A parsed message: the part tree plus the top-level headers that carry
/// RFC 2047 encoded words, already decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeMessage {
    pub root: MimePart,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl MimePart {
    pub fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }

    /// First header value with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lowercased `Content-Transfer-Encoding`, if declared.
    pub fn transfer_encoding(&self) -> Option<String> {
        self.header("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase())
    }

    /// Depth-first, document-order leaves.
    pub fn leaves(&self) -> Vec<&MimePart> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a MimePart>) {
        if self.is_multipart() {
            for child in &self.children {
                child.collect_leaves(out);
            }
        } else {
            out.push(self);
        }
    }

    /// The part as it would appear on the wire: header lines, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_body(&self.body)
    }

    /// Like [`MimePart::to_bytes`] with a replacement body (e.g. after base64 decoding).
    pub fn to_bytes_with_body(&self, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 256);
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(body);
        out
    }
}

/// Parse a complete message.
pub fn parse(document: &[u8]) -> Result<MimeMessage, MimeError> {
    let document = skip_from_line(document);
    if document.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(MimeError::Empty);
    }

    let message = MessageParser::default()
        .parse(document)
        .ok_or(MimeError::MissingHeaderTerminator)?;
    let top = message.parts.first().ok_or(MimeError::Empty)?;

    if top.headers.is_empty() {
        return Err(MimeError::NoHeaderFields);
    }
    // mail-parser keeps a header-only message but flags it.
    if top.is_encoding_problem && top.raw_body_offset() >= document.len() {
        return Err(MimeError::MissingHeaderTerminator);
    }

    Ok(MimeMessage {
        root: build_part(&message, 0, document, "text/plain", 0)?,
        subject: find_header(&top.headers, HeaderName::Subject)
            .and_then(|h| h.value().as_text())
            .map(str::to_string),
        from: find_header(&top.headers, HeaderName::From)
            .and_then(|h| h.value().as_address())
            .and_then(format_address),
        to: find_header(&top.headers, HeaderName::To)
            .and_then(|h| h.value().as_address())
            .and_then(format_address),
    })
}

fn build_part(
    message: &Message<'_>,
    id: usize,
    document: &[u8],
    default_type: &str,
    depth: usize,
) -> Result<MimePart, MimeError> {
    if depth > MAX_DEPTH {
        return Err(MimeError::TooDeep(MAX_DEPTH));
    }
    let part = message.parts.get(id).ok_or(MimeError::MissingPart(id))?;

    let content_type = part
        .content_type()
        .and_then(|ct| {
            ct.subtype()
                .map(|sub| format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase())
        })
        .unwrap_or_else(|| default_type.to_string());
    let headers = part
        .headers
        .iter()
        .map(|h| (h.name().to_string(), raw_value(h, document)))
        .collect();

    match &part.body {
        PartType::Multipart(child_ids) => {
            let child_default = if content_type == "multipart/digest" {
                "message/rfc822"
            } else {
                "text/plain"
            };
            let children = child_ids
                .iter()
                .map(|&child| build_part(message, child, document, child_default, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MimePart {
                content_type,
                headers,
                body: Vec::new(),
                children,
            })
        }
        // Declared multipart but the parser fell back to a single body.
        _ if content_type.starts_with("multipart/") => {
            match part.content_type().and_then(|ct| ct.attribute("boundary")) {
                Some(boundary) if !boundary.is_empty() => {
                    Err(MimeError::BoundaryNotFound(boundary.to_string()))
                }
                _ => Err(MimeError::MissingBoundary),
            }
        }
        _ => {
            let body = document
                .get(part.raw_body_offset()..part.raw_end_offset())
                .unwrap_or_default();
            Ok(MimePart {
                content_type,
                headers,
                body: body.to_vec(),
                children: Vec::new(),
            })
        }
    }
}

fn find_header<'a, 'x>(headers: &'a [Header<'x>], name: HeaderName<'static>) -> Option<&'a Header<'x>> {
    headers.iter().find(|h| h.name == name)
}

/// Header value as written, continuation lines joined with a single space.
fn raw_value(header: &Header<'_>, document: &[u8]) -> String {
    let raw = document
        .get(header.offset_start()..header.offset_end())
        .unwrap_or_default();
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Name <addr>` list, comma separated; groups as `name: members;`.
fn format_address(address: &Address<'_>) -> Option<String> {
    let rendered: Vec<String> = match address {
        Address::List(list) => list.iter().filter_map(format_addr).collect(),
        Address::Group(groups) => groups
            .iter()
            .map(|group| {
                let members: Vec<String> = group.addresses.iter().filter_map(format_addr).collect();
                match group.name.as_deref() {
                    Some(name) => format!("{}: {};", name, members.join(", ")),
                    None => members.join(", "),
                }
            })
            .collect(),
    };
    let joined = rendered.join(", ");
    (!joined.trim().is_empty()).then_some(joined)
}

fn format_addr(addr: &Addr<'_>) -> Option<String> {
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(address)) => Some(format!("{} <{}>", display_name(name), address)),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

fn display_name(name: &str) -> String {
    if name.contains([',', ';', ':', '<', '>', '@', '"']) {
        format!("\"{}\"", name.replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

/// Drop a UTF-8 BOM and a leading mbox `From ` separator line.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
