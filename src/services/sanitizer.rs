//! HTML clean-up: header residue removal, canonical re-serialization and
//! quoted-reply removal.
//!
//! Each step is a total function over `&str`; [`HtmlSanitizer::clean`] runs
//! them in a fixed order.

use std::sync::LazyLock;

use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::AppError;

static CONTENT_TYPE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Content-Type: [^\n]+\n").expect("valid regex"));
static TRANSFER_ENCODING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Content-Transfer-Encoding: [^\n]+\n").expect("valid regex")
});
static DOCUMENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!doctype|<(?:html|head|body)[\s>/]").expect("valid regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];
/// Content is never escaped by the parser, so it must not be escaped on output.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes",
];
/// Whitespace is significant; written on one line exactly as parsed.
const PREFORMATTED_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

#[derive(Clone, Debug)]
pub struct HtmlSanitizer {
    quote_selector: Selector,
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self {
            quote_selector: Selector::parse(crate::config::DEFAULT_QUOTE_SELECTOR)
                .expect("default quote selector is valid"),
        }
    }
}

impl HtmlSanitizer {
    /// `quote_selector` is a CSS selector marking quoted replies, e.g. `.gmail_quote`.
    pub fn new(quote_selector: &str) -> Result<Self, AppError> {
        let selector = Selector::parse(quote_selector).map_err(|e| {
            AppError::Config(format!("invalid quote selector '{}': {:?}", quote_selector, e))
        })?;
        Ok(Self {
            quote_selector: selector,
        })
    }

    pub fn clean(&self, html: &str, remove_quoted: bool) -> String {
        let html = strip_content_type_lines(html);
        let html = strip_transfer_encoding_lines(&html);
        let pretty = prettify(&html);
        if remove_quoted {
            remove_matching(&pretty, &self.quote_selector)
        } else {
            pretty
        }
    }
}

pub fn strip_content_type_lines(html: &str) -> String {
    CONTENT_TYPE_LINE.replace_all(html, "").into_owned()
}

pub fn strip_transfer_encoding_lines(html: &str) -> String {
    TRANSFER_ENCODING_LINE.replace_all(html, "").into_owned()
}

/// Parse leniently and write back one node per line, indented by depth.
pub fn prettify(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let (document, is_fragment) = parse(html);
    render(&document, is_fragment)
}

/// Delete every subtree matching `selector`, then re-serialize.
pub fn remove_matching(html: &str, selector: &Selector) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let (mut document, is_fragment) = parse(html);
    let doomed: Vec<_> = document.select(selector).map(|el| el.id()).collect();
    if !doomed.is_empty() {
        tracing::debug!(removed = doomed.len(), "removing quoted subtrees");
    }
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    render(&document, is_fragment)
}

/// Whole documents keep their `<html>` skeleton; anything else is a body fragment.
fn parse(html: &str) -> (Html, bool) {
    if DOCUMENT_MARKER.is_match(html) {
        (Html::parse_document(html), false)
    } else {
        (Html::parse_fragment(html), true)
    }
}

fn render(document: &Html, is_fragment: bool) -> String {
    let mut out = String::new();
    for child in document.tree.root().children() {
        match child.value() {
            Node::Doctype(doctype) => push_line(&mut out, 0, &format!("<!DOCTYPE {}>", doctype.name())),
            Node::Comment(comment) => push_line(&mut out, 0, &format!("<!--{}-->", &**comment)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    // Fragments are parsed under a synthetic <html> root.
                    if is_fragment && element.value().name() == "html" {
                        write_children(element, 0, &mut out);
                    } else {
                        write_element(element, 0, &mut out);
                    }
                }
            }
            Node::Text(text) => write_text(text, 0, &mut out),
            _ => {}
        }
    }
    out
}

fn write_children(parent: ElementRef<'_>, depth: usize, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, depth, out);
                }
            }
            Node::Text(text) => write_text(text, depth, out),
            Node::Comment(comment) => push_line(out, depth, &format!("<!--{}-->", &**comment)),
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, depth: usize, out: &mut String) {
    let name = output_name(element.value().name());
    let open = open_tag(element.value());

    if VOID_ELEMENTS.contains(&name) {
        push_line(out, depth, &open);
        return;
    }

    if PREFORMATTED_ELEMENTS.contains(&name) || RAW_TEXT_ELEMENTS.contains(&name) {
        let mut line = open;
        // The parser drops one newline right after <pre>; keep a leading one alive.
        let leading_newline = element
            .children()
            .next()
            .and_then(|c| c.value().as_text().map(|t| t.starts_with('\n')))
            .unwrap_or(false);
        if leading_newline && PREFORMATTED_ELEMENTS.contains(&name) {
            line.push('\n');
        }
        write_inline(element, &mut line);
        line.push_str(&format!("</{}>", name));
        push_line(out, depth, &line);
        return;
    }

    push_line(out, depth, &open);
    write_children(element, depth + 1, out);
    push_line(out, depth, &format!("</{}>", name));
}

/// Serialize content exactly as parsed, without added whitespace.
fn write_inline(parent: ElementRef<'_>, out: &mut String) {
    let raw = RAW_TEXT_ELEMENTS.contains(&parent.value().name());
    for child in parent.children() {
        match child.value() {
            Node::Text(text) if raw => out.push_str(text),
            Node::Text(text) => out.push_str(&encode_text(&**text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    let name = output_name(element.value().name());
                    out.push_str(&open_tag(element.value()));
                    if !VOID_ELEMENTS.contains(&name) {
                        write_inline(element, out);
                        out.push_str(&format!("</{}>", name));
                    }
                }
            }
            _ => {}
        }
    }
}

fn write_text(text: &str, depth: usize, out: &mut String) {
    // ASCII whitespace only: a lone &nbsp; is content.
    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if !trimmed.is_empty() {
        push_line(out, depth, &encode_text(trimmed));
    }
}

/// `<plaintext>` has no end tag and swallows the rest of the input; it is
/// written as `<pre>`, which renders the same text.
fn output_name(name: &str) -> &str {
    if name == "plaintext" {
        "pre"
    } else {
        name
    }
}

/// Attributes sorted by name so output does not depend on parser map order.
fn open_tag(element: &Element) -> String {
    let mut attrs: Vec<(&str, &str)> = element.attrs().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));

    let mut tag = format!("<{}", output_name(element.name()));
    for (name, value) in attrs {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        tag.push_str(&encode_double_quoted_attribute(value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push(' ');
    }
    out.push_str(line);
    out.push('\n');
}
