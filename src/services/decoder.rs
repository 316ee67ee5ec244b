//! Transfer-encoding and charset decoding for message bodies.
//!
//! Everything here except [`decode_base64_url`] is total: malformed input is
//! passed through rather than rejected.

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// `-`/`_` alphabet, accepts input with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode the Gmail `raw` field into MIME document bytes.
pub fn decode_base64_url(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_LENIENT.decode(compact)
}

/// Decode a `Content-Transfer-Encoding: base64` body. Undecodable input is returned unchanged.
pub fn decode_base64_body(body: &[u8]) -> Vec<u8> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match STANDARD_LENIENT.decode(&compact) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!(error = %e, "base64 body did not decode, keeping raw bytes");
            body.to_vec()
        }
    }
}

/// Reverse quoted-printable encoding.
///
/// `=XX` becomes the byte `0xXX`, `=` at a line end (optionally followed by
/// blanks) is a soft break and is removed. Any other `=` is kept literally.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        // Soft line break: '=' [blanks] (CRLF | LF | EOF)
        let mut j = i + 1;
        while j < input.len() && (input[j] == b' ' || input[j] == b'\t') {
            j += 1;
        }
        if j == input.len() {
            i = j;
            continue;
        }
        if input[j] == b'\n' {
            i = j + 1;
            continue;
        }
        if input[j] == b'\r' && input.get(j + 1) == Some(&b'\n') {
            i = j + 2;
            continue;
        }

        match (input.get(i + 1).and_then(hex_value), input.get(i + 2).and_then(hex_value)) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

fn hex_value(byte: &u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode bytes with the named charset, substituting U+FFFD for invalid sequences.
///
/// Unknown charset labels decode as UTF-8.
pub fn decode_text(bytes: &[u8], charset: &str) -> String {
    let encoding =
        encoding_rs::Encoding::for_label(charset.trim().as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(charset = encoding.name(), "replaced undecodable bytes");
    }
    text.into_owned()
}
