//! Character-level codecs: bytes literals, backslash escapes, URL and HTML
//! escaping, and the ROT13/ROT47 substitution ciphers.
//!
//! Escape-style codecs fail outright when their marker character is absent
//! so the selector does not waste a comparison on an unchanged copy.

use super::{require_text, score, Codec, CodecId, DecodeError};
use crate::payload::Payload;

// ── Bytes literal ────────────────────────────────────────────────────────────

const BYTES_OPEN: &str = "bytes([";
const BYTES_CLOSE: &str = "]).decode()";
const DECODE_CALL: &str = ".decode()";

/// Parse the comma-separated element list of a `bytes([...])` literal.
/// Every element must be a decimal integer in `0..=255`.
fn parse_byte_list(list: &str) -> Option<Vec<u8>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<u8>().ok())
        .collect()
}

/// Replace each `bytes([72, 105]).decode()` with the quoted string it
/// builds.  Returns `None` when no occurrence could be rewritten.
pub fn rewrite_bytes_literals(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut rewritten = 0usize;

    while let Some(open) = rest.find(BYTES_OPEN) {
        let (before, tail) = rest.split_at(open);
        out.push_str(before);
        let body = &tail[BYTES_OPEN.len()..];

        let decoded = body.find(BYTES_CLOSE).and_then(|close| {
            let list = &body[..close];
            let bytes = parse_byte_list(list)?;
            let s = String::from_utf8(bytes).ok()?;
            Some((s, close))
        });

        match decoded {
            Some((s, close)) => {
                out.push_str(&format!("{s:?}"));
                rest = &body[close + BYTES_CLOSE.len()..];
                rewritten += 1;
            }
            None => {
                out.push_str(BYTES_OPEN);
                rest = body;
            }
        }
    }
    out.push_str(rest);

    (rewritten > 0).then(|| out.replace(DECODE_CALL, ""))
}

pub struct BytesLiteralCodec;
impl Codec for BytesLiteralCodec {
    fn name(&self) -> &'static str { CodecId::BytesLiteral.name() }
    fn display_name(&self) -> &'static str { CodecId::BytesLiteral.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        let text = require_text(self.name(), input)?;
        rewrite_bytes_literals(text)
            .map(Payload::Text)
            .ok_or_else(|| DecodeError::malformed(self.name(), "no bytes([...]).decode() literal"))
    }
}

// ── Backslash escapes ────────────────────────────────────────────────────────

fn hex_value(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(s, 16).ok()
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Resolve string-literal escapes (`\xNN`, `\uNNNN`, `\UNNNNNNNN`, octal,
/// and the single-character forms).  Unknown escapes are kept verbatim.
pub fn unescape(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0usize;

    while i < input.len() {
        if input[i] != b'\\' || i + 1 == input.len() {
            out.push(input[i]);
            i += 1;
            continue;
        }
        let esc = input[i + 1];
        i += 2;
        match esc {
            b'x' | b'u' | b'U' => {
                let width = match esc { b'x' => 2, b'u' => 4, _ => 8 };
                let digits = input.get(i..i + width).ok_or("truncated escape")?;
                let value = hex_value(digits).ok_or("bad hex digits in escape")?;
                if esc == b'x' {
                    out.push(value as u8);
                } else {
                    push_char(&mut out, char::from_u32(value).ok_or("invalid code point")?);
                }
                i += width;
            }
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut taken = 0;
                while taken < 2 && i < input.len() && (b'0'..=b'7').contains(&input[i]) {
                    value = value * 8 + u32::from(input[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(u8::try_from(value).map_err(|_| "octal escape out of range")?);
            }
            b'n'  => out.push(b'\n'),
            b'r'  => out.push(b'\r'),
            b't'  => out.push(b'\t'),
            b'a'  => out.push(0x07),
            b'b'  => out.push(0x08),
            b'f'  => out.push(0x0c),
            b'v'  => out.push(0x0b),
            b'\\' | b'\'' | b'"' => out.push(esc),
            other => out.extend_from_slice(&[b'\\', other]),
        }
    }
    Ok(out)
}

pub struct EscapesCodec;
impl Codec for EscapesCodec {
    fn name(&self) -> &'static str { CodecId::Escapes.name() }
    fn display_name(&self) -> &'static str { CodecId::Escapes.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        if !data.contains(&b'\\') {
            return Err(DecodeError::malformed(self.name(), "no escape sequences"));
        }
        unescape(data)
            .map(Payload::from_bytes)
            .map_err(|reason| DecodeError::malformed(self.name(), reason))
    }
    /// A backslash inside binary data is noise, not an escape.
    fn plausible(&self, input: &Payload, _output: &Payload) -> bool {
        input.is_text()
    }
}

// ── URL percent-encoding ─────────────────────────────────────────────────────

/// Decode `%HH` sequences.  A `%` not followed by two hex digits is kept.
pub fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0usize;
    while i < input.len() {
        if input[i] == b'%' {
            if let Some(v) = input.get(i + 1..i + 3).and_then(hex_value) {
                out.push(v as u8);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

pub struct UrlCodec;
impl Codec for UrlCodec {
    fn name(&self) -> &'static str { CodecId::Url.name() }
    fn display_name(&self) -> &'static str { CodecId::Url.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        if !data.contains(&b'%') {
            return Err(DecodeError::malformed(self.name(), "no percent escapes"));
        }
        Ok(Payload::from_bytes(percent_decode(data)))
    }
    fn plausible(&self, input: &Payload, _output: &Payload) -> bool {
        input.is_text()
    }
}

// ── HTML entities ────────────────────────────────────────────────────────────

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Longest entity body we look at, `#x10FFFF` plus slack.
const MAX_ENTITY_LEN: usize = 10;

fn resolve_entity(body: &str) -> Option<char> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    NAMED_ENTITIES.iter().find(|(name, _)| *name == body).map(|(_, c)| *c)
}

/// Replace named and numeric character references.  Unknown or unterminated
/// references are kept as written.
pub fn html_unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let resolved = tail
            .find(';')
            .filter(|&semi| semi <= MAX_ENTITY_LEN)
            .and_then(|semi| resolve_entity(&tail[..semi]).map(|c| (c, semi)));
        match resolved {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

pub struct HtmlCodec;
impl Codec for HtmlCodec {
    fn name(&self) -> &'static str { CodecId::Html.name() }
    fn display_name(&self) -> &'static str { CodecId::Html.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        let text = require_text(self.name(), input)?;
        if !text.contains('&') {
            return Err(DecodeError::malformed(self.name(), "no character references"));
        }
        Ok(Payload::Text(html_unescape(text)))
    }
}

// ── Rotation ciphers ─────────────────────────────────────────────────────────

/// ROT13 over ASCII letters.  Its own inverse.
pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

/// ROT47 over the printable ASCII range `!`..=`~`.  Its own inverse.
pub fn rot47(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '!'..='~' => (b'!' + ((c as u8 - b'!') + 47) % 94) as char,
            _ => c,
        })
        .collect()
}

/// Rotations always "succeed", so auto mode only takes one when the result
/// reads more like English than what went in.
fn rotation_helps(input: &Payload, output: &Payload) -> bool {
    match (input.as_text(), output.as_text()) {
        (Some(before), Some(after)) => score::reads_better(before, after),
        _ => false,
    }
}

pub struct Rot13Codec;
impl Codec for Rot13Codec {
    fn name(&self) -> &'static str { CodecId::Rot13.name() }
    fn display_name(&self) -> &'static str { CodecId::Rot13.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        Ok(Payload::Text(rot13(require_text(self.name(), input)?)))
    }
    fn plausible(&self, input: &Payload, output: &Payload) -> bool {
        rotation_helps(input, output)
    }
}

pub struct Rot47Codec;
impl Codec for Rot47Codec {
    fn name(&self) -> &'static str { CodecId::Rot47.name() }
    fn display_name(&self) -> &'static str { CodecId::Rot47.display_name() }
    fn decode(&self, input: &Payload, _limit: usize) -> Result<Payload, DecodeError> {
        Ok(Payload::Text(rot47(require_text(self.name(), input)?)))
    }
    fn plausible(&self, input: &Payload, output: &Payload) -> bool {
        rotation_helps(input, output)
    }
}
