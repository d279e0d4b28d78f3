//! The working value threaded through a decode session.
//!
//! A [`Payload`] is either decoded text or raw bytes.  Codecs always produce
//! bytes internally; [`Payload::from_bytes`] promotes them to text when they
//! are valid UTF-8 and otherwise keeps the raw form so the next layer can
//! still inspect them (a compressed stream is rarely valid UTF-8).

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Bytes(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

impl Payload {
    /// Promote `bytes` to text when they are valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(e) => {
                tracing::debug!(
                    valid_up_to = e.utf8_error().valid_up_to(),
                    "decoded bytes are not UTF-8, keeping raw form"
                );
                Payload::Bytes(e.into_bytes())
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Bytes(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Bytes(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// The value with leading and trailing ASCII whitespace removed.
    pub fn trimmed(&self) -> &[u8] {
        self.as_bytes().trim_ascii()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(s) => s.into_bytes(),
            Payload::Bytes(b) => b,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Payload::from_bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::from_bytes(b)
    }
}

/// Text renders verbatim, bytes as lower-case hex.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(s) => f.write_str(s),
            Payload::Bytes(b) => f.write_str(&hex::encode(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_bytes_become_text() {
        assert_eq!(Payload::from(b"plain".to_vec()), Payload::Text("plain".into()));
    }

    #[test]
    fn invalid_utf8_stays_bytes() {
        let p = Payload::from(vec![0x78, 0x9c, 0xff]);
        assert!(!p.is_text());
        assert_eq!(p.to_string(), "789cff");
    }

    #[test]
    fn trimmed_strips_ascii_whitespace_only() {
        let p = Payload::from("  \tabc \n");
        assert_eq!(p.trimmed(), b"abc");
        assert!(Payload::from(" \n ").trimmed().is_empty());
    }
}
