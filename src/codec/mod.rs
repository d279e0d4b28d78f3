//! Codec registry: stable names + fixed priority order.
//!
//! # Identity rules
//! Every built-in codec is identified by a [`CodecId`].  Its [`name`] is the
//! stable string that appears in decode chains, JSON reports and attempt
//! keys; it is never reused for a different transform.
//!
//! # Priority
//! [`REGISTRY`] is the declared order in which auto-decode tries codecs.
//! Position is priority: the first codec whose output is accepted wins the
//! round.  Several encodings share alphabets (Hex is valid Base64 more often
//! than not), so this order is part of the observable behavior and must not
//! be reshuffled casually.
//!
//! # Contract
//! A codec is a pure function of its input.  Malformed input is reported as a
//! [`DecodeError`], never a panic.  Decompressing codecs stream into a capped
//! buffer and abort with [`DecodeError::SizeLimitExceeded`] before holding
//! more than `limit + 1` bytes.
//!
//! [`name`]: CodecId::name

use serde::Serialize;
use thiserror::Error;

use crate::payload::Payload;

pub mod compress;
pub mod marshal;
pub mod radix;
pub mod score;
pub mod text;

/// Output cap used by [`decode_single`] when the caller supplies none.
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 16 * 1024 * 1024;

// ── CodecId enum ─────────────────────────────────────────────────────────────

/// Built-in codec discriminant.  Declaration order equals [`REGISTRY`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CodecId {
    Base64Zlib,
    Base64,
    UrlBase64Zlib,
    UrlBase64,
    Base32Zlib,
    Base32,
    HexZlib,
    Hex,
    Base85Zlib,
    Base85,
    Ascii85Zlib,
    Ascii85,
    Zlib,
    Gzip,
    Zstd,
    Lzma,
    Marshal,
    BytesLiteral,
    Escapes,
    Url,
    Html,
    Rot13,
    Rot47,
}

/// Auto-decode priority order.
pub const REGISTRY: [CodecId; 23] = [
    CodecId::Base64Zlib,
    CodecId::Base64,
    CodecId::UrlBase64Zlib,
    CodecId::UrlBase64,
    CodecId::Base32Zlib,
    CodecId::Base32,
    CodecId::HexZlib,
    CodecId::Hex,
    CodecId::Base85Zlib,
    CodecId::Base85,
    CodecId::Ascii85Zlib,
    CodecId::Ascii85,
    CodecId::Zlib,
    CodecId::Gzip,
    CodecId::Zstd,
    CodecId::Lzma,
    CodecId::Marshal,
    CodecId::BytesLiteral,
    CodecId::Escapes,
    CodecId::Url,
    CodecId::Html,
    CodecId::Rot13,
    CodecId::Rot47,
];

/// Extra spellings accepted by [`CodecId::from_name`], already normalised.
const ALIASES: &[(&str, CodecId)] = &[
    ("b64", CodecId::Base64),
    ("b64zlib", CodecId::Base64Zlib),
    ("urlbase64", CodecId::UrlBase64),
    ("base64url", CodecId::UrlBase64),
    ("urlbase64zlib", CodecId::UrlBase64Zlib),
    ("base16", CodecId::Hex),
    ("base16zlib", CodecId::HexZlib),
    ("a85", CodecId::Ascii85),
    ("b85", CodecId::Base85),
    ("b32", CodecId::Base32),
    ("pyc", CodecId::Marshal),
    ("bytes", CodecId::BytesLiteral),
    ("unescape", CodecId::Escapes),
    ("percent", CodecId::Url),
];

impl CodecId {
    /// Stable identifier used in chains, attempt keys and reports.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Base64Zlib    => "Base64+Zlib",
            CodecId::Base64        => "Base64",
            CodecId::UrlBase64Zlib => "URL-safe Base64+Zlib",
            CodecId::UrlBase64     => "URL-safe Base64",
            CodecId::Base32Zlib    => "Base32+Zlib",
            CodecId::Base32        => "Base32",
            CodecId::HexZlib       => "Hex+Zlib",
            CodecId::Hex           => "Hex",
            CodecId::Base85Zlib    => "Base85+Zlib",
            CodecId::Base85        => "Base85",
            CodecId::Ascii85Zlib   => "ASCII85+Zlib",
            CodecId::Ascii85       => "ASCII85",
            CodecId::Zlib          => "Zlib",
            CodecId::Gzip          => "Gzip",
            CodecId::Zstd          => "Zstd",
            CodecId::Lzma          => "LZMA",
            CodecId::Marshal       => "Marshal",
            CodecId::BytesLiteral  => "Bytes literal",
            CodecId::Escapes       => "Escapes",
            CodecId::Url           => "URL",
            CodecId::Html          => "HTML",
            CodecId::Rot13         => "ROT13",
            CodecId::Rot47         => "ROT47",
        }
    }

    /// Human-readable description (diagnostics only, never parsed).
    pub fn display_name(self) -> &'static str {
        match self {
            CodecId::Base64Zlib    => "Base64, then zlib inflate",
            CodecId::Base64        => "Base64 (standard alphabet)",
            CodecId::UrlBase64Zlib => "URL-safe Base64, then zlib inflate",
            CodecId::UrlBase64     => "URL-safe Base64",
            CodecId::Base32Zlib    => "Base32, then zlib inflate",
            CodecId::Base32        => "Base32 (RFC 4648)",
            CodecId::HexZlib       => "Hex, then zlib inflate",
            CodecId::Hex           => "Hex / Base16",
            CodecId::Base85Zlib    => "Base85, then zlib inflate",
            CodecId::Base85        => "Base85 (RFC 1924)",
            CodecId::Ascii85Zlib   => "ASCII85, then zlib inflate",
            CodecId::Ascii85       => "ASCII85 (Adobe)",
            CodecId::Zlib          => "Zlib stream",
            CodecId::Gzip          => "Gzip member",
            CodecId::Zstd          => "Zstandard frame",
            CodecId::Lzma          => "LZMA (.lzma alone)",
            CodecId::Marshal       => "Bytecode container string constants",
            CodecId::BytesLiteral  => "bytes([...]).decode() literal",
            CodecId::Escapes       => "Backslash escape sequences",
            CodecId::Url           => "URL percent-encoding",
            CodecId::Html          => "HTML entities",
            CodecId::Rot13         => "ROT13 letter rotation",
            CodecId::Rot47         => "ROT47 printable rotation",
        }
    }

    /// Parse a user-supplied codec name.  Case, spaces, `-`, `_` and `+`
    /// are ignored, so `"url-safe base64"` and `"URLSAFEBASE64"` both match.
    pub fn from_name(s: &str) -> Option<Self> {
        let wanted = normalise(s);
        REGISTRY
            .iter()
            .copied()
            .find(|id| normalise(id.name()) == wanted)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == wanted)
                    .map(|(_, id)| *id)
            })
    }

    pub fn descriptor(self) -> CodecDescriptor {
        CodecDescriptor { id: self.name(), display_name: self.display_name() }
    }
}

fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Entry returned by [`list_codecs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecDescriptor {
    pub id:           &'static str,
    pub display_name: &'static str,
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Wrong alphabet, bad padding, corrupt stream, checksum mismatch.
    #[error("{codec}: {reason}")]
    Malformed { codec: &'static str, reason: String },
    /// Output would exceed the configured cap (decompression bomb guard).
    #[error("{codec}: output would exceed {limit} bytes")]
    SizeLimitExceeded { codec: &'static str, limit: usize },
    /// A text-only codec was handed bytes that are not valid UTF-8.
    #[error("{codec}: input is binary, expected text")]
    NotText { codec: &'static str },
    #[error("Unknown codec '{0}'")]
    UnknownCodec(String),
}

impl DecodeError {
    pub fn malformed(codec: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed { codec, reason: reason.into() }
    }

    /// The codec that rejected the input, if any.
    pub fn codec(&self) -> Option<&'static str> {
        match self {
            DecodeError::Malformed { codec, .. }
            | DecodeError::SizeLimitExceeded { codec, .. }
            | DecodeError::NotText { codec } => Some(codec),
            DecodeError::UnknownCodec(_) => None,
        }
    }

    pub fn is_size_limit(&self) -> bool {
        matches!(self, DecodeError::SizeLimitExceeded { .. })
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    /// Stable identifier; also the attempt-key component.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Reverse one layer.  `limit` caps the output length in bytes.
    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError>;

    /// Auto-decode veto.  Returning `false` rejects an otherwise successful
    /// decode; single-codec mode never consults it.
    fn plausible(&self, _input: &Payload, _output: &Payload) -> bool {
        true
    }

    fn descriptor(&self) -> CodecDescriptor {
        CodecDescriptor { id: self.name(), display_name: self.display_name() }
    }
}

/// Text view of `input` for codecs that only make sense on characters.
pub(crate) fn require_text<'a>(codec: &'static str, input: &'a Payload) -> Result<&'a str, DecodeError> {
    input.as_text().ok_or(DecodeError::NotText { codec })
}

// ── Factory ──────────────────────────────────────────────────────────────────

static BUILTIN: [&dyn Codec; 23] = [
    &radix::BASE64_ZLIB,
    &radix::BASE64,
    &radix::URL_BASE64_ZLIB,
    &radix::URL_BASE64,
    &radix::BASE32_ZLIB,
    &radix::BASE32,
    &radix::HEX_ZLIB,
    &radix::HEX,
    &radix::BASE85_ZLIB,
    &radix::BASE85,
    &radix::ASCII85_ZLIB,
    &radix::ASCII85,
    &compress::ZlibCodec,
    &compress::GzipCodec,
    &compress::ZstdCodec,
    &compress::LzmaCodec,
    &marshal::MarshalCodec,
    &text::BytesLiteralCodec,
    &text::EscapesCodec,
    &text::UrlCodec,
    &text::HtmlCodec,
    &text::Rot13Codec,
    &text::Rot47Codec,
];

/// Resolve a [`CodecId`] to its shared, immutable implementation.
pub fn get_codec(id: CodecId) -> &'static dyn Codec {
    BUILTIN[id as usize]
}

/// Resolve a user-supplied name to a built-in codec.
pub fn get_codec_by_name(name: &str) -> Result<&'static dyn Codec, DecodeError> {
    CodecId::from_name(name)
        .map(get_codec)
        .ok_or_else(|| DecodeError::UnknownCodec(name.to_owned()))
}

/// The built-in registry in priority order.
pub fn builtin_registry() -> &'static [&'static dyn Codec] {
    &BUILTIN
}

/// Ordered catalog of built-in codecs.
pub fn list_codecs() -> Vec<CodecDescriptor> {
    REGISTRY.iter().map(|id| id.descriptor()).collect()
}

/// Apply exactly one named codec, with the default output cap.
pub fn decode_single(codec_id: &str, input: &Payload) -> Result<Payload, DecodeError> {
    get_codec_by_name(codec_id)?.decode(input, DEFAULT_MAX_OUTPUT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_matches_registry_order() {
        for (i, id) in REGISTRY.iter().enumerate() {
            assert_eq!(*id as usize, i);
            assert_eq!(BUILTIN[i].name(), id.name());
            assert_eq!(get_codec(*id).display_name(), id.display_name());
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = REGISTRY.iter().map(|id| normalise(id.name())).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), REGISTRY.len());
    }

    #[test]
    fn from_name_is_forgiving() {
        assert_eq!(CodecId::from_name("base64"), Some(CodecId::Base64));
        assert_eq!(CodecId::from_name("BASE64+ZLIB"), Some(CodecId::Base64Zlib));
        assert_eq!(CodecId::from_name("url-safe base64"), Some(CodecId::UrlBase64));
        assert_eq!(CodecId::from_name("base16"), Some(CodecId::Hex));
        assert_eq!(CodecId::from_name("rot_13"), Some(CodecId::Rot13));
        assert_eq!(CodecId::from_name("uuencode"), None);
    }

    #[test]
    fn xz_is_not_lzma() {
        // The LZMA codec reads the bare "lzma_alone" stream; an xz container
        // (magic fd 37 7a 58 5a 00) would only ever fail there.
        assert_eq!(CodecId::from_name("xz"), None);
        assert_eq!(CodecId::from_name("lzma"), Some(CodecId::Lzma));
        let xz = Payload::Bytes(vec![0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00, 0x04]);
        assert!(matches!(decode_single("xz", &xz), Err(DecodeError::UnknownCodec(_))));
    }

    #[test]
    fn unknown_codec_is_an_error() {
        let err = decode_single("nope", &Payload::from("x")).unwrap_err();
        assert_eq!(err, DecodeError::UnknownCodec("nope".into()));
        assert_eq!(err.codec(), None);
    }

    #[test]
    fn list_codecs_preserves_priority() {
        let list = list_codecs();
        assert_eq!(list.len(), REGISTRY.len());
        assert_eq!(list[0].id, "Base64+Zlib");
        assert_eq!(list[1].id, "Base64");
        assert_eq!(list.last().map(|d| d.id), Some("ROT47"));
    }
}
