//! Radix codecs: Base64 (standard and URL-safe), Base32, Hex, Base85 and
//! ASCII85, each optionally followed by a zlib inflate.
//!
//! ASCII whitespace anywhere in the input is ignored, so wrapped blobs
//! decode the same as single-line ones.  Everything else is strict: a
//! character outside the alphabet, bad padding or non-zero trailing bits is
//! a [`DecodeError::Malformed`].

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use super::{compress, score, Codec, CodecId, DecodeError};
use crate::payload::Payload;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const BASE85_ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

const INVALID: u8 = 0xff;
const BASE32_LOOKUP: [u8; 256] = lookup_table(BASE32_ALPHABET);
const BASE85_LOOKUP: [u8; 256] = lookup_table(BASE85_ALPHABET);

const fn lookup_table(alphabet: &[u8]) -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < alphabet.len() {
        table[alphabet[i] as usize] = i as u8;
        i += 1;
    }
    table
}

// ── Radix kinds ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Base64,
    UrlBase64,
    Base32,
    Hex,
    Base85,
    Ascii85,
}

impl Radix {
    /// Alphabets that also cover digits-and-letters words, so an
    /// alphanumeric input is no evidence of encoding.
    pub fn is_loose(self) -> bool {
        matches!(self, Radix::Base85 | Radix::Ascii85)
    }

    /// Decode whitespace-free `input`.  Errors carry a short reason only; the
    /// caller attaches the codec name.
    pub fn decode(self, input: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            Radix::Base64    => STANDARD.decode(input).map_err(|e| e.to_string()),
            Radix::UrlBase64 => URL_SAFE_LENIENT.decode(input).map_err(|e| e.to_string()),
            Radix::Base32    => base32_decode(input),
            Radix::Hex       => hex::decode(input).map_err(|e| e.to_string()),
            Radix::Base85    => base85_decode(input),
            Radix::Ascii85   => ascii85_decode(input),
        }
    }
}

// ── Codec implementation ─────────────────────────────────────────────────────

pub struct RadixCodec {
    id:      CodecId,
    radix:   Radix,
    inflate: bool,
}

pub static BASE64_ZLIB:     RadixCodec = RadixCodec { id: CodecId::Base64Zlib,    radix: Radix::Base64,    inflate: true };
pub static BASE64:          RadixCodec = RadixCodec { id: CodecId::Base64,        radix: Radix::Base64,    inflate: false };
pub static URL_BASE64_ZLIB: RadixCodec = RadixCodec { id: CodecId::UrlBase64Zlib, radix: Radix::UrlBase64, inflate: true };
pub static URL_BASE64:      RadixCodec = RadixCodec { id: CodecId::UrlBase64,     radix: Radix::UrlBase64, inflate: false };
pub static BASE32_ZLIB:     RadixCodec = RadixCodec { id: CodecId::Base32Zlib,    radix: Radix::Base32,    inflate: true };
pub static BASE32:          RadixCodec = RadixCodec { id: CodecId::Base32,        radix: Radix::Base32,    inflate: false };
pub static HEX_ZLIB:        RadixCodec = RadixCodec { id: CodecId::HexZlib,       radix: Radix::Hex,       inflate: true };
pub static HEX:             RadixCodec = RadixCodec { id: CodecId::Hex,           radix: Radix::Hex,       inflate: false };
pub static BASE85_ZLIB:     RadixCodec = RadixCodec { id: CodecId::Base85Zlib,    radix: Radix::Base85,    inflate: true };
pub static BASE85:          RadixCodec = RadixCodec { id: CodecId::Base85,        radix: Radix::Base85,    inflate: false };
pub static ASCII85_ZLIB:    RadixCodec = RadixCodec { id: CodecId::Ascii85Zlib,   radix: Radix::Ascii85,   inflate: true };
pub static ASCII85:         RadixCodec = RadixCodec { id: CodecId::Ascii85,       radix: Radix::Ascii85,   inflate: false };

impl Codec for RadixCodec {
    fn name(&self) -> &'static str { self.id.name() }
    fn display_name(&self) -> &'static str { self.id.display_name() }

    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        let name = self.name();
        let compact: Vec<u8> = input
            .as_bytes()
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(DecodeError::malformed(name, "empty input"));
        }

        let raw = self
            .radix
            .decode(&compact)
            .map_err(|reason| DecodeError::malformed(name, reason))?;

        let out = if self.inflate {
            compress::inflate_zlib(name, &raw, limit)?
        } else {
            if raw.len() > limit {
                return Err(DecodeError::SizeLimitExceeded { codec: name, limit });
            }
            raw
        };
        Ok(Payload::from_bytes(out))
    }

    /// A zlib layer carries its own checksum; bare radix output must look
    /// like text or a container, and must read better than input that was
    /// already words.
    fn plausible(&self, input: &Payload, output: &Payload) -> bool {
        self.inflate || score::plausible_radix_output(input.as_bytes(), output.as_bytes(), self.radix.is_loose())
    }
}

// ── Base32 (RFC 4648) ────────────────────────────────────────────────────────

fn base32_decode(input: &[u8]) -> Result<Vec<u8>, String> {
    let body_len = input.iter().rposition(|&b| b != b'=').map_or(0, |p| p + 1);
    let (body, pad) = input.split_at(body_len);
    if body.is_empty() {
        return Err("no data".into());
    }
    if !pad.is_empty() && (input.len() % 8 != 0 || pad.len() >= 8) {
        return Err("bad padding".into());
    }
    if !matches!(body.len() % 8, 0 | 2 | 4 | 5 | 7) {
        return Err(format!("invalid length {}", body.len()));
    }

    let mut out = Vec::with_capacity(body.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &c in body {
        let v = BASE32_LOOKUP[c as usize];
        if v == INVALID {
            return Err(format!("invalid character {:?}", c as char));
        }
        acc = (acc << 5) | u32::from(v);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    if acc != 0 {
        return Err("non-zero trailing bits".into());
    }
    Ok(out)
}

// ── Base85 / ASCII85 ─────────────────────────────────────────────────────────

/// Fold up to five base-85 digits into a big-endian 32-bit group.
/// Missing digits are padded with 84, the highest digit.
fn fold_group(digits: &[u8]) -> Result<[u8; 4], String> {
    let mut acc: u64 = 0;
    for i in 0..5 {
        let d = digits.get(i).copied().unwrap_or(84);
        acc = acc * 85 + u64::from(d);
    }
    u32::try_from(acc)
        .map(u32::to_be_bytes)
        .map_err(|_| "group overflows 32 bits".to_string())
}

fn flush_group(group: &[u8], out: &mut Vec<u8>) -> Result<(), String> {
    match group.len() {
        0 => Ok(()),
        1 => Err("dangling single character".into()),
        n => {
            let bytes = fold_group(group)?;
            out.extend_from_slice(&bytes[..n - 1]);
            Ok(())
        }
    }
}

fn base85_decode(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len() / 5 * 4 + 4);
    let mut group = Vec::with_capacity(5);
    for &c in input {
        let v = BASE85_LOOKUP[c as usize];
        if v == INVALID {
            return Err(format!("invalid character {:?}", c as char));
        }
        group.push(v);
        if group.len() == 5 {
            out.extend_from_slice(&fold_group(&group)?);
            group.clear();
        }
    }
    flush_group(&group, &mut out)?;
    Ok(out)
}

fn ascii85_decode(input: &[u8]) -> Result<Vec<u8>, String> {
    let input = input.strip_prefix(b"<~").unwrap_or(input);
    let input = input.strip_suffix(b"~>").unwrap_or(input);

    let mut out = Vec::with_capacity(input.len() / 5 * 4 + 4);
    let mut group = Vec::with_capacity(5);
    for &c in input {
        match c {
            b'z' if group.is_empty() => out.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group.push(c - b'!');
                if group.len() == 5 {
                    out.extend_from_slice(&fold_group(&group)?);
                    group.clear();
                }
            }
            _ => return Err(format!("invalid character {:?}", c as char)),
        }
    }
    flush_group(&group, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const LIMIT: usize = 1 << 20;

    fn decode(codec: &RadixCodec, s: &str) -> Result<Payload, DecodeError> {
        codec.decode(&Payload::from(s), LIMIT)
    }

    #[test]
    fn base64_standard() {
        assert_eq!(decode(&BASE64, "SGVsbG8sIFdvcmxkIQ==").unwrap(), Payload::from("Hello, World!"));
        assert_eq!(decode(&BASE64, "SGVs\nbG8s\r\nIFdvcmxkIQ==\n").unwrap(), Payload::from("Hello, World!"));
    }

    #[test]
    fn base64_rejects_garbage_suffix() {
        let err = decode(&BASE64, "SGVsbG8=@@@").unwrap_err();
        assert_eq!(err.codec(), Some("Base64"));
    }

    #[test]
    fn url_safe_base64_without_padding() {
        // 0xfb 0xff encodes to "-_8" in the URL-safe alphabet.
        assert_eq!(decode(&URL_BASE64, "-_8").unwrap(), Payload::Bytes(vec![0xfb, 0xff]));
        assert!(decode(&BASE64, "-_8=").is_err());
    }

    #[test]
    fn base32_rfc4648_vectors() {
        assert_eq!(decode(&BASE32, "MZXW6YTBOI======").unwrap(), Payload::from("foobar"));
        assert_eq!(decode(&BASE32, "MZXW6YQ").unwrap(), Payload::from("foob"));
        assert!(decode(&BASE32, "mzxw6ytboi").is_err());
        assert!(decode(&BASE32, "MZXW6YTBO").is_err());
    }

    #[test]
    fn hex_either_case() {
        assert_eq!(decode(&HEX, "48656c6C6f").unwrap(), Payload::from("Hello"));
        assert!(decode(&HEX, "486").is_err());
    }

    #[test]
    fn base85_group() {
        assert_eq!(decode(&BASE85, "O<`^z").unwrap(), Payload::from("Man "));
        assert!(decode(&BASE85, "O<`^z\"").is_err());
    }

    #[test]
    fn ascii85_wikipedia_prefix() {
        assert_eq!(decode(&ASCII85, "9jqo^BlbD-").unwrap(), Payload::from("Man is d"));
        assert_eq!(decode(&ASCII85, "<~9jqo^~>").unwrap(), Payload::from("Man "));
        assert_eq!(ascii85_decode(b"z").unwrap(), vec![0; 4]);
        assert!(ascii85_decode(b"9").is_err());
        assert!(ascii85_decode(b"s8W-\"").is_err());
    }

    #[test]
    fn zlib_variant_inflates() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"layered").unwrap();
        let packed = hex::encode(enc.finish().unwrap());
        assert_eq!(decode(&HEX_ZLIB, &packed).unwrap(), Payload::from("layered"));
        assert!(decode(&HEX_ZLIB, "48656c6c6f").is_err());
    }

    #[test]
    fn plausibility_rejects_binary_noise() {
        let input = Payload::from("deadbeef");
        let out = decode(&HEX, "deadbeef").unwrap();
        assert!(!HEX.plausible(&input, &out));
        let input = Payload::from("48656c6c6f");
        let out = decode(&HEX, "48656c6c6f").unwrap();
        assert!(HEX.plausible(&input, &out));
    }

    #[test]
    fn loose_alphabets_leave_words_alone() {
        for (codec, word) in [(&BASE85, "abc"), (&BASE85, "dog"), (&BASE85, "admin"), (&ASCII85, "cat"), (&BASE85, "baz")] {
            let input = Payload::from(word);
            let out = decode(codec, word).unwrap();
            assert!(!codec.plausible(&input, &out), "{word} -> {out}");
        }
        let input = Payload::from("9jqo^BlbD-");
        let out = decode(&ASCII85, "9jqo^BlbD-").unwrap();
        assert!(ASCII85.plausible(&input, &out));
    }
}
