//! Interpreter bytecode containers.
//!
//! Recognises a serialized code object, either bare (first byte `0xe3`, a
//! code-object tag with the reference flag set) or behind a compiled-file
//! header (`XX XX 0d 0a` magic followed by 4, 8 or 12 bytes of metadata).
//! The tag alone is one byte in 256, so the fixed 32-bit fields after it
//! must be followed by an in-bounds bytecode record as well.
//! The code object is never evaluated.  Instead every string record in the
//! stream is collected, which surfaces names, literals and embedded source
//! (the part a human wants to read) in order of appearance.
//!
//! Record layout: a tag byte (high bit is the reference flag), then either a
//! 32-bit little-endian length for `s`/`u`/`t`/`a`/`A` or an 8-bit length
//! for the short-ASCII tags `z`/`Z`.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashSet;

use super::{Codec, CodecId, DecodeError};
use crate::payload::Payload;

const CODE_TAG: u8 = 0xe3;
const FLAG_REF: u8 = 0x80;
/// Compiled-file header sizes across interpreter versions, newest first.
const HEADER_SIZES: [usize; 3] = [16, 12, 8];
/// 32-bit fields between the code tag and the bytecode record: five, or six
/// for the versions that also store `nlocals`.
const FIELD_COUNTS: [usize; 2] = [5, 6];

/// True if `data` is a code tag, the fixed fields, then a bytecode record
/// that fits inside `data`.
fn is_code_object(data: &[u8]) -> bool {
    data.first() == Some(&CODE_TAG)
        && FIELD_COUNTS.into_iter().any(|fields| {
            let at = 1 + 4 * fields;
            match (data.get(at), data.get(at + 1..at + 5)) {
                (Some(&tag), Some(len)) if tag & !FLAG_REF == b's' => (at + 5)
                    .checked_add(LittleEndian::read_u32(len) as usize)
                    .map_or(false, |end| end <= data.len()),
                _ => false,
            }
        })
}

/// Offset of the code object inside `data`, if it is a bytecode container.
pub fn code_object_offset(data: &[u8]) -> Option<usize> {
    if is_code_object(data) {
        return Some(0);
    }
    if data.len() > 8 && &data[2..4] == b"\r\n" {
        return HEADER_SIZES.into_iter().find(|&h| is_code_object(&data[h.min(data.len())..]));
    }
    None
}

/// Printable string records in `data`, deduplicated, in stream order.
pub fn extract_strings(data: &[u8]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < data.len() {
        let (header, len) = match data[i] & !FLAG_REF {
            b's' | b'u' | b't' | b'a' | b'A' if i + 5 <= data.len() => {
                (5, LittleEndian::read_u32(&data[i + 1..i + 5]) as usize)
            }
            b'z' | b'Z' if i + 2 <= data.len() => (2, usize::from(data[i + 1])),
            _ => {
                i += 1;
                continue;
            }
        };

        let start = i + header;
        let Some(end) = start.checked_add(len).filter(|&end| end <= data.len()) else {
            i += 1;
            continue;
        };

        // Whole records are skipped even when binary: a bytes record is
        // usually the instruction stream and scanning inside it only finds
        // noise.
        if let Ok(s) = std::str::from_utf8(&data[start..end]) {
            if !s.is_empty() && s.chars().all(|c| !c.is_control() || c.is_whitespace()) && seen.insert(s) {
                out.push(s.to_owned());
            }
        }
        i = end.max(i + 1);
    }
    out
}

pub struct MarshalCodec;

impl Codec for MarshalCodec {
    fn name(&self) -> &'static str { CodecId::Marshal.name() }
    fn display_name(&self) -> &'static str { CodecId::Marshal.display_name() }

    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        let offset = code_object_offset(data)
            .ok_or_else(|| DecodeError::malformed(self.name(), "no code object header"))?;

        let strings = extract_strings(&data[offset + 1..]);
        if strings.is_empty() {
            return Err(DecodeError::malformed(self.name(), "no string constants"));
        }
        let text = strings.join("\n");
        if text.len() > limit {
            return Err(DecodeError::SizeLimitExceeded { codec: self.name(), limit });
        }
        Ok(Payload::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(tag: u8, s: &str) -> Vec<u8> {
        let mut v = vec![tag, s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    fn long(tag: u8, s: &[u8]) -> Vec<u8> {
        let mut v = vec![tag];
        v.extend_from_slice(&(s.len() as u32).to_le_bytes());
        v.extend_from_slice(s);
        v
    }

    fn sample_code_object() -> Vec<u8> {
        // argcount, posonlyargcount, kwonlyargcount, stacksize, flags
        let mut v = vec![CODE_TAG, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0x40, 0, 0, 0];
        v.extend(long(b's' | FLAG_REF, &[0x64, 0x00, 0x53, 0x00]));
        v.extend(short(b'Z' | FLAG_REF, "print"));
        v.extend(long(b'u', "flag{layers}".as_bytes()));
        v.extend(short(b'z', "print"));
        v.extend(short(b'z', "<module>"));
        v
    }

    #[test]
    fn bare_code_object() {
        let out = MarshalCodec.decode(&Payload::Bytes(sample_code_object()), 1024).unwrap();
        assert_eq!(out, Payload::from("print\nflag{layers}\n<module>"));
    }

    #[test]
    fn compiled_file_header() {
        let mut data = vec![0x55, 0x0d, b'\r', b'\n', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        data.extend(sample_code_object());
        assert_eq!(code_object_offset(&data), Some(16));
        assert!(MarshalCodec.decode(&Payload::Bytes(data), 1024).is_ok());
    }

    #[test]
    fn rejects_non_containers() {
        assert!(MarshalCodec.decode(&Payload::from("print('x')"), 1024).is_err());
        assert!(MarshalCodec.decode(&Payload::Bytes(vec![CODE_TAG, 0, 0]), 1024).is_err());
    }

    #[test]
    fn six_field_layout() {
        let mut data = vec![CODE_TAG];
        data.extend_from_slice(&[0; 24]);
        data.extend(long(b's', &[0x64, 0x00]));
        data.extend(short(b'z', "main"));
        assert_eq!(code_object_offset(&data), Some(0));
    }

    #[test]
    fn stray_code_tag_is_not_a_container() {
        // Base64-decoding the hex text of "Hello, World" yields these bytes.
        let noise = [0xe3, 0xce, 0xb9, 0xe9, 0xce, 0x9c, 0xe9, 0xfd, 0x9c, 0xdb, 0x4e, 0x7b, 0xe9, 0xfe, 0xf6, 0xe9, 0xce, 0xb8];
        assert_eq!(code_object_offset(&noise), None);
        assert!(MarshalCodec.decode(&Payload::Bytes(noise.to_vec()), 1024).is_err());

        // Record length runs past the end.
        let mut truncated = vec![CODE_TAG];
        truncated.extend_from_slice(&[0; 20]);
        truncated.extend(long(b's', &[0x64, 0x00]));
        truncated.truncate(truncated.len() - 1);
        assert_eq!(code_object_offset(&truncated), None);
    }

    #[test]
    fn oversized_length_does_not_panic() {
        let mut data = vec![CODE_TAG, b's'];
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(extract_strings(&data[1..]).is_empty());
    }
}
