//! Decompressing codecs: zlib, gzip, zstd and LZMA.
//!
//! # Output cap
//! Every decoder streams into a buffer that is checked before each append.
//! Once the produced length would pass `limit`, decoding stops with
//! [`DecodeError::SizeLimitExceeded`]; a decompression bomb never gets more
//! than `limit` bytes (plus one internal chunk) materialised.  The zstd
//! window, which the decoder allocates up front, is bounded the same way.
//!
//! # Magic
//! Gzip, zstd and LZMA are only attempted when the input starts with their
//! signature.  Zlib relies on the RFC 1950 header check done by the inflater.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};

use super::{Codec, CodecId, DecodeError};
use crate::payload::Payload;

/// Inflate scratch size.
const INFLATE_BUF_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
/// Window of `zstd -19` without `--long`; always allowed.
const ZSTD_MIN_WINDOW_LOG: u32 = 23;
/// Largest window log zstd accepts on every target.
const ZSTD_MAX_WINDOW_LOG: u32 = 30;
/// lc=3 lp=0 pb=2, the properties byte every mainstream encoder writes.
const LZMA_PROPS: u8 = 0x5d;
/// props(1) + dict size(4) + unpacked size(8).
const LZMA_HEADER_LEN: usize = 13;

// ── Bounded helpers ──────────────────────────────────────────────────────────

/// Inflate a complete zlib stream, refusing to produce more than `limit`
/// bytes.  The stream must end with a valid Adler-32 trailer.
pub fn inflate_zlib(codec: &'static str, input: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut de = Decompress::new(true);
    let mut buf = vec![0u8; INFLATE_BUF_SIZE];
    let mut out = Vec::new();
    let mut in_pos = 0usize;

    loop {
        let before_in = de.total_in() as usize;
        let before_out = de.total_out() as usize;

        let status = de
            .decompress(&input[in_pos..], &mut buf, FlushDecompress::None)
            .map_err(|e| DecodeError::malformed(codec, e.to_string()))?;

        let consumed = de.total_in() as usize - before_in;
        let produced = de.total_out() as usize - before_out;
        in_pos += consumed;

        if produced != 0 {
            if out.len() + produced > limit {
                return Err(DecodeError::SizeLimitExceeded { codec, limit });
            }
            out.extend_from_slice(&buf[..produced]);
        }

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 {
                    let reason = if in_pos >= input.len() { "truncated stream" } else { "inflate stalled" };
                    return Err(DecodeError::malformed(codec, reason));
                }
            }
        }
    }
}

/// Drain `reader`, failing once more than `limit` bytes come out.
pub fn read_capped<R: Read>(codec: &'static str, reader: R, limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::malformed(codec, e.to_string()))?;
    if out.len() > limit {
        return Err(DecodeError::SizeLimitExceeded { codec, limit });
    }
    Ok(out)
}

/// `Write` sink that errors instead of growing past its limit.  Used for
/// decoders that push output rather than being pulled from.
pub struct CappedWriter {
    buf:       Vec<u8>,
    limit:     usize,
    pub overflowed: bool,
}

impl CappedWriter {
    pub fn new(limit: usize) -> Self {
        Self { buf: Vec::new(), limit, overflowed: false }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for CappedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            self.overflowed = true;
            return Err(io::Error::new(io::ErrorKind::WriteZero, "output cap reached"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Codec implementations ────────────────────────────────────────────────────

pub struct ZlibCodec;
impl Codec for ZlibCodec {
    fn name(&self) -> &'static str { CodecId::Zlib.name() }
    fn display_name(&self) -> &'static str { CodecId::Zlib.display_name() }
    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        inflate_zlib(self.name(), input.as_bytes(), limit).map(Payload::from_bytes)
    }
}

pub struct GzipCodec;
impl Codec for GzipCodec {
    fn name(&self) -> &'static str { CodecId::Gzip.name() }
    fn display_name(&self) -> &'static str { CodecId::Gzip.display_name() }
    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        if !data.starts_with(GZIP_MAGIC) {
            return Err(DecodeError::malformed(self.name(), "missing gzip magic"));
        }
        read_capped(self.name(), GzDecoder::new(data), limit).map(Payload::from_bytes)
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn name(&self) -> &'static str { CodecId::Zstd.name() }
    fn display_name(&self) -> &'static str { CodecId::Zstd.display_name() }
    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        if !data.starts_with(ZSTD_MAGIC) {
            return Err(DecodeError::malformed(self.name(), "missing zstd magic"));
        }
        let mut decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| DecodeError::malformed(self.name(), e.to_string()))?;
        decoder
            .window_log_max(window_log_for(limit))
            .map_err(|e| DecodeError::malformed(self.name(), e.to_string()))?;
        match read_capped(self.name(), decoder, limit) {
            Err(DecodeError::Malformed { reason, .. }) if reason.contains("too much memory") => {
                Err(DecodeError::SizeLimitExceeded { codec: self.name(), limit })
            }
            result => result.map(Payload::from_bytes),
        }
    }
}

/// Window log the zstd decoder may allocate for an output cap of `limit`:
/// enough to hold `limit` bytes, never below what ordinary levels write.
fn window_log_for(limit: usize) -> u32 {
    let log = usize::BITS - limit.saturating_sub(1).leading_zeros();
    log.clamp(ZSTD_MIN_WINDOW_LOG, ZSTD_MAX_WINDOW_LOG)
}

pub struct LzmaCodec;
impl Codec for LzmaCodec {
    fn name(&self) -> &'static str { CodecId::Lzma.name() }
    fn display_name(&self) -> &'static str { CodecId::Lzma.display_name() }
    fn decode(&self, input: &Payload, limit: usize) -> Result<Payload, DecodeError> {
        let data = input.as_bytes();
        if data.len() < LZMA_HEADER_LEN || data[0] != LZMA_PROPS {
            return Err(DecodeError::malformed(self.name(), "missing lzma header"));
        }
        // The dictionary buffer holds every byte produced until it wraps, so
        // bounding it by `limit` bounds the output that is buffered but not
        // yet flushed to the sink.
        let opts = lzma_rs::decompress::Options { memlimit: Some(limit), ..Default::default() };
        let mut sink = CappedWriter::new(limit);
        let result = lzma_rs::lzma_decompress_with_options(&mut io::Cursor::new(data), &mut sink, &opts);
        match result {
            _ if sink.overflowed => Err(DecodeError::SizeLimitExceeded { codec: self.name(), limit }),
            Err(lzma_rs::error::Error::LzmaError(msg)) if msg.contains("memory limit") => {
                Err(DecodeError::SizeLimitExceeded { codec: self.name(), limit })
            }
            Err(e) => Err(DecodeError::malformed(self.name(), e.to_string())),
            Ok(()) => Ok(Payload::from_bytes(sink.into_inner())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn zlib_roundtrip() {
        let packed = Payload::Bytes(zlib(b"print('hi')"));
        assert_eq!(ZlibCodec.decode(&packed, 1024).unwrap(), Payload::from("print('hi')"));
    }

    #[test]
    fn zlib_truncated_is_malformed() {
        let mut packed = zlib(b"some longer text that will not fit in the first bytes");
        packed.truncate(packed.len() - 6);
        let err = ZlibCodec.decode(&Payload::Bytes(packed), 1024).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { codec: "Zlib", .. }));
    }

    #[test]
    fn zlib_respects_limit() {
        let packed = Payload::Bytes(zlib(&vec![0u8; 200_000]));
        let err = ZlibCodec.decode(&packed, 100_000).unwrap_err();
        assert_eq!(err, DecodeError::SizeLimitExceeded { codec: "Zlib", limit: 100_000 });
    }

    #[test]
    fn plain_text_is_not_zlib() {
        assert!(ZlibCodec.decode(&Payload::from("hello world"), 1024).is_err());
    }

    #[test]
    fn gzip_roundtrip_and_limit() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&vec![b'a'; 4096]).unwrap();
        let packed = Payload::Bytes(enc.finish().unwrap());
        assert_eq!(GzipCodec.decode(&packed, 4096).unwrap().len(), 4096);
        assert!(GzipCodec.decode(&packed, 4095).unwrap_err().is_size_limit());
    }

    #[test]
    fn zstd_roundtrip() {
        let packed = Payload::Bytes(zstd::encode_all(&b"zstd layer"[..], 3).unwrap());
        assert_eq!(ZstdCodec.decode(&packed, 1024).unwrap(), Payload::from("zstd layer"));
        assert!(ZstdCodec.decode(&Payload::from("zstd layer"), 1024).is_err());
    }

    #[test]
    fn zstd_window_follows_limit() {
        assert_eq!(window_log_for(1024), ZSTD_MIN_WINDOW_LOG);
        assert_eq!(window_log_for(64 << 20), 26);
        assert_eq!(window_log_for(usize::MAX), ZSTD_MAX_WINDOW_LOG);

        // Streamed without a pledged size, so the header keeps the 32 MiB window.
        let mut enc = zstd::stream::write::Encoder::new(Vec::new(), 3).unwrap();
        enc.window_log(25).unwrap();
        enc.write_all(b"wide window, small payload").unwrap();
        let packed = Payload::Bytes(enc.finish().unwrap());

        assert!(ZstdCodec.decode(&packed, 1 << 20).unwrap_err().is_size_limit());
        assert_eq!(ZstdCodec.decode(&packed, 32 << 20).unwrap(), Payload::from("wide window, small payload"));
    }

    #[test]
    fn lzma_roundtrip_and_limit() {
        let mut packed = Vec::new();
        lzma_rs::lzma_compress(&mut io::Cursor::new(vec![b'x'; 10_000]), &mut packed).unwrap();
        let packed = Payload::Bytes(packed);
        assert_eq!(LzmaCodec.decode(&packed, 10_000).unwrap().len(), 10_000);
        assert!(LzmaCodec.decode(&packed, 1_000).unwrap_err().is_size_limit());
    }

    #[test]
    fn capped_writer_flags_overflow() {
        let mut w = CappedWriter::new(4);
        w.write_all(b"abcd").unwrap();
        assert!(w.write_all(b"e").is_err());
        assert!(w.overflowed);
        assert_eq!(w.into_inner(), b"abcd");
    }
}
