//! Text decoder (C3): converts an arbitrary-encoded byte stream to UTF-8,
//! with BOM-aware encoding selection when the caller hasn't pinned one down.
//!
//! UTF-8 BOM stripping for the already-UTF-8 case is left to the buffered
//! reader (`buffer.rs`), which strips it once at the first fill, per spec
//! §4.2. This module only needs to worry about *choosing* an encoding and
//! transcoding non-UTF-8 input (UTF-16 and others) down to UTF-8 bytes.

use std::io::{self, Read};

use encoding_rs::{Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// Picks an encoding from an explicit override, or sniffs a BOM from the
/// leading bytes, defaulting to UTF-8 (spec §3 `culture`/decoding options;
/// spec §6 "UTF-8 and UTF-16 BOMs are stripped once").
pub fn detect_encoding(explicit: Option<&'static Encoding>, head: &[u8]) -> &'static Encoding {
    if let Some(enc) = explicit {
        return enc;
    }
    if head.starts_with(&[0xFF, 0xFE]) {
        return UTF_16LE;
    }
    if head.starts_with(&[0xFE, 0xFF]) {
        return UTF_16BE;
    }
    UTF_8
}

/// A `Read` adapter that transcodes an arbitrary encoding to UTF-8 bytes,
/// replacing malformed sequences with U+FFFD (matches `encoding_rs`'s
/// non-strict streaming decode, mirroring the teacher's `simdutf8`-accelerated
/// UTF-8 fast path for the already-UTF-8 case).
pub struct TranscodingReader<R> {
    inner: R,
    decoder: Option<Decoder>,
    in_buf: Vec<u8>,
    out_buf: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> TranscodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        let decoder = if encoding == UTF_8 {
            None
        } else {
            Some(encoding.new_decoder())
        };
        TranscodingReader {
            inner,
            decoder,
            in_buf: vec![0_u8; 64 * 1024],
            out_buf: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let decoder = match &mut self.decoder {
            None => return Ok(()),
            Some(d) => d,
        };
        if self.eof {
            return Ok(());
        }
        let n = self.inner.read(&mut self.in_buf)?;
        self.eof = n == 0;
        let max_len = decoder
            .max_utf8_buffer_length(n)
            .unwrap_or(n * 4 + 16);
        let mut out = vec![0_u8; max_len];
        let (_, _, written, _) = decoder.decode_to_utf8(&self.in_buf[..n], &mut out, self.eof);
        out.truncate(written);
        self.out_buf = out;
        self.out_pos = 0;
        Ok(())
    }
}

impl<R: Read> Read for TranscodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.decoder.is_none() {
            return self.inner.read(buf);
        }
        while self.out_pos >= self.out_buf.len() && !self.eof {
            self.refill()?;
        }
        let avail = &self.out_buf[self.out_pos..];
        if avail.is_empty() {
            return Ok(0);
        }
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        self.out_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough_is_untouched() {
        let mut r = TranscodingReader::new(&b"a,b\n1,2\n"[..], UTF_8);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"a,b\n1,2\n");
    }

    #[test]
    fn utf16le_is_transcoded_to_utf8() {
        let (bytes, _, _) = UTF_16LE.encode("a,b\n1,2\n");
        let mut r = TranscodingReader::new(&bytes[..], UTF_16LE);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"a,b\n1,2\n");
    }

    #[test]
    fn bom_detection_prefers_utf16() {
        assert_eq!(detect_encoding(None, &[0xFF, 0xFE, b'a']), UTF_16LE);
        assert_eq!(detect_encoding(None, &[0xFE, 0xFF, b'a']), UTF_16BE);
        assert_eq!(detect_encoding(None, &[b'a', b'b']), UTF_8);
    }
}
