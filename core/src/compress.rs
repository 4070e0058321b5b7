//! Decompression wrapper (C2): format auto-detection plus a decompressed-size
//! guard (spec §4.1).

use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

/// Supported compression formats (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    None,
    Gzip,
    Deflate,
    Zlib,
    Brotli,
}

/// Detect format from a path's extension (spec §4.1 step ii).
pub fn detect_from_extension(path: &Path) -> CompressionFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") | Some("gzip") => CompressionFormat::Gzip,
        Some("deflate") => CompressionFormat::Deflate,
        Some("br") => CompressionFormat::Brotli,
        Some("zlib") => CompressionFormat::Zlib,
        _ => CompressionFormat::None,
    }
}

/// Detect format from magic bytes at the start of a stream (spec §4.1 step
/// iii). `head` must contain at least 2 bytes when available; shorter inputs
/// simply fail to match and fall through to pass-through.
pub fn detect_from_magic(head: &[u8]) -> CompressionFormat {
    if head.len() >= 2 && head[0] == 0x1F && head[1] == 0x8B {
        return CompressionFormat::Gzip;
    }
    if head.len() >= 2
        && head[0] == 0x78
        && matches!(head[1], 0x01 | 0x5E | 0x9C | 0xDA)
    {
        return CompressionFormat::Zlib;
    }
    CompressionFormat::None
}

/// Resolve the effective format: caller-supplied override wins, then
/// extension, then magic bytes, then pass-through (spec §4.1).
pub fn resolve_format(
    caller_supplied: Option<CompressionFormat>,
    path: Option<&Path>,
    head: &[u8],
) -> CompressionFormat {
    if let Some(fmt) = caller_supplied {
        return fmt;
    }
    if let Some(p) = path {
        let by_ext = detect_from_extension(p);
        if by_ext != CompressionFormat::None {
            return by_ext;
        }
    }
    detect_from_magic(head)
}

pub fn wrap_decoder(format: CompressionFormat, source: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    match format {
        CompressionFormat::None => source,
        CompressionFormat::Gzip => Box::new(GzDecoder::new(source)),
        CompressionFormat::Deflate => Box::new(DeflateDecoder::new(source)),
        CompressionFormat::Zlib => Box::new(ZlibDecoder::new(source)),
        CompressionFormat::Brotli => Box::new(brotli::Decompressor::new(source, 4096)),
    }
}

/// Marker type stashed inside an `io::Error` so callers can recognize a
/// bomb-guard trip without threading a separate error channel through
/// `Read::read`.
#[derive(Debug)]
pub struct DecompressionBombMarker {
    pub limit: u64,
    pub delivered: u64,
}

impl fmt::Display for DecompressionBombMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decompressed {} bytes, exceeding the {} byte limit",
            self.delivered, self.limit
        )
    }
}

impl std::error::Error for DecompressionBombMarker {}

pub fn is_bomb_error(e: &io::Error) -> Option<&DecompressionBombMarker> {
    e.get_ref().and_then(|inner| inner.downcast_ref::<DecompressionBombMarker>())
}

/// Wraps a decompressor and counts bytes delivered downstream. Exceeding
/// `limit` raises a fatal error (spec §4.1). `limit == 0` disables the guard.
pub struct BombGuardReader<R> {
    inner: R,
    limit: u64,
    delivered: Arc<AtomicU64>,
}

impl<R: Read> BombGuardReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        BombGuardReader { inner, limit, delivered: Arc::new(AtomicU64::new(0)) }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// A shared handle to the running byte count, readable after this
    /// reader has been boxed into a type-erased pipeline (used by the
    /// progress notifier for `bytes_consumed`).
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.delivered.clone()
    }
}

impl<R: Read> Read for BombGuardReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if self.limit != 0 {
            let total = self.delivered.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
            if total > self.limit {
                tracing::warn!(limit = self.limit, delivered = total, "decompression bomb guard tripped");
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    DecompressionBombMarker { limit: self.limit, delivered: total },
                ));
            }
        } else {
            self.delivered.fetch_add(n as u64, Ordering::Relaxed);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_detection() {
        assert_eq!(detect_from_extension(&PathBuf::from("a.csv.gz")), CompressionFormat::Gzip);
        assert_eq!(detect_from_extension(&PathBuf::from("a.br")), CompressionFormat::Brotli);
        assert_eq!(detect_from_extension(&PathBuf::from("a.csv")), CompressionFormat::None);
    }

    #[test]
    fn magic_detection() {
        assert_eq!(detect_from_magic(&[0x1F, 0x8B, 0x08]), CompressionFormat::Gzip);
        assert_eq!(detect_from_magic(&[0x78, 0x9C]), CompressionFormat::Zlib);
        assert_eq!(detect_from_magic(&[b'a', b'b']), CompressionFormat::None);
    }

    #[test]
    fn bomb_guard_trips_past_limit() {
        let data = vec![0_u8; 100];
        let mut guard = BombGuardReader::new(&data[..], 10);
        let mut buf = vec![0_u8; 100];
        let err = guard.read(&mut buf).unwrap_err();
        assert!(is_bomb_error(&err).is_some());
    }

    #[test]
    fn bomb_guard_disabled_at_zero() {
        let data = vec![0_u8; 100];
        let mut guard = BombGuardReader::new(&data[..], 0);
        let mut buf = vec![0_u8; 100];
        assert_eq!(guard.read(&mut buf).unwrap(), 100);
    }
}
