//! Buffered reader (C4): a single pooled byte buffer with refill/compaction
//! across record boundaries, per spec §4.2.
//!
//! The buffer tracks a monotonically increasing `generation` counter that
//! increments on every refill that moves the read cursor's backing storage
//! (compaction or growth). A [`crate::tokenizer::FieldSpan`] captured
//! against one generation is only valid to read back until the generation
//! changes again (spec's "buffer generation" invariant).

use std::io::{self, Read};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Owns a single pooled byte buffer; refills on demand and compacts the
/// unread tail to the front when it runs low on trailing space.
pub struct PooledBuffer {
    data: Vec<u8>,
    /// start of unread data
    pos: usize,
    /// end of valid data
    len: usize,
    generation: u64,
    source_eof: bool,
    bom_checked: bool,
}

impl PooledBuffer {
    pub fn new(capacity: usize) -> Self {
        PooledBuffer {
            data: vec![0_u8; capacity.max(4096)],
            pos: 0,
            len: 0,
            generation: 0,
            source_eof: false,
            bom_checked: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bytes available to read without a further fill.
    pub fn peek(&self) -> &[u8] {
        &self.data[self.pos..self.len]
    }

    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.len);
        self.pos += n;
    }

    pub fn is_exhausted(&self) -> bool {
        self.source_eof && self.pos == self.len
    }

    /// Compacts the unread tail to the front of the buffer, growing it if
    /// the tail alone doesn't leave room for a refill, then reads more bytes
    /// from `source`. Returns the number of new bytes read (0 at EOF).
    ///
    /// On the very first call, strips a UTF-8 BOM if present, per spec
    /// §4.2 (UTF-16 BOM stripping happens upstream in the text decoder,
    /// which transcodes to BOM-less UTF-8 before bytes reach this buffer).
    pub fn fill(&mut self, source: &mut dyn Read) -> io::Result<usize> {
        if self.source_eof {
            return Ok(0);
        }

        let unread = self.len - self.pos;
        if self.pos > 0 {
            self.data.copy_within(self.pos..self.len, 0);
            self.len = unread;
            self.pos = 0;
            self.generation += 1;
        }
        if self.len == self.data.len() {
            let new_cap = self.data.len().checked_mul(2).unwrap_or(self.data.len());
            self.data.resize(new_cap.max(self.data.len() + 4096), 0);
            self.generation += 1;
        }

        let n = source.read(&mut self.data[self.len..])?;
        self.len += n;
        if n == 0 {
            self.source_eof = true;
        }

        if !self.bom_checked {
            self.bom_checked = true;
            if self.peek().starts_with(UTF8_BOM) {
                self.pos += UTF8_BOM.len();
            }
        }

        Ok(n)
    }

    /// Ensures at least `want` bytes are available (or EOF is reached),
    /// refilling repeatedly as needed. Used by the tokenizer when a
    /// multi-character delimiter needs lookahead, or a field is still open
    /// at the end of the buffer.
    pub fn ensure(&mut self, want: usize, source: &mut dyn Read) -> io::Result<()> {
        while self.len - self.pos < want && !self.source_eof {
            self.fill(source)?;
        }
        Ok(())
    }
}
