//! Field tokenizer (C5): a byte-driven state machine scanning the pooled
//! buffer, per spec §4.3.
//!
//! The scan never calls [`PooledBuffer::advance`] until a field's full
//! extent (delimiter or record terminator inclusive) is known, so every
//! local index used while scanning stays relative to `buf.peek()`'s current
//! start and survives any refill/compaction triggered by `buf.ensure`
//! along the way. Once the boundary is found, `next_field` returns the
//! field's data together with the number of bytes to advance by; the
//! caller must read any [`FieldData::Span`] bytes out of `buf.peek()`
//! *before* calling [`Tokenizer::commit`], since that's what actually
//! moves the buffer's read cursor (and, on the next fill, its generation).
//!
//! Unquoted fields are reported as a zero-copy `[lo, hi)` span into the
//! buffer's current unread window. Quoted fields always go through a
//! scratch buffer: removing the enclosing quotes (and un-doubling any
//! embedded quotes) is itself a rewrite, so there's no byte range in the
//! source buffer equal to the field's logical value.

use std::io::Read;

use crate::buffer::PooledBuffer;
use crate::error::{CsvCoreError, ErrorKind, ErrorPolicy, Fault, Recovery};
use crate::options::{QuoteMode, Trimming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StartOfField,
    InUnquotedField,
    InQuotedField,
    QuoteInQuotedField,
}

/// A field's value as produced by the tokenizer.
#[derive(Debug, Clone)]
pub enum FieldData {
    /// Zero-copy span `[lo, hi)` into `buf.peek()` as it stood when this
    /// event was returned. Read it out before calling [`Tokenizer::commit`].
    Span { lo: usize, hi: usize },
    /// Owned bytes: quoted fields, or fields recovered after an
    /// error-policy skip.
    Owned(Vec<u8>),
    /// Distinguished null per `distinguish_empty_from_null` (spec §4.3).
    Null,
}

#[derive(Debug)]
pub struct FieldEvent {
    pub data: FieldData,
    pub record_end: bool,
    /// Bytes to advance `buf` by (field content plus delimiter/terminator)
    /// once the caller is done reading any `Span` out of `buf.peek()`.
    pub consumed: usize,
}

fn normalize_smart_quote(bytes: &[u8]) -> Option<(u8, usize)> {
    // Unicode left/right double quotation marks U+201C/U+201D are encoded in
    // UTF-8 as E2 80 9C / E2 80 9D; single quotation marks U+2018/U+2019 as
    // E2 80 98 / E2 80 99.
    if bytes.len() < 3 || bytes[0] != 0xE2 || bytes[1] != 0x80 {
        return None;
    }
    match bytes[2] {
        0x9C | 0x9D => Some((b'"', 3)),
        0x98 | 0x99 => Some((b'\'', 3)),
        _ => None,
    }
}

pub struct Tokenizer {
    pub delimiter: Vec<u8>,
    pub quote: u8,
    pub quote_mode: QuoteMode,
    pub trimming: Trimming,
    pub normalize_smart_quotes: bool,
    pub max_quoted_field_length: usize,
    pub distinguish_empty_from_null: bool,
    pub line_number: u64,
    pub column: u64,
}

impl Tokenizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        delimiter: Vec<u8>,
        quote: u8,
        quote_mode: QuoteMode,
        trimming: Trimming,
        normalize_smart_quotes: bool,
        max_quoted_field_length: usize,
        distinguish_empty_from_null: bool,
    ) -> Self {
        Tokenizer {
            delimiter,
            quote,
            quote_mode,
            trimming,
            normalize_smart_quotes,
            max_quoted_field_length,
            distinguish_empty_from_null,
            line_number: 1,
            column: 0,
        }
    }

    fn is_trim_unquoted(&self) -> bool {
        matches!(self.trimming, Trimming::UnquotedOnly | Trimming::All)
    }

    fn is_trim_quoted(&self) -> bool {
        matches!(self.trimming, Trimming::QuotedOnly | Trimming::All)
    }

    /// Advances `buf` past the bytes an already-returned [`FieldEvent`]
    /// accounted for. Must be called exactly once per event, after any
    /// `Span` data has been read out.
    pub fn commit(&self, buf: &mut PooledBuffer, event: &FieldEvent) {
        buf.advance(event.consumed);
    }

    /// Peeks the very next byte without consuming it, refilling if needed.
    /// Returns `None` at true EOF.
    pub fn peek_byte(
        &self,
        buf: &mut PooledBuffer,
        source: &mut dyn Read,
    ) -> std::io::Result<Option<u8>> {
        buf.ensure(1, source)?;
        Ok(buf.peek().first().copied())
    }

    /// Discards an entire physical line (comment handling, spec §4.3/§4.4),
    /// without emitting any field.
    pub fn skip_physical_line(
        &mut self,
        buf: &mut PooledBuffer,
        source: &mut dyn Read,
    ) -> std::io::Result<()> {
        loop {
            buf.ensure(1, source)?;
            let bytes = buf.peek();
            if bytes.is_empty() {
                return Ok(());
            }
            match bytes[0] {
                b'\n' => {
                    buf.advance(1);
                    self.line_number += 1;
                    return Ok(());
                }
                b'\r' => {
                    buf.advance(1);
                    buf.ensure(1, source)?;
                    if buf.peek().first() == Some(&b'\n') {
                        buf.advance(1);
                    }
                    self.line_number += 1;
                    return Ok(());
                }
                _ => buf.advance(1),
            }
        }
    }

    fn terminator_len(bytes: &[u8]) -> Option<usize> {
        match bytes.first() {
            Some(b'\r') => Some(if bytes.get(1) == Some(&b'\n') { 2 } else { 1 }),
            Some(b'\n') => Some(1),
            _ => None,
        }
    }

    /// Reads the next field. Returns `Ok(None)` only when called at the
    /// absolute start of a record and the source is exhausted (true EOF).
    pub fn next_field(
        &mut self,
        buf: &mut PooledBuffer,
        source: &mut dyn Read,
        record_index: u64,
        field_index: u64,
        policy: &mut ErrorPolicy,
    ) -> crate::error::Result<Option<FieldEvent>> {
        let mut state = State::StartOfField;
        let mut i: usize = 0;
        let mut span_lo: usize = 0;
        let mut scratch: Vec<u8> = Vec::new();

        loop {
            let lookahead = i + self.delimiter.len().max(4);
            buf.ensure(lookahead, source).map_err(CsvCoreError::from_io)?;
            let bytes = buf.peek();
            let at_eof = bytes.len() <= i;

            if at_eof {
                return match state {
                    State::StartOfField if i == 0 => Ok(None),
                    State::StartOfField => Ok(Some(self.empty_event(i, true))),
                    State::InUnquotedField => Ok(Some(self.span_event(buf, span_lo, i, i, true))),
                    // The closing quote was already consumed to reach this
                    // state, so the field is well-formed even without a
                    // trailing record terminator.
                    State::QuoteInQuotedField => {
                        let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                        Ok(Some(FieldEvent { data: FieldData::Owned(bytes), record_end: true, consumed: i }))
                    }
                    State::InQuotedField => {
                        if self.quote_mode == QuoteMode::Strict {
                            let fault = Fault::new(
                                ErrorKind::MalformedQuote,
                                record_index,
                                self.line_number,
                                self.column,
                            )
                            .with_field(field_index)
                            .with_cause("unterminated quoted field at end of input");
                            policy.handle(fault)?;
                        }
                        let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                        Ok(Some(FieldEvent { data: FieldData::Owned(bytes), record_end: true, consumed: i }))
                    }
                };
            }

            let remaining = &bytes[i..];
            let b = remaining[0];
            let smart = if self.normalize_smart_quotes { normalize_smart_quote(remaining) } else { None };

            match state {
                State::StartOfField => {
                    if self.is_trim_unquoted() && (b == b' ' || b == b'\t') {
                        i += 1;
                        self.column += 1;
                        continue;
                    }
                    let effective = smart.map(|(ch, _)| ch).unwrap_or(b);
                    if effective == self.quote {
                        i += smart.map(|(_, n)| n).unwrap_or(1);
                        self.column += 1;
                        state = State::InQuotedField;
                        continue;
                    }
                    if remaining.starts_with(&self.delimiter[..]) {
                        i += self.delimiter.len();
                        self.column += self.delimiter.len() as u64;
                        return Ok(Some(self.empty_event(i, false)));
                    }
                    if let Some(term_len) = Self::terminator_len(remaining) {
                        i += term_len;
                        self.line_number += 1;
                        self.column = 0;
                        return Ok(Some(self.empty_event(i, true)));
                    }
                    span_lo = i;
                    state = State::InUnquotedField;
                }
                State::InUnquotedField => {
                    if remaining.starts_with(&self.delimiter[..]) {
                        let hi = i;
                        i += self.delimiter.len();
                        self.column += self.delimiter.len() as u64;
                        return Ok(Some(self.span_event(buf, span_lo, hi, i, false)));
                    }
                    if let Some(term_len) = Self::terminator_len(remaining) {
                        let hi = i;
                        i += term_len;
                        self.line_number += 1;
                        self.column = 0;
                        return Ok(Some(self.span_event(buf, span_lo, hi, i, true)));
                    }
                    // Single-byte delimiter: jump straight to the next
                    // candidate boundary byte instead of re-checking one
                    // byte at a time.
                    if self.delimiter.len() == 1 {
                        let skip = memchr::memchr3(self.delimiter[0], b'\n', b'\r', remaining)
                            .unwrap_or(remaining.len())
                            .max(1);
                        i += skip;
                        self.column += skip as u64;
                        continue;
                    }
                    i += 1;
                    self.column += 1;
                }
                State::InQuotedField => {
                    let effective = smart.map(|(ch, _)| ch).unwrap_or(b);
                    if effective == self.quote {
                        i += smart.map(|(_, n)| n).unwrap_or(1);
                        self.column += 1;
                        state = State::QuoteInQuotedField;
                        continue;
                    }
                    if self.quote_mode == QuoteMode::Lenient && b == b'\\' && remaining.get(1) == Some(&self.quote) {
                        scratch.push(self.quote);
                        i += 2;
                        self.column += 2;
                        continue;
                    }
                    if b == b'\n' {
                        self.line_number += 1;
                    }
                    scratch.push(b);
                    i += 1;
                    self.column += 1;
                    if self.max_quoted_field_length != 0 && scratch.len() > self.max_quoted_field_length {
                        let fault = Fault::new(
                            ErrorKind::FieldTooLong,
                            record_index,
                            self.line_number,
                            self.column,
                        )
                        .with_field(field_index);
                        match policy.handle(fault)? {
                            Recovery::SkipFieldAndLine => {
                                buf.advance(i);
                                self.skip_physical_line(buf, source).map_err(CsvCoreError::from_io)?;
                                return Ok(Some(FieldEvent {
                                    data: FieldData::Owned(Vec::new()),
                                    record_end: true,
                                    consumed: 0,
                                }));
                            }
                            _ => {
                                let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                                return Ok(Some(FieldEvent {
                                    data: FieldData::Owned(bytes),
                                    record_end: true,
                                    consumed: i,
                                }));
                            }
                        }
                    }
                }
                State::QuoteInQuotedField => {
                    let effective = smart.map(|(ch, _)| ch).unwrap_or(b);
                    if effective == self.quote {
                        scratch.push(self.quote);
                        i += smart.map(|(_, n)| n).unwrap_or(1);
                        self.column += 1;
                        state = State::InQuotedField;
                        continue;
                    }
                    if remaining.starts_with(&self.delimiter[..]) {
                        i += self.delimiter.len();
                        self.column += self.delimiter.len() as u64;
                        let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                        return Ok(Some(FieldEvent { data: FieldData::Owned(bytes), record_end: false, consumed: i }));
                    }
                    if let Some(term_len) = Self::terminator_len(remaining) {
                        i += term_len;
                        self.line_number += 1;
                        self.column = 0;
                        let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                        return Ok(Some(FieldEvent { data: FieldData::Owned(bytes), record_end: true, consumed: i }));
                    }
                    if self.quote_mode == QuoteMode::Strict {
                        let fault = Fault::new(
                            ErrorKind::MalformedQuote,
                            record_index,
                            self.line_number,
                            self.column,
                        )
                        .with_field(field_index)
                        .with_cause("unexpected character after closing quote");
                        match policy.handle(fault)? {
                            Recovery::AdvanceLine => {
                                buf.advance(i);
                                self.skip_physical_line(buf, source).map_err(CsvCoreError::from_io)?;
                                return Ok(Some(FieldEvent {
                                    data: FieldData::Owned(Vec::new()),
                                    record_end: true,
                                    consumed: 0,
                                }));
                            }
                            _ => {
                                let bytes = self.finish_quoted(std::mem::take(&mut scratch));
                                return Ok(Some(FieldEvent { data: FieldData::Owned(bytes), record_end: true, consumed: i }));
                            }
                        }
                    }
                    // lenient: tolerate stray bytes after the closing quote
                    // as literal content and resume accumulating.
                    scratch.push(b);
                    i += 1;
                    self.column += 1;
                    state = State::InQuotedField;
                }
            }
        }
    }

    fn finish_quoted(&self, bytes: Vec<u8>) -> Vec<u8> {
        if self.is_trim_quoted() {
            trim_bytes(&bytes).to_vec()
        } else {
            bytes
        }
    }

    fn span_event(&self, buf: &PooledBuffer, lo: usize, mut hi: usize, consumed: usize, record_end: bool) -> FieldEvent {
        if self.is_trim_unquoted() {
            let bytes = buf.peek();
            while hi > lo && matches!(bytes.get(hi - 1), Some(b' ') | Some(b'\t')) {
                hi -= 1;
            }
        }
        if lo == hi {
            return self.empty_event(consumed, record_end);
        }
        FieldEvent { data: FieldData::Span { lo, hi }, record_end, consumed }
    }

    fn empty_event(&self, consumed: usize, record_end: bool) -> FieldEvent {
        let data = if self.distinguish_empty_from_null { FieldData::Null } else { FieldData::Owned(Vec::new()) };
        FieldEvent { data, record_end, consumed }
    }
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != b' ' && *b != b'\t').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| *b != b' ' && *b != b'\t').map(|i| i + 1).unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorPolicy, ParseErrorAction};
    use std::io::Cursor;

    fn drive(input: &[u8], mut tok: Tokenizer) -> Vec<(Vec<u8>, bool)> {
        let mut buf = PooledBuffer::new(64);
        let mut src_storage = Cursor::new(input.to_vec());
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut out = Vec::new();
        let mut record_index = 0u64;
        let mut field_index = 0u64;
        loop {
            match tok
                .next_field(&mut buf, &mut src_storage, record_index, field_index, &mut policy)
                .unwrap()
            {
                None => break,
                Some(ev) => {
                    let bytes = match &ev.data {
                        FieldData::Span { lo, hi } => buf.peek()[*lo..*hi].to_vec(),
                        FieldData::Owned(v) => v.clone(),
                        FieldData::Null => Vec::new(),
                    };
                    let record_end = ev.record_end;
                    tok.commit(&mut buf, &ev);
                    out.push((bytes, record_end));
                    field_index += 1;
                    if record_end {
                        record_index += 1;
                        field_index = 0;
                    }
                }
            }
        }
        out
    }

    fn basic_tokenizer() -> Tokenizer {
        Tokenizer::new(vec![b','], b'"', QuoteMode::Strict, Trimming::None, false, 0, false)
    }

    #[test]
    fn splits_simple_unquoted_record() {
        let out = drive(b"a,b,c\n", basic_tokenizer());
        assert_eq!(
            out,
            vec![(b"a".to_vec(), false), (b"b".to_vec(), false), (b"c".to_vec(), true)]
        );
    }

    #[test]
    fn handles_quoted_field_with_doubled_quote() {
        let out = drive(b"\"say \"\"hi\"\"\",2\n", basic_tokenizer());
        assert_eq!(out[0].0, b"say \"hi\"".to_vec());
        assert_eq!(out[1].0, b"2".to_vec());
    }

    #[test]
    fn quoted_field_can_contain_delimiter_and_newline() {
        let out = drive(b"\"a,b\nc\",x\n", basic_tokenizer());
        assert_eq!(out[0].0, b"a,b\nc".to_vec());
        assert_eq!(out[1], (b"x".to_vec(), true));
    }

    #[test]
    fn trims_unquoted_whitespace_when_configured() {
        let tok = Tokenizer::new(vec![b','], b'"', QuoteMode::Strict, Trimming::All, false, 0, false);
        let out = drive(b"  a  , b \n", tok);
        assert_eq!(out[0].0, b"a".to_vec());
        assert_eq!(out[1].0, b"b".to_vec());
    }

    #[test]
    fn multi_char_delimiter_is_respected() {
        let tok = Tokenizer::new(b"::".to_vec(), b'"', QuoteMode::Strict, Trimming::None, false, 0, false);
        let out = drive(b"a::b::c\n", tok);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].0, b"b".to_vec());
    }

    #[test]
    fn last_field_without_trailing_newline_is_emitted() {
        let out = drive(b"a,b", basic_tokenizer());
        assert_eq!(out, vec![(b"a".to_vec(), false), (b"b".to_vec(), true)]);
    }

    #[test]
    fn quoted_last_field_without_trailing_newline_is_well_formed() {
        let out = drive(b"\"x\",\"y\"", basic_tokenizer());
        assert_eq!(out, vec![(b"x".to_vec(), false), (b"y".to_vec(), true)]);
    }

    #[test]
    fn empty_fields_distinguish_null_when_configured() {
        let mut tok = Tokenizer::new(vec![b','], b'"', QuoteMode::Strict, Trimming::None, false, 0, true);
        let mut buf = PooledBuffer::new(64);
        let mut src_storage = Cursor::new(b"a,,c\n".to_vec());
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let first = tok.next_field(&mut buf, &mut src_storage, 0, 0, &mut policy).unwrap().unwrap();
        tok.commit(&mut buf, &first);
        let second = tok.next_field(&mut buf, &mut src_storage, 0, 1, &mut policy).unwrap().unwrap();
        assert!(matches!(second.data, FieldData::Null));
    }
}
