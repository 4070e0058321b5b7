//! Record assembler (C6): turns a stream of field events into validated,
//! arity-checked records (spec §4.4).

use smallvec::SmallVec;
use std::io::Read;

use crate::buffer::PooledBuffer;
use crate::error::{CsvCoreError, ErrorKind, ErrorPolicy, Fault, Recovery};
use crate::options::MismatchedFieldPolicy;
use crate::tokenizer::{FieldData, Tokenizer};

/// One field's resolved value, already copied out of the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Null => None,
        }
    }
}

/// A record's fields in source (pre-projection) order. Most tables are
/// narrow, so the common case avoids a heap allocation per record.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub fields: SmallVec<[FieldValue; 8]>,
    pub line_number: u64,
}

fn bytes_to_field_value(bytes: &[u8]) -> FieldValue {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) => FieldValue::Text(s.to_string()),
        Err(_) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Coordinates the tokenizer, error policy, and arity validation to produce
/// one [`RawRecord`] at a time. Owns no I/O state itself — callers (the
/// public `Reader`) thread `buf`/`source`/`tokenizer`/`policy` through.
pub struct RecordAssembler {
    pub mismatched_field_policy: MismatchedFieldPolicy,
    pub comment: Option<u8>,
    pub skip_empty_lines: bool,
    /// Set once the header (or synthesized schema) is known.
    pub expected_arity: Option<usize>,
}

impl RecordAssembler {
    pub fn new(mismatched_field_policy: MismatchedFieldPolicy, comment: Option<u8>, skip_empty_lines: bool) -> Self {
        RecordAssembler { mismatched_field_policy, comment, skip_empty_lines, expected_arity: None }
    }

    /// Discards `n` physical lines at the stream's start (`skip_rows`).
    pub fn skip_rows(
        &mut self,
        n: usize,
        buf: &mut PooledBuffer,
        source: &mut dyn Read,
        tokenizer: &mut Tokenizer,
    ) -> crate::error::Result<()> {
        for _ in 0..n {
            tokenizer.skip_physical_line(buf, source).map_err(CsvCoreError::from_io)?;
        }
        Ok(())
    }

    /// Reads the next raw record, transparently discarding comment lines
    /// and (when `skip_empty_lines`) bare blank lines. Returns `Ok(None)`
    /// at end of stream.
    pub fn next_record(
        &mut self,
        buf: &mut PooledBuffer,
        source: &mut dyn Read,
        tokenizer: &mut Tokenizer,
        policy: &mut ErrorPolicy,
        record_index: u64,
    ) -> crate::error::Result<Option<RawRecord>> {
        loop {
            if let Some(comment) = self.comment {
                if tokenizer.peek_byte(buf, source).map_err(CsvCoreError::from_io)? == Some(comment) {
                    tokenizer.skip_physical_line(buf, source).map_err(CsvCoreError::from_io)?;
                    continue;
                }
            }

            let line_number = tokenizer.line_number;
            let mut fields: SmallVec<[FieldValue; 8]> = SmallVec::new();
            let mut field_index = 0u64;
            loop {
                let Some(event) =
                    tokenizer.next_field(buf, source, record_index, field_index, policy)?
                else {
                    break;
                };
                let value = match &event.data {
                    FieldData::Span { lo, hi } => bytes_to_field_value(&buf.peek()[*lo..*hi]),
                    FieldData::Owned(bytes) => bytes_to_field_value(bytes),
                    FieldData::Null => FieldValue::Null,
                };
                let record_end = event.record_end;
                tokenizer.commit(buf, &event);
                fields.push(value);
                field_index += 1;
                if record_end {
                    break;
                }
            }

            if fields.is_empty() {
                return Ok(None);
            }

            let is_bare_blank_line = fields.len() == 1
                && (matches!(fields[0], FieldValue::Null)
                    || matches!(&fields[0], FieldValue::Text(s) if s.is_empty()));
            if self.skip_empty_lines && is_bare_blank_line {
                continue;
            }

            let record = RawRecord { fields, line_number };
            return Ok(Some(self.apply_arity(record, record_index, policy)?));
        }
    }

    fn apply_arity(
        &self,
        mut record: RawRecord,
        record_index: u64,
        policy: &mut ErrorPolicy,
    ) -> crate::error::Result<RawRecord> {
        let Some(expected) = self.expected_arity else {
            return Ok(record);
        };
        let actual = record.fields.len();
        if actual == expected {
            return Ok(record);
        }

        match self.mismatched_field_policy {
            MismatchedFieldPolicy::Pad if actual < expected => {
                record.fields.resize(expected, FieldValue::Null);
                Ok(record)
            }
            MismatchedFieldPolicy::Truncate if actual > expected => {
                record.fields.truncate(expected);
                Ok(record)
            }
            MismatchedFieldPolicy::PadOrTruncate => {
                if actual < expected {
                    record.fields.resize(expected, FieldValue::Null);
                } else {
                    record.fields.truncate(expected);
                }
                Ok(record)
            }
            _ => {
                let fault = Fault::new(ErrorKind::FieldCountMismatch, record_index, record.line_number, 0)
                    .with_cause(format!("expected {expected} fields, found {actual}"));
                match policy.handle(fault)? {
                    Recovery::DropRecord => {
                        Err(CsvCoreError::Fault(Fault::new(
                            ErrorKind::FieldCountMismatch,
                            record_index,
                            record.line_number,
                            0,
                        )))
                    }
                    _ => Ok(record),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorAction;
    use crate::options::QuoteMode;
    use crate::options::Trimming;
    use std::io::Cursor;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(vec![b','], b'"', QuoteMode::Strict, Trimming::None, false, 0, false)
    }

    #[test]
    fn reads_simple_records_until_eof() {
        let mut buf = PooledBuffer::new(64);
        let mut src = Cursor::new(b"a,b\n1,2\n".to_vec());
        let mut tok = tokenizer();
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut assembler = RecordAssembler::new(MismatchedFieldPolicy::Throw, None, true);

        let header = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 0).unwrap().unwrap();
        assert_eq!(header.fields.len(), 2);
        let data = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 1).unwrap().unwrap();
        assert_eq!(data.fields[0], FieldValue::Text("1".to_string()));
        assert!(assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 2).unwrap().is_none());
    }

    #[test]
    fn blank_lines_are_skipped_when_configured() {
        let mut buf = PooledBuffer::new(64);
        let mut src = Cursor::new(b"a,b\n\n1,2\n".to_vec());
        let mut tok = tokenizer();
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut assembler = RecordAssembler::new(MismatchedFieldPolicy::Throw, None, true);

        assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 0).unwrap();
        let data = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 1).unwrap().unwrap();
        assert_eq!(data.fields[0], FieldValue::Text("1".to_string()));
    }

    #[test]
    fn pad_or_truncate_normalizes_arity() {
        let mut buf = PooledBuffer::new(64);
        let mut src = Cursor::new(b"1\n2,3\n4,5,6\n".to_vec());
        let mut tok = tokenizer();
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut assembler = RecordAssembler::new(MismatchedFieldPolicy::PadOrTruncate, None, true);
        assembler.expected_arity = Some(2);

        let r1 = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 0).unwrap().unwrap();
        assert_eq!(r1.fields.len(), 2);
        assert_eq!(r1.fields[1], FieldValue::Null);

        let r2 = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 1).unwrap().unwrap();
        assert_eq!(r2.fields.len(), 2);

        let r3 = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 2).unwrap().unwrap();
        assert_eq!(r3.fields.len(), 2);
        assert_eq!(r3.fields[0], FieldValue::Text("4".to_string()));
    }

    #[test]
    fn throw_policy_raises_fault_on_arity_mismatch() {
        let mut buf = PooledBuffer::new(64);
        let mut src = Cursor::new(b"1,2,3\n".to_vec());
        let mut tok = tokenizer();
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut assembler = RecordAssembler::new(MismatchedFieldPolicy::Throw, None, true);
        assembler.expected_arity = Some(2);

        let err = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldCountMismatch);
    }

    #[test]
    fn comment_lines_are_discarded_before_header() {
        let mut buf = PooledBuffer::new(64);
        let mut src = Cursor::new(b"# hello\na,b\n1,2\n".to_vec());
        let mut tok = tokenizer();
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 0);
        let mut assembler = RecordAssembler::new(MismatchedFieldPolicy::Throw, Some(b'#'), true);

        let header = assembler.next_record(&mut buf, &mut src, &mut tok, &mut policy, 0).unwrap().unwrap();
        assert_eq!(header.fields[0], FieldValue::Text("a".to_string()));
    }
}
