//! Public reader surface: wires C1–C11 together behind the external
//! interface from spec §6.

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::PooledBuffer;
use crate::compress::BombGuardReader;
use crate::convert::{TargetType, Value};
use crate::decode::{self, TranscodingReader};
use crate::error::{CsvCoreError, ErrorKind, ErrorPolicy, Fault, Result};
use crate::header::{HeaderManager, Schema};
use crate::options::ReaderOptions;
use crate::progress::ProgressReporter;
use crate::project::{ProjectionPlan, Slot};
use crate::record::{FieldValue, RawRecord, RecordAssembler};
use crate::source::Source;
use crate::tokenizer::Tokenizer;

/// Where the reader is in its lifecycle (spec §3 "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unstarted,
    Active,
    Exhausted,
    Closed,
}

/// A streaming CSV/TSV reader. Construct with [`Reader::open`]; drive with
/// [`Reader::read`]; release with [`Reader::close`] (or just drop it).
pub struct Reader {
    buf: PooledBuffer,
    source: Box<dyn Read + Send>,
    tokenizer: Tokenizer,
    policy: ErrorPolicy,
    assembler: RecordAssembler,
    schema: Schema,
    projection: ProjectionPlan,
    opts: ReaderOptions,
    bytes_counter: Arc<AtomicU64>,
    progress: ProgressReporter,
    current: Vec<FieldValue>,
    pending_first_record: Option<RawRecord>,
    records_read: u64,
    record_index: u64,
    state: State,
}

impl Reader {
    /// Opens `source`, auto-detecting compression, selecting an encoding,
    /// and resolving the header/schema (spec §6 `open`).
    pub fn open(source: Source, opts: ReaderOptions) -> Result<Reader> {
        opts.validate()?;

        let decompressed = source.open(None).map_err(CsvCoreError::from_io)?;
        let guard = BombGuardReader::new(decompressed, opts.max_decompressed_size);
        let bytes_counter = guard.counter();
        let mut guarded: Box<dyn Read + Send> = Box::new(guard);

        let mut head = vec![0_u8; 4];
        let n = read_fill(&mut *guarded, &mut head).map_err(CsvCoreError::from_io)?;
        head.truncate(n);
        let encoding = decode::detect_encoding(None, &head);
        let chained = Cursor::new(head).chain(guarded);
        let source_read: Box<dyn Read + Send> = Box::new(TranscodingReader::new(chained, encoding));

        if opts.delimiter.is_empty() {
            return Err(CsvCoreError::Fault(Fault::new(ErrorKind::EmptyDelimiter, 0, 0, 0)));
        }
        let delimiter = opts.delimiter.as_bytes().to_vec();
        let mut quote_buf = [0_u8; 4];
        let quote_byte = opts.quote.encode_utf8(&mut quote_buf).as_bytes()[0];
        let mut tokenizer = Tokenizer::new(
            delimiter,
            quote_byte,
            opts.quote_mode,
            opts.trimming,
            opts.normalize_smart_quotes,
            opts.max_quoted_field_length,
            opts.distinguish_empty_from_null,
        );

        let comment_byte = opts.comment.map(|c| {
            let mut cbuf = [0_u8; 4];
            c.encode_utf8(&mut cbuf).as_bytes()[0]
        });

        let mut buf = PooledBuffer::new(opts.buffer_size);
        let mut assembler =
            RecordAssembler::new(opts.mismatched_field, comment_byte, opts.skip_empty_lines);
        let mut policy = ErrorPolicy::new(opts.parse_error_action, opts.max_parse_errors);
        if let Some(cb) = opts.raise_callback.clone() {
            policy = policy.with_raise_callback(cb);
        }

        let mut source_read = source_read;
        assembler.skip_rows(opts.skip_rows, &mut buf, &mut *source_read, &mut tokenizer)?;

        let header_manager = HeaderManager::new(opts.duplicate_header, opts.default_header_name.clone());

        let (schema, pending_first_record) = if opts.has_header_row {
            let header_record = assembler
                .next_record(&mut buf, &mut *source_read, &mut tokenizer, &mut policy, 0)?
                .ok_or_else(|| {
                    CsvCoreError::Fault(
                        Fault::new(ErrorKind::Io, 0, 0, 0).with_cause("empty input: no header row"),
                    )
                })?;
            let raw: Vec<String> = header_record
                .fields
                .iter()
                .map(|f| f.as_text().unwrap_or("").to_string())
                .collect();
            let schema = header_manager.resolve(&raw)?;
            assembler.expected_arity = Some(schema.field_count());
            (schema, None)
        } else {
            match assembler.next_record(&mut buf, &mut *source_read, &mut tokenizer, &mut policy, 0)? {
                Some(first) => {
                    let schema = header_manager.synthesize(first.fields.len());
                    assembler.expected_arity = Some(schema.field_count());
                    (schema, Some(first))
                }
                None => (header_manager.synthesize(0), None),
            }
        };

        tracing::debug!(fields = schema.field_count(), "resolved schema");

        let projection = ProjectionPlan::build(
            &schema,
            opts.include_columns.as_ref(),
            &opts.exclude_columns,
            &opts.static_columns,
        );

        let progress = ProgressReporter::new(opts.progress_interval_rows, opts.progress_callback.clone());

        Ok(Reader {
            buf,
            source: source_read,
            tokenizer,
            policy,
            assembler,
            schema,
            projection,
            opts,
            bytes_counter,
            progress,
            current: Vec::new(),
            pending_first_record,
            records_read: 0,
            record_index: 1,
            state: State::Unstarted,
        })
    }

    /// Advances to the next record. Returns `Ok(false)` at end of stream.
    pub fn read(&mut self) -> Result<bool> {
        if self.state == State::Closed {
            return Err(CsvCoreError::Fault(
                Fault::new(ErrorKind::Io, self.record_index, 0, 0).with_cause("reader is closed"),
            ));
        }
        if self.state == State::Exhausted {
            return Ok(false);
        }
        // Polled once per record rather than per buffer refill: a single
        // record never spans more than a handful of fills in practice, so
        // this bounds cancellation latency to one record without adding a
        // check inside the tokenizer's inner loop.
        if let Some(token) = &self.opts.cancellation_token {
            if token.is_cancelled() {
                self.state = State::Exhausted;
                return Err(CsvCoreError::Cancelled);
            }
        }

        let raw = if let Some(pending) = self.pending_first_record.take() {
            Some(pending)
        } else {
            self.assembler.next_record(
                &mut self.buf,
                &mut *self.source,
                &mut self.tokenizer,
                &mut self.policy,
                self.record_index,
            )?
        };

        let Some(raw) = raw else {
            self.state = State::Exhausted;
            return Ok(false);
        };

        let mut current = Vec::with_capacity(self.projection.slots.len());
        for slot in &self.projection.slots {
            let value = match slot {
                Slot::Source { ordinal } => {
                    raw.fields.get(*ordinal).cloned().unwrap_or(FieldValue::Null)
                }
                Slot::Static { value } => FieldValue::Text(value.clone()),
            };
            current.push(self.apply_null_literal(value));
        }
        self.current = current;

        self.state = State::Active;
        self.records_read += 1;
        self.record_index += 1;
        self.progress.tick(
            self.records_read,
            raw.line_number,
            self.bytes_counter.load(Ordering::Relaxed),
        );
        Ok(true)
    }

    fn apply_null_literal(&self, value: FieldValue) -> FieldValue {
        match (&self.opts.null_value, &value) {
            (Some(marker), FieldValue::Text(s)) if s == marker => FieldValue::Null,
            _ => value,
        }
    }

    pub fn field_count(&self) -> usize {
        self.projection.field_count()
    }

    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.projection.names.get(ordinal).map(String::as_str)
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.projection.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn is_null(&self, ordinal: usize) -> bool {
        !matches!(self.current.get(ordinal), Some(FieldValue::Text(_)))
    }

    pub fn get_string(&self, ordinal: usize) -> Option<&str> {
        match self.current.get(ordinal) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn target_type_for(&self, ordinal: usize) -> TargetType {
        self.name(ordinal)
            .and_then(|name| self.opts.column_types.get(name))
            .copied()
            .unwrap_or(TargetType::String)
    }

    fn get_typed(&self, ordinal: usize, target: TargetType) -> Result<Option<Value>> {
        let Some(text) = self.get_string(ordinal) else { return Ok(None) };
        self.opts
            .type_registry
            .convert_with_culture(target, text, self.opts.culture.as_deref())
            .map(Some)
            .map_err(|e| {
                CsvCoreError::Fault(
                    Fault::new(ErrorKind::ConversionError, self.record_index.saturating_sub(1), 0, 0)
                        .with_field(ordinal as u64)
                        .with_cause(e.to_string()),
                )
            })
    }

    pub fn get_i8(&self, ordinal: usize) -> Result<Option<i8>> {
        Ok(match self.get_typed(ordinal, TargetType::I8)? {
            Some(Value::I8(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_i16(&self, ordinal: usize) -> Result<Option<i16>> {
        Ok(match self.get_typed(ordinal, TargetType::I16)? {
            Some(Value::I16(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_i32(&self, ordinal: usize) -> Result<Option<i32>> {
        Ok(match self.get_typed(ordinal, TargetType::I32)? {
            Some(Value::I32(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_i64(&self, ordinal: usize) -> Result<Option<i64>> {
        Ok(match self.get_typed(ordinal, TargetType::I64)? {
            Some(Value::I64(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_f32(&self, ordinal: usize) -> Result<Option<f32>> {
        Ok(match self.get_typed(ordinal, TargetType::F32)? {
            Some(Value::F32(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_f64(&self, ordinal: usize) -> Result<Option<f64>> {
        Ok(match self.get_typed(ordinal, TargetType::F64)? {
            Some(Value::F64(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_f32_vec(&self, ordinal: usize) -> Result<Option<Vec<f32>>> {
        Ok(match self.get_typed(ordinal, TargetType::F32Vec)? {
            Some(Value::F32Vec(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_bool(&self, ordinal: usize) -> Result<Option<bool>> {
        Ok(match self.get_typed(ordinal, TargetType::Bool)? {
            Some(Value::Bool(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_date_time(&self, ordinal: usize) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(match self.get_typed(ordinal, TargetType::DateTime)? {
            Some(Value::DateTime(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_uuid(&self, ordinal: usize) -> Result<Option<uuid::Uuid>> {
        Ok(match self.get_typed(ordinal, TargetType::Uuid)? {
            Some(Value::Uuid(v)) => Some(v),
            _ => None,
        })
    }

    pub fn get_bytes(&self, ordinal: usize) -> Result<Option<Vec<u8>>> {
        Ok(match self.get_typed(ordinal, TargetType::Bytes)? {
            Some(Value::Bytes(v)) => Some(v),
            _ => None,
        })
    }

    /// Converts using the column's configured type, or `String` by default.
    pub fn get_value(&self, ordinal: usize) -> Result<Value> {
        let target = self.target_type_for(ordinal);
        Ok(self.get_typed(ordinal, target)?.unwrap_or(Value::Null))
    }

    pub fn get_values(&self, out: &mut Vec<Value>) -> Result<()> {
        out.clear();
        for i in 0..self.field_count() {
            out.push(self.get_value(i)?);
        }
        Ok(())
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn parse_errors(&self) -> &[Fault] {
        self.policy.collected()
    }

    /// Releases resources deterministically. Also happens on drop.
    pub fn close(mut self) {
        self.state = State::Closed;
    }
}

fn read_fill(r: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(input: &[u8], opts: ReaderOptions) -> Reader {
        Reader::open(Source::from_bytes(input.to_vec()), opts).unwrap()
    }

    #[test]
    fn basic_header_and_record() {
        let mut r = open(b"a,b,c\n1,2,3\n", ReaderOptions::builder().build());
        assert!(r.read().unwrap());
        assert_eq!(r.field_count(), 3);
        assert_eq!(r.get_string(0), Some("1"));
        assert_eq!(r.records_read(), 1);
        assert!(!r.read().unwrap());
    }

    #[test]
    fn bom_is_stripped_from_header() {
        let mut r = open(b"\xEF\xBB\xBFa,b\n1,2\n", ReaderOptions::builder().build());
        assert_eq!(r.name(0), Some("a"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(1), Some("2"));
    }

    #[test]
    fn custom_delimiter() {
        let opts = ReaderOptions::builder().delimiter("|").build();
        let mut r = open(b"a|b|c\n1|2|3\n", opts);
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(2), Some("3"));
    }

    #[test]
    fn multi_char_delimiter() {
        let opts = ReaderOptions::builder().delimiter("::").build();
        let mut r = open(b"a::b::c\n1::2::3\n", opts);
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(1), Some("2"));
    }

    #[test]
    fn duplicate_header_rename() {
        let opts = ReaderOptions::builder()
            .duplicate_header(crate::options::DuplicateHeaderPolicy::Rename)
            .build();
        let mut r = open(b"name,name,name\n1,2,3\n", opts);
        assert_eq!(r.name(0), Some("name"));
        assert_eq!(r.name(1), Some("name_2"));
        assert_eq!(r.name(2), Some("name_3"));
    }

    #[test]
    fn comment_lines_are_skipped() {
        let opts = ReaderOptions::builder().comment('#').build();
        let mut r = open(b"# comment\na,b\n1,2\n", opts);
        assert_eq!(r.name(0), Some("a"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(0), Some("1"));
    }

    #[test]
    fn pad_or_truncate_normalizes_arity() {
        let opts = ReaderOptions::builder()
            .mismatched_field(crate::options::MismatchedFieldPolicy::PadOrTruncate)
            .build();
        let mut r = open(b"a,b\n1\n2,3\n4,5,6\n", opts);
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(0), Some("1"));
        assert!(r.is_null(1));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(1), Some("3"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(0), Some("4"));
        assert_eq!(r.get_string(1), Some("5"));
    }

    #[test]
    fn decompression_bomb_is_fatal() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write as _;

        let mut enc = GzEncoder::new(Vec::new(), Compression::best());
        enc.write_all(&vec![b'a'; 1_000_000]).unwrap();
        let compressed = enc.finish().unwrap();

        let opts = ReaderOptions::builder().max_decompressed_size(1000).has_header_row(false).build();
        let err = Reader::open(Source::from_bytes(compressed), opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecompressionBomb);
    }

    #[test]
    fn typed_getters_convert_lazily() {
        let opts = ReaderOptions::builder().build();
        let mut r = open(b"n\n42\n", opts);
        assert!(r.read().unwrap());
        assert_eq!(r.get_i64(0).unwrap(), Some(42));
        assert_eq!(r.get_i32(0).unwrap(), Some(42));
    }

    #[test]
    fn projection_applies_include_and_static_columns() {
        let opts = ReaderOptions::builder()
            .include_columns(["a".to_string()].into_iter().collect())
            .static_columns(vec![crate::options::StaticColumn::new("tag", "x")])
            .build();
        let mut r = open(b"a,b\n1,2\n", opts);
        assert_eq!(r.field_count(), 2);
        assert_eq!(r.name(1), Some("tag"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(1), Some("x"));
    }

    #[test]
    fn no_header_row_synthesizes_column_names() {
        let opts = ReaderOptions::builder().has_header_row(false).build();
        let mut r = open(b"1,2,3\n4,5,6\n", opts);
        assert_eq!(r.name(0), Some("Column1"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(0), Some("1"));
        assert!(r.read().unwrap());
        assert_eq!(r.get_string(0), Some("4"));
        assert!(!r.read().unwrap());
    }
}
