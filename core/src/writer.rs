//! CSV writer (C12): the inverse of the tokenizer, with the same quoting
//! and escaping conventions the reader accepts (spec §4.10).

use std::io::{self, Write};

use crate::convert::Value;
use crate::options::{QuotingPolicy, WriterOptions};

/// Streams records out as delimited text, optionally compressed.
pub struct Writer<W: Write> {
    sink: W,
    opts: WriterOptions,
    delimiter: Vec<u8>,
    wrote_any: bool,
}

impl<W: Write> Writer<W> {
    pub fn new(mut sink: W, opts: WriterOptions) -> io::Result<Self> {
        if opts.write_bom {
            sink.write_all(&[0xEF, 0xBB, 0xBF])?;
        }
        let delimiter = opts.delimiter.as_bytes().to_vec();
        Ok(Writer { sink, opts, delimiter, wrote_any: false })
    }

    /// Writes a header row (same quoting rules as a data record).
    pub fn write_header(&mut self, names: &[String]) -> io::Result<()> {
        self.write_row(names.iter().map(|n| Some(n.as_str())))
    }

    /// Writes one record's fields, each already formatted as text. `None`
    /// is rendered as `null_value`; `Some("")` is a genuine empty field.
    pub fn write_record(&mut self, fields: &[Option<String>]) -> io::Result<()> {
        self.write_row(fields.iter().map(|f| f.as_deref()))
    }

    /// Writes one record from typed values, formatting each with
    /// [`format_value`] and substituting `null_value` for `Value::Null`.
    pub fn write_values(&mut self, values: &[Value]) -> io::Result<()> {
        let rendered: Vec<Option<String>> = values
            .iter()
            .map(|v| match v {
                Value::Null => None,
                other => Some(format_value(other)),
            })
            .collect();
        self.write_row(rendered.iter().map(|f| f.as_deref()))
    }

    fn write_row<'a, I: Iterator<Item = Option<&'a str>>>(&mut self, fields: I) -> io::Result<()> {
        for (i, field) in fields.enumerate() {
            if i > 0 {
                self.sink.write_all(&self.delimiter)?;
            }
            self.write_field(field)?;
        }
        self.sink.write_all(self.opts.newline.as_bytes())?;
        self.wrote_any = true;
        Ok(())
    }

    fn write_field(&mut self, field: Option<&str>) -> io::Result<()> {
        let text = field.unwrap_or(self.opts.null_value.as_str());
        if self.needs_quoting(text) {
            let quote_byte = self.opts.quote as u8;
            self.sink.write_all(&[quote_byte])?;
            let mut rest = text;
            while let Some(pos) = rest.find(self.opts.quote) {
                self.sink.write_all(rest[..pos].as_bytes())?;
                self.sink.write_all(&[quote_byte, quote_byte])?;
                rest = &rest[pos + self.opts.quote.len_utf8()..];
            }
            self.sink.write_all(rest.as_bytes())?;
            self.sink.write_all(&[quote_byte])?;
        } else {
            self.sink.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    fn needs_quoting(&self, text: &str) -> bool {
        match self.opts.quoting {
            QuotingPolicy::Always => true,
            QuotingPolicy::Never => false,
            QuotingPolicy::NonNumeric => text.parse::<f64>().is_err(),
            QuotingPolicy::AsNeeded => {
                text.as_bytes().iter().any(|b| self.delimiter.contains(b))
                    || text.contains(self.opts.quote)
                    || text.contains('\n')
                    || text.contains('\r')
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Renders a typed [`Value`] back to text (inverse of `convert::convert_builtin`
/// for the scalar cases; `Null` becomes an empty string, substituted with the
/// writer's `null_value` by [`Writer::write_field`]).
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::I8(n) => n.to_string(),
        Value::I16(n) => n.to_string(),
        Value::I32(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::F32(f) => f.to_string(),
        Value::F64(f) => f.to_string(),
        Value::F32Vec(v) => {
            let parts: Vec<String> = v.iter().map(f32::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Decimal(d) => d.to_string(),
        Value::DateTime(dt) => dt.to_rfc3339(),
        Value::Uuid(u) => u.to_string(),
        Value::Bytes(bytes) => {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(opts: WriterOptions, rows: &[&[&str]]) -> String {
        let mut w = Writer::new(Vec::new(), opts).unwrap();
        for row in rows {
            let fields: Vec<Option<String>> = row.iter().map(|s| Some(s.to_string())).collect();
            w.write_record(&fields).unwrap();
        }
        w.flush().unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn as_needed_quotes_only_when_required() {
        let opts = WriterOptions::builder().build();
        let out = written(opts, &[&["plain", "has,comma", "has\"quote"]]);
        assert_eq!(out, "plain,\"has,comma\",\"has\"\"quote\"\n");
    }

    #[test]
    fn always_quotes_every_field() {
        let opts = WriterOptions::builder().quoting(QuotingPolicy::Always).build();
        let out = written(opts, &[&["a", "b"]]);
        assert_eq!(out, "\"a\",\"b\"\n");
    }

    #[test]
    fn non_numeric_policy_leaves_numbers_bare() {
        let opts = WriterOptions::builder().quoting(QuotingPolicy::NonNumeric).build();
        let out = written(opts, &[&["42", "abc"]]);
        assert_eq!(out, "42,\"abc\"\n");
    }

    #[test]
    fn none_field_substitutes_configured_null_marker() {
        let opts = WriterOptions::builder().null_value("NULL").build();
        let mut w = Writer::new(Vec::new(), opts).unwrap();
        w.write_record(&[None, Some("x".to_string())]).unwrap();
        w.flush().unwrap();
        assert_eq!(String::from_utf8(w.into_inner()).unwrap(), "NULL,x\n");
    }

    #[test]
    fn genuine_empty_string_is_not_treated_as_null() {
        let opts = WriterOptions::builder().null_value("NULL").build();
        let mut w = Writer::new(Vec::new(), opts).unwrap();
        w.write_record(&[Some(String::new()), Some("x".to_string())]).unwrap();
        w.flush().unwrap();
        assert_eq!(String::from_utf8(w.into_inner()).unwrap(), ",x\n");
    }

    #[test]
    fn bom_is_written_when_requested() {
        let opts = WriterOptions::builder().write_bom(true).build();
        let out = written(opts, &[&["a"]]);
        assert!(out.as_bytes().starts_with(&[0xEF, 0xBB, 0xBF]));
    }

    #[test]
    fn write_values_renders_typed_values_and_nulls() {
        let opts = WriterOptions::builder().null_value("").build();
        let mut w = Writer::new(Vec::new(), opts).unwrap();
        w.write_values(&[Value::I64(7), Value::Null, Value::String("hi".to_string())]).unwrap();
        w.flush().unwrap();
        assert_eq!(String::from_utf8(w.into_inner()).unwrap(), "7,,hi\n");
    }
}
