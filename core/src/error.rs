//! Error policy engine (C10).
//!
//! Faults are classified by [`ErrorKind`] and routed through an
//! [`ErrorPolicy`] that decides whether to throw, skip, collect, or hand the
//! decision to a user callback, per the policy matrix in spec §4.8.

use std::fmt;
use std::sync::Arc;

/// Stable error-kind surface (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Encoding,
    DecompressionBomb,
    MalformedQuote,
    FieldCountMismatch,
    FieldTooLong,
    DuplicateHeader,
    UnknownColumn,
    ConversionError,
    EmptyDelimiter,
    OptionConflict,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Io => "io",
            ErrorKind::Encoding => "encoding",
            ErrorKind::DecompressionBomb => "decompression_bomb",
            ErrorKind::MalformedQuote => "malformed_quote",
            ErrorKind::FieldCountMismatch => "field_count_mismatch",
            ErrorKind::FieldTooLong => "field_too_long",
            ErrorKind::DuplicateHeader => "duplicate_header",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::ConversionError => "conversion_error",
            ErrorKind::EmptyDelimiter => "empty_delimiter",
            ErrorKind::OptionConflict => "option_conflict",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A single fault, carrying enough context to reproduce it (spec §4.8).
#[derive(Debug, Clone)]
pub struct Fault {
    pub record_index: u64,
    /// -1 (encoded as `None`) when the fault is record-level rather than field-level.
    pub field_index: Option<u64>,
    pub line_number: u64,
    pub column: u64,
    pub snippet: String,
    pub kind: ErrorKind,
    pub cause: Option<String>,
}

impl Fault {
    pub fn new(kind: ErrorKind, record_index: u64, line_number: u64, column: u64) -> Self {
        Fault {
            record_index,
            field_index: None,
            line_number,
            column,
            snippet: String::new(),
            kind,
            cause: None,
        }
    }

    pub fn with_field(mut self, field_index: u64) -> Self {
        self.field_index = Some(field_index);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{kind} at record {rec} line {line} col {col}",
            kind = self.kind,
            rec = self.record_index,
            line = self.line_number,
            col = self.column,
        )?;
        if let Some(field) = self.field_index {
            write!(f, " field {field}")?;
        }
        if !self.snippet.is_empty() {
            write!(f, ": {:?}", self.snippet)?;
        }
        Ok(())
    }
}

/// Fatal, terminating error. `Io` and `DecompressionBomb` are always fatal;
/// `Cancelled` always propagates (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum CsvCoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Fault(Fault),

    #[error("option conflict: {0}")]
    OptionConflict(String),

    #[error("decompression bomb: decompressed size exceeded the configured limit")]
    DecompressionBomb(Fault),

    #[error("operation cancelled")]
    Cancelled,
}

impl CsvCoreError {
    /// Wraps an I/O error, recognizing a tripped [`crate::compress::BombGuardReader`]
    /// and reporting it as `DecompressionBomb` rather than a plain `Io` fault
    /// (the bomb guard can surface at any read, not just construction).
    pub fn from_io(e: std::io::Error) -> CsvCoreError {
        match crate::compress::is_bomb_error(&e) {
            Some(marker) => CsvCoreError::DecompressionBomb(
                Fault::new(ErrorKind::DecompressionBomb, 0, 0, 0).with_cause(marker.to_string()),
            ),
            None => CsvCoreError::Io(e),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CsvCoreError::Io(_) => ErrorKind::Io,
            CsvCoreError::Fault(f) => f.kind,
            CsvCoreError::OptionConflict(_) => ErrorKind::OptionConflict,
            CsvCoreError::DecompressionBomb(_) => ErrorKind::DecompressionBomb,
            CsvCoreError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, CsvCoreError>;

/// Escalation policy selected per spec §3's `parse_error_action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorAction {
    Throw,
    SkipLine,
    Collect,
    /// Invoke the user callback and honor its returned action.
    Raise,
}

impl Default for ParseErrorAction {
    fn default() -> Self {
        ParseErrorAction::Throw
    }
}

/// What the caller (record assembler / tokenizer / converter) should do in
/// response to a non-fatal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Advance past the offending line without emitting it (MalformedQuote).
    AdvanceLine,
    /// Drop the whole record (FieldCountMismatch).
    DropRecord,
    /// Replace the offending field's value with null and keep going (ConversionError).
    SubstituteNull,
    /// Truncate the field at the limit and skip the rest of the physical line (FieldTooLong).
    SkipFieldAndLine,
}

/// Callback signature for `ParseErrorAction::Raise`. Returns the action to
/// apply to *this* fault (must not be `Raise` again).
pub type RaiseCallback = Arc<dyn Fn(&Fault) -> ParseErrorAction + Send + Sync>;

/// The error policy engine (C10): classifies faults and decides
/// throw/skip/collect, bounding the collected count at `max_parse_errors`.
pub struct ErrorPolicy {
    action: ParseErrorAction,
    max_parse_errors: usize,
    collected: Vec<Fault>,
    raise_callback: Option<RaiseCallback>,
}

impl ErrorPolicy {
    pub fn new(action: ParseErrorAction, max_parse_errors: usize) -> Self {
        ErrorPolicy {
            action,
            max_parse_errors,
            collected: Vec::new(),
            raise_callback: None,
        }
    }

    pub fn with_raise_callback(mut self, cb: RaiseCallback) -> Self {
        self.raise_callback = Some(cb);
        self
    }

    pub fn collected(&self) -> &[Fault] {
        &self.collected
    }

    pub fn take_collected(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.collected)
    }

    /// Route a fault through the policy matrix (spec §4.8). Fatal kinds
    /// always return `Err`, regardless of `action`.
    pub fn handle(&mut self, fault: Fault) -> Result<Recovery> {
        match fault.kind {
            ErrorKind::DecompressionBomb => return Err(CsvCoreError::DecompressionBomb(fault)),
            ErrorKind::Cancelled => return Err(CsvCoreError::Cancelled),
            ErrorKind::Io => return Err(CsvCoreError::Fault(fault)),
            _ => {}
        }

        let effective_action = if self.action == ParseErrorAction::Raise {
            match &self.raise_callback {
                Some(cb) => cb(&fault),
                None => ParseErrorAction::Throw,
            }
        } else {
            self.action
        };

        match effective_action {
            ParseErrorAction::Throw => Err(CsvCoreError::Fault(fault)),
            ParseErrorAction::Raise => Err(CsvCoreError::Fault(fault)),
            ParseErrorAction::SkipLine => Ok(recovery_for_kind(fault.kind)),
            ParseErrorAction::Collect => {
                if self.collected.len() >= self.max_parse_errors {
                    // overflow falls back to throw (spec §4.8)
                    return Err(CsvCoreError::Fault(fault));
                }
                let recovery = recovery_for_kind(fault.kind);
                self.collected.push(fault);
                Ok(recovery)
            }
        }
    }
}

fn recovery_for_kind(kind: ErrorKind) -> Recovery {
    match kind {
        ErrorKind::MalformedQuote => Recovery::AdvanceLine,
        ErrorKind::FieldCountMismatch => Recovery::DropRecord,
        ErrorKind::ConversionError => Recovery::SubstituteNull,
        ErrorKind::FieldTooLong => Recovery::SkipFieldAndLine,
        // DuplicateHeader/UnknownColumn/OptionConflict are construction-time
        // faults that are always fatal in this implementation; never routed
        // through `handle`.
        _ => Recovery::DropRecord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throw_is_fatal() {
        let mut policy = ErrorPolicy::new(ParseErrorAction::Throw, 10);
        let fault = Fault::new(ErrorKind::ConversionError, 0, 1, 0);
        assert!(policy.handle(fault).is_err());
    }

    #[test]
    fn skip_line_substitutes_null_for_conversion_error() {
        let mut policy = ErrorPolicy::new(ParseErrorAction::SkipLine, 10);
        let fault = Fault::new(ErrorKind::ConversionError, 0, 1, 0);
        assert_eq!(policy.handle(fault).unwrap(), Recovery::SubstituteNull);
    }

    #[test]
    fn collect_bounds_at_max_then_throws() {
        let mut policy = ErrorPolicy::new(ParseErrorAction::Collect, 1);
        let f1 = Fault::new(ErrorKind::FieldCountMismatch, 0, 1, 0);
        let f2 = Fault::new(ErrorKind::FieldCountMismatch, 1, 2, 0);
        assert!(policy.handle(f1).is_ok());
        assert!(policy.handle(f2).is_err());
        assert_eq!(policy.collected().len(), 1);
    }

    #[test]
    fn decompression_bomb_always_fatal_even_under_collect() {
        let mut policy = ErrorPolicy::new(ParseErrorAction::Collect, 100);
        let fault = Fault::new(ErrorKind::DecompressionBomb, 0, 1, 0);
        assert!(matches!(
            policy.handle(fault),
            Err(CsvCoreError::DecompressionBomb(_))
        ));
    }

    #[test]
    fn raise_honors_callback_decision() {
        let cb: RaiseCallback = Arc::new(|_f| ParseErrorAction::SkipLine);
        let mut policy = ErrorPolicy::new(ParseErrorAction::Raise, 10).with_raise_callback(cb);
        let fault = Fault::new(ErrorKind::FieldTooLong, 0, 1, 0);
        assert_eq!(policy.handle(fault).unwrap(), Recovery::SkipFieldAndLine);
    }
}
