//! Reader/writer configuration (spec §3).
//!
//! Options are assembled with a [`bon`] builder and are immutable once the
//! reader is constructed, matching the teacher crate's
//! `#[derive(Builder)]` convention for command `Args` (see
//! `waka-core::dedup::Args`).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::convert::TypeRegistry;
use crate::error::{ParseErrorAction, RaiseCallback};

/// How surrounding whitespace is trimmed from a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trimming {
    #[default]
    None,
    UnquotedOnly,
    QuotedOnly,
    All,
}

/// Strict RFC-like quote handling vs. best-effort recovery (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteMode {
    #[default]
    Strict,
    Lenient,
}

/// Resolution policy for a repeated header name (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateHeaderPolicy {
    Throw,
    #[default]
    Rename,
    First,
    Last,
    Ignore,
}

/// Resolution policy for a record whose field count disagrees with arity
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchedFieldPolicy {
    #[default]
    Throw,
    Pad,
    Truncate,
    PadOrTruncate,
}

/// A statically-injected column (spec §3, §4.6).
#[derive(Debug, Clone)]
pub struct StaticColumn {
    pub name: String,
    pub value: String,
    /// `None` appends at the end; `Some(i)` inserts at projected index `i`.
    pub position: Option<usize>,
}

impl StaticColumn {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        StaticColumn { name: name.into(), value: value.into(), position: None }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Immutable options snapshot used to construct a reader (spec §3).
#[derive(bon::Builder, Clone)]
#[builder(derive(Clone))]
pub struct ReaderOptions {
    #[builder(into, default = ",".to_string())]
    pub delimiter: String,
    #[builder(default = '"')]
    pub quote: char,
    #[builder(default = '"')]
    pub escape: char,
    pub comment: Option<char>,
    #[builder(default = true)]
    pub has_header_row: bool,
    #[builder(default = 0)]
    pub skip_rows: usize,
    #[builder(default = true)]
    pub skip_empty_lines: bool,
    #[builder(default)]
    pub trimming: Trimming,
    #[builder(into)]
    pub null_value: Option<String>,
    #[builder(default = false)]
    pub distinguish_empty_from_null: bool,
    #[builder(default)]
    pub quote_mode: QuoteMode,
    #[builder(default)]
    pub duplicate_header: DuplicateHeaderPolicy,
    #[builder(default)]
    pub mismatched_field: MismatchedFieldPolicy,
    #[builder(default = false)]
    pub normalize_smart_quotes: bool,
    #[builder(default = 64 * 1024)]
    pub buffer_size: usize,
    #[builder(default = 0)]
    pub max_quoted_field_length: usize,
    #[builder(default = 10 * 1024 * 1024 * 1024)]
    pub max_decompressed_size: u64,
    #[builder(default)]
    pub parse_error_action: ParseErrorAction,
    #[builder(default = 100)]
    pub max_parse_errors: usize,
    #[builder(default)]
    pub column_types: HashMap<String, crate::convert::TargetType>,
    #[builder(default)]
    pub include_columns: Option<BTreeSet<String>>,
    #[builder(default)]
    pub exclude_columns: BTreeSet<String>,
    #[builder(default)]
    pub static_columns: Vec<StaticColumn>,
    #[builder(default)]
    pub type_registry: TypeRegistry,
    pub raise_callback: Option<RaiseCallback>,
    #[builder(default = 10_000)]
    pub progress_interval_rows: u64,
    pub progress_callback: Option<crate::progress::ProgressCallback>,
    #[builder(into, default = "Column".to_string())]
    pub default_header_name: String,
    pub cancellation_token: Option<Arc<crate::progress::CancellationToken>>,
    /// Format-provider hint for numeric/date parsing (e.g. `"en-US"`,
    /// `"de-DE"`). Only the decimal separator is currently culture-aware;
    /// everything else uses invariant parsing (see DESIGN.md).
    pub culture: Option<String>,
}

impl ReaderOptions {
    /// Construction-time validation (spec §9 open question: empty-delimiter
    /// is rejected eagerly, not mid-stream).
    pub fn validate(&self) -> Result<(), crate::error::CsvCoreError> {
        if self.delimiter.is_empty() {
            return Err(crate::error::CsvCoreError::OptionConflict(
                "delimiter must be non-empty".to_string(),
            ));
        }
        if let Some(include) = &self.include_columns {
            if !self.exclude_columns.is_empty()
                && include.iter().any(|c| self.exclude_columns.contains(c))
            {
                return Err(crate::error::CsvCoreError::OptionConflict(
                    "a column cannot be both included and excluded".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Quoting policy for the writer (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotingPolicy {
    #[default]
    AsNeeded,
    Always,
    Never,
    NonNumeric,
}

/// Immutable writer options (inverse of [`ReaderOptions`], spec §4.10).
#[derive(bon::Builder, Clone)]
pub struct WriterOptions {
    #[builder(into, default = ",".to_string())]
    pub delimiter: String,
    #[builder(default = '"')]
    pub quote: char,
    #[builder(default)]
    pub quoting: QuotingPolicy,
    #[builder(into, default = "".to_string())]
    pub null_value: String,
    #[builder(into, default = "\n".to_string())]
    pub newline: String,
    #[builder(default = false)]
    pub write_bom: bool,
    #[builder(default = 64 * 1024)]
    pub buffer_size: usize,
}
