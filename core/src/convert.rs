//! Type converter registry (C9): lazy, per-field conversion from the raw
//! UTF-8 text to a typed value, with a small built-in converter set and
//! room for caller-supplied overrides (spec §4.7).
//!
//! A [`TypeRegistry`] is built once and is effectively immutable from the
//! reader's point of view: `with_converter` clones the registry and
//! returns a new one, matching the copy-on-write style the options layer
//! uses throughout (spec §9 design note).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The target type a column's text should be converted to (spec §3
/// `column_types`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetType {
    #[default]
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// A vector of `f32`, accepted either as a JSON-style `[1.0, 2.0]`
    /// array or a bare comma-separated list (`1.0,2.0`).
    F32Vec,
    Decimal,
    DateTime,
    Uuid,
    Bytes,
}

/// A converted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    F32Vec(Vec<f32>),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
pub struct ConversionError {
    pub target: TargetType,
    pub text: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {:?} to {:?}", self.text, self.target)
    }
}

impl std::error::Error for ConversionError {}

type Converter = Arc<dyn Fn(&str) -> Result<Value, ConversionError> + Send + Sync>;

/// Holds the built-in converters plus any caller overrides, keyed by
/// [`TargetType`]. Clone is cheap (an `Arc` bump per override).
#[derive(Clone)]
pub struct TypeRegistry {
    overrides: HashMap<TargetType, Converter>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry").field("overrides", &self.overrides.len()).finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry { overrides: HashMap::new() }
    }
}

impl TypeRegistry {
    /// Returns a new registry with `target` routed through `f`, leaving
    /// `self` untouched.
    pub fn with_converter<F>(&self, target: TargetType, f: F) -> TypeRegistry
    where
        F: Fn(&str) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        let mut next = self.clone();
        next.overrides.insert(target, Arc::new(f));
        next
    }

    pub fn convert(&self, target: TargetType, text: &str) -> Result<Value, ConversionError> {
        self.convert_with_culture(target, text, None)
    }

    /// Like [`TypeRegistry::convert`], but `culture` may select a
    /// non-invariant decimal separator (e.g. `"de-DE"` uses `,`). Only
    /// numeric built-ins are culture-sensitive; overrides and every other
    /// target ignore it (spec §4.7's "format provider" is scoped down to
    /// this single knob — see DESIGN.md).
    pub fn convert_with_culture(
        &self,
        target: TargetType,
        text: &str,
        culture: Option<&str>,
    ) -> Result<Value, ConversionError> {
        if let Some(f) = self.overrides.get(&target) {
            return f(text);
        }
        convert_builtin(target, text, culture)
    }
}

fn uses_comma_decimal(culture: Option<&str>) -> bool {
    matches!(culture, Some(c) if c.eq_ignore_ascii_case("de-DE") || c.eq_ignore_ascii_case("fr-FR"))
}

fn convert_builtin(target: TargetType, text: &str, culture: Option<&str>) -> Result<Value, ConversionError> {
    let err = || ConversionError { target, text: text.to_string() };
    let normalized;
    let text = if uses_comma_decimal(culture) && matches!(target, TargetType::F64 | TargetType::Decimal) {
        normalized = text.replace('.', "").replacen(',', ".", 1);
        normalized.as_str()
    } else {
        text
    };
    match target {
        TargetType::String => Ok(Value::String(text.to_string())),
        TargetType::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "t" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "n" | "f" | "off" => Ok(Value::Bool(false)),
            _ => Err(err()),
        },
        TargetType::I8 => text.trim().parse::<i8>().map(Value::I8).map_err(|_| err()),
        TargetType::I16 => text.trim().parse::<i16>().map(Value::I16).map_err(|_| err()),
        TargetType::I32 => text.trim().parse::<i32>().map(Value::I32).map_err(|_| err()),
        TargetType::I64 => text.trim().parse::<i64>().map(Value::I64).map_err(|_| err()),
        TargetType::F32 => lexical_core::parse::<f32>(text.trim().as_bytes()).map(Value::F32).map_err(|_| err()),
        TargetType::F64 => text.trim().parse::<f64>().map(Value::F64).map_err(|_| err()),
        TargetType::F32Vec => parse_f32_vec(text.trim()).map(Value::F32Vec).ok_or_else(err),
        TargetType::Decimal => text.trim().parse::<Decimal>().map(Value::Decimal).map_err(|_| err()),
        TargetType::DateTime => parse_datetime(text.trim()).ok_or_else(err),
        TargetType::Uuid => Uuid::parse_str(text.trim()).map(Value::Uuid).map_err(|_| err()),
        TargetType::Bytes => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(Value::Bytes)
            .map_err(|_| err()),
    }
}

fn parse_f32_vec(text: &str) -> Option<Vec<f32>> {
    let inner = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')).unwrap_or(text);
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|part| lexical_core::parse::<f32>(part.trim().as_bytes()).ok())
        .collect()
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Value::DateTime(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let ndt = date.and_hms_opt(0, 0, 0)?;
        return Some(Value::DateTime(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)));
    }
    None
}
