//! Header manager (C7): resolves the schema's column names, synthesizing
//! and de-duplicating as needed (spec §4.5).

use std::collections::HashMap;

use crate::error::{CsvCoreError, ErrorKind, Fault};
use crate::options::DuplicateHeaderPolicy;

/// The resolved, ordered set of column names plus a case-insensitive,
/// case-preserving lookup index.
#[derive(Debug, Clone)]
pub struct Schema {
    names: Vec<String>,
    index_by_lower: HashMap<String, usize>,
}

impl Schema {
    pub fn field_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.names.get(ordinal).map(String::as_str)
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.index_by_lower.get(&name.to_lowercase()).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Builds a [`Schema`] from either a physical header row or, when
/// `has_header_row` is false, synthesized `{default_name}N` placeholders
/// (spec §4.5).
pub struct HeaderManager {
    policy: DuplicateHeaderPolicy,
    default_name: String,
}

impl HeaderManager {
    pub fn new(policy: DuplicateHeaderPolicy, default_name: impl Into<String>) -> Self {
        HeaderManager { policy, default_name: default_name.into() }
    }

    pub fn synthesize(&self, field_count: usize) -> Schema {
        let names: Vec<String> =
            (0..field_count).map(|i| format!("{}{}", self.default_name, i + 1)).collect();
        Schema { index_by_lower: index_of(&names), names }
    }

    /// Resolves raw header cells into a [`Schema`], applying the duplicate
    /// policy and synthesizing a name for any empty/whitespace-only cell.
    pub fn resolve(&self, raw: &[String]) -> crate::error::Result<Schema> {
        let mut names: Vec<String> = raw
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if cell.trim().is_empty() {
                    format!("{}{}", self.default_name, i + 1)
                } else {
                    cell.clone()
                }
            })
            .collect();

        let mut seen: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            seen.entry(name.to_lowercase()).or_default().push(i);
        }

        let duplicated = seen.values().any(|v| v.len() > 1);
        if duplicated {
            match self.policy {
                DuplicateHeaderPolicy::Throw => {
                    let (dup_name, positions) =
                        seen.iter().find(|(_, v)| v.len() > 1).expect("duplicated checked above");
                    let fault = Fault::new(ErrorKind::DuplicateHeader, 0, 1, 0).with_cause(format!(
                        "duplicate header name {:?} at columns {:?}",
                        dup_name, positions
                    ));
                    return Err(CsvCoreError::Fault(fault));
                }
                DuplicateHeaderPolicy::Rename => {
                    for positions in seen.values() {
                        if positions.len() < 2 {
                            continue;
                        }
                        for (occurrence, &idx) in positions.iter().enumerate().skip(1) {
                            names[idx] = format!("{}_{}", names[idx], occurrence + 1);
                        }
                    }
                }
                DuplicateHeaderPolicy::First => {
                    // Keep every name; ordinal() will resolve the lowercase
                    // key to the first occurrence since index_of keeps the
                    // first insertion.
                }
                DuplicateHeaderPolicy::Last => {
                    // index_of is rebuilt to point at the last occurrence below.
                }
                DuplicateHeaderPolicy::Ignore => {}
            }
        }

        let index_by_lower = match self.policy {
            DuplicateHeaderPolicy::Last => index_of_last(&names),
            _ => index_of(&names),
        };

        Ok(Schema { names, index_by_lower })
    }
}

fn index_of(names: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, n) in names.iter().enumerate() {
        map.entry(n.to_lowercase()).or_insert(i);
    }
    map
}

fn index_of_last(names: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, n) in names.iter().enumerate() {
        map.insert(n.to_lowercase(), i);
    }
    map
}
