//! Column projector (C8): include/exclude filtering plus static column
//! injection, precomputed once against the resolved schema (spec §4.6).

use std::collections::BTreeSet;

use crate::header::Schema;
use crate::options::StaticColumn;

/// One slot in the projected output, in final column order.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Pull the value for this source ordinal from the raw record.
    Source { ordinal: usize },
    /// Inject a fixed value, the same for every record.
    Static { value: String },
}

#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub names: Vec<String>,
    pub slots: Vec<Slot>,
}

impl ProjectionPlan {
    /// Builds the plan once per reader, from the resolved [`Schema`] and the
    /// reader's include/exclude/static-column options.
    pub fn build(
        schema: &Schema,
        include: Option<&BTreeSet<String>>,
        exclude: &BTreeSet<String>,
        static_columns: &[StaticColumn],
    ) -> ProjectionPlan {
        let mut names = Vec::new();
        let mut slots = Vec::new();

        for (ordinal, name) in schema.names().iter().enumerate() {
            let included = include.map(|set| set.contains(name)).unwrap_or(true);
            let excluded = exclude.contains(name);
            if included && !excluded {
                names.push(name.clone());
                slots.push(Slot::Source { ordinal });
            }
        }

        for sc in static_columns {
            let entry = (sc.name.clone(), Slot::Static { value: sc.value.clone() });
            match sc.position {
                Some(pos) if pos <= names.len() => {
                    names.insert(pos, entry.0);
                    slots.insert(pos, entry.1);
                }
                _ => {
                    names.push(entry.0);
                    slots.push(entry.1);
                }
            }
        }

        ProjectionPlan { names, slots }
    }

    pub fn field_count(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderManager;
    use crate::options::DuplicateHeaderPolicy;

    fn schema() -> Schema {
        let mgr = HeaderManager::new(DuplicateHeaderPolicy::Throw, "Column");
        mgr.resolve(&["a".into(), "b".into(), "c".into()]).unwrap()
    }

    #[test]
    fn include_filters_to_requested_columns() {
        let schema = schema();
        let include: BTreeSet<String> = ["a".to_string(), "c".to_string()].into_iter().collect();
        let plan = ProjectionPlan::build(&schema, Some(&include), &BTreeSet::new(), &[]);
        assert_eq!(plan.names, vec!["a", "c"]);
    }

    #[test]
    fn exclude_drops_requested_columns() {
        let schema = schema();
        let exclude: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        let plan = ProjectionPlan::build(&schema, None, &exclude, &[]);
        assert_eq!(plan.names, vec!["a", "c"]);
    }

    #[test]
    fn static_column_is_injected_at_requested_position() {
        let schema = schema();
        let statics = vec![StaticColumn::new("source_file", "in.csv").at(1)];
        let plan = ProjectionPlan::build(&schema, None, &BTreeSet::new(), &statics);
        assert_eq!(plan.names, vec!["a", "source_file", "b", "c"]);
        assert!(matches!(plan.slots[1], Slot::Static { .. }));
    }

    #[test]
    fn static_column_without_position_is_appended() {
        let schema = schema();
        let statics = vec![StaticColumn::new("tag", "x")];
        let plan = ProjectionPlan::build(&schema, None, &BTreeSet::new(), &statics);
        assert_eq!(plan.names.last(), Some(&"tag".to_string()));
    }
}
