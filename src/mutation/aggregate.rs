//! Per-row merging of the mutations in one batch
//!
//! The planner must see a batch the way the table will look after the whole
//! batch lands, so every row gets exactly one merged mutation:
//!
//! - cells appended in arrival order
//! - durability flags OR-ed
//! - first-seen attribute values win
//!
//! Merged mutations only exist while one batch is being pre-committed. They
//! refuse to be encoded.

use std::collections::HashMap;

use super::types::{Mutation, RowKey};

/// Collects the mutations of one batch into one merged mutation per row.
#[derive(Debug, Default)]
pub struct MutationAggregator {
    slots: HashMap<RowKey, usize>,
    merged: Vec<Mutation>,
}

impl MutationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one mutation into the merged mutation for its row
    pub fn add(&mut self, mutation: &Mutation) {
        let slot = match self.slots.get(mutation.row()) {
            Some(&slot) => slot,
            None => {
                let slot = self.merged.len();
                self.merged
                    .push(Mutation::new_merged(mutation.row().clone(), mutation.is_durable()));
                self.slots.insert(mutation.row().clone(), slot);
                slot
            }
        };

        let stored = &mut self.merged[slot];
        for cell in mutation.cells() {
            stored.add_cell(cell.clone());
        }
        for (name, value) in mutation.attributes() {
            stored.set_attribute_if_absent(name, value);
        }
        if mutation.is_durable() {
            stored.set_durable(true);
        }
    }

    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Merged mutations in order of first appearance of their row
    pub fn into_merged(self) -> Vec<Mutation> {
        self.merged
    }
}

/// Merge an ordered batch in one call.
pub fn aggregate<'a, I>(mutations: I) -> Vec<Mutation>
where
    I: IntoIterator<Item = &'a Mutation>,
{
    let mut aggregator = MutationAggregator::new();
    for mutation in mutations {
        aggregator.add(mutation);
    }
    aggregator.into_merged()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_merged_mutation_per_row() {
        let batch = vec![
            Mutation::new("r1").put("f", "q", 1, "a"),
            Mutation::new("r2").put("f", "q", 1, "b"),
            Mutation::new("r1").put("f", "q", 2, "c"),
        ];

        let merged = aggregate(&batch);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].row(), &RowKey::from("r1"));
        assert_eq!(merged[1].row(), &RowKey::from("r2"));

        let values: Vec<_> = merged[0].family(b"f").iter().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec![b"a".to_vec(), b"c".to_vec()]);
        assert!(merged.iter().all(Mutation::is_merged));
    }

    #[test]
    fn test_durability_is_ored() {
        let batch = vec![
            Mutation::new("r").put("f", "q", 1, "a").with_durability(false),
            Mutation::new("r").put("f", "q", 2, "b").with_durability(true),
            Mutation::new("r").put("f", "q", 3, "c").with_durability(false),
        ];

        let merged = aggregate(&batch);
        assert!(merged[0].is_durable());

        let all_skip = vec![Mutation::new("r").with_durability(false)];
        assert!(!aggregate(&all_skip)[0].is_durable());
    }

    #[test]
    fn test_first_seen_attribute_wins() {
        let batch = vec![
            Mutation::new("r").with_attribute("a", "first"),
            Mutation::new("r")
                .with_attribute("a", "second")
                .with_attribute("b", "only"),
        ];

        let merged = aggregate(&batch);
        assert_eq!(merged[0].attribute("a"), Some(&b"first"[..]));
        assert_eq!(merged[0].attribute("b"), Some(&b"only"[..]));
    }

    #[test]
    fn test_incremental_add_counts_rows() {
        let mut aggregator = MutationAggregator::new();
        assert!(aggregator.is_empty());
        aggregator.add(&Mutation::new("x").put("f", "q", 1, "v"));
        aggregator.add(&Mutation::new("x").put("f", "q", 2, "w"));
        assert_eq!(aggregator.len(), 1);

        let merged = aggregator.into_merged();
        assert_eq!(merged[0].row(), &RowKey::from("x"));
        assert_eq!(merged[0].family(b"f").len(), 2);
    }
}
