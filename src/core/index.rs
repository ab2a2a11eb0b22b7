use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::catalog::Catalog;

/// Keyword lookup tables derived from the catalog.
///
/// Both relations are many-to-many: a keyword may trigger several actions
/// and an argument keyword several argument slots. The index never breaks
/// ties itself; frequency scoring and classification do that later.
///
/// Ordered maps keep construction deterministic, so rebuilding from an
/// unchanged catalog hash serializes bit-identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordIndex {
    actions_by_keyword: BTreeMap<String, BTreeSet<String>>,
    args_by_keyword: BTreeMap<String, BTreeMap<String, BTreeSet<usize>>>,
}

impl KeywordIndex {
    pub fn build(catalog: &Catalog) -> KeywordIndex {
        let mut index = KeywordIndex::default();
        for (id, action) in catalog.actions() {
            for keyword in &action.keywords {
                index
                    .actions_by_keyword
                    .entry(keyword.to_lowercase())
                    .or_default()
                    .insert(id.clone());
            }
            let per_action = index.args_by_keyword.entry(id.clone()).or_default();
            for arg in &action.args {
                for keyword in &arg.keywords {
                    per_action
                        .entry(keyword.to_lowercase())
                        .or_default()
                        .insert(arg.index);
                }
            }
        }
        index
    }

    /// Full action-keyword vocabulary, sorted.
    pub fn vocabulary(&self) -> Vec<String> {
        self.actions_by_keyword.keys().cloned().collect()
    }

    pub fn actions_for(&self, keyword: &str) -> Option<&BTreeSet<String>> {
        self.actions_by_keyword.get(keyword)
    }

    pub fn arg_indices_for(&self, action: &str, keyword: &str) -> Option<&BTreeSet<usize>> {
        self.args_by_keyword.get(action)?.get(keyword)
    }

    pub fn actions_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.actions_by_keyword
    }
}
