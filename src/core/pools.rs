use std::collections::BTreeMap;

use crate::core::catalog::ArgKind;
use crate::core::tokenizer::Token;

/// Filler words dropped from unquoted non-keywords before typing. Quoted
/// tokens are never filtered; the user asked for them literally.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "in", "on", "at", "of", "for", "with", "my", "me", "it", "this",
    "that", "up", "into", "from", "and", "please",
];

const KIND_ORDER: [ArgKind; 3] = [ArgKind::Int, ArgKind::Str, ArgKind::Any];

fn kinds_for(kind: ArgKind) -> &'static [ArgKind] {
    match kind {
        ArgKind::Int => &KIND_ORDER[0..1],
        ArgKind::Str => &KIND_ORDER[1..2],
        ArgKind::Any => &KIND_ORDER,
    }
}

/// Per-query pools of candidate argument values, bucketed by inferred kind.
///
/// Quoted tokens go to the priority side and shadow the ordinary side during
/// extraction. Consumption is destructive: a value lives in exactly one
/// bucket until `take` removes it, and emptied buckets are cleaned up here
/// rather than at call sites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenPools {
    ordinary: BTreeMap<ArgKind, Vec<String>>,
    priority: BTreeMap<ArgKind, Vec<String>>,
}

impl TokenPools {
    /// Buckets non-keyword tokens, preserving query order within each
    /// bucket. Unquoted stop words are discarded.
    pub fn classify(non_keywords: &[Token]) -> TokenPools {
        let mut pools = TokenPools::default();
        for token in non_keywords {
            if !token.quoted && STOP_WORDS.contains(&token.text.to_lowercase().as_str()) {
                continue;
            }
            let kind = ArgKind::of(&token.text);
            let side = if token.quoted {
                &mut pools.priority
            } else {
                &mut pools.ordinary
            };
            side.entry(kind).or_default().push(token.text.clone());
        }
        pools
    }

    /// Values in both sides whose inferred kind is exactly `kind`.
    pub fn available(&self, kind: ArgKind) -> usize {
        self.priority.get(&kind).map_or(0, Vec::len) + self.ordinary.get(&kind).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        KIND_ORDER.iter().map(|&k| self.available(k)).sum()
    }

    /// Candidates an argument of `kind` may draw from right now. The
    /// priority side shadows the ordinary side: while any quoted value of a
    /// compatible kind remains, only quoted values are offered. `any` draws
    /// from every bucket.
    pub fn candidates(&self, kind: ArgKind) -> Vec<String> {
        let side = self.side_for(kind);
        let mut values = Vec::new();
        for k in kinds_for(kind) {
            if let Some(bucket) = side.get(k) {
                values.extend(bucket.iter().cloned());
            }
        }
        values
    }

    /// Removes and returns the value at `position` within the current
    /// `candidates(kind)` ordering. Ownership transfers to the caller; the
    /// value is gone from the pools.
    pub fn take(&mut self, kind: ArgKind, position: usize) -> Option<String> {
        let from_priority = self.has_any(&self.priority, kind);
        let side = if from_priority {
            &mut self.priority
        } else {
            &mut self.ordinary
        };

        let mut remaining = position;
        for k in kinds_for(kind) {
            let len = side.get(k).map_or(0, Vec::len);
            if remaining < len {
                let bucket = side.get_mut(k)?;
                let value = bucket.remove(remaining);
                if bucket.is_empty() {
                    side.remove(k);
                }
                return Some(value);
            }
            remaining -= len;
        }
        None
    }

    fn side_for(&self, kind: ArgKind) -> &BTreeMap<ArgKind, Vec<String>> {
        if self.has_any(&self.priority, kind) {
            &self.priority
        } else {
            &self.ordinary
        }
    }

    fn has_any(&self, side: &BTreeMap<ArgKind, Vec<String>>, kind: ArgKind) -> bool {
        kinds_for(kind)
            .iter()
            .any(|k| side.get(k).is_some_and(|v| !v.is_empty()))
    }
}
