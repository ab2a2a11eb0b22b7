use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Laplace-style smoothing for unseen words. Small enough that one training
/// example already separates classes sharply (the bootstrap pass alone must
/// classify the catalog's own keyword bags above the auto-select threshold).
const SMOOTHING: f64 = 0.01;

/// Multinomial naive Bayes over word bags with incremental training.
///
/// Labels and per-class word counts live in ordered maps, so serialized
/// models are stable across rebuilds and ties resolve by label order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BagClassifier {
    class_examples: BTreeMap<String, u64>,
    word_counts: BTreeMap<String, BTreeMap<String, u64>>,
    vocabulary: BTreeMap<String, u64>,
}

impl BagClassifier {
    pub fn new() -> BagClassifier {
        BagClassifier::default()
    }

    /// Online update with one labeled example. Never retrains from scratch.
    pub fn partial_fit<S: AsRef<str>>(&mut self, words: &[S], label: &str) {
        *self.class_examples.entry(label.to_string()).or_insert(0) += 1;
        let counts = self.word_counts.entry(label.to_string()).or_default();
        for word in words {
            let word = word.as_ref().to_lowercase();
            *counts.entry(word.clone()).or_insert(0) += 1;
            *self.vocabulary.entry(word).or_insert(0) += 1;
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.class_examples.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &String> {
        self.class_examples.keys()
    }

    /// Top `k` labels with normalized probabilities, best first. Empty when
    /// the model has seen no examples.
    pub fn predict_top_k<S: AsRef<str>>(&self, words: &[S], k: usize) -> Vec<(String, f64)> {
        if self.class_examples.is_empty() || k == 0 {
            return Vec::new();
        }

        let total_examples: u64 = self.class_examples.values().sum();
        let vocab_size = self.vocabulary.len().max(1) as f64;
        let empty = BTreeMap::new();

        let mut scored: Vec<(String, f64)> = Vec::with_capacity(self.class_examples.len());
        for (label, &examples) in &self.class_examples {
            let counts = self.word_counts.get(label).unwrap_or(&empty);
            let class_words: u64 = counts.values().sum();
            let denominator = class_words as f64 + SMOOTHING * vocab_size;
            let mut log_p = (examples as f64 / total_examples as f64).ln();
            for word in words {
                let word = word.as_ref().to_lowercase();
                let count = counts.get(&word).copied().unwrap_or(0) as f64;
                log_p += ((count + SMOOTHING) / denominator).ln();
            }
            scored.push((label.clone(), log_p));
        }

        // Log scores to probabilities, shifted by the max for stability.
        let top = scored
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut probabilities: Vec<(String, f64)> = scored
            .into_iter()
            .map(|(label, s)| (label, (s - top).exp()))
            .collect();
        let normalizer: f64 = probabilities.iter().map(|(_, p)| *p).sum();
        for entry in &mut probabilities {
            entry.1 /= normalizer;
        }

        probabilities.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        probabilities.truncate(k);
        probabilities
    }

    pub fn predict_best<S: AsRef<str>>(&self, words: &[S]) -> Option<(String, f64)> {
        self.predict_top_k(words, 1).into_iter().next()
    }
}
