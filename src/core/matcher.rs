use crate::core::error::{validate_cutoff, Result};
use crate::core::tokenizer::Token;

/// Fuzzy-matching seam. The resolution engine only sees this trait, so the
/// string-similarity backend can be swapped without touching it.
pub trait KeywordMatcher {
    /// Best vocabulary entry for `token`, scored 0-100. Ties go to the
    /// first entry seen at the top score (deterministic, vocabulary order).
    fn best_match<'a>(&self, token: &str, vocabulary: &'a [String]) -> Option<(&'a str, f64)>;
}

/// Default backend: normalized Levenshtein ratio via `strsim`.
pub struct LevenshteinMatcher;

impl KeywordMatcher for LevenshteinMatcher {
    fn best_match<'a>(&self, token: &str, vocabulary: &'a [String]) -> Option<(&'a str, f64)> {
        let token = token.to_lowercase();
        let mut best: Option<(&str, f64)> = None;
        for word in vocabulary {
            let score = strsim::normalized_levenshtein(&token, word) * 100.0;
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((word, score)),
            }
        }
        best
    }
}

/// A query split into keyword signal and candidate argument values.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedQuery {
    /// Canonical vocabulary words, with multiplicity, in query order.
    pub keywords: Vec<String>,
    /// Everything else, still carrying the quoted flag.
    pub non_keywords: Vec<Token>,
}

/// Routes each token: unquoted tokens whose best match scores at least
/// `cutoff * 100` become keywords (replaced by the canonical vocabulary
/// word); quoted tokens always land in non-keywords regardless of score.
pub fn split_keywords(
    matcher: &dyn KeywordMatcher,
    tokens: &[Token],
    vocabulary: &[String],
    cutoff: f64,
) -> Result<MatchedQuery> {
    validate_cutoff(cutoff)?;
    let threshold = cutoff * 100.0;

    let mut keywords = Vec::new();
    let mut non_keywords = Vec::new();
    for token in tokens {
        if token.quoted {
            non_keywords.push(token.clone());
            continue;
        }
        match matcher.best_match(&token.text, vocabulary) {
            Some((word, score)) if score >= threshold => keywords.push(word.to_string()),
            _ => non_keywords.push(token.clone()),
        }
    }

    Ok(MatchedQuery {
        keywords,
        non_keywords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DorisError;

    fn vocabulary() -> Vec<String> {
        vec!["launch".to_string(), "open".to_string()]
    }

    #[test]
    fn near_miss_matches() {
        let matched = split_keywords(
            &LevenshteinMatcher,
            &[Token::bare("launc")],
            &vocabulary(),
            0.8,
        )
        .unwrap();
        assert_eq!(matched.keywords, vec!["launch".to_string()]);
        assert!(matched.non_keywords.is_empty());
    }

    #[test]
    fn junk_matches_nothing() {
        let matched = split_keywords(
            &LevenshteinMatcher,
            &[Token::bare("xyz")],
            &vocabulary(),
            0.8,
        )
        .unwrap();
        assert!(matched.keywords.is_empty());
        assert_eq!(matched.non_keywords, vec![Token::bare("xyz")]);
    }

    #[test]
    fn quoted_tokens_skip_matching() {
        let matched = split_keywords(
            &LevenshteinMatcher,
            &[Token::quoted("launch")],
            &vocabulary(),
            0.8,
        )
        .unwrap();
        assert!(matched.keywords.is_empty());
        assert_eq!(matched.non_keywords, vec![Token::quoted("launch")]);
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let vocabulary = vocabulary();
        let (word, score) = LevenshteinMatcher
            .best_match("LAUNCH", &vocabulary)
            .unwrap();
        assert_eq!(word, "launch");
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_keep_first_vocabulary_entry() {
        let vocab = vec!["ab".to_string(), "ba".to_string()];
        let (word, _) = LevenshteinMatcher.best_match("aa", &vocab).unwrap();
        assert_eq!(word, "ab");
    }

    #[test]
    fn cutoff_out_of_range_fails() {
        let result = split_keywords(&LevenshteinMatcher, &[], &vocabulary(), 1.5);
        assert!(matches!(result, Err(DorisError::InvalidCutoff(_))));
        let result = split_keywords(&LevenshteinMatcher, &[], &vocabulary(), -0.01);
        assert!(matches!(result, Err(DorisError::InvalidCutoff(_))));
    }
}
