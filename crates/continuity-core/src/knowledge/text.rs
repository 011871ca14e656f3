//! Text normalization shared by fact dedup, contradiction judging and narrative
//! theme extraction.

use std::collections::{BTreeSet, HashMap};

/// Words that carry no content for overlap or theme purposes.
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "been",
    "being", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has",
    "have", "he", "her", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "just", "me", "mine", "more", "most", "much", "my", "myself", "now", "of", "on", "or",
    "our", "ours", "really", "she", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "to", "too", "user", "users",
    "very", "was", "we", "were", "what", "when", "which", "while", "who", "will", "with",
    "would", "you", "your", "yours",
];

/// Terms that flip the stance of a statement. They count for overlap but are
/// never themes.
const NEGATIONS: &[&str] = &[
    "didn't", "didnt", "doesn't", "doesnt", "don't", "dont", "isn't", "isnt", "never", "no",
    "not", "nothing", "won't", "wont",
];

/// Preference verbs folded onto one canonical term each.
const CANONICAL_TERMS: &[(&str, &str)] = &[
    ("like", "like"),
    ("likes", "like"),
    ("liked", "like"),
    ("love", "like"),
    ("loves", "like"),
    ("loved", "like"),
    ("enjoy", "like"),
    ("enjoys", "like"),
    ("enjoyed", "like"),
    ("prefer", "like"),
    ("prefers", "like"),
    ("favorite", "like"),
    ("favourite", "like"),
    ("hate", "dislike"),
    ("hates", "dislike"),
    ("hated", "dislike"),
    ("dislike", "dislike"),
    ("dislikes", "dislike"),
    ("disliked", "dislike"),
    ("detest", "dislike"),
    ("detests", "dislike"),
    ("loathe", "dislike"),
    ("loathes", "dislike"),
];

/// Lowercases, trims and collapses internal whitespace. Used for exact-match checks.
pub fn normalize_exact(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

fn canonical(word: &str) -> &str {
    CANONICAL_TERMS
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
        .unwrap_or(word)
}

pub fn is_negation(term: &str) -> bool {
    NEGATIONS.binary_search(&term).is_ok()
}

/// Content terms in order of appearance: lowercased, punctuation stripped,
/// stop-words removed, preference verbs canonicalized.
pub fn content_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty() && !is_stop_word(w))
        .map(|w| canonical(&w).to_string())
        .collect()
}

pub fn term_set(text: &str) -> BTreeSet<String> {
    content_terms(text).into_iter().collect()
}

/// Overlap coefficient `|A ∩ B| / min(|A|, |B|)` of two texts' content terms.
/// Returns 0.0 when either side has no content terms.
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let a = term_set(a);
    let b = term_set(b);
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / smaller as f64
}

/// True when any content term of `text` is a negation.
pub fn is_negated(text: &str) -> bool {
    content_terms(text).iter().any(|t| is_negation(t))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    fn flipped(self) -> Self {
        match self {
            Polarity::Like => Polarity::Dislike,
            Polarity::Dislike => Polarity::Like,
        }
    }
}

/// Preference polarity of a fact and its subject terms, if it states a
/// preference. Negation flips the polarity and is not part of the subject.
pub fn polarity_of(fact: &str) -> Option<(Polarity, BTreeSet<String>)> {
    let mut terms = term_set(fact);
    let negated = terms.iter().any(|t| is_negation(t));
    terms.retain(|t| !is_negation(t));
    let likes = terms.remove("like");
    let dislikes = terms.remove("dislike");
    let base = match (likes, dislikes) {
        (true, false) => Polarity::Like,
        (false, true) => Polarity::Dislike,
        _ => return None,
    };
    if terms.is_empty() {
        return None;
    }
    Some((if negated { base.flipped() } else { base }, terms))
}

/// Whether two texts take opposite stances: opposite preference polarity when
/// both state one, otherwise one negated and the other not.
pub fn opposing_stance(a: &str, b: &str) -> bool {
    match (polarity_of(a), polarity_of(b)) {
        (Some((pa, _)), Some((pb, _))) => pa != pb,
        _ => is_negated(a) != is_negated(b),
    }
}

/// The `n` most frequent content terms of at least `min_len` characters.
/// Ties are broken alphabetically so the result is deterministic.
pub fn top_terms(text: &str, n: usize, min_len: usize) -> BTreeSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for term in content_terms(text) {
        if term.chars().count() >= min_len && !is_negation(&term) {
            *counts.entry(term).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)));
    ranked.into_iter().take(n).map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_lists_are_sorted_for_binary_search() {
        assert!(STOP_WORDS.windows(2).all(|w| w[0] < w[1]));
        assert!(NEGATIONS.windows(2).all(|w| w[0] < w[1]));
        assert!(!NEGATIONS.iter().any(|n| is_stop_word(n)));
    }

    #[test]
    fn polarity_reads_verbs_and_negation() {
        assert_eq!(polarity_of("User likes pizza").map(|p| p.0), Some(Polarity::Like));
        assert_eq!(polarity_of("User hates pizza").map(|p| p.0), Some(Polarity::Dislike));
        let (polarity, subject) = polarity_of("User does not like pizza").unwrap();
        assert_eq!(polarity, Polarity::Dislike);
        assert_eq!(subject, term_set("pizza"));
        assert_eq!(polarity_of("User doesn't like pizza").map(|p| p.0), Some(Polarity::Dislike));
        assert_eq!(polarity_of("User owns a bicycle"), None);
        assert_eq!(polarity_of("User likes"), None);
    }

    #[test]
    fn negation_opposes_the_plain_statement() {
        assert!(opposing_stance("User likes pizza", "User does not like pizza"));
        assert!(opposing_stance("User likes pizza", "User no longer likes pizza"));
        assert!(opposing_stance("User owns a bicycle", "User never owns a bicycle"));
        assert!(!opposing_stance("User likes pizza", "Pizza is my favorite food"));
        assert!(!opposing_stance("User owns a bicycle", "The user owns a bicycle"));
    }

    #[test]
    fn exact_normalization_ignores_case_and_spacing() {
        assert_eq!(normalize_exact("  User   LIKES pizza "), "user likes pizza");
    }

    #[test]
    fn preference_terms_fold_together() {
        assert_eq!(content_terms("User likes pizza"), vec!["like", "pizza"]);
        assert_eq!(
            content_terms("Pizza is my favorite food!"),
            vec!["pizza", "like", "food"]
        );
        assert_eq!(content_terms("User hates pizza"), vec!["dislike", "pizza"]);
    }

    #[test]
    fn overlap_ratio_uses_smaller_side() {
        assert_eq!(overlap_ratio("User likes pizza", "Pizza is my favorite food"), 1.0);
        assert_eq!(overlap_ratio("User likes pizza", "User hates pizza"), 0.5);
        assert_eq!(overlap_ratio("the a an", "pizza"), 0.0);
    }

    #[test]
    fn top_terms_rank_by_frequency_then_name() {
        let terms = top_terms("music music music code code sleep art not not not not", 3, 3);
        let expected: BTreeSet<String> =
            ["music", "code", "art"].iter().map(|s| s.to_string()).collect();
        assert_eq!(terms, expected);
    }
}
