//! Opening-name comparison.
//!
//! Game sources and repertoire authors name the same opening differently
//! ("Sicilian Defense: Najdorf Variation" vs "Najdorf"). The concept match
//! reduces a name to its distinctive words and compares those.

use std::collections::BTreeSet;

const FILLER_WORDS: &[&str] = &[
    "opening", "defense", "defence", "attack", "game", "variation", "system", "the", "a", "an",
    "for", "by", "in", "on", "white", "black", "both", "old", "new",
];

/// Case-insensitive, whitespace-insensitive equality.
pub fn exact_match(a: &str, b: &str) -> bool {
    let a = canonical(a);
    !a.is_empty() && a == canonical(b)
}

/// Concept match: one name contains the other, or they share a concept word.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
    let (ca, cb) = (canonical(a), canonical(b));
    if ca.is_empty() || cb.is_empty() {
        return false;
    }
    if ca.contains(&cb) || cb.contains(&ca) {
        return true;
    }
    let words_a = concept_words(a);
    concept_words(b).iter().any(|w| words_a.contains(w))
}

/// Distinctive words of an opening name.
pub fn concept_words(name: &str) -> BTreeSet<String> {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == ':' || c == ',')
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| w.chars().count() > 2 && !FILLER_WORDS.contains(&w.as_str()))
        .map(|mut w| {
            if w.chars().count() > 3 && w.ends_with('s') {
                w.pop();
            }
            w
        })
        .collect()
}

fn canonical(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_words() {
        let words = concept_words("Sicilian Defense: Najdorf Variation");
        assert_eq!(
            words,
            BTreeSet::from(["sicilian".to_string(), "najdorf".to_string()])
        );
        assert!(concept_words("The Old Indian Defence").contains("indian"));
        assert!(concept_words("King's Gambit").contains("king"));
    }

    #[test]
    fn test_plural_stripped() {
        assert!(concept_words("Queens Gambit").contains("queen"));
        // Too short to be a plural.
        assert!(concept_words("Ups").contains("ups"));
    }

    #[test]
    fn test_exact_match() {
        assert!(exact_match("Italian Game", "italian  game"));
        assert!(exact_match("Caro-Kann", "caro kann"));
        assert!(!exact_match("Italian Game", "Italian"));
        assert!(!exact_match("", ""));
    }

    #[test]
    fn test_fuzzy_match() {
        assert!(fuzzy_match("Sicilian", "Sicilian Defense Old Sicilian Variation"));
        assert!(fuzzy_match("Najdorf", "Sicilian Defense: Najdorf Variation"));
        assert!(fuzzy_match("Queens Gambit Declined", "Queen's Gambit"));
        assert!(!fuzzy_match("French Defense", "Sicilian Defense"));
        assert!(!fuzzy_match("London System", "Italian Game"));
        assert!(!fuzzy_match("", "Italian Game"));
    }
}
