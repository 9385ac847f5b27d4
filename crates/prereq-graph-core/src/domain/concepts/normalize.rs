//! Normalization keys for concept hints and prerequisite labels
//!
//! Hints arrive as free text from the analysis model, mostly Turkish with
//! some English. The key is lowercase, diacritic-free, punctuation-free and
//! stop-word-free so that "Fissura Orbitalis Superior" and
//! "fissura orbitalis-superior." land on comparable keys.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Conjunctions and articles dropped from keys
const STOP_WORDS: &[&str] = &[
    // Turkish
    "ve", "ile", "veya", "ya", "da", "de", "ki", "bir",
    // English
    "a", "an", "the", "and", "or", "of",
];

/// Fold a string to lowercase ASCII-ish text without diacritics
///
/// The Turkish dotless `ı` and dotted capital `İ` are mapped to `i` before
/// decomposition because neither decomposes to a plain `i` on its own.
pub fn fold_case_and_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'ı' | 'İ' => 'i',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Compute the normalization key for a hint or label
///
/// Hyphens are kept when they join two word characters; every other
/// punctuation character becomes a word break.
pub fn normalize_key(input: &str) -> String {
    let folded = fold_case_and_diacritics(input);
    let chars: Vec<char> = folded.chars().collect();

    let mut cleaned = String::with_capacity(chars.len());
    for (i, c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            cleaned.push(*c);
        } else if *c == '-' {
            let joins_words = i > 0
                && chars[i - 1].is_alphanumeric()
                && chars.get(i + 1).is_some_and(|next| next.is_alphanumeric());
            cleaned.push(if joins_words { '-' } else { ' ' });
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// All lookup keys for a hint: the key itself plus its hyphen→space variant
pub fn lookup_keys(input: &str) -> Vec<String> {
    let key = normalize_key(input);
    if key.is_empty() {
        return Vec::new();
    }

    let legacy = key.replace('-', " ");
    if legacy == key {
        vec![key]
    } else {
        vec![key, legacy]
    }
}

/// Words of a normalized key, split on spaces and hyphens
pub fn key_tokens(key: &str) -> impl Iterator<Item = &str> {
    key.split(|c: char| c == ' ' || c == '-')
        .filter(|token| !token.is_empty())
}
