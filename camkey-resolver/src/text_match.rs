//! Fuzzy text matching for picking the right search result
//!
//! Search results are noisy: `(Remastered)` suffixes, `feat.` credits,
//! reordered words, curly apostrophes. Matching works on normalized token sets
//! rather than exact strings.

use std::collections::HashSet;

/// Normalize free text for comparison
///
/// Lower-cases, maps curly apostrophes to straight ones, keeps only letters,
/// digits, `#` and whitespace, and collapses whitespace runs to single spaces.
pub fn normalize_for_match(s: &str) -> String {
    let kept: String = s
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .filter(|c| c.is_alphanumeric() || *c == '#' || c.is_whitespace())
        .collect();

    collapse_whitespace(&kept)
}

/// Token-overlap similarity in `[0, 1]`
///
/// `|A ∩ B| / max(|A|, |B|)` over the whitespace-delimited token sets of the
/// normalized strings; 0 when either side has no tokens.
pub fn token_overlap_score(a: &str, b: &str) -> f64 {
    let a_norm = normalize_for_match(a);
    let b_norm = normalize_for_match(b);
    let a_tokens: HashSet<&str> = a_norm.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b_norm.split_whitespace().collect();

    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let shared = a_tokens.intersection(&b_tokens).count();
    shared as f64 / a_tokens.len().max(b_tokens.len()) as f64
}

/// Escape a phrase for embedding in a Lucene-style query
///
/// Collapses whitespace, then backslash-escapes `\` and `"`.
pub fn escape_search_phrase(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in collapse_whitespace(s).chars() {
        if ch == '\\' || ch == '"' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Trim and collapse internal whitespace runs to one space
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
