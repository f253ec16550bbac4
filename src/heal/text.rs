//! String heuristics shared by the structural passes: tokenizing, fuzzy port
//! matching, semantic relatedness and identifier canonicalization.

use std::collections::BTreeSet;

/// Best fuzzy match must score strictly above this.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.3;

/// Fixed domain-synonym groups. Two names relate when both hit the same group.
pub const SYNONYM_GROUPS: &[&[&str]] = &[
    &["user", "auth", "login", "profile", "account"],
    &["order", "cart", "checkout", "purchase", "payment"],
    &["product", "item", "catalog", "inventory", "stock"],
    &["event", "log", "audit", "activity", "track"],
    &["message", "chat", "notification", "email", "queue"],
    &["data", "record", "entry", "row", "dataset"],
    &["metric", "stat", "analytics", "report", "dashboard"],
];

/// Lowercase word tokens. Splits on non-alphanumerics and camel-case
/// boundaries (`userProfileDB` -> `user`, `profile`, `db`).
pub fn tokenize(name: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for word in split_words(name) {
        tokens.insert(word);
    }
    tokens
}

fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// |A ∩ B| / max(|A|, |B|) over word tokens.
pub fn overlap_score(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let denom = ta.len().max(tb.len());
    if denom == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / denom as f64
}

/// Pick the best-scoring candidate above the threshold. Ties keep the
/// earliest candidate.
pub fn best_fuzzy_match<'a, I>(wanted: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = overlap_score(wanted, candidate);
        if score <= FUZZY_MATCH_THRESHOLD {
            continue;
        }
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c)
}

pub fn semantically_related(a: &str, b: &str) -> bool {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.intersection(&tb).next().is_some() {
        return true;
    }
    SYNONYM_GROUPS.iter().any(|group| {
        ta.iter().any(|t| group.contains(&t.as_str()))
            && tb.iter().any(|t| group.contains(&t.as_str()))
    })
}

pub fn has_keyword(name: &str, keywords: &[&str]) -> bool {
    tokenize(name).iter().any(|t| keywords.contains(&t.as_str()))
}

/// Lowercase-with-underscores identifier with an alphabetic lead.
pub fn canonical_identifier(name: &str) -> String {
    let words = split_words(name);
    let mut out = words.join("_");
    if out.is_empty() {
        return "component".to_string();
    }
    if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.insert_str(0, "c_");
    }
    out
}

/// 32-bit FNV-1a, stable across platforms and runs.
pub fn stable_hash(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in s.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
