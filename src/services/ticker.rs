// src/services/ticker.rs
use regex::Regex;

/// Shape of a normalized symbol: 1-5 alphanumerics with an optional
/// single-letter class suffix (BRK.B, BF.B).
pub fn is_valid_ticker(text: &str) -> bool {
    let re = Regex::new(r"^[A-Z0-9]{1,5}(\.[A-Z])?$").unwrap();
    re.is_match(text)
}

/// Clean raw caller input into cache-key form: trim, uppercase, and strip
/// everything outside the symbol alphabet. May return an empty string.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '.')
        .collect()
}

/// Scan free text for ticker-shaped tokens, in first-occurrence order.
/// Only tokens already written in uppercase count; lowercase prose words
/// ("buy", "and") are not symbols. Repeated symbols are reported once.
/// Empty or symbol-free input yields an empty vector.
pub fn extract_tickers(free_text: &str) -> Vec<String> {
    let re = Regex::new(r"\b[A-Z]{1,5}(\.[A-Z])?\b").unwrap();

    let mut seen = Vec::new();
    for m in re.find_iter(free_text) {
        let token = m.as_str();
        if !is_valid_ticker(token) {
            continue;
        }
        if !seen.iter().any(|s| s == token) {
            seen.push(token.to_string());
        }
    }
    seen
}
