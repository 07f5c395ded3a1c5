//! Helpers for sanitizing values before they reach logs or span fields.
//!
//! Endpoint URLs may carry credentials in their userinfo or query string,
//! and stored image paths can reveal a user's directory layout.

use std::path::Path;

/// Returns only the file name component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo and query parameters from an endpoint URL.
///
/// - `https://user:pw@host/v1` → `https://****@host/v1`
/// - `https://host/v1?key=abc` → `https://host/v1?****`
/// - `http://localhost:11434/v1` → unchanged
pub fn redact_url(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, _)) => (base, Some("****")),
        None => (url, None),
    };

    let mut redacted = match base.find("://") {
        Some(scheme_end) => {
            let after_scheme = &base[scheme_end + 3..];
            let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
            match after_scheme[..authority_end].rfind('@') {
                Some(at_pos) => format!(
                    "{}****@{}",
                    &base[..scheme_end + 3],
                    &after_scheme[at_pos + 1..]
                ),
                None => base.to_string(),
            }
        }
        None => base.to_string(),
    };

    if let Some(q) = query {
        redacted.push('?');
        redacted.push_str(q);
    }
    redacted
}
