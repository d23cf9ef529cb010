//! Domain pattern normalization and validation.
//!
//! A pattern is either an exact host (`ads.example.com`) or a wildcard
//! (`*.example.com`). Normalization runs once at parse time; lookups only
//! canonicalize the query string. Matching is case-insensitive whether or
//! not the stored text was lowercased.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::error::DomainError;

/// Prefix marking a wildcard pattern.
pub const WILDCARD_PREFIX: &str = "*.";

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Hostname alphabet. Underscores are accepted because published lists
/// contain service names like `_dmarc.example.com`.
static LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_](?:[a-zA-Z0-9_-]*[a-zA-Z0-9_])?$").unwrap()
});

/// Trim a raw pattern, optionally lowercase it, and strip a single trailing
/// root dot (`example.com.` becomes `example.com`).
pub fn normalize(raw: &str, lowercase: bool) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if lowercase {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Canonicalize a query host for lookup: lowercase and strip the root dot.
///
/// Borrows when the query is already canonical, which is the common case
/// on the DNS query path.
pub fn canonical_query(domain: &str) -> Cow<'_, str> {
    fold_case(domain.strip_suffix('.').unwrap_or(domain))
}

/// Lowercase form used as a match key, borrowed when already lowercase.
pub fn fold_case(domain: &str) -> Cow<'_, str> {
    if domain.bytes().any(|b| b.is_ascii_uppercase()) || !domain.is_ascii() {
        Cow::Owned(domain.to_lowercase())
    } else {
        Cow::Borrowed(domain)
    }
}

/// Check the structural invariant every stored pattern satisfies:
/// non-empty, and no leading, trailing or consecutive dots.
pub fn check_structure(pattern: &str) -> Result<(), DomainError> {
    if pattern.is_empty() {
        return Err(DomainError::Empty);
    }
    let host = wildcard_base(pattern).unwrap_or(pattern);
    if host.is_empty() || host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(DomainError::MisplacedDot);
    }
    Ok(())
}

/// Full syntax validation: structure, length limits, label alphabet, and a
/// wildcard only as the leading `*.` label.
pub fn validate(pattern: &str) -> Result<(), DomainError> {
    check_structure(pattern)?;

    if pattern.len() > MAX_DOMAIN_LEN {
        return Err(DomainError::TooLong(pattern.len()));
    }

    let host = wildcard_base(pattern).unwrap_or(pattern);
    for label in host.split('.') {
        if label.len() > MAX_LABEL_LEN {
            return Err(DomainError::LabelTooLong(label.to_string()));
        }
        if !LABEL_PATTERN.is_match(label) {
            return Err(DomainError::InvalidCharacters);
        }
    }

    Ok(())
}

/// Check if a pattern is a wildcard (`*.base`).
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.starts_with(WILDCARD_PREFIX)
}

/// Base domain of a wildcard pattern (`*.example.com` -> `example.com`).
pub fn wildcard_base(pattern: &str) -> Option<&str> {
    pattern.strip_prefix(WILDCARD_PREFIX)
}

/// Number of labels in a host.
pub fn label_count(host: &str) -> usize {
    host.split('.').count()
}

/// Reverse the label sequence of a host (`example.com` -> `com.example`).
pub fn reversed_labels(host: &str) -> String {
    let mut out = String::with_capacity(host.len());
    for (i, label) in host.rsplit('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(label);
    }
    out
}

/// Check if `domain` is a strict subdomain of `base` (dot boundary).
pub fn is_strict_subdomain(domain: &str, base: &str) -> bool {
    domain.len() > base.len() + 1
        && domain.ends_with(base)
        && domain.as_bytes()[domain.len() - base.len() - 1] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Ads.Example.COM ", true), "ads.example.com");
        assert_eq!(normalize("Ads.Example.COM", false), "Ads.Example.COM");
        assert_eq!(normalize("example.com.", true), "example.com");
        assert_eq!(normalize("*.Tracker.net", true), "*.tracker.net");
    }

    #[test]
    fn test_canonical_query_borrows() {
        assert!(matches!(canonical_query("example.com"), Cow::Borrowed(_)));
        assert_eq!(canonical_query("Example.COM."), "example.com");
        assert!(matches!(fold_case("a.com"), Cow::Borrowed(_)));
        assert_eq!(fold_case("Ads.Example.com"), "ads.example.com");
    }

    #[test]
    fn test_structure() {
        assert!(check_structure("example.com").is_ok());
        assert!(check_structure("*.example.com").is_ok());
        assert_eq!(check_structure(""), Err(DomainError::Empty));
        assert_eq!(check_structure(".example.com"), Err(DomainError::MisplacedDot));
        assert_eq!(check_structure("example..com"), Err(DomainError::MisplacedDot));
        assert_eq!(check_structure("example.com."), Err(DomainError::MisplacedDot));
        assert_eq!(check_structure("*."), Err(DomainError::MisplacedDot));
    }

    #[test]
    fn test_validate() {
        assert!(validate("ads.example.com").is_ok());
        assert!(validate("*.tracker.net").is_ok());
        assert!(validate("_dmarc.example.com").is_ok());
        assert!(validate("localhost").is_ok());
        assert_eq!(validate("ex ample.com"), Err(DomainError::InvalidCharacters));
        assert_eq!(validate("-bad.com"), Err(DomainError::InvalidCharacters));
        assert_eq!(validate("a.*.com"), Err(DomainError::InvalidCharacters));
        assert_eq!(validate("http://a.com"), Err(DomainError::InvalidCharacters));

        let long_label = format!("{}.com", "a".repeat(64));
        assert!(matches!(validate(&long_label), Err(DomainError::LabelTooLong(_))));

        let long_domain = vec!["abcdefghij"; 25].join(".");
        assert!(matches!(validate(&long_domain), Err(DomainError::TooLong(_))));
    }

    #[test]
    fn test_wildcard_helpers() {
        assert!(is_wildcard("*.example.com"));
        assert!(!is_wildcard("example.com"));
        assert_eq!(wildcard_base("*.example.com"), Some("example.com"));
        assert_eq!(wildcard_base("example.com"), None);
    }

    #[test]
    fn test_reversed_labels() {
        assert_eq!(reversed_labels("example.com"), "com.example");
        assert_eq!(reversed_labels("a.b.example.com"), "com.example.b.a");
        assert_eq!(reversed_labels("localhost"), "localhost");
    }

    #[test]
    fn test_strict_subdomain() {
        assert!(is_strict_subdomain("sub.example.com", "example.com"));
        assert!(is_strict_subdomain("a.b.example.com", "example.com"));
        assert!(!is_strict_subdomain("example.com", "example.com"));
        assert!(!is_strict_subdomain("notexample.com", "example.com"));
    }
}
