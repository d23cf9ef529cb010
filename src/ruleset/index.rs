//! Domain index over a rule set's entries.
//!
//! Two tiers: exact hosts, and wildcard bases keyed by their reversed label
//! sequence (`*.example.com` -> `com.example`). Keys are case-folded, so
//! patterns kept in their original case still match canonical queries. A query
//! is reversed once; every proper label-boundary prefix of the reversed
//! query is a parent suffix to probe in the wildcard tier.

use ahash::AHashMap;

use crate::domain;
use crate::entry::RuleEntry;

/// Whether a wildcard `*.base` also covers `base` itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WildcardMode {
    /// `*.base` matches strict subdomains only; the root needs its own rule
    #[default]
    SubdomainsOnly,
    /// `*.base` matches `base` and every subdomain
    IncludeRoot,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DomainIndex {
    exact: AHashMap<String, Vec<usize>>,
    wildcard: AHashMap<String, Vec<usize>>,
}

impl DomainIndex {
    pub fn build(entries: &[RuleEntry]) -> Self {
        let mut index = Self::default();
        for (i, entry) in entries.iter().enumerate() {
            match entry.wildcard_base() {
                Some(base) => index
                    .wildcard
                    .entry(domain::reversed_labels(&domain::fold_case(base)))
                    .or_default()
                    .push(i),
                None => index
                    .exact
                    .entry(domain::fold_case(&entry.domain).into_owned())
                    .or_default()
                    .push(i),
            }
        }
        log::debug!(
            "built domain index: {} exact keys, {} wildcard keys",
            index.exact_len(),
            index.wildcard_len()
        );
        index
    }

    /// Indices of every entry matching a canonical host.
    ///
    /// Exact matches come first, then wildcards from the longest base to
    /// the shortest.
    pub fn matches(&self, host: &str, mode: WildcardMode) -> Vec<usize> {
        let mut out = Vec::new();
        if host.is_empty() {
            return out;
        }
        if let Some(ids) = self.exact.get(host) {
            out.extend_from_slice(ids);
        }
        if self.wildcard.is_empty() {
            return out;
        }

        let reversed = domain::reversed_labels(host);
        if mode == WildcardMode::IncludeRoot {
            if let Some(ids) = self.wildcard.get(reversed.as_str()) {
                out.extend_from_slice(ids);
            }
        }
        let boundaries = reversed.match_indices('.').map(|(i, _)| i).rev();
        for end in boundaries {
            if let Some(ids) = self.wildcard.get(&reversed[..end]) {
                out.extend_from_slice(ids);
            }
        }
        out
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub fn wildcard_len(&self) -> usize {
        self.wildcard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<RuleEntry> {
        vec![
            RuleEntry::block("ads.example.com"),
            RuleEntry::block("*.example.com"),
            RuleEntry::allow("*.a.example.com"),
            RuleEntry::block("*.com"),
            RuleEntry::allow("ads.example.com"),
        ]
    }

    #[test]
    fn test_exact_and_wildcard_tiers() {
        let index = DomainIndex::build(&entries());
        assert_eq!(index.exact_len(), 1);
        assert_eq!(index.wildcard_len(), 3);

        assert_eq!(
            index.matches("ads.example.com", WildcardMode::SubdomainsOnly),
            vec![0, 4, 1, 3]
        );
        assert_eq!(
            index.matches("x.a.example.com", WildcardMode::SubdomainsOnly),
            vec![2, 1, 3]
        );
    }

    #[test]
    fn test_wildcard_root_handling() {
        let index = DomainIndex::build(&entries());
        assert_eq!(index.matches("example.com", WildcardMode::SubdomainsOnly), vec![3]);
        assert_eq!(index.matches("example.com", WildcardMode::IncludeRoot), vec![1, 3]);
        assert!(index.matches("com", WildcardMode::SubdomainsOnly).is_empty());
    }

    #[test]
    fn test_no_partial_label_match() {
        let index = DomainIndex::build(&[RuleEntry::block("*.ample.com")]);
        assert!(index.matches("x.example.com", WildcardMode::SubdomainsOnly).is_empty());
        assert_eq!(index.matches("x.ample.com", WildcardMode::SubdomainsOnly), vec![0]);
    }

    #[test]
    fn test_mixed_case_patterns_indexed_folded() {
        let index = DomainIndex::build(&[
            RuleEntry::block("Ads.Example.com"),
            RuleEntry::block("*.Tracker.NET"),
        ]);
        assert_eq!(index.matches("ads.example.com", WildcardMode::SubdomainsOnly), vec![0]);
        assert_eq!(index.matches("x.tracker.net", WildcardMode::SubdomainsOnly), vec![1]);
    }

    #[test]
    fn test_empty_query() {
        let index = DomainIndex::build(&entries());
        assert!(index.matches("", WildcardMode::IncludeRoot).is_empty());
    }
}
