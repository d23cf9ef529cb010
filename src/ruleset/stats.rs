//! Rule set statistics.

use ahash::AHashSet;
use std::fmt;

use crate::action::RuleAction;
use crate::domain;
use crate::entry::RuleEntry;

/// Counts describing a rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleSetStatistics {
    pub total: usize,
    pub block: usize,
    pub allow: usize,
    pub wildcard: usize,
    /// Distinct domain patterns, regardless of action
    pub unique_domains: usize,
    /// Entries repeating an earlier domain+action pair
    pub duplicates: usize,
    /// Entries failing full domain validation
    pub invalid: usize,
}

impl RuleSetStatistics {
    pub fn from_entries(entries: &[RuleEntry]) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Default::default()
        };
        let mut domains = AHashSet::with_capacity(entries.len());
        let mut rules = AHashSet::with_capacity(entries.len());

        for entry in entries {
            match entry.action {
                RuleAction::Block => stats.block += 1,
                RuleAction::Allow => stats.allow += 1,
            }
            if entry.is_wildcard() {
                stats.wildcard += 1;
            }
            if domain::validate(&entry.domain).is_err() {
                stats.invalid += 1;
            }
            domains.insert(entry.domain.as_str());
            if !rules.insert((entry.domain.as_str(), entry.action)) {
                stats.duplicates += 1;
            }
        }

        stats.unique_domains = domains.len();
        stats
    }
}

impl fmt::Display for RuleSetStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rules ({} block, {} allow, {} wildcard), {} unique domains, {} duplicates",
            self.total, self.block, self.allow, self.wildcard, self.unique_domains, self.duplicates
        )?;
        if self.invalid > 0 {
            write!(f, ", {} invalid", self.invalid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let entries = vec![
            RuleEntry::block("a.com"),
            RuleEntry::block("a.com").with_priority(100),
            RuleEntry::allow("a.com"),
            RuleEntry::block("*.b.com"),
            RuleEntry::allow("bad domain.com"),
        ];
        let stats = RuleSetStatistics::from_entries(&entries);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.block, 3);
        assert_eq!(stats.allow, 2);
        assert_eq!(stats.wildcard, 1);
        assert_eq!(stats.unique_domains, 3);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.invalid, 1);
    }

    #[test]
    fn test_display() {
        let stats = RuleSetStatistics::from_entries(&[RuleEntry::block("a.com")]);
        assert_eq!(
            stats.to_string(),
            "1 rules (1 block, 0 allow, 0 wildcard), 1 unique domains, 0 duplicates"
        );
    }
}
