//! Rule entity model: one normalized rule and the metadata of a rule list.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};

use crate::action::{RuleAction, RulePriority};
use crate::domain;

/// One filtering rule.
///
/// `domain` is an exact host (`ads.example.com`) or a wildcard pattern
/// (`*.example.com`) and is already normalized. Equality and hashing use
/// only domain, action and priority; comment, date and source are
/// informational.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub domain: String,
    pub action: RuleAction,
    pub priority: i32,
    pub comment: Option<String>,
    pub added_date: Option<DateTime<Utc>>,
    /// Origin identifier (URL or source-set name)
    pub source: Option<String>,
}

impl RuleEntry {
    /// Create a rule with no informational fields.
    pub fn new(domain: impl Into<String>, action: RuleAction, priority: i32) -> Self {
        Self {
            domain: domain.into(),
            action,
            priority,
            comment: None,
            added_date: None,
            source: None,
        }
    }

    /// Block rule at medium priority.
    pub fn block(domain: impl Into<String>) -> Self {
        Self::new(domain, RuleAction::Block, RulePriority::MEDIUM)
    }

    /// Allow rule at medium priority.
    pub fn allow(domain: impl Into<String>) -> Self {
        Self::new(domain, RuleAction::Allow, RulePriority::MEDIUM)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_added_date(mut self, date: DateTime<Utc>) -> Self {
        self.added_date = Some(date);
        self
    }

    /// Check if this is a wildcard rule.
    pub fn is_wildcard(&self) -> bool {
        domain::is_wildcard(&self.domain)
    }

    /// Base domain of a wildcard rule.
    pub fn wildcard_base(&self) -> Option<&str> {
        domain::wildcard_base(&self.domain)
    }

    /// Check if this rule matches a canonical (lowercase) host.
    ///
    /// Wildcards match strict subdomains only.
    pub fn matches_domain(&self, host: &str) -> bool {
        match self.wildcard_base() {
            Some(base) => domain::is_strict_subdomain(host, &domain::fold_case(base)),
            None => domain::fold_case(&self.domain) == host,
        }
    }

    /// Rank used to order equally prioritized matches: exact rules rank above
    /// every wildcard, longer wildcard bases above shorter ones.
    pub fn specificity(&self) -> (bool, usize) {
        match self.wildcard_base() {
            Some(base) => (false, domain::label_count(base)),
            None => (true, domain::label_count(&self.domain)),
        }
    }
}

impl PartialEq for RuleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.action == other.action && self.priority == other.priority
    }
}

impl Eq for RuleEntry {}

impl Hash for RuleEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.action.hash(state);
        self.priority.hash(state);
    }
}

/// Describes the origin of a batch of entries. Never affects matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSetMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub source_url: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    /// Any additional fields from the document
    pub custom_fields: Map<String, Value>,
}

impl RuleSetMetadata {
    /// Metadata with only a name and version.
    pub fn named(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Fill fields missing here from `other`; custom fields are unioned with
    /// existing keys kept.
    pub fn combine(&mut self, other: &RuleSetMetadata) {
        fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(other);
            }
        }
        fill(&mut self.name, &other.name);
        fill(&mut self.version, &other.version);
        fill(&mut self.author, &other.author);
        fill(&mut self.source_url, &other.source_url);
        fill(&mut self.description, &other.description);
        fill(&mut self.license, &other.license);
        self.updated = match (self.updated, other.updated) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for (key, value) in &other.custom_fields {
            self.custom_fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
