//! Rule sets: normalized rules plus metadata, with a lazily built domain
//! index for lookups.

mod index;
mod merge;
mod stats;

pub use index::WildcardMode;
pub use merge::{merge_rule_sets, MergeOptions};
pub use stats::RuleSetStatistics;

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use self::index::DomainIndex;
use crate::action::{Decision, RuleAction, RulePriority};
use crate::domain;
use crate::entry::{RuleEntry, RuleSetMetadata};
use crate::error::{Error, Result};
use crate::precedence;
use crate::timestamp;

/// Source tag of entries created from an override dictionary.
pub const OVERRIDE_SOURCE: &str = "override";

/// A collection of rules with metadata.
///
/// Lookups are `&self` and safe from many threads at once; the index is
/// built by whichever thread needs it first. Mutation takes `&mut self`
/// and discards the index, so a rule set shared behind an `Arc` is
/// effectively immutable.
#[derive(Debug, Clone)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
    metadata: RuleSetMetadata,
    parse_date: DateTime<Utc>,
    wildcard_mode: WildcardMode,
    index: OnceCell<DomainIndex>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Vec::new(), RuleSetMetadata::default())
    }
}

impl RuleSet {
    /// Create a rule set from already normalized entries.
    pub fn new(entries: Vec<RuleEntry>, metadata: RuleSetMetadata) -> Self {
        Self {
            entries,
            metadata,
            parse_date: Utc::now(),
            wildcard_mode: WildcardMode::default(),
            index: OnceCell::new(),
        }
    }

    /// Rule set holding the allow/block override dictionary of a manifest.
    ///
    /// Every entry gets `RulePriority::OVERRIDE` so it beats any list rule.
    pub fn from_overrides<A, B>(allow: A, block: B) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let allow = allow
            .into_iter()
            .map(|d| (d.as_ref().to_string(), RuleAction::Allow));
        let block = block
            .into_iter()
            .map(|d| (d.as_ref().to_string(), RuleAction::Block));

        let mut entries = Vec::new();
        for (raw, action) in allow.chain(block) {
            let pattern = domain::normalize(&raw, true);
            domain::validate(&pattern).map_err(|reason| Error::InvalidDomain {
                line: None,
                domain: pattern.clone(),
                reason,
            })?;
            entries.push(
                RuleEntry::new(pattern, action, RulePriority::OVERRIDE).with_source(OVERRIDE_SOURCE),
            );
        }

        let metadata = RuleSetMetadata {
            name: Some("overrides".to_string()),
            ..Default::default()
        };
        Ok(Self::new(entries, metadata))
    }

    /// Select how wildcards treat their base domain.
    pub fn with_wildcard_mode(mut self, mode: WildcardMode) -> Self {
        self.wildcard_mode = mode;
        self
    }

    pub fn wildcard_mode(&self) -> WildcardMode {
        self.wildcard_mode
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn metadata(&self) -> &RuleSetMetadata {
        &self.metadata
    }

    /// When this rule set was created.
    pub fn parse_date(&self) -> DateTime<Utc> {
        self.parse_date
    }

    pub fn rule_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the domain index now instead of on the first lookup.
    pub fn build_index(&self) {
        self.index();
    }

    /// Check if the index is currently built.
    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    fn index(&self) -> &DomainIndex {
        self.index.get_or_init(|| DomainIndex::build(&self.entries))
    }

    /// All rules matching a query host, exact matches first.
    ///
    /// The query is lowercased and a trailing root dot is stripped.
    pub fn lookup(&self, domain: &str) -> Vec<&RuleEntry> {
        let host = domain::canonical_query(domain.trim());
        self.index()
            .matches(&host, self.wildcard_mode)
            .into_iter()
            .map(|i| &self.entries[i])
            .collect()
    }

    /// All rules matching a query host, strongest first.
    pub fn lookup_by_precedence(&self, domain: &str) -> Vec<&RuleEntry> {
        let mut matches = self.lookup(domain);
        precedence::sort_by_precedence(&mut matches);
        matches
    }

    /// Resolve a query host to a decision.
    pub fn decide(&self, domain: &str) -> Decision {
        precedence::resolve(&self.lookup(domain))
    }

    /// The rule that decides a query host, if any.
    pub fn rule_for_domain(&self, domain: &str) -> Option<&RuleEntry> {
        precedence::winner(&self.lookup(domain))
    }

    /// Quick check if a query host is blocked.
    pub fn should_block(&self, domain: &str) -> bool {
        self.decide(domain).is_block()
    }

    /// Append one entry. The domain is lowercased and its root dot
    /// stripped; the index is discarded.
    pub fn add_entry(&mut self, mut entry: RuleEntry) {
        entry.domain = domain::normalize(&entry.domain, true);
        self.entries.push(entry);
        self.index.take();
    }

    /// Append entries, skipping domain+action repeats unless
    /// `allow_duplicates`. Returns how many were added.
    pub fn add_entries<I>(&mut self, entries: I, allow_duplicates: bool) -> usize
    where
        I: IntoIterator<Item = RuleEntry>,
    {
        let before = self.entries.len();
        let mut seen: AHashSet<(String, RuleAction)> = if allow_duplicates {
            AHashSet::new()
        } else {
            self.entries
                .iter()
                .map(|e| (e.domain.clone(), e.action))
                .collect()
        };
        for mut entry in entries {
            entry.domain = domain::normalize(&entry.domain, true);
            if !allow_duplicates && !seen.insert((entry.domain.clone(), entry.action)) {
                continue;
            }
            self.entries.push(entry);
        }
        let added = self.entries.len() - before;
        if added > 0 {
            self.index.take();
        }
        added
    }

    pub fn statistics(&self) -> RuleSetStatistics {
        RuleSetStatistics::from_entries(&self.entries)
    }

    /// New rule set with only the entries matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> RuleSet
    where
        F: Fn(&RuleEntry) -> bool,
    {
        let entries = self.entries.iter().filter(|&e| predicate(e)).cloned().collect();
        RuleSet::new(entries, self.metadata.clone()).with_wildcard_mode(self.wildcard_mode)
    }

    /// New rule set with the entries of both sets; metadata missing here is
    /// filled from `other`.
    pub fn merge(&self, other: &RuleSet) -> RuleSet {
        merge_rule_sets(
            [self, other],
            MergeOptions::KEEP_DUPLICATES | MergeOptions::COMBINE_METADATA,
        )
    }

    /// New rule set with one entry per domain+action, keeping the highest
    /// priority copy.
    pub fn without_duplicates(&self) -> RuleSet {
        merge_rule_sets([self], MergeOptions::PREFER_HIGHER_PRIORITY)
    }

    /// Check every entry against full domain validation.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.entries {
            domain::validate(&entry.domain).map_err(|reason| Error::InvalidDomain {
                line: None,
                domain: entry.domain.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Export as a JSON rule document.
    ///
    /// Rules with medium priority and no informational fields are written
    /// as bare strings, all others as records. The output parses back with
    /// the JSON parser into the same rules.
    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        let meta = &self.metadata;
        let scalars = [
            ("name", &meta.name),
            ("version", &meta.version),
            ("author", &meta.author),
            ("description", &meta.description),
            ("source", &meta.source_url),
            ("license", &meta.license),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                doc.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(updated) = meta.updated {
            doc.insert("updated".to_string(), Value::String(timestamp::format_rfc3339(&updated)));
        }

        let mut blocked = Vec::new();
        let mut whitelist = Vec::new();
        for entry in &self.entries {
            let item = export_entry(entry);
            match entry.action {
                RuleAction::Block => blocked.push(item),
                RuleAction::Allow => whitelist.push(item),
            }
        }
        doc.insert("blocked".to_string(), Value::Array(blocked));
        doc.insert("whitelist".to_string(), Value::Array(whitelist));

        if !meta.custom_fields.is_empty() {
            doc.insert("metadata".to_string(), Value::Object(meta.custom_fields.clone()));
        }
        Value::Object(doc)
    }

    /// Export as pretty-printed JSON text.
    pub fn to_json(&self) -> String {
        format!("{:#}", self.to_value())
    }
}

fn export_entry(entry: &RuleEntry) -> Value {
    let plain = entry.priority == RulePriority::MEDIUM
        && entry.comment.is_none()
        && entry.source.is_none()
        && entry.added_date.is_none();
    if plain {
        return Value::String(entry.domain.clone());
    }

    let mut record = Map::new();
    record.insert("domain".to_string(), Value::String(entry.domain.clone()));
    record.insert("priority".to_string(), Value::from(entry.priority));
    if let Some(comment) = &entry.comment {
        record.insert("comment".to_string(), Value::String(comment.clone()));
    }
    if let Some(source) = &entry.source {
        record.insert("source".to_string(), Value::String(source.clone()));
    }
    if let Some(added) = entry.added_date {
        record.insert("added".to_string(), Value::String(timestamp::format_rfc3339(&added)));
    }
    Value::Object(record)
}
