//! Publish handle for the active rule set.
//!
//! Writers build a complete [`RuleSet`] off to the side and publish it in
//! one atomic pointer swap. Readers always see either the old or the new
//! set, never a mix, and a reader holding the old set keeps it alive until
//! it is done.

use arc_swap::ArcSwap;
use quick_cache::sync::Cache;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::action::Decision;
use crate::domain;
use crate::error::Result;
use crate::parser::ParserOptions;
use crate::registry::{FormatHint, ParserRegistry};
use crate::ruleset::{RuleSet, WildcardMode};

/// Default decision cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Configuration for a [`RuleSetHandle`].
#[derive(Debug, Clone)]
pub struct HandleConfig {
    /// Maximum number of cached decisions.
    pub cache_capacity: usize,
    /// Whether to cache decisions at all.
    pub cache_enabled: bool,
    /// Wildcard mode forced onto every published set; `None` keeps the
    /// set's own.
    pub wildcard_mode: Option<WildcardMode>,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
            wildcard_mode: None,
        }
    }
}

impl HandleConfig {
    /// Configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            ..Default::default()
        }
    }

    /// Configuration with the decision cache disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
            wildcard_mode: None,
        }
    }

    pub fn with_wildcard_mode(mut self, mode: WildcardMode) -> Self {
        self.wildcard_mode = Some(mode);
        self
    }
}

/// Decision cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of cached decisions.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
}

/// Shared handle to the active rule set.
///
/// # Example
///
/// ```ignore
/// use shieldrule::{RuleSetHandle, ParserRegistry, ParserOptions};
///
/// let registry = ParserRegistry::with_builtin();
/// let handle = RuleSetHandle::default();
///
/// handle.reload_file(&registry, Path::new("blocklist.yaml"), &ParserOptions::default())?;
/// let decision = handle.decide("ads.example.com");
/// ```
pub struct RuleSetHandle {
    inner: ArcSwap<RuleSet>,
    /// Decisions keyed by a hash of (generation, query)
    cache: Option<Cache<u64, Decision>>,
    config: HandleConfig,
    generation: AtomicU64,
}

impl Default for RuleSetHandle {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl RuleSetHandle {
    /// Wrap a rule set with the default configuration.
    pub fn new(rule_set: RuleSet) -> Self {
        Self::with_config(rule_set, HandleConfig::default())
    }

    /// Wrap a rule set with a custom configuration.
    pub fn with_config(rule_set: RuleSet, config: HandleConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };

        Self {
            inner: ArcSwap::from_pointee(Self::prepare(rule_set, &config)),
            cache,
            config,
            generation: AtomicU64::new(0),
        }
    }

    fn prepare(rule_set: RuleSet, config: &HandleConfig) -> RuleSet {
        let rule_set = match config.wildcard_mode {
            Some(mode) => rule_set.with_wildcard_mode(mode),
            None => rule_set,
        };
        rule_set.build_index();
        rule_set
    }

    /// Atomically replace the active rule set and return the new
    /// generation.
    ///
    /// The index is built before the swap, so the first lookups on the new
    /// set do not pay for it.
    pub fn publish(&self, rule_set: RuleSet) -> u64 {
        let rule_set = Self::prepare(rule_set, &self.config);
        let count = rule_set.rule_count();
        self.inner.store(Arc::new(rule_set));

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(ref cache) = self.cache {
            cache.clear();
        }

        log::info!("Published rule set generation {} ({} rules)", generation, count);
        generation
    }

    /// Parse a document and publish the result.
    ///
    /// A failed parse leaves the active set untouched.
    pub fn reload_from_bytes(
        &self,
        registry: &ParserRegistry,
        data: &[u8],
        hint: FormatHint<'_>,
        options: &ParserOptions,
    ) -> Result<u64> {
        let outcome = registry.parse(data, hint, options)?;
        Ok(self.publish(outcome.into_rule_set()))
    }

    /// Parse a file and publish the result.
    pub fn reload_file(
        &self,
        registry: &ParserRegistry,
        path: &Path,
        options: &ParserOptions,
    ) -> Result<u64> {
        let outcome = registry.parse_file(path, options)?;
        log::info!("Loaded rules from {:?}", path);
        Ok(self.publish(outcome.into_rule_set()))
    }

    /// The active rule set. Stays valid after later publishes.
    pub fn current(&self) -> Arc<RuleSet> {
        self.inner.load_full()
    }

    /// Resolve a query against the active rule set, with caching.
    pub fn decide(&self, domain: &str) -> Decision {
        if domain.is_empty() {
            return Decision::Unknown;
        }

        // Generation is read before the set so a stale decision is never
        // stored under a newer generation.
        let generation = self.generation.load(Ordering::SeqCst);
        let key = cache_key(generation, domain);

        if let Some(ref cache) = self.cache {
            if let Some(decision) = cache.get(&key) {
                return decision;
            }
        }

        let decision = self.inner.load().decide(domain);

        if let Some(ref cache) = self.cache {
            cache.insert(key, decision);
        }
        decision
    }

    /// Quick check if a query is blocked by the active set.
    pub fn should_block(&self, domain: &str) -> bool {
        self.decide(domain).is_block()
    }

    /// Clear the decision cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.config.cache_capacity,
                len: cache.len(),
                enabled: true,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
            },
        }
    }

    /// Number of publishes since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }
}

fn cache_key(generation: u64, domain: &str) -> u64 {
    let mut hasher = ahash::AHasher::default();
    generation.hash(&mut hasher);
    domain::canonical_query(domain.trim()).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{RuleEntry, RuleSetMetadata};

    fn rules(entries: Vec<RuleEntry>) -> RuleSet {
        RuleSet::new(entries, RuleSetMetadata::default())
    }

    #[test]
    fn test_decide_basic() {
        let handle = RuleSetHandle::new(rules(vec![
            RuleEntry::block("*.ads.com"),
            RuleEntry::allow("ok.ads.com").with_priority(100),
        ]));
        assert!(handle.current().is_indexed());
        assert_eq!(handle.decide("x.ads.com"), Decision::Block);
        assert_eq!(handle.decide("ok.ads.com"), Decision::Allow);
        assert_eq!(handle.decide("ads.com"), Decision::Unknown);
        assert_eq!(handle.decide(""), Decision::Unknown);
    }

    #[test]
    fn test_cache_hit() {
        let handle = RuleSetHandle::new(rules(vec![RuleEntry::block("a.com")]));
        handle.decide("a.com");
        assert_eq!(handle.cache_stats().len, 1);
        handle.decide("a.com");
        assert_eq!(handle.cache_stats().len, 1);
    }

    #[test]
    fn test_publish_swaps_and_clears() {
        let handle = RuleSetHandle::new(rules(vec![RuleEntry::block("a.com")]));
        let old = handle.current();
        assert_eq!(handle.decide("a.com"), Decision::Block);
        assert_eq!(handle.generation(), 0);

        let generation = handle.publish(rules(vec![RuleEntry::allow("a.com")]));
        assert_eq!(generation, 1);
        assert_eq!(handle.generation(), 1);
        assert_eq!(handle.cache_stats().len, 0);
        assert_eq!(handle.decide("a.com"), Decision::Allow);

        // Readers holding the previous set are unaffected
        assert_eq!(old.decide("a.com"), Decision::Block);
    }

    #[test]
    fn test_no_cache_config() {
        let handle = RuleSetHandle::with_config(
            rules(vec![RuleEntry::block("a.com")]),
            HandleConfig::no_cache(),
        );
        assert_eq!(handle.decide("a.com"), Decision::Block);
        let stats = handle.cache_stats();
        assert!(!stats.enabled);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn test_equivalent_queries_share_cache_entry() {
        let handle = RuleSetHandle::with_config(
            rules(vec![RuleEntry::block("a.com")]),
            HandleConfig::with_capacity(16),
        );
        assert_eq!(handle.decide("a.com"), Decision::Block);
        assert_eq!(handle.decide("a.com."), Decision::Block);
        assert_eq!(handle.decide(" A.COM "), Decision::Block);
        assert_eq!(handle.cache_stats().len, 1);
        assert_eq!(cache_key(3, "A.com."), cache_key(3, "a.com"));
        assert_ne!(cache_key(3, "a.com"), cache_key(4, "a.com"));
    }

    #[test]
    fn test_forced_wildcard_mode() {
        let config = HandleConfig::with_capacity(16).with_wildcard_mode(WildcardMode::IncludeRoot);
        let handle = RuleSetHandle::with_config(rules(vec![RuleEntry::block("*.ads.com")]), config);
        assert_eq!(handle.decide("ads.com"), Decision::Block);
        handle.publish(rules(vec![RuleEntry::block("*.track.com")]));
        assert_eq!(handle.current().wildcard_mode(), WildcardMode::IncludeRoot);
        assert_eq!(handle.decide("track.com"), Decision::Block);
    }

    #[test]
    fn test_failed_reload_keeps_active_set() {
        let registry = ParserRegistry::with_builtin();
        let handle = RuleSetHandle::new(rules(vec![RuleEntry::block("a.com")]));
        let result = handle.reload_from_bytes(
            &registry,
            b"{\"blocked\": [",
            FormatHint::Format("json"),
            &ParserOptions::default(),
        );
        assert!(result.is_err());
        assert_eq!(handle.generation(), 0);
        assert_eq!(handle.decide("a.com"), Decision::Block);

        let generation = handle
            .reload_from_bytes(
                &registry,
                b"whitelist:\n  - a.com\n",
                FormatHint::Format("yaml"),
                &ParserOptions::default(),
            )
            .unwrap();
        assert_eq!(generation, 1);
        assert_eq!(handle.decide("a.com"), Decision::Allow);
    }
}
