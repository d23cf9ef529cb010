//! ShieldRule - A domain allow/block rule engine for DNS filtering.
//!
//! This crate ingests third-party rule lists, normalizes them into one
//! in-memory representation and answers, for every DNS query, whether the
//! domain is allowed, blocked or unknown, and by which rule.
//!
//! # Features
//!
//! - **Multi-format parsing**: JSON documents, a constrained YAML-like
//!   dialect, plain domain lists and hosts files
//! - **Parser registry**: Select parsers by format, extension, MIME type or
//!   content sniffing; gzip input is decompressed transparently
//! - **Wildcard indexing**: Exact and `*.suffix` rules resolved through a
//!   reversed-label index
//! - **Deterministic precedence**: Priority, then Block over Allow, then
//!   specificity
//! - **Atomic publish**: Swap in a new rule set without disturbing readers
//!
//! # Quick Start
//!
//! ```ignore
//! use shieldrule::{Decision, FormatHint, ParserOptions, ParserRegistry, RuleSetHandle};
//!
//! let registry = ParserRegistry::with_builtin();
//! let outcome = registry.parse(
//!     b"blocked:\n  - \"*.tracker.net\"\nwhitelist:\n  - safe.tracker.net\n",
//!     FormatHint::Format("yaml"),
//!     &ParserOptions::default(),
//! )?;
//!
//! let handle = RuleSetHandle::new(outcome.into_rule_set());
//! assert_eq!(handle.decide("ads.tracker.net"), Decision::Block);
//! ```
//!
//! # Precedence
//!
//! When several rules match a query:
//! 1. The highest priority wins
//! 2. On a priority tie, Block beats Allow
//! 3. Remaining ties go to the most specific rule (exact, then the longest
//!    wildcard base)
//!
//! A wildcard `*.example.com` covers strict subdomains only unless the rule
//! set uses [`WildcardMode::IncludeRoot`].

mod error;
mod timestamp;

pub mod action;
pub mod domain;
pub mod entry;
pub mod handle;
pub mod parser;
pub mod precedence;
pub mod registry;
pub mod ruleset;

// Re-export core types
pub use action::{Decision, RuleAction, RulePriority};
pub use entry::{RuleEntry, RuleSetMetadata};
pub use error::{DomainError, Error, Result};

// Re-export parser types
pub use parser::{
    Capabilities, Diagnostic, HostsParser, JsonRuleParser, JsonRuleSchema, ParseOutcome,
    ParseStatus, ParserOptions, PlainListParser, RuleParser, YamlRuleParser,
};
pub use registry::{FormatHint, ParserRegistry};

// Re-export rule set types
pub use ruleset::{
    merge_rule_sets, MergeOptions, RuleSet, RuleSetStatistics, WildcardMode, OVERRIDE_SOURCE,
};

// Re-export the publish handle
pub use handle::{CacheStats, HandleConfig, RuleSetHandle};
