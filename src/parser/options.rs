//! Per-parse configuration.

use serde::{Deserialize, Serialize};

use crate::action::{RuleAction, RulePriority};

/// Default number of rows between progress notifications.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options controlling one parse. Not persisted with the rule set.
///
/// Deserializable so that a refresh orchestrator can carry them in its own
/// configuration file; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserOptions {
    /// Fail the whole parse on the first invalid rule instead of skipping it
    pub strict_mode: bool,
    /// Apply full domain syntax validation
    pub validate_domains: bool,
    /// Lower-case domains
    pub normalize_case: bool,
    /// Keep exact domain+action repeats within one parse
    pub allow_duplicates: bool,
    /// Priority for rules that do not declare one
    pub default_priority: i32,
    /// Action for sources without an explicit action (plain lists)
    pub default_action: RuleAction,
    /// Stop once this many rules were accepted (0 = unlimited)
    pub max_rule_count: usize,
    /// Rows between progress notifications
    pub batch_size: usize,
    /// Build the domain index before returning the rule set
    pub build_index_while_parsing: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            validate_domains: true,
            normalize_case: true,
            allow_duplicates: false,
            default_priority: RulePriority::MEDIUM,
            default_action: RuleAction::Block,
            max_rule_count: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            build_index_while_parsing: false,
        }
    }
}

impl ParserOptions {
    /// Reject the batch on the first invalid rule.
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            ..Self::default()
        }
    }

    /// Skip validation and duplicate suppression, index eagerly.
    ///
    /// Intended for large lists from trusted sources.
    pub fn performance() -> Self {
        Self {
            validate_domains: false,
            allow_duplicates: true,
            batch_size: 10_000,
            build_index_while_parsing: true,
            ..Self::default()
        }
    }

    pub fn with_default_action(mut self, action: RuleAction) -> Self {
        self.default_action = action;
        self
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn with_max_rule_count(mut self, max: usize) -> Self {
        self.max_rule_count = max;
        self
    }

    /// Rows between progress notifications, never zero.
    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = ParserOptions::default();
        assert!(!default.strict_mode);
        assert!(default.validate_domains);
        assert!(!default.allow_duplicates);

        assert!(ParserOptions::strict().strict_mode);

        let perf = ParserOptions::performance();
        assert!(perf.allow_duplicates);
        assert!(perf.build_index_while_parsing);
    }

    #[test]
    fn test_deserialize_partial() {
        let options: ParserOptions =
            serde_json::from_str(r#"{"strictMode": true, "maxRuleCount": 10, "defaultAction": "allow"}"#)
                .unwrap();
        assert!(options.strict_mode);
        assert_eq!(options.max_rule_count, 10);
        assert_eq!(options.default_action, RuleAction::Allow);
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size() {
        let options = ParserOptions {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(options.effective_batch_size(), 1);
    }
}
