//! Rule actions, lookup decisions and priority levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action a rule applies to the domains it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Block the domain
    #[default]
    Block,
    /// Allow the domain (whitelist)
    Allow,
}

impl RuleAction {
    /// Parse an action from a string (case-insensitive).
    ///
    /// Accepts the spellings used by published rule lists.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" | "blocked" | "deny" | "blocklist" | "blacklist" => Some(RuleAction::Block),
            "allow" | "allowed" | "whitelist" | "allowlist" | "pass" => Some(RuleAction::Allow),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Block => "block",
            RuleAction::Allow => "allow",
        }
    }

    /// Convert into the equivalent lookup decision.
    pub fn decision(self) -> Decision {
        match self {
            RuleAction::Block => Decision::Block,
            RuleAction::Allow => Decision::Allow,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of resolving a domain against a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// A rule allows the domain
    Allow,
    /// A rule blocks the domain
    Block,
    /// No rule matched; the caller's default policy applies
    Unknown,
}

impl Decision {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block => "BLOCK",
            Decision::Unknown => "UNKNOWN",
        }
    }

    /// Whether this decision blocks the query.
    pub fn is_block(self) -> bool {
        self == Decision::Block
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known priority levels. Any `i32` is a valid priority.
pub struct RulePriority;

impl RulePriority {
    pub const LOW: i32 = 0;
    pub const MEDIUM: i32 = 50;
    pub const HIGH: i32 = 100;
    /// User- or admin-authored overrides
    pub const OVERRIDE: i32 = 999;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(RuleAction::parse("block"), Some(RuleAction::Block));
        assert_eq!(RuleAction::parse("BLOCKED"), Some(RuleAction::Block));
        assert_eq!(RuleAction::parse("deny"), Some(RuleAction::Block));
        assert_eq!(RuleAction::parse("Allow"), Some(RuleAction::Allow));
        assert_eq!(RuleAction::parse("whitelist"), Some(RuleAction::Allow));
        assert_eq!(RuleAction::parse(" allowed "), Some(RuleAction::Allow));
        assert_eq!(RuleAction::parse("redirect"), None);
    }

    #[test]
    fn test_action_decision() {
        assert_eq!(RuleAction::Block.decision(), Decision::Block);
        assert_eq!(RuleAction::Allow.decision(), Decision::Allow);
    }

    #[test]
    fn test_display() {
        assert_eq!(RuleAction::Block.to_string(), "block");
        assert_eq!(Decision::Unknown.to_string(), "UNKNOWN");
        assert!(Decision::Block.is_block());
        assert!(!Decision::Allow.is_block());
    }
}
