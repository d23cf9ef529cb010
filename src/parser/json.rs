//! JSON rule document parser.
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "name": "Rule List Name",
//!   "updated": "2024-01-01T00:00:00Z",
//!   "blocked": ["ad.example.com", "*.tracking.com",
//!               {"domain": "spam.com", "priority": 100, "comment": "Known spam"}],
//!   "whitelist": ["safe.example.com", {"domain": "trusted.com", "priority": 100}],
//!   "metadata": {"custom_field": "value"}
//! }
//! ```

use serde_json::Value;

use super::builder::RuleBuilder;
use super::document::{read_document, rule_item_count, scalar_string, value_kind, ALLOW_KEYS, BLOCK_KEYS};
use super::{decode_text, Capabilities, ParseOutcome, ParserOptions, RuleParser};
use crate::error::{Error, Result};
use crate::registry::ParserRegistry;

/// JSON rule document parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRuleParser;

impl JsonRuleParser {
    fn decode(data: &[u8]) -> Result<Value> {
        let text = decode_text(data)?;
        serde_json::from_str(text).map_err(|e| Error::syntax(Some(e.line()), e.to_string()))
    }
}

impl RuleParser for JsonRuleParser {
    fn format_identifier(&self) -> &'static str {
        "json"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["application/json", "text/json"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::METADATA
            | Capabilities::VALIDATION
            | Capabilities::PRIORITIES
            | Capabilities::WILDCARDS
            | Capabilities::STREAMING_PROGRESS
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        matches!(
            data.iter().find(|b| !b.is_ascii_whitespace()),
            Some(b'{') | Some(b'[')
        )
    }

    fn parse_with_progress(
        &self,
        data: &[u8],
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome> {
        let doc = Self::decode(data)?;
        let mut builder = RuleBuilder::new(options, progress, rule_item_count(&doc));
        let metadata = read_document(&doc, &mut builder)?;
        Ok(builder.finish(metadata))
    }
}

/// Structural validation of JSON rule documents, separable from parsing.
///
/// Lets a caller check a document before committing to a full parse.
pub struct JsonRuleSchema;

impl JsonRuleSchema {
    /// Decode and validate raw bytes.
    pub fn validate_bytes(data: &[u8]) -> Result<()> {
        Self::validate(&JsonRuleParser::decode(data)?)
    }

    /// Validate the structure of a decoded document.
    pub fn validate(json: &Value) -> Result<()> {
        let map = json.as_object().ok_or_else(|| {
            Error::InvalidFormat(format!("rule document is {}, expected a mapping", value_kind(json)))
        })?;

        if !Self::has_required_fields(json) {
            return Err(Error::InvalidFormat(
                "rule document has no blocked or whitelist list".to_string(),
            ));
        }

        for key in BLOCK_KEYS.iter().chain(ALLOW_KEYS) {
            let items = match map.get(*key) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(Error::InvalidFormat(format!(
                        "`{}` is {}, expected a list",
                        key,
                        value_kind(other)
                    )))
                }
            };
            for (i, item) in items.iter().enumerate() {
                let valid = match item {
                    Value::String(_) => true,
                    Value::Object(record) => record.get("domain").map_or(false, Value::is_string),
                    _ => false,
                };
                if !valid {
                    return Err(Error::InvalidFormat(format!(
                        "`{}[{}]` must be a domain string or a record with a `domain` string",
                        key, i
                    )));
                }
            }
        }

        match map.get("metadata") {
            None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
            Some(other) => Err(Error::InvalidFormat(format!(
                "`metadata` is {}, expected a mapping",
                value_kind(other)
            ))),
        }
    }

    /// Check if the document has at least one rule list.
    pub fn has_required_fields(json: &Value) -> bool {
        json.as_object().map_or(false, |map| {
            BLOCK_KEYS.iter().chain(ALLOW_KEYS).any(|k| map.contains_key(*k))
        })
    }

    /// Extract the document version, string or number.
    pub fn extract_version(json: &Value) -> Option<String> {
        json.get("version").and_then(scalar_string)
    }
}

/// Register the JSON dialect.
pub fn register(registry: &mut ParserRegistry) {
    registry.register(&["json"], || Box::new(JsonRuleParser));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{RuleAction, RulePriority};
    use serde_json::json;

    #[test]
    fn test_blocked_and_whitelist() {
        let data = br#"{"blocked":["a.com"],"whitelist":["b.com"]}"#;
        let outcome = JsonRuleParser.parse(data, &ParserOptions::default()).unwrap();
        let rules = outcome.rule_set.entries();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].domain, "a.com");
        assert_eq!(rules[0].action, RuleAction::Block);
        assert_eq!(rules[1].domain, "b.com");
        assert_eq!(rules[1].action, RuleAction::Allow);
        for rule in rules {
            assert_eq!(rule.priority, RulePriority::MEDIUM);
            assert!(rule.comment.is_none());
            assert!(rule.added_date.is_none());
        }
    }

    #[test]
    fn test_full_document() {
        let data = br#"{
            "version": 2,
            "name": "Corp list",
            "updated": "2024-01-01T00:00:00Z",
            "author": "secops",
            "description": "ads and trackers",
            "source": "https://lists.example/corp.json",
            "license": "MIT",
            "blocked": [
                "ad.example.com",
                "*.Tracking.com",
                {"domain": "spam.com", "priority": 100, "comment": "Known spam domain"}
            ],
            "whitelist": [{"domain": "trusted.com", "priority": 100}],
            "metadata": {"team": "net"}
        }"#;
        let outcome = JsonRuleParser.parse(data, &ParserOptions::default()).unwrap();
        let meta = outcome.rule_set.metadata();
        assert_eq!(meta.version.as_deref(), Some("2"));
        assert_eq!(meta.name.as_deref(), Some("Corp list"));
        assert_eq!(meta.author.as_deref(), Some("secops"));
        assert_eq!(meta.license.as_deref(), Some("MIT"));
        assert!(meta.updated.is_some());
        assert_eq!(meta.custom_fields["team"], json!("net"));

        let rules = outcome.rule_set.entries();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[1].domain, "*.tracking.com");
        assert_eq!(rules[2].priority, 100);
        assert_eq!(rules[2].comment.as_deref(), Some("Known spam domain"));
        assert_eq!(rules[3].action, RuleAction::Allow);
    }

    #[test]
    fn test_out_of_range_dates_ignored() {
        let data = br#"{
            "updated": "99999999999999-01-01",
            "blocked": [{"domain": "a.com", "added": "99999999999999-01-01T00:00:00Z"}, "b.com"]
        }"#;
        let outcome = JsonRuleParser.parse(data, &ParserOptions::default()).unwrap();
        assert!(outcome.rule_set.metadata().updated.is_none());
        assert_eq!(outcome.rule_set.rule_count(), 2);
        assert!(outcome.rule_set.entries()[0].added_date.is_none());
    }

    #[test]
    fn test_malformed_json() {
        let err = JsonRuleParser
            .parse(b"{\n\"blocked\": [\n", &ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Syntax { line: Some(_), .. }));
    }

    #[test]
    fn test_top_level_array_and_scalar() {
        let outcome = JsonRuleParser
            .parse(br#"["a.com", "b.com"]"#, &ParserOptions::default())
            .unwrap();
        assert_eq!(outcome.rule_set.rule_count(), 2);

        assert!(matches!(
            JsonRuleParser.parse(br#""a.com""#, &ParserOptions::default()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_can_parse() {
        assert!(JsonRuleParser.can_parse(b"  {\"blocked\": []}"));
        assert!(JsonRuleParser.can_parse(b"\n[\"a.com\"]"));
        assert!(!JsonRuleParser.can_parse(b"blocked:\n  - a.com"));
    }

    #[test]
    fn test_schema_validation() {
        assert!(JsonRuleSchema::validate(&json!({"blocked": ["a.com"]})).is_ok());
        assert!(JsonRuleSchema::validate(&json!({"whitelist": [{"domain": "a.com"}]})).is_ok());
        assert!(JsonRuleSchema::validate(&json!({"name": "x"})).is_err());
        assert!(JsonRuleSchema::validate(&json!({"blocked": "a.com"})).is_err());
        assert!(JsonRuleSchema::validate(&json!({"blocked": [{"priority": 1}]})).is_err());
        assert!(JsonRuleSchema::validate(&json!({"blocked": [], "metadata": 3})).is_err());
        assert!(JsonRuleSchema::validate(&json!(["a.com"])).is_err());
        assert!(JsonRuleSchema::validate_bytes(b"{oops").is_err());
    }

    #[test]
    fn test_schema_helpers() {
        assert!(JsonRuleSchema::has_required_fields(&json!({"allowlist": []})));
        assert!(!JsonRuleSchema::has_required_fields(&json!({"version": "1"})));
        assert_eq!(
            JsonRuleSchema::extract_version(&json!({"version": "1.0"})).as_deref(),
            Some("1.0")
        );
        assert_eq!(
            JsonRuleSchema::extract_version(&json!({"version": 3})).as_deref(),
            Some("3")
        );
        assert_eq!(JsonRuleSchema::extract_version(&json!({})), None);
    }
}
