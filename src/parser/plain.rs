//! Plain domain list parser.
//!
//! One domain per line; blank lines and `#` comments are skipped. Every
//! rule gets `options.default_action`, so the same parser serves block-only
//! and allow-only feeds.

use super::builder::{RawRule, RuleBuilder};
use super::{decode_text, strip_inline_comment, Capabilities, ParseOutcome, ParserOptions, RuleParser};
use crate::entry::RuleSetMetadata;
use crate::error::Result;
use crate::registry::ParserRegistry;

/// Plain domain list parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainListParser;

impl RuleParser for PlainListParser {
    fn format_identifier(&self) -> &'static str {
        "plain"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["txt", "list", "lst", "domains"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["text/plain"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::COMMENTS
            | Capabilities::WILDCARDS
            | Capabilities::VALIDATION
            | Capabilities::STREAMING_PROGRESS
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(data) else {
            return false;
        };
        let mut rows = text
            .lines()
            .map(|l| strip_inline_comment(l).trim())
            .filter(|l| !l.is_empty())
            .peekable();
        rows.peek().is_some()
            && rows.all(|l| l.contains('.') && !l.contains(':') && !l.contains(char::is_whitespace))
    }

    fn parse_with_progress(
        &self,
        data: &[u8],
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome> {
        let text = decode_text(data)?;
        let total = text.lines().count();
        let mut builder = RuleBuilder::new(options, progress, total);
        let action = options.default_action;

        for (idx, line) in text.lines().enumerate() {
            builder.tick();
            let line = strip_inline_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            builder.push(RawRule::new(line, action, Some(idx + 1)))?;
            if builder.is_full() {
                break;
            }
        }

        Ok(builder.finish(RuleSetMetadata::default()))
    }
}

/// Register the plain list dialect.
pub fn register(registry: &mut ParserRegistry) {
    registry.register(&["plain", "txt", "text", "list"], || Box::new(PlainListParser));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{RuleAction, RulePriority};
    use crate::parser::ParseStatus;

    #[test]
    fn test_parse_plain_list() {
        let data = "ads.example.com\n# comment\n \n*.tracker.net\n";
        let outcome = PlainListParser
            .parse(data.as_bytes(), &ParserOptions::default())
            .unwrap();
        let rules = outcome.rule_set.entries();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].domain, "ads.example.com");
        assert_eq!(rules[1].domain, "*.tracker.net");
        assert!(rules.iter().all(|r| r.action == RuleAction::Block));
        assert!(rules.iter().all(|r| r.priority == RulePriority::MEDIUM));
    }

    #[test]
    fn test_caller_supplied_action() {
        let options = ParserOptions::default()
            .with_default_action(RuleAction::Allow)
            .with_default_priority(RulePriority::HIGH);
        let outcome = PlainListParser.parse(b"good.com # trusted\n", &options).unwrap();
        let rule = &outcome.rule_set.entries()[0];
        assert_eq!(rule.domain, "good.com");
        assert_eq!(rule.action, RuleAction::Allow);
        assert_eq!(rule.priority, RulePriority::HIGH);
    }

    #[test]
    fn test_max_rule_count_early_stop() {
        let data = "a.com\nb.com\nc.com\nd.com\ne.com\n";
        let options = ParserOptions::default().with_max_rule_count(1);
        let outcome = PlainListParser.parse(data.as_bytes(), &options).unwrap();
        assert_eq!(outcome.rule_set.rule_count(), 1);
        assert_eq!(outcome.status, ParseStatus::MaxRuleCountReached);
    }

    #[test]
    fn test_crlf_lines() {
        let outcome = PlainListParser
            .parse(b"a.com\r\nb.com\r\n", &ParserOptions::default())
            .unwrap();
        assert_eq!(outcome.rule_set.rule_count(), 2);
    }

    #[test]
    fn test_empty_data() {
        assert!(matches!(
            PlainListParser.parse(b"", &ParserOptions::default()),
            Err(crate::Error::EmptyData)
        ));
    }

    #[test]
    fn test_can_parse() {
        assert!(PlainListParser.can_parse(b"# list\na.com\n*.b.net\n"));
        assert!(!PlainListParser.can_parse(b"blocked:\n  - a.com\n"));
        assert!(!PlainListParser.can_parse(b"0.0.0.0 a.com\n"));
        assert!(!PlainListParser.can_parse(b"# only comments\n"));
    }
}
