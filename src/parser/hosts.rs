//! Hosts file parser.
//!
//! ```text
//! # Title: My Blocklist
//! 0.0.0.0 ad.example.com
//! 127.0.0.1 tracker.example.com tracker2.example.com
//! 0.0.0.0 spam.example.com # inline comment
//! ::1 v6.example.com
//! # @whitelist safe.example.com
//! # @allow trusted.example.com
//! ```
//!
//! Entries pointing at a blocking address become block rules; entries
//! pointing anywhere else are ignored. `@whitelist`/`@allow` comments
//! produce allow rules and `Key: value` header comments fill metadata.

use std::net::IpAddr;

use super::builder::{RawRule, RuleBuilder};
use super::{decode_text, strip_inline_comment, Capabilities, ParseOutcome, ParserOptions, RuleParser};
use crate::action::RuleAction;
use crate::entry::RuleSetMetadata;
use crate::error::Result;
use crate::registry::ParserRegistry;
use crate::timestamp;

/// Host names every hosts file maps to loopback; never rules.
const RESERVED_HOSTS: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
    "0.0.0.0",
];

/// Hosts file parser.
#[derive(Debug, Clone, Copy)]
pub struct HostsParser {
    /// Read `# @whitelist` / `# @allow` comments
    pub parse_whitelist_comments: bool,
    /// Read `# Title:`-style header comments into metadata
    pub parse_metadata_comments: bool,
    /// Accept `::1` and `::` as blocking addresses
    pub allow_ipv6: bool,
    /// Skip lines whose address does not parse as an IP
    pub strict_ip_validation: bool,
}

impl Default for HostsParser {
    fn default() -> Self {
        Self {
            parse_whitelist_comments: true,
            parse_metadata_comments: true,
            allow_ipv6: true,
            strict_ip_validation: false,
        }
    }
}

impl HostsParser {
    /// Check if an address is one hosts-based blocklists point domains at.
    pub fn is_blocking_ip(&self, ip: &str) -> bool {
        match ip {
            "0.0.0.0" | "127.0.0.1" | "0" => true,
            "::1" | "::" | "0:0:0:0:0:0:0:0" | "0:0:0:0:0:0:0:1" => self.allow_ipv6,
            _ => false,
        }
    }

    /// Domains on a hosts line, or `None` if the line is not a blocking
    /// entry.
    pub fn extract_domains<'l>(&self, line: &'l str) -> Option<Vec<&'l str>> {
        let mut fields = strip_inline_comment(line).split_whitespace();
        let address = fields.next()?;
        if self.strict_ip_validation && address.parse::<IpAddr>().is_err() {
            return None;
        }
        if !self.is_blocking_ip(address) {
            return None;
        }
        Some(
            fields
                .filter(|d| !RESERVED_HOSTS.iter().any(|r| r.eq_ignore_ascii_case(d)))
                .collect(),
        )
    }

    /// Domain named by a `# @whitelist d` or `# @allow d` comment.
    pub fn whitelist_comment_domain(comment: &str) -> Option<&str> {
        let body = comment.trim_start_matches('#').trim();
        let rest = body
            .strip_prefix("@whitelist")
            .or_else(|| body.strip_prefix("@allow"))?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest.split_whitespace().next()
    }

    /// `(key, value)` of a `# Key: value` header comment.
    pub fn metadata_comment(comment: &str) -> Option<(String, &str)> {
        let body = comment.trim_start_matches('#').trim();
        let (key, value) = body.split_once(':')?;
        let key = key.trim();
        let key_chars = |c: char| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_');
        if key.is_empty() || key.len() > 32 || !key.chars().all(key_chars) {
            return None;
        }
        Some((key.to_lowercase(), value.trim()))
    }

    fn apply_metadata(metadata: &mut RuleSetMetadata, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let value_owned = value.to_string();
        match key {
            "title" | "name" => metadata.name = Some(value_owned),
            "version" => metadata.version = Some(value_owned),
            "description" => metadata.description = Some(value_owned),
            "author" | "maintainer" => metadata.author = Some(value_owned),
            "homepage" | "source" | "url" => metadata.source_url = Some(value_owned),
            "license" => metadata.license = Some(value_owned),
            "last modified" | "last-modified" | "updated" | "date" => {
                metadata.updated = timestamp::parse_date(value)
            }
            other => {
                metadata
                    .custom_fields
                    .insert(other.to_string(), serde_json::Value::String(value_owned));
            }
        }
    }
}

impl RuleParser for HostsParser {
    fn format_identifier(&self) -> &'static str {
        "hosts"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["hosts"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &[]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::METADATA
            | Capabilities::COMMENTS
            | Capabilities::VALIDATION
            | Capabilities::WILDCARDS
            | Capabilities::STREAMING_PROGRESS
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(data) else {
            return false;
        };
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .and_then(|l| l.split_whitespace().next())
            .map_or(false, |addr| self.is_blocking_ip(addr))
    }

    fn parse_with_progress(
        &self,
        data: &[u8],
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome> {
        let text = decode_text(data)?;
        let mut builder = RuleBuilder::new(options, progress, text.lines().count());
        let mut metadata = RuleSetMetadata::default();
        // Header comments only count before the first entry
        let mut in_header = true;

        for (idx, line) in text.lines().enumerate() {
            builder.tick();
            let line_no = Some(idx + 1);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') {
                if self.parse_whitelist_comments {
                    if let Some(domain) = Self::whitelist_comment_domain(line) {
                        builder.push(RawRule::new(domain, RuleAction::Allow, line_no))?;
                        continue;
                    }
                }
                if self.parse_metadata_comments && in_header {
                    if let Some((key, value)) = Self::metadata_comment(line) {
                        Self::apply_metadata(&mut metadata, &key, value);
                    }
                }
                continue;
            }

            in_header = false;
            match self.extract_domains(line) {
                Some(domains) => {
                    for domain in domains {
                        builder.push(RawRule::new(domain, RuleAction::Block, line_no))?;
                    }
                }
                None => builder.warn(line_no, "not a blocking hosts entry"),
            }
            if builder.is_full() {
                break;
            }
        }

        Ok(builder.finish(metadata))
    }
}

/// Register the hosts file dialect.
pub fn register(registry: &mut ParserRegistry) {
    registry.register(&["hosts"], || Box::new(HostsParser::default()));
}
