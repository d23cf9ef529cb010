//! Rule list parsers.
//!
//! Every supported dialect implements [`RuleParser`] and advertises the
//! optional features it handles through [`Capabilities`]. Parsers are
//! stateless: all per-parse state lives in a builder owned by one call, so
//! one parser instance may serve concurrent parses.

pub(crate) mod builder;
mod document;
pub mod hosts;
pub mod json;
mod options;
pub mod plain;
pub mod yaml;

pub use hosts::HostsParser;
pub use json::{JsonRuleParser, JsonRuleSchema};
pub use options::{ParserOptions, DEFAULT_BATCH_SIZE};
pub use plain::PlainListParser;
pub use yaml::{is_likely_yaml, YamlRuleParser};

use bitflags::bitflags;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ruleset::RuleSet;

bitflags! {
    /// Optional features a parser supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Reports progress while parsing
        const STREAMING_PROGRESS = 1 << 0;
        /// Extracts rule list metadata
        const METADATA = 1 << 1;
        /// Validates domain syntax
        const VALIDATION = 1 << 2;
        /// Understands comments
        const COMMENTS = 1 << 3;
        /// Reads per-rule priorities
        const PRIORITIES = 1 << 4;
        /// Accepts wildcard domains
        const WILDCARDS = 1 << 5;
        /// Accepts gzip-compressed input
        const COMPRESSED = 1 << 6;
    }
}

/// How a parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The whole document was read
    Complete,
    /// Parsing stopped early at `max_rule_count`; the rule set holds the
    /// rules accepted up to that point
    MaxRuleCountReached,
}

/// A non-fatal problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Option<usize>,
    pub message: String,
}

/// Result of a successful parse.
#[derive(Debug)]
pub struct ParseOutcome {
    pub rule_set: RuleSet,
    pub status: ParseStatus,
    /// Rules dropped as invalid (non-strict mode)
    pub skipped: usize,
    /// Exact domain+action repeats suppressed
    pub duplicates: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    /// Whether the whole document was consumed.
    pub fn is_complete(&self) -> bool {
        self.status == ParseStatus::Complete
    }

    /// Take the rule set, dropping the parse report.
    pub fn into_rule_set(self) -> RuleSet {
        self.rule_set
    }
}

/// Contract shared by every rule list dialect.
pub trait RuleParser: Send + Sync {
    /// Format identifier (e.g. `"yaml"`, `"json"`).
    fn format_identifier(&self) -> &'static str;

    /// File extensions this parser handles, without the dot.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// MIME types this parser handles.
    fn supported_mime_types(&self) -> &'static [&'static str];

    fn capabilities(&self) -> Capabilities;

    /// Cheap content sniffing used when no format hint is available.
    fn can_parse(&self, _data: &[u8]) -> bool {
        false
    }

    /// Parse a document, reporting progress fractions in `[0.0, 1.0]`.
    ///
    /// Progress is non-decreasing and reported synchronously on the calling
    /// thread every `batch_size` rows, then once with `1.0` on success.
    fn parse_with_progress(
        &self,
        data: &[u8],
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome>;

    /// Parse a document without progress reporting.
    fn parse(&self, data: &[u8], options: &ParserOptions) -> Result<ParseOutcome> {
        self.parse_with_progress(data, options, &mut |_: f64| {})
    }

    /// Read a file and parse its contents.
    fn parse_file(&self, path: &Path, options: &ParserOptions) -> Result<ParseOutcome> {
        let data = std::fs::read(path)?;
        self.parse(&data, options)
    }
}

/// Check for empty input and decode UTF-8, skipping a leading BOM.
pub(crate) fn decode_text(data: &[u8]) -> Result<&str> {
    if data.is_empty() {
        return Err(Error::EmptyData);
    }
    let text = std::str::from_utf8(data)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Strip a trailing ` # comment` from a line. A `#` glued to a token is
/// kept.
pub(crate) fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}
