//! Constrained YAML-like rule document parser.
//!
//! ```text
//! ---
//! version: "1.0"
//! name: "Rule List Name"
//! blocked:
//!   - ad.example.com
//!   - "*.tracking.com"
//!   - domain: spam.com, priority: 100
//!   - domain: ads.net
//!     comment: "Known ad network"
//! whitelist:
//!   - safe.example.com
//! metadata:
//!   custom_field: value
//! ```
//!
//! This is a line-oriented reader, not a YAML implementation. The contract
//! is exactly one level of nesting below a top-level key: a block sequence
//! whose items are scalars or `key: value` records, or a mapping of scalars.
//! A bare top-level sequence is also accepted, every item being a block
//! rule. Flow collections and deeper nesting are dropped with a diagnostic.
//!
//! Unquoted scalars are coerced: `true`/`yes` and `false`/`no` to booleans,
//! `null`/`~` to null (lowercase spellings only), decimal numbers to numbers, anything else to a
//! string. Quoted scalars are unwrapped verbatim. Indentation is counted in
//! spaces, a tab counting as four. Blank lines, `#` comments and `---`
//! markers are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

use super::builder::RuleBuilder;
use super::document::{read_document, rule_item_count};
use super::{decode_text, Capabilities, ParseOutcome, ParserOptions, RuleParser};
use crate::error::{Error, Result};
use crate::registry::ParserRegistry;

const TAB_WIDTH: usize = 4;

/// Constrained YAML rule document parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRuleParser;

impl RuleParser for YamlRuleParser {
    fn format_identifier(&self) -> &'static str {
        "yaml"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["application/yaml", "application/x-yaml", "text/yaml", "text/x-yaml"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::METADATA
            | Capabilities::VALIDATION
            | Capabilities::COMMENTS
            | Capabilities::PRIORITIES
            | Capabilities::WILDCARDS
            | Capabilities::STREAMING_PROGRESS
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        std::str::from_utf8(data).map_or(false, is_likely_yaml)
    }

    fn parse_with_progress(
        &self,
        data: &[u8],
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome> {
        let text = decode_text(data)?;
        if !is_likely_yaml(text) {
            return Err(Error::InvalidFormat(
                "document has no YAML mapping or sequence".to_string(),
            ));
        }

        let (doc, diagnostics) = read_yaml(text)?;
        let mut builder = RuleBuilder::new(options, progress, rule_item_count(&doc));
        for (line, message) in diagnostics {
            builder.warn(Some(line), message);
        }
        let metadata = read_document(&doc, &mut builder)?;
        Ok(builder.finish(metadata))
    }
}

/// Register the YAML dialect.
pub fn register(registry: &mut ParserRegistry) {
    registry.register(&["yaml", "yml"], || Box::new(YamlRuleParser));
}

static KEY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*["']?[A-Za-z0-9_.\-]+["']?\s*:(\s|$)"#).unwrap());
static ITEM_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-(\s+\S|\s*$)").unwrap());

/// Heuristic check for the YAML dialect: a `---` marker, a `key:` line or a
/// `- item` line. JSON documents are rejected.
pub fn is_likely_yaml(text: &str) -> bool {
    let mut lines = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    match lines.next() {
        None => false,
        Some(first) => {
            let first_trim = first.trim_start();
            if first_trim.starts_with('{') || first_trim.starts_with('[') {
                return false;
            }
            std::iter::once(first)
                .chain(lines)
                .any(|l| l.trim() == "---" || KEY_LINE.is_match(l) || ITEM_LINE.is_match(l))
        }
    }
}

/// Count leading indentation: spaces count one, tabs count four.
pub fn indentation_level(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Coerce one scalar. Returns `None` for flow collections, which the
/// dialect does not support.
pub fn parse_value(raw: &str) -> Option<Value> {
    let s = raw.trim();
    if let Some(inner) = unquote(s) {
        return Some(Value::String(inner.to_string()));
    }
    match s {
        "[]" => return Some(Value::Array(Vec::new())),
        "{}" => return Some(Value::Object(Map::new())),
        _ if s.starts_with('[') || s.starts_with('{') => return None,
        _ => {}
    }
    Some(match s {
        "true" | "yes" => Value::Bool(true),
        "false" | "no" => Value::Bool(false),
        "null" | "~" => Value::Null,
        _ => parse_decimal(s).unwrap_or_else(|| Value::String(s.to_string())),
    })
}

fn unquote(s: &str) -> Option<&str> {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn parse_decimal(s: &str) -> Option<Value> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let valid = match frac_part {
        None => !int_part.is_empty() && all_digits(int_part),
        Some(frac) => {
            all_digits(int_part) && all_digits(frac) && !(int_part.is_empty() && frac.is_empty())
        }
    };
    if !valid {
        return None;
    }
    if frac_part.is_none() {
        if let Ok(v) = s.parse::<i64>() {
            return Some(Value::Number(v.into()));
        }
    }
    s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

/// Find the `key: value` separator outside quotes. The colon must be
/// followed by whitespace or end the string, so `http://x` is not a key.
fn split_key_value(s: &str) -> Option<(String, &str)> {
    let mut quote: Option<char> = None;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') if i == 0 => quote = Some(c),
            (None, ':') => {
                let at_end = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
                if at_end {
                    let key = s[..i].trim();
                    let key = unquote(key).unwrap_or(key);
                    if key.is_empty() {
                        return None;
                    }
                    return Some((key.to_string(), s[i + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` outside quotes.
fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == sep => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Drop a trailing comment: `#` preceded by whitespace, outside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_space = true;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' && prev_space => return &line[..i],
            None => {}
        }
        prev_space = c.is_whitespace();
    }
    line
}

/// Parse a document into a value tree plus `(line, message)` diagnostics.
pub(crate) fn read_yaml(text: &str) -> Result<(Value, Vec<(usize, String)>)> {
    let mut reader = LineReader::default();
    for (idx, line) in text.lines().enumerate() {
        reader.line(idx + 1, line);
    }
    reader.finish()
}

#[derive(Default)]
enum Root {
    #[default]
    Empty,
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
}

/// Children collected under the pending top-level key.
#[derive(Default)]
enum Pending {
    #[default]
    Nothing,
    List(Vec<Value>),
    Mapping(Map<String, Value>),
}

/// Line state machine. The only nesting tracked is one level below a
/// top-level key (or one record inside a top-level sequence item).
#[derive(Default)]
struct LineReader {
    root: Root,
    current_line: usize,
    /// Top-level key whose value is on the following lines
    pending_key: Option<String>,
    pending: Pending,
    /// Indentation of the first item in the pending list
    list_indent: Option<usize>,
    /// Record item being continued on indented `key: value` lines
    record: Option<Map<String, Value>>,
    record_indent: usize,
    /// Indentation of the keys in the current record or pending mapping
    field_indent: Option<usize>,
    /// Lines indented deeper than this belong to a dropped line
    skip_indent: Option<usize>,
    stray_scalar: bool,
    diagnostics: Vec<(usize, String)>,
}

impl LineReader {
    fn line(&mut self, number: usize, raw: &str) {
        self.current_line = number;
        let indent = indentation_level(raw);
        let content = strip_comment(raw).trim();
        if content.is_empty() || content == "---" || content == "..." {
            return;
        }
        if let Some(skip) = self.skip_indent {
            if indent > skip {
                self.drop_line("line nested under an unsupported value");
                return;
            }
            self.skip_indent = None;
        }

        if let Some(item) = item_content(content) {
            self.item_line(indent, item);
        } else if let Some((key, value)) = split_key_value(content) {
            if indent == 0 {
                self.top_level_key(key, value);
            } else {
                self.nested_key(indent, key, value);
            }
        } else if indent == 0 && matches!(self.root, Root::Empty) && self.pending_key.is_none() {
            self.stray_scalar = true;
            self.drop_line("top-level scalar is not a rule document");
        } else {
            self.drop_line("unexpected scalar line");
        }
    }

    fn item_line(&mut self, indent: usize, item: &str) {
        if let Some(list_indent) = self.list_indent {
            if indent > list_indent && self.pending_key.is_some() {
                self.drop_nested(indent, "nested sequences are not supported");
                return;
            }
        }
        if self.pending_key.is_none() && indent > 0 {
            self.drop_nested(indent, "nested sequences are not supported");
            return;
        }

        self.finish_record();

        if self.pending_key.is_some() {
            match self.pending {
                Pending::Mapping(_) => {
                    self.drop_line("list item inside a mapping");
                    return;
                }
                Pending::Nothing => {
                    self.pending = Pending::List(Vec::new());
                    self.list_indent = Some(indent);
                }
                Pending::List(_) => {}
            }
        } else {
            match self.root {
                Root::Mapping(_) => {
                    self.drop_line("list item outside of a list");
                    return;
                }
                Root::Empty => self.root = Root::Sequence(Vec::new()),
                Root::Sequence(_) => {}
            }
        }

        if item.is_empty() {
            self.record = Some(Map::new());
            self.record_indent = indent;
            return;
        }
        if item.starts_with('[') || item.starts_with('{') {
            self.drop_line("flow collections are not supported");
            return;
        }

        if split_key_value(item).is_some() {
            let mut record = Map::new();
            for part in split_outside_quotes(item, ',') {
                match split_key_value(part.trim()) {
                    Some((key, value)) if !value.is_empty() => match parse_value(value) {
                        Some(v) => {
                            record.insert(key, v);
                        }
                        None => self.drop_line("flow collections are not supported"),
                    },
                    _ => self.drop_line(format!("ignoring record fragment {:?}", part.trim())),
                }
            }
            self.record = Some(record);
            self.record_indent = indent;
        } else if let Some(value) = parse_value(item) {
            self.push_item(value);
        }
    }

    fn top_level_key(&mut self, key: String, value: &str) {
        self.close_key();
        if let Root::Sequence(_) = self.root {
            self.drop_line("mapping key inside a sequence document");
            return;
        }
        if value.is_empty() {
            self.pending_key = Some(key);
            return;
        }
        match parse_value(value) {
            Some(v) => self.mapping().insert(key, v),
            None => {
                self.drop_line(format!("flow collection for `{}` is not supported", key));
                None
            }
        };
    }

    fn nested_key(&mut self, indent: usize, key: String, value: &str) {
        if self.record.is_some() && indent > self.record_indent {
            if !self.accept_field_indent(indent) {
                self.drop_nested(indent, format!("`{}` is nested inside a record field", key));
                return;
            }
            if value.is_empty() {
                self.drop_nested(indent, format!("nested value for `{}` is not supported", key));
                return;
            }
            match (parse_value(value), self.record.as_mut()) {
                (Some(v), Some(record)) => {
                    record.insert(key, v);
                }
                _ => self.drop_line("flow collections are not supported"),
            }
            return;
        }

        if self.pending_key.is_none() {
            self.drop_line(format!("unexpected indentation for `{}`", key));
            return;
        }
        if let Pending::List(_) = self.pending {
            self.drop_line(format!("`{}` is not part of a list item", key));
            return;
        }
        if !self.accept_field_indent(indent) {
            self.drop_nested(indent, format!("`{}` is nested inside a mapping value", key));
            return;
        }
        if value.is_empty() {
            self.drop_nested(indent, format!("nested value for `{}` is not supported", key));
            return;
        }
        let Some(v) = parse_value(value) else {
            self.drop_line("flow collections are not supported");
            return;
        };
        match &mut self.pending {
            Pending::Mapping(map) => {
                map.insert(key, v);
            }
            pending => {
                let mut map = Map::new();
                map.insert(key, v);
                *pending = Pending::Mapping(map);
            }
        }
    }

    fn push_item(&mut self, value: Value) {
        if self.pending_key.is_some() {
            if let Pending::List(items) = &mut self.pending {
                items.push(value);
            }
        } else if let Root::Sequence(items) = &mut self.root {
            items.push(value);
        }
    }

    /// Fix the key indentation of the current record or mapping on its
    /// first key; deeper keys are rejected.
    fn accept_field_indent(&mut self, indent: usize) -> bool {
        match self.field_indent {
            Some(field) if indent > field => false,
            Some(_) => true,
            None => {
                self.field_indent = Some(indent);
                true
            }
        }
    }

    fn finish_record(&mut self) {
        self.field_indent = None;
        if let Some(record) = self.record.take() {
            if record.is_empty() {
                self.drop_line("empty list item");
            } else {
                self.push_item(Value::Object(record));
            }
        }
    }

    fn close_key(&mut self) {
        self.finish_record();
        self.list_indent = None;
        self.field_indent = None;
        let Some(key) = self.pending_key.take() else {
            return;
        };
        let value = match std::mem::take(&mut self.pending) {
            Pending::Nothing => Value::Null,
            Pending::List(items) => Value::Array(items),
            Pending::Mapping(map) => Value::Object(map),
        };
        if let Root::Sequence(_) = self.root {
            self.drop_line("mapping key inside a sequence document");
            return;
        }
        self.mapping().insert(key, value);
    }

    fn mapping(&mut self) -> &mut Map<String, Value> {
        if let Root::Empty = self.root {
            self.root = Root::Mapping(Map::new());
        }
        match &mut self.root {
            Root::Mapping(map) => map,
            // Callers check for sequences first
            _ => unreachable!("mapping requested on a sequence document"),
        }
    }

    fn drop_line(&mut self, message: impl Into<String>) {
        self.diagnostics.push((self.current_line, message.into()));
    }

    /// Drop a line together with everything indented below it.
    fn drop_nested(&mut self, indent: usize, message: impl Into<String>) {
        self.drop_line(message);
        self.skip_indent = Some(indent);
    }

    fn finish(mut self) -> Result<(Value, Vec<(usize, String)>)> {
        self.close_key();
        let doc = match self.root {
            Root::Mapping(map) => Value::Object(map),
            Root::Sequence(items) => Value::Array(items),
            Root::Empty => {
                let reason = if self.stray_scalar {
                    "document is a scalar, not a mapping or sequence"
                } else {
                    "document has no mapping or sequence"
                };
                return Err(Error::InvalidFormat(reason.to_string()));
            }
        };
        Ok((doc, self.diagnostics))
    }
}

/// Content after a `- ` item marker, or `None` if not an item line.
fn item_content(content: &str) -> Option<&str> {
    if content == "-" {
        return Some("");
    }
    content
        .strip_prefix("- ")
        .or_else(|| content.strip_prefix("-\t"))
        .map(str::trim)
}
