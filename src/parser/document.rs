//! Rule document shape shared by the JSON and YAML dialects.
//!
//! Both dialects decode into a `serde_json::Value` tree and then read it
//! here: a mapping with metadata scalars, block/allow arrays and a free-form
//! `metadata` object, or a bare sequence whose items are all block rules.
//! Array items are either a bare domain string or a record
//! `{domain, priority, comment, source, action, added}`; a record's own
//! `action` overrides the action implied by its array.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::builder::{RawRule, RuleBuilder};
use crate::action::RuleAction;
use crate::entry::RuleSetMetadata;
use crate::error::{Error, Result};
use crate::timestamp;

/// Keys holding block rules.
pub(crate) const BLOCK_KEYS: &[&str] = &["blocked", "blocklist"];
/// Keys holding allow rules.
pub(crate) const ALLOW_KEYS: &[&str] = &["whitelist", "allowlist", "allowed"];

/// Number of rule items in a document, for progress reporting.
pub(crate) fn rule_item_count(doc: &Value) -> usize {
    match doc {
        Value::Array(items) => items.len(),
        Value::Object(map) => BLOCK_KEYS
            .iter()
            .chain(ALLOW_KEYS)
            .filter_map(|k| map.get(*k).and_then(Value::as_array))
            .map(Vec::len)
            .sum(),
        _ => 0,
    }
}

/// Feed every rule of `doc` into the builder and return its metadata.
pub(crate) fn read_document(doc: &Value, builder: &mut RuleBuilder<'_>) -> Result<RuleSetMetadata> {
    match doc {
        Value::Array(items) => {
            read_rule_array(items, RuleAction::Block, None, builder)?;
            Ok(RuleSetMetadata::default())
        }
        Value::Object(map) => {
            let metadata = read_metadata(map);
            let source = metadata.source_url.clone();
            for (keys, action) in [(BLOCK_KEYS, RuleAction::Block), (ALLOW_KEYS, RuleAction::Allow)] {
                for key in keys {
                    match map.get(*key) {
                        Some(Value::Array(items)) => {
                            read_rule_array(items, action, source.as_deref(), builder)?
                        }
                        Some(Value::Null) | None => {}
                        Some(_) => builder.skip_malformed(None, format!("`{}` is not a list", key))?,
                    }
                }
            }
            Ok(metadata)
        }
        other => Err(Error::InvalidFormat(format!(
            "expected a mapping or a list at the top level, found {}",
            value_kind(other)
        ))),
    }
}

fn read_rule_array(
    items: &[Value],
    implied: RuleAction,
    list_source: Option<&str>,
    builder: &mut RuleBuilder<'_>,
) -> Result<()> {
    for item in items {
        if builder.is_full() {
            break;
        }
        builder.tick();
        match item {
            Value::String(domain) => {
                let mut raw = RawRule::new(domain.as_str(), implied, None);
                raw.source = list_source.map(str::to_string);
                builder.push(raw)?;
            }
            Value::Object(record) => match read_record(record, implied, list_source) {
                Ok(raw) => builder.push(raw)?,
                Err(reason) => builder.skip_malformed(None, reason)?,
            },
            other => builder.skip_malformed(
                None,
                format!("rule item must be a domain or a record, found {}", value_kind(other)),
            )?,
        }
    }
    Ok(())
}

fn read_record(
    record: &Map<String, Value>,
    implied: RuleAction,
    list_source: Option<&str>,
) -> std::result::Result<RawRule, String> {
    let domain = record
        .get("domain")
        .and_then(Value::as_str)
        .ok_or_else(|| "rule record without a `domain` string".to_string())?;

    let action = match record.get("action") {
        None | Some(Value::Null) => implied,
        Some(Value::String(s)) => {
            RuleAction::parse(s).ok_or_else(|| format!("unknown action {:?} for {}", s, domain))?
        }
        Some(other) => return Err(format!("action for {} is {}", domain, value_kind(other))),
    };

    let priority = match record.get("priority") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            as_priority(value).ok_or_else(|| format!("invalid priority for {}", domain))?,
        ),
    };

    let mut raw = RawRule::new(domain, action, None);
    raw.priority = priority;
    raw.comment = string_field(record, "comment");
    raw.source = string_field(record, "source").or_else(|| list_source.map(str::to_string));
    raw.added_date = ["added", "addedDate", "added_date", "date"]
        .iter()
        .find_map(|k| record.get(*k))
        .and_then(as_timestamp);
    Ok(raw)
}

fn read_metadata(map: &Map<String, Value>) -> RuleSetMetadata {
    RuleSetMetadata {
        name: string_field(map, "name"),
        version: map.get("version").and_then(scalar_string),
        updated: map.get("updated").and_then(as_timestamp),
        author: string_field(map, "author"),
        source_url: string_field(map, "source"),
        description: string_field(map, "description"),
        license: string_field(map, "license"),
        custom_fields: match map.get("metadata") {
            Some(Value::Object(custom)) => custom.clone(),
            _ => Map::new(),
        },
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_string)
}

/// Render a scalar as text; strings verbatim, numbers and booleans
/// formatted.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_priority(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => timestamp::parse_date(s),
        Value::Number(n) => n.as_u64().and_then(timestamp::from_unix_secs),
        _ => None,
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
