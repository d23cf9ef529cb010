//! Shared per-rule validation and normalization pipeline.
//!
//! One `RuleBuilder` is owned by one `parse` call. Dialect parsers feed it
//! raw rules; it normalizes, validates, suppresses duplicates, enforces
//! `max_rule_count` and reports progress. Nothing is committed until
//! `finish`, so a failed parse leaves no partial rule set behind.

use ahash::AHashSet;
use chrono::{DateTime, Utc};

use super::{Diagnostic, ParseOutcome, ParseStatus, ParserOptions};
use crate::action::RuleAction;
use crate::domain;
use crate::entry::{RuleEntry, RuleSetMetadata};
use crate::error::{DomainError, Error, Result};
use crate::ruleset::RuleSet;

/// A rule as read from the document, before normalization.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawRule {
    pub domain: String,
    pub action: RuleAction,
    pub priority: Option<i32>,
    pub comment: Option<String>,
    pub source: Option<String>,
    pub added_date: Option<DateTime<Utc>>,
    /// 1-based source line, when the dialect tracks lines
    pub line: Option<usize>,
}

impl RawRule {
    pub fn new(domain: impl Into<String>, action: RuleAction, line: Option<usize>) -> Self {
        Self {
            domain: domain.into(),
            action,
            line,
            ..Default::default()
        }
    }
}

pub(crate) struct RuleBuilder<'a> {
    options: &'a ParserOptions,
    progress: &'a mut dyn FnMut(f64),
    entries: Vec<RuleEntry>,
    /// Domain+action pairs accepted so far
    seen: AHashSet<(String, RuleAction)>,
    diagnostics: Vec<Diagnostic>,
    status: ParseStatus,
    skipped: usize,
    duplicates: usize,
    total_rows: usize,
    rows_seen: usize,
    last_progress: f64,
}

impl<'a> RuleBuilder<'a> {
    /// `total_rows` is the denominator used for progress fractions.
    pub fn new(
        options: &'a ParserOptions,
        progress: &'a mut dyn FnMut(f64),
        total_rows: usize,
    ) -> Self {
        Self {
            options,
            progress,
            entries: Vec::new(),
            seen: AHashSet::new(),
            diagnostics: Vec::new(),
            status: ParseStatus::Complete,
            skipped: 0,
            duplicates: 0,
            total_rows: total_rows.max(1),
            rows_seen: 0,
            last_progress: 0.0,
        }
    }

    /// Whether `max_rule_count` was reached; callers stop feeding rules.
    pub fn is_full(&self) -> bool {
        self.status == ParseStatus::MaxRuleCountReached
    }

    /// Count one processed row and report progress every `batch_size` rows.
    pub fn tick(&mut self) {
        self.rows_seen += 1;
        if self.rows_seen % self.options.effective_batch_size() == 0 {
            let fraction = (self.rows_seen as f64 / self.total_rows as f64).min(1.0);
            self.report(fraction);
        }
    }

    /// Record a non-fatal problem with the document.
    pub fn warn(&mut self, line: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        log::warn!(
            "{}{}",
            line.map(|l| format!("line {}: ", l)).unwrap_or_default(),
            message
        );
        self.diagnostics.push(Diagnostic { line, message });
    }

    /// Run one rule through the pipeline.
    ///
    /// Returns `Err` only in strict mode for an invalid domain.
    pub fn push(&mut self, raw: RawRule) -> Result<()> {
        if self.is_full() {
            return Ok(());
        }

        let trimmed = raw.domain.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let pattern = domain::normalize(trimmed, self.options.normalize_case);
        let checked = if self.options.validate_domains {
            domain::validate(&pattern)
        } else {
            domain::check_structure(&pattern)
        };
        if let Err(reason) = checked {
            return self.reject(raw.line, pattern, reason);
        }

        if !self.options.allow_duplicates && !self.seen.insert((pattern.clone(), raw.action)) {
            self.duplicates += 1;
            return Ok(());
        }

        self.entries.push(RuleEntry {
            domain: pattern,
            action: raw.action,
            priority: raw.priority.unwrap_or(self.options.default_priority),
            comment: raw.comment,
            added_date: raw.added_date,
            source: raw.source,
        });

        let max = self.options.max_rule_count;
        if max > 0 && self.entries.len() >= max {
            log::debug!("max rule count {} reached, stopping parse", max);
            self.status = ParseStatus::MaxRuleCountReached;
        }

        Ok(())
    }

    /// Drop a structurally malformed rule record (not a domain problem).
    ///
    /// Strict mode turns it into a syntax error.
    pub fn skip_malformed(&mut self, line: Option<usize>, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.options.strict_mode {
            return Err(Error::syntax(line, message));
        }
        self.skipped += 1;
        self.warn(line, message);
        Ok(())
    }

    fn reject(&mut self, line: Option<usize>, domain: String, reason: DomainError) -> Result<()> {
        if self.options.strict_mode {
            return Err(Error::InvalidDomain {
                line,
                domain,
                reason,
            });
        }
        self.skipped += 1;
        self.warn(line, format!("skipping invalid domain {:?}: {}", domain, reason));
        Ok(())
    }

    /// Commit the accepted rules into a rule set.
    pub fn finish(mut self, metadata: RuleSetMetadata) -> ParseOutcome {
        let rule_set = RuleSet::new(std::mem::take(&mut self.entries), metadata);
        if self.options.build_index_while_parsing {
            rule_set.build_index();
        }
        self.report(1.0);

        log::debug!(
            "parsed {} rules ({} skipped, {} duplicates, status {:?})",
            rule_set.rule_count(),
            self.skipped,
            self.duplicates,
            self.status
        );

        ParseOutcome {
            rule_set,
            status: self.status,
            skipped: self.skipped,
            duplicates: self.duplicates,
            diagnostics: self.diagnostics,
        }
    }

    fn report(&mut self, fraction: f64) {
        if fraction >= self.last_progress {
            self.last_progress = fraction;
            (self.progress)(fraction);
        }
    }
}
