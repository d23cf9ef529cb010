//! Merging several rule sets into one.

use ahash::AHashMap;
use bitflags::bitflags;

use super::RuleSet;
use crate::action::RuleAction;
use crate::entry::{RuleEntry, RuleSetMetadata};

bitflags! {
    /// Conflict handling when merging rule sets.
    ///
    /// Two entries conflict when they share domain and action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MergeOptions: u32 {
        /// Keep the higher priority entry on conflict
        const PREFER_HIGHER_PRIORITY = 1 << 0;
        /// Keep the entry with the later added date on conflict
        const PREFER_NEWER = 1 << 1;
        /// Keep every entry; no conflict resolution at all
        const KEEP_DUPLICATES = 1 << 2;
        /// Fill missing metadata fields from every input
        const COMBINE_METADATA = 1 << 3;
    }
}

/// Merge rule sets in order into a new set. Entries are always copied.
///
/// Conflicting entries keep the position of the first occurrence. Without
/// a preference flag the first occurrence also wins. With both preference
/// flags priority is compared first.
pub fn merge_rule_sets<'a, I>(sets: I, options: MergeOptions) -> RuleSet
where
    I: IntoIterator<Item = &'a RuleSet>,
{
    let mut entries: Vec<RuleEntry> = Vec::new();
    let mut positions: AHashMap<(String, RuleAction), usize> = AHashMap::new();
    let mut metadata: Option<RuleSetMetadata> = None;
    let mut wildcard_mode = None;
    let mut inputs = 0usize;

    for set in sets {
        inputs += 1;
        wildcard_mode.get_or_insert(set.wildcard_mode());
        match metadata.as_mut() {
            None => metadata = Some(set.metadata().clone()),
            Some(meta) if options.contains(MergeOptions::COMBINE_METADATA) => {
                meta.combine(set.metadata())
            }
            Some(_) => {}
        }

        for entry in set.entries() {
            if options.contains(MergeOptions::KEEP_DUPLICATES) {
                entries.push(entry.clone());
                continue;
            }
            let key = (entry.domain.clone(), entry.action);
            match positions.get(&key) {
                Some(&pos) => {
                    if replaces(entry, &entries[pos], options) {
                        entries[pos] = entry.clone();
                    }
                }
                None => {
                    positions.insert(key, entries.len());
                    entries.push(entry.clone());
                }
            }
        }
    }

    log::debug!("merged {} rule sets into {} rules", inputs, entries.len());
    RuleSet::new(entries, metadata.unwrap_or_default())
        .with_wildcard_mode(wildcard_mode.unwrap_or_default())
}

fn replaces(candidate: &RuleEntry, kept: &RuleEntry, options: MergeOptions) -> bool {
    if options.contains(MergeOptions::PREFER_HIGHER_PRIORITY) && candidate.priority != kept.priority
    {
        return candidate.priority > kept.priority;
    }
    if options.contains(MergeOptions::PREFER_NEWER) {
        return candidate.added_date > kept.added_date;
    }
    false
}
