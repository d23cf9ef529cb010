//! Conflict resolution between rules matching the same query.
//!
//! Ordering, strongest first:
//! 1. Higher priority
//! 2. Block over Allow at equal priority
//! 3. Exact over wildcard, then longer wildcard base over shorter
//!
//! Rules equal on all three are interchangeable; the first one in match
//! order is reported.

use std::cmp::Ordering;

use crate::action::{Decision, RuleAction};
use crate::entry::RuleEntry;

fn action_rank(action: RuleAction) -> u8 {
    match action {
        RuleAction::Block => 1,
        RuleAction::Allow => 0,
    }
}

/// Compare two rules by strength; `Greater` means `a` wins over `b`.
pub fn compare(a: &RuleEntry, b: &RuleEntry) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| action_rank(a.action).cmp(&action_rank(b.action)))
        .then_with(|| a.specificity().cmp(&b.specificity()))
}

/// The rule that decides a query, if any matched.
pub fn winner<'a>(matches: &[&'a RuleEntry]) -> Option<&'a RuleEntry> {
    matches.iter().copied().reduce(|best, candidate| {
        if compare(candidate, best) == Ordering::Greater {
            candidate
        } else {
            best
        }
    })
}

/// Decision for a set of matching rules. Never fails; no match is
/// `Decision::Unknown`.
pub fn resolve(matches: &[&RuleEntry]) -> Decision {
    winner(matches).map_or(Decision::Unknown, |rule| rule.action.decision())
}

/// Sort matching rules strongest first.
pub fn sort_by_precedence(matches: &mut [&RuleEntry]) {
    matches.sort_by(|a, b| compare(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RulePriority;

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(resolve(&[]), Decision::Unknown);
        assert!(winner(&[]).is_none());
    }

    #[test]
    fn test_higher_priority_wins() {
        let block = RuleEntry::block("x.com").with_priority(100);
        let allow = RuleEntry::allow("x.com").with_priority(150);
        assert_eq!(resolve(&[&block, &allow]), Decision::Allow);
        assert_eq!(resolve(&[&allow, &block]), Decision::Allow);
    }

    #[test]
    fn test_block_wins_tie() {
        let block = RuleEntry::block("x.com").with_priority(100);
        let allow = RuleEntry::allow("x.com").with_priority(100);
        assert_eq!(resolve(&[&allow, &block]), Decision::Block);
        assert_eq!(resolve(&[&block, &allow]), Decision::Block);
    }

    #[test]
    fn test_priority_beats_specificity() {
        let exact = RuleEntry::allow("ads.example.com");
        let wildcard = RuleEntry::block("*.example.com").with_priority(RulePriority::HIGH);
        assert_eq!(winner(&[&exact, &wildcard]), Some(&wildcard));
    }

    #[test]
    fn test_specificity_breaks_remaining_ties() {
        let broad = RuleEntry::block("*.com");
        let narrow = RuleEntry::block("*.example.com");
        let exact = RuleEntry::block("ads.example.com");
        let chosen = winner(&[&broad, &narrow, &exact]).unwrap();
        assert_eq!(chosen.domain, "ads.example.com");

        let chosen = winner(&[&broad, &narrow]).unwrap();
        assert_eq!(chosen.domain, "*.example.com");
    }

    #[test]
    fn test_sort_by_precedence() {
        let a = RuleEntry::allow("*.example.com");
        let b = RuleEntry::block("*.example.com");
        let c = RuleEntry::allow("ads.example.com").with_priority(RulePriority::OVERRIDE);
        let d = RuleEntry::block("ads.example.com").with_priority(RulePriority::LOW);
        let mut matches = vec![&d, &a, &b, &c];
        sort_by_precedence(&mut matches);
        let order: Vec<_> = matches
            .iter()
            .map(|r| (r.domain.as_str(), r.action))
            .collect();
        assert_eq!(
            order,
            vec![
                ("ads.example.com", RuleAction::Allow),
                ("*.example.com", RuleAction::Block),
                ("*.example.com", RuleAction::Allow),
                ("ads.example.com", RuleAction::Block),
            ]
        );
    }
}
