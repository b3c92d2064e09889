//! Declaration matching
//!
//! Pairs old and new entries of a name-indexed collection by exact,
//! case-sensitive name. Additions on the new side are collected but never
//! count against compatibility.

use std::collections::BTreeMap;

/// Outcome for one old-side entry
#[derive(Debug, PartialEq)]
pub enum Match<'a, T> {
    Paired { name: &'a str, old: &'a T, new: &'a T },
    Unmatched { name: &'a str, old: &'a T },
}

impl<T> Clone for Match<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Match<'_, T> {}

/// Old-side entries in order, plus the new-only entries
#[derive(Debug, Clone, PartialEq)]
pub struct Matching<'a, T> {
    pub matches: Vec<Match<'a, T>>,
    pub added: Vec<(&'a str, &'a T)>,
}

impl<'a, T> Matching<'a, T> {
    pub fn unmatched(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.matches.iter().filter_map(|m| match m {
            Match::Unmatched { name, .. } => Some(*name),
            Match::Paired { .. } => None,
        })
    }
}

/// Pair the entries of two name-indexed collections
pub fn match_by_name<'a, T>(
    old: &'a BTreeMap<String, T>,
    new: &'a BTreeMap<String, T>,
) -> Matching<'a, T> {
    let matches = old
        .iter()
        .map(|(name, old_entry)| match new.get(name) {
            Some(new_entry) => Match::Paired {
                name: name.as_str(),
                old: old_entry,
                new: new_entry,
            },
            None => Match::Unmatched {
                name: name.as_str(),
                old: old_entry,
            },
        })
        .collect();

    let added = new
        .iter()
        .filter(|(name, _)| !old.contains_key(*name))
        .map(|(name, entry)| (name.as_str(), entry))
        .collect();

    Matching { matches, added }
}
