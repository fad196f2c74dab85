//! # Artist Identities
//!
//! File tags name artists inconsistently: some files carry a MusicBrainz artist id
//! (MBID), some only a free-text name, and names vary in case, spacing and a
//! leading "The". An [`Identity`] is the single key Musedex uses for one
//! real-world artist across the whole library.
//!
//! ## Derivation
//!
//! 1. If the track supplies an MBID, the identity is that MBID.
//! 2. Otherwise the name is canonicalised ([`canonicalise_name`]) and looked up in
//!    the library-wide [`SynonymTable`]; if any file anywhere in the library paired
//!    that canonical name with an MBID, the identity is that MBID.
//! 3. Otherwise the identity is the canonical name itself.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical artist key: either an MBID or a canonicalised name.
pub type Identity = String;

/// Lowercase, drop a leading "the ", and join the remaining words with `_`.
///
/// ```
/// use musedex::identity::canonicalise_name;
///
/// assert_eq!(canonicalise_name("The  Velvet Underground"), "velvet_underground");
/// assert_eq!(canonicalise_name("the Björk"), "björk");
/// ```
#[must_use]
pub fn canonicalise_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let stripped = match lower.strip_prefix("the ") {
        Some(rest) => rest.trim_start(),
        None => lower.as_str(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Whether `s` has the 8-4-4-4-12 hexadecimal shape of a MusicBrainz id.
#[must_use]
pub fn is_mbid(s: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Canonical name -> MBID, first-seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymTable {
    entries: BTreeMap<String, Identity>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` was seen tagged with `mbid`.
    ///
    /// Returns the previously recorded MBID when it disagrees with `mbid`; the
    /// table itself is left unchanged in that case.
    pub fn record(&mut self, mbid: &str, name: &str) -> Option<Identity> {
        let key = canonicalise_name(name);
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, mbid.to_string());
                None
            }
            Some(existing) if existing == mbid => None,
            Some(existing) => Some(existing.clone()),
        }
    }

    /// MBID recorded for the canonical form of `name`, if any.
    pub fn mbid_for(&self, name: &str) -> Option<&str> {
        self.entries.get(&canonicalise_name(name)).map(String::as_str)
    }

    /// Apply the identity derivation rule to an (mbid, name) pair.
    ///
    /// Returns `None` when neither is present.
    pub fn identity_for(&self, mbid: Option<&str>, name: Option<&str>) -> Option<Identity> {
        if let Some(mbid) = mbid.map(str::trim).filter(|m| !m.is_empty()) {
            return Some(mbid.to_string());
        }
        let name = name.filter(|n| !n.trim().is_empty())?;
        let key = canonicalise_name(name);
        Some(self.entries.get(&key).cloned().unwrap_or(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a table from (mbid, name) pairs, logging every conflict.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::new();
        for (mbid, name) in pairs {
            if let Some(existing) = table.record(mbid, name) {
                warn!("Artist name \"{name}\" associated with multiple artist IDs: \"{mbid}\" \"{existing}\"");
            }
        }
        table
    }
}

/// Counting map of the display names observed for one identity.
///
/// Insertion order is kept so that ties go to the name seen first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTally {
    counts: Vec<(String, usize)>,
}

impl NameTally {
    pub fn add(&mut self, name: &str) {
        match self.counts.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((name.to_string(), 1)),
        }
    }

    /// Most frequently observed name; the earliest one wins a tie.
    pub fn most_frequent(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(name, _)| name.as_str())
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalise_name() {
        assert_eq!(canonicalise_name("Björk"), "björk");
        assert_eq!(canonicalise_name("the Björk"), "björk");
        assert_eq!(canonicalise_name("THE   Fall"), "fall");
        assert_eq!(canonicalise_name("  Sigur   Rós "), "sigur_rós");
        // Only a leading article is removed.
        assert_eq!(canonicalise_name("Them"), "them");
        assert_eq!(canonicalise_name("Bring Me The Horizon"), "bring_me_the_horizon");
    }

    #[test]
    fn test_is_mbid() {
        assert!(is_mbid("89ad4ac3-39f7-470e-963a-56509c546377"));
        assert!(is_mbid("89AD4AC3-39F7-470E-963A-56509C546377"));
        assert!(!is_mbid("89ad4ac3-39f7-470e-963a-56509c54637"));
        assert!(!is_mbid("björk"));
        assert!(!is_mbid("abc-1"));
        assert!(!is_mbid("zzad4ac3-39f7-470e-963a-56509c546377"));
    }

    #[test]
    fn test_synonym_table_first_seen_wins() {
        let mut table = SynonymTable::new();
        assert_eq!(table.record("abc-1", "Björk"), None);
        assert_eq!(table.record("abc-1", "the björk"), None);
        assert_eq!(table.record("xyz-9", "Björk"), Some("abc-1".to_string()));
        assert_eq!(table.mbid_for("BJÖRK"), Some("abc-1"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_identity_derivation_rule() {
        let table = SynonymTable::from_pairs([("abc-1", "Björk")]);

        assert_eq!(table.identity_for(Some("def-2"), Some("Björk")), Some("def-2".to_string()));
        assert_eq!(table.identity_for(None, Some("the Björk")), Some("abc-1".to_string()));
        assert_eq!(table.identity_for(None, Some("Low")), Some("low".to_string()));
        assert_eq!(table.identity_for(Some(""), Some("Low")), Some("low".to_string()));
        assert_eq!(table.identity_for(None, None), None);
        assert_eq!(table.identity_for(None, Some("  ")), None);
    }

    #[test]
    fn test_name_tally_most_frequent_with_first_tie_break() {
        let mut tally = NameTally::default();
        assert_eq!(tally.most_frequent(), None);

        tally.add("The Fall");
        tally.add("Fall");
        assert_eq!(tally.most_frequent(), Some("The Fall"));

        tally.add("Fall");
        assert_eq!(tally.most_frequent(), Some("Fall"));
        assert_eq!(tally.total(), 3);
    }
}
