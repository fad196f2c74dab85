//! Two-pass identity resolution over a [`LibraryTree`].
//!
//! Pass A gathers every (MBID, name) pair in the library into a [`SynonymTable`].
//! Pass B then assigns each track its artist and album-artist identities. Pass B
//! must see the complete table, because an untagged file's identity can depend on
//! an MBID that only appears in some other directory.

use log::{debug, warn};
use std::collections::BTreeMap;

use crate::identity::{Identity, NameTally, SynonymTable};
use crate::tree::LibraryTree;

/// Output of resolution: the synonym table and the display names observed for
/// each identity.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub synonyms: SynonymTable,
    pub names: BTreeMap<Identity, NameTally>,
}

/// Pass A: collect every (MBID, name) pair from artist and album-artist tags.
pub fn collect_synonyms(tree: &LibraryTree) -> SynonymTable {
    let mut synonyms = SynonymTable::new();
    for id in tree.pre_order() {
        for track in &tree.node(id).tracks {
            for (mbid, name) in track.record.roles() {
                let (Some(mbid), Some(name)) = (mbid, name) else { continue };
                if let Some(existing) = synonyms.record(mbid, name) {
                    warn!(
                        "Artist name \"{name}\" associated with multiple artist IDs: \"{mbid}\" \"{existing}\" ({})",
                        track.path().display()
                    );
                }
            }
        }
    }
    debug!("Synonym table holds {} names", synonyms.len());
    synonyms
}

/// Pass B: assign identities to every track and tally display names.
pub fn assign_identities(tree: &mut LibraryTree, synonyms: &SynonymTable) -> BTreeMap<Identity, NameTally> {
    let mut names: BTreeMap<Identity, NameTally> = BTreeMap::new();
    let order = tree.pre_order();

    for id in order {
        for track in &mut tree.node_mut(id).tracks {
            let record = &track.record;
            let artist_id = synonyms.identity_for(record.artist_mbid.as_deref(), record.artist_name.as_deref());
            let album_artist_id = synonyms.identity_for(
                record.album_artist_mbid.as_deref(),
                record.album_artist_name.as_deref(),
            );

            for (identity, name) in [
                (&artist_id, record.artist_name.as_deref()),
                (&album_artist_id, record.album_artist_name.as_deref()),
            ] {
                let Some(identity) = identity else { continue };
                let tally = names.entry(identity.clone()).or_default();
                if let Some(name) = name {
                    tally.add(name);
                }
            }

            if artist_id.is_none() {
                warn!("Track {} has neither artist name nor artist ID", record.path.display());
            }
            track.artist_id = artist_id;
            track.album_artist_id = album_artist_id;
        }
    }
    names
}

/// Run both passes and refresh every footprint.
pub fn resolve(tree: &mut LibraryTree) -> Resolution {
    let synonyms = collect_synonyms(tree);
    let names = assign_identities(tree, &synonyms);
    tree.propagate_footprints();
    debug!("Resolved {} artist identities", names.len());
    Resolution { synonyms, names }
}
