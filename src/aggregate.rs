//! # Artist Aggregation
//!
//! Turns a resolved [`LibraryTree`] into one [`Artist`] per identity:
//!
//! - every maximal pure directory becomes a subtree of its artist;
//! - tracks in mixed directories become per-album subtrees of their artist;
//! - tracks are attached to their primary artist, and to their album artist when
//!   that is someone else.
//!
//! Afterwards artists that carry no identity, no name or no tracks are dropped, and
//! [`unify_subtrees`] re-merges pure folders that the directory layout split apart.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::artist::{Artist, ArtistSubtree};
use crate::identity::{Identity, NameTally};
use crate::tree::{LibraryTree, NodeId, TrackRef};

/// Build the artist table from a resolved tree.
pub fn create_artists(
    tree: &LibraryTree,
    names: &BTreeMap<Identity, NameTally>,
    unify: bool,
) -> BTreeMap<Identity, Artist> {
    let mut artists: BTreeMap<Identity, Artist> = names
        .iter()
        .map(|(id, tally)| (id.clone(), Artist::new(id, tally.most_frequent().unwrap_or_default())))
        .collect();

    attach_subtrees_and_tracks(tree, &mut artists);
    sanitise_artists(tree, &mut artists);

    if unify {
        for artist in artists.values_mut() {
            let united = unify_subtrees(&artist.id, &artist.subtrees, tree);
            if united.len() < artist.subtrees.len() {
                debug!(
                    "Uniting {} subtrees for {}",
                    artist.subtrees.len() - united.len() + 1,
                    artist.name
                );
            }
            artist.subtrees = united;
        }
    }
    artists
}

fn attach_subtrees_and_tracks(tree: &LibraryTree, artists: &mut BTreeMap<Identity, Artist>) {
    for id in tree.pre_order() {
        let node = tree.node(id);

        if tree.is_maximal_pure(id) {
            if let Some(artist) = tree.pure_identity(id).and_then(|aid| artists.get_mut(aid)) {
                artist
                    .subtrees
                    .insert(ArtistSubtree::pure(id, node.path.clone(), &artist.id));
            }
        }

        let pure = tree.is_pure(id);
        for (slot, track) in node.tracks.iter().enumerate() {
            let Some(artist_id) = track.artist_id.as_ref() else { continue };
            let r = TrackRef { node: id, slot };

            if let Some(artist) = artists.get_mut(artist_id) {
                if !pure {
                    artist.subtrees.insert(ArtistSubtree {
                        node: id,
                        path: node.path.clone(),
                        artist: artist_id.clone(),
                        album_artist: track.album_artist_id.clone(),
                        album: track.record.album.clone(),
                    });
                }
                artist.tracks.push(r);
            }

            if let Some(album_artist_id) = track.album_artist_id.as_ref().filter(|a| *a != artist_id) {
                if let Some(album_artist) = artists.get_mut(album_artist_id) {
                    album_artist.tracks_as_album_artist.push(r);
                }
            }
        }
    }
}

/// Drop artists that cannot be used, logging why.
///
/// Returns the identities removed.
pub fn sanitise_artists(tree: &LibraryTree, artists: &mut BTreeMap<Identity, Artist>) -> Vec<Identity> {
    let mut bad = Vec::new();
    for (key, artist) in artists.iter() {
        let example = artist
            .tracks
            .first()
            .or_else(|| artist.tracks_as_album_artist.first())
            .map(|r| tree.track(*r).path().display().to_string())
            .unwrap_or_else(|| "no tracks".to_string());

        if artist.id.is_empty() {
            warn!("Artist {} has no id: deleting ({example})", display_or(&artist.name, "?"));
        } else if artist.name.is_empty() {
            warn!("Artist {} has no name: deleting ({example})", artist.id);
        } else if artist.tracks.is_empty() && artist.tracks_as_album_artist.is_empty() {
            warn!("Artist {} ({}) has no tracks: deleting", artist.name, artist.id);
        } else {
            continue;
        }
        bad.push(key.clone());
    }
    for key in &bad {
        artists.remove(key);
    }
    bad
}

fn display_or<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.is_empty() {
        fallback
    } else {
        s
    }
}

/// Merge an artist's spuriously separated pure subtrees.
///
/// Considers the subtrees where the artist is its own album artist. If there are
/// several and they all share one parent directory, or exactly one of their
/// parents is itself one of those subtrees, they are replaced by a single subtree
/// at that directory. Otherwise the set is returned unchanged.
///
/// This is a layout heuristic: it assumes a shared parent of several pure folders
/// is itself the artist's folder, which holds for the common
/// `Artist/Album/track` layout but not for every tree.
pub fn unify_subtrees(
    artist: &str,
    subtrees: &BTreeSet<ArtistSubtree>,
    tree: &LibraryTree,
) -> BTreeSet<ArtistSubtree> {
    let (own, others): (Vec<&ArtistSubtree>, Vec<&ArtistSubtree>) =
        subtrees.iter().partition(|s| s.is_own() && s.artist == artist);
    if own.len() < 2 {
        return subtrees.clone();
    }

    let parents: BTreeSet<Option<NodeId>> = own.iter().map(|s| tree.parent(s.node)).collect();
    let anchor = if parents.len() == 1 {
        parents.into_iter().next().flatten()
    } else {
        let own_nodes: BTreeSet<NodeId> = own.iter().map(|s| s.node).collect();
        let nested: BTreeSet<NodeId> = parents
            .into_iter()
            .flatten()
            .filter(|p| own_nodes.contains(p))
            .collect();
        if nested.len() == 1 {
            nested.into_iter().next()
        } else {
            None
        }
    };

    match anchor {
        Some(node) => {
            let mut united: BTreeSet<ArtistSubtree> = others.into_iter().cloned().collect();
            united.insert(ArtistSubtree::pure(node, tree.node(node).path.clone(), artist));
            united
        }
        None => subtrees.clone(),
    }
}
