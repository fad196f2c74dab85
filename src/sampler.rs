//! # Recommendation Sampling
//!
//! Turns the two similarity signals into playlists and link sets.
//!
//! ## Similar-artist lists
//!
//! An artist's pool is itself plus every entry of its similar-artist list that
//! resolves to a library artist with at least one track. Playlists draw artists
//! uniformly with replacement and take one random track from each; link sets list
//! the subtrees of the pool, the artist's own first.
//!
//! ## Music space
//!
//! The pool is the artist's ranked neighbour list, restricted to artists that have
//! tracks; the artist itself is not in it. Playlists draw artists with replacement
//! in proportion to weight. An artist without coordinates, or whose pool is empty
//! or weighs nothing, gets no playlist.
//!
//! ## Tags and whole-library playlists
//!
//! Tag playlists draw from the artists carrying a tag; single-artist and
//! all-artists playlists are plain shuffles.
//!
//! Every sampler takes its random source as an argument so runs can be seeded.

use log::debug;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::artist::{Artist, ArtistSubtree, Tag};
use crate::library::Library;
use crate::tree::TrackRef;

/// One random track of `artist`.
fn random_track<R: Rng + ?Sized>(artist: &Artist, rng: &mut R) -> Option<TrackRef> {
    artist.tracks.choose(rng).copied()
}

/// Ordered union of the subtrees of `artists`.
fn subtree_union<'a>(artists: impl IntoIterator<Item = &'a Artist>) -> Vec<&'a ArtistSubtree> {
    let mut seen = BTreeSet::new();
    let mut union = Vec::new();
    for artist in artists {
        for subtree in &artist.subtrees {
            if seen.insert(subtree) {
                union.push(subtree);
            }
        }
    }
    union
}

/// The artist followed by its in-library similar artists that have tracks.
pub fn similar_pool<'a>(library: &'a Library, artist: &'a Artist) -> Vec<&'a Artist> {
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(&artist.id);
    let mut pool = vec![artist];
    for similar in &artist.similar {
        if let Some(other) = library.lookup_similar(similar) {
            if other.has_tracks() && seen.insert(&other.id) {
                pool.push(other);
            }
        }
    }
    pool
}

/// `n` tracks, each from an artist drawn uniformly from the similar-artist pool.
pub fn similar_playlist<R: Rng + ?Sized>(
    library: &Library,
    artist: &Artist,
    n: usize,
    rng: &mut R,
) -> Vec<TrackRef> {
    let pool: Vec<&Artist> = similar_pool(library, artist)
        .into_iter()
        .filter(|a| a.has_tracks())
        .collect();
    if pool.is_empty() {
        return Vec::new();
    }
    (0..n)
        .filter_map(|_| pool.choose(rng).and_then(|a| random_track(a, rng)))
        .collect()
}

/// Subtrees of the artist and its similar artists, the artist's own first.
pub fn similar_subtrees<'a>(library: &'a Library, artist: &'a Artist) -> Vec<&'a ArtistSubtree> {
    subtree_union(similar_pool(library, artist))
}

/// The artist's neighbours that have tracks, heaviest first.
///
/// Returns `None` for an artist without music-space coordinates.
pub fn musicspace_pool<'a>(library: &'a Library, artist: &'a Artist) -> Option<Vec<(&'a Artist, f64)>> {
    let neighbours = artist.neighbours.as_ref()?;
    Some(
        neighbours
            .iter()
            .filter_map(|(id, weight)| {
                library
                    .artist(id)
                    .filter(|a| a.has_tracks())
                    .map(|a| (a, *weight))
            })
            .collect(),
    )
}

/// `n` tracks, each from an artist drawn in proportion to music-space weight.
///
/// Empty for an artist without coordinates.
pub fn musicspace_playlist<R: Rng + ?Sized>(
    library: &Library,
    artist: &Artist,
    n: usize,
    rng: &mut R,
) -> Vec<TrackRef> {
    let Some(pool) = musicspace_pool(library, artist) else {
        return Vec::new();
    };
    let index = match WeightedIndex::new(pool.iter().map(|(_, w)| *w)) {
        Ok(index) => index,
        Err(e) => {
            debug!("No music-space playlist for {}: {e}", artist.name);
            return Vec::new();
        }
    };
    (0..n)
        .filter_map(|_| random_track(pool[index.sample(rng)].0, rng))
        .collect()
}

/// Subtrees of the music-space pool in rank order.
pub fn musicspace_subtrees<'a>(library: &'a Library, artist: &'a Artist) -> Vec<&'a ArtistSubtree> {
    musicspace_pool(library, artist)
        .map(|pool| subtree_union(pool.into_iter().map(|(a, _)| a)))
        .unwrap_or_default()
}

/// Up to `n` distinct tracks drawn from the artists carrying `tag`.
pub fn tag_playlist<R: Rng + ?Sized>(library: &Library, tag: &Tag, n: usize, rng: &mut R) -> Vec<TrackRef> {
    let pool: Vec<&Artist> = tag
        .artists
        .iter()
        .filter_map(|id| library.artist(id))
        .filter(|a| a.has_tracks())
        .collect();
    if pool.is_empty() {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    (0..n)
        .filter_map(|_| pool.choose(rng).and_then(|a| random_track(a, rng)))
        .filter(|r| seen.insert(*r))
        .collect()
}

/// Subtrees of every artist carrying `tag`.
pub fn tag_subtrees<'a>(library: &'a Library, tag: &Tag) -> Vec<&'a ArtistSubtree> {
    subtree_union(tag.artists.iter().filter_map(|id| library.artist(id)))
}

/// Names on the artist's similar list that are not in the library.
pub fn recommended_absent<'a>(library: &Library, artist: &'a Artist) -> Vec<&'a str> {
    artist
        .similar
        .iter()
        .filter(|s| library.lookup_similar(s).is_none())
        .map(|s| s.name.as_str())
        .collect()
}

/// All of an artist's tracks in random order.
pub fn single_artist_playlist<R: Rng + ?Sized>(artist: &Artist, rng: &mut R) -> Vec<TrackRef> {
    let mut tracks = artist.tracks.clone();
    tracks.shuffle(rng);
    tracks
}

/// Every track in the library, shuffled and cut into chunks of `chunk_size`.
pub fn all_artists_playlists<R: Rng + ?Sized>(
    library: &Library,
    chunk_size: usize,
    rng: &mut R,
) -> Vec<Vec<TrackRef>> {
    let mut tracks = library.tree.all_tracks();
    tracks.shuffle(rng);
    tracks.chunks(chunk_size.max(1)).map(<[TrackRef]>::to_vec).collect()
}

/// File name of the `i`th (zero-based) all-artists chunk: `01.m3u`, `02.m3u`, ...
pub fn chunk_file_name(i: usize) -> String {
    format!("{:02}.m3u", i + 1)
}

/// Subtrees of all artists grouped by the upper-cased initial of their name.
pub fn a_to_z_index(library: &Library) -> BTreeMap<String, Vec<&ArtistSubtree>> {
    let mut index: BTreeMap<String, Vec<&ArtistSubtree>> = BTreeMap::new();
    for artist in library.artists.values() {
        let Some(initial) = artist.name.chars().next() else { continue };
        if artist.subtrees.is_empty() {
            continue;
        }
        index
            .entry(initial.to_uppercase().collect())
            .or_default()
            .extend(artist.subtrees.iter());
    }
    for subtrees in index.values_mut() {
        subtrees.sort();
        subtrees.dedup();
    }
    index
}
