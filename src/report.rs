//! Plain-text reports on a built library.

use anyhow::Result;
use std::io::Write;

use crate::identity::is_mbid;
use crate::library::Library;

/// Neighbours listed per artist by [`show_musicspace`].
pub const NEIGHBOURS_SHOWN: usize = 30;

/// One line per directory: path, number of artists, their identities.
///
/// With `tracks`, each directory's tracks follow it.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn show_library(library: &Library, tracks: bool, out: &mut impl Write) -> Result<()> {
    let tree = &library.tree;
    for id in tree.pre_order() {
        let node = tree.node(id);
        let ids: Vec<&str> = node.footprint.keys().map(String::as_str).collect();
        writeln!(out, "{:<75} {} [{}]", node.path.display(), ids.len(), ids.join(", "))?;
        if tracks {
            for track in &node.tracks {
                let record = &track.record;
                writeln!(
                    out,
                    "    {} | {} | {} | {}",
                    record.path.file_name().map(|f| f.to_string_lossy()).unwrap_or_default(),
                    record.artist_name.as_deref().unwrap_or(""),
                    record.album_artist_name.as_deref().unwrap_or(""),
                    track.artist_id.as_deref().unwrap_or("?")
                )?;
            }
        }
    }
    Ok(())
}

/// `name<TAB>mbid` per artist, the MBID column empty for name-only identities.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn show_artists(library: &Library, out: &mut impl Write) -> Result<()> {
    for artist in library.artists_with_min_tracks(0) {
        let mbid = if is_mbid(&artist.id) { artist.id.as_str() } else { "" };
        writeln!(out, "{}\t{}", artist.name, mbid)?;
    }
    Ok(())
}

/// Each artist followed by its nearest music-space neighbours and their weights.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn show_musicspace(library: &Library, out: &mut impl Write) -> Result<()> {
    for artist in library.artists_with_min_tracks(0) {
        writeln!(out, "{}", artist.name)?;
        let Some(neighbours) = &artist.neighbours else { continue };
        for (id, weight) in neighbours.iter().take(NEIGHBOURS_SHOWN) {
            let name = library.artist(id).map_or(id.as_str(), |a| a.name.as_str());
            writeln!(out, "\t{name:<30}{weight:.6}")?;
        }
    }
    Ok(())
}
