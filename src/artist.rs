//! Artist, ArtistSubtree and Tag entities.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::identity::Identity;
use crate::tree::{NodeId, TrackRef};

/// One (mbid, name) entry of an external similar-artist list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarArtist {
    pub mbid: Option<String>,
    pub name: String,
}

impl SimilarArtist {
    pub fn new(mbid: Option<&str>, name: &str) -> Self {
        Self {
            mbid: mbid.filter(|m| !m.is_empty()).map(str::to_string),
            name: name.to_string(),
        }
    }
}

/// One reason a directory is associated with an artist: a whole pure folder, a
/// single album, or a single compilation track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSubtree {
    pub node: NodeId,
    pub path: PathBuf,
    pub artist: Identity,
    pub album_artist: Option<Identity>,
    pub album: Option<String>,
}

impl ArtistSubtree {
    /// Subtree for a folder that belongs wholly to `artist`.
    pub fn pure(node: NodeId, path: PathBuf, artist: &str) -> Self {
        Self {
            node,
            path,
            artist: artist.to_string(),
            album_artist: Some(artist.to_string()),
            album: None,
        }
    }

    /// Whether the artist is also the album artist.
    pub fn is_own(&self) -> bool {
        self.album_artist.as_deref() == Some(self.artist.as_str())
    }
}

impl Ord for ArtistSubtree {
    // (artist, album artist, album), absent album artist last, path breaks ties.
    fn cmp(&self, other: &Self) -> Ordering {
        self.artist
            .cmp(&other.artist)
            .then_with(|| match (&self.album_artist, &other.album_artist) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.album.cmp(&other.album))
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for ArtistSubtree {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Identity,
    /// Most frequent display name seen in tags.
    pub name: String,
    pub subtrees: BTreeSet<ArtistSubtree>,
    pub tracks: Vec<TrackRef>,
    pub tracks_as_album_artist: Vec<TrackRef>,
    #[serde(default)]
    pub validated_name: Option<String>,
    #[serde(default)]
    pub similar: Vec<SimilarArtist>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: Vec<f64>,
    /// Music-space neighbours, heaviest first.
    #[serde(default)]
    pub neighbours: Option<Vec<(Identity, f64)>>,
}

impl Artist {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub fn has_location(&self) -> bool {
        self.neighbours.is_some()
    }

    /// Name to send to external services.
    pub fn query_name(&self) -> &str {
        self.validated_name.as_deref().unwrap_or(&self.name)
    }

    /// Display name made safe for use as a file name.
    pub fn clean_name(&self) -> String {
        clean_file_name(&self.name)
    }
}

/// Strip characters that upset file systems or players.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '\'' | '/' | '\\' | '?' | ':' | '*' | '<' | '>' | '|'))
        .collect()
}

/// An external tag and the library artists carrying it among their top tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub artists: Vec<Identity>,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            artists: Vec::new(),
        }
    }
}
