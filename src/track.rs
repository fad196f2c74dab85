//! # Track Records
//!
//! A [`TrackRecord`] is the flat, per-file view of the tags Musedex cares about:
//! who performed the track, who the album belongs to, and the MusicBrainz ids of
//! both when the file carries them. Records are produced by a [`TrackReader`];
//! the default reader, [`TagReader`], uses `lofty` to read tags from disk.
//!
//! Tests and benchmarks substitute their own readers so that the library model can
//! be built without real audio files.

use anyhow::{Context, Result};
use lofty::prelude::{ItemKey, TaggedFileExt};
use log::trace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::identity::Identity;

/// File extensions treated as music when scanning a directory.
pub const MUSIC_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "ogg", "oga", "m4a", "mp4", "aac", "wma", "wav", "aiff", "opus", "wv", "ape",
    "mpc",
];

/// Tags read from a single audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub path: PathBuf,
    pub artist_name: Option<String>,
    pub artist_mbid: Option<String>,
    pub album_artist_name: Option<String>,
    pub album_artist_mbid: Option<String>,
    pub album: Option<String>,
}

impl TrackRecord {
    /// A record is valid when it names its artist in at least one way.
    ///
    /// Blank fields do not count.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.artist_name) || present(&self.artist_mbid)
    }

    /// The (mbid, name) pairs this track contributes, artist role first.
    pub fn roles(&self) -> [(Option<&str>, Option<&str>); 2] {
        [
            (self.artist_mbid.as_deref(), self.artist_name.as_deref()),
            (
                self.album_artist_mbid.as_deref(),
                self.album_artist_name.as_deref(),
            ),
        ]
    }
}

/// A track as held by the library tree: the raw record plus the identities
/// assigned to it during resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub record: TrackRecord,
    #[serde(default)]
    pub artist_id: Option<Identity>,
    #[serde(default)]
    pub album_artist_id: Option<Identity>,
}

impl Track {
    pub fn new(record: TrackRecord) -> Self {
        Self {
            record,
            artist_id: None,
            album_artist_id: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.record.path
    }
}

/// Source of per-file tag records.
pub trait TrackReader {
    /// Read the tags of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or its tags cannot be parsed.
    fn read_track(&self, path: &Path) -> Result<TrackRecord>;
}

/// Whether `path` has one of the [`MUSIC_EXTENSIONS`].
#[must_use]
pub fn is_music(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MUSIC_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reads tags with `lofty`, using the primary tag of the file (or the first tag
/// found when the format has no primary).
#[derive(Debug, Default, Clone, Copy)]
pub struct TagReader;

impl TrackReader for TagReader {
    fn read_track(&self, path: &Path) -> Result<TrackRecord> {
        let tagged_file = lofty::read_from_path(path)
            .with_context(|| format!("Failed to read tags from {}", path.display()))?;

        let mut record = TrackRecord {
            path: path.to_path_buf(),
            ..TrackRecord::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            let get = |key: &ItemKey| non_empty(tag.get_string(key));
            record.artist_name = get(&ItemKey::TrackArtist);
            record.artist_mbid = get(&ItemKey::MusicBrainzArtistId);
            record.album_artist_name = get(&ItemKey::AlbumArtist);
            record.album_artist_mbid = get(&ItemKey::MusicBrainzReleaseArtistId);
            record.album = get(&ItemKey::AlbumTitle);
        }

        trace!("Read tags for {}: {:?}", path.display(), record);
        Ok(record)
    }
}

/// Trimmed owned copy of a tag value, `None` when absent or blank.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_requires_artist_name_or_mbid() {
        let mut record = TrackRecord {
            path: PathBuf::from("/music/a.flac"),
            album_artist_name: Some("Someone".to_string()),
            ..TrackRecord::default()
        };
        assert!(!record.is_valid(), "album artist alone does not make a track valid");

        record.artist_mbid = Some("abc-1".to_string());
        assert!(record.is_valid());

        record.artist_mbid = None;
        record.artist_name = Some("Björk".to_string());
        assert!(record.is_valid());
    }

    #[test]
    fn test_blank_artist_fields_are_invalid() {
        let record = TrackRecord {
            path: PathBuf::from("/music/a.flac"),
            artist_name: Some("   ".to_string()),
            artist_mbid: Some(String::new()),
            ..TrackRecord::default()
        };
        assert!(!record.is_valid());
    }

    #[test]
    fn test_is_music_is_case_insensitive() {
        assert!(is_music(Path::new("/music/a/01 Track.FLAC")));
        assert!(is_music(Path::new("song.mp3")));
        assert!(!is_music(Path::new("cover.jpg")));
        assert!(!is_music(Path::new(".ignore")));
        assert!(!is_music(Path::new("noext")));
    }

    #[test]
    fn test_non_empty_trims_and_drops_blank() {
        assert_eq!(non_empty(Some("  Low ")), Some("Low".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
