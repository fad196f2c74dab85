//! # Library Context
//!
//! [`Library`] is the per-run context every stage works on: the directory tree,
//! the synonym table, the display-name tallies, the artists, the cache of
//! similar-artist data and the tag index. It is built once per run and saved and
//! reloaded as a single JSON document.
//!
//! ## Lifecycle
//!
//! ```no_run
//! use musedex::library::{Library, LibrarySource};
//! use musedex::track::TagReader;
//! use std::path::PathBuf;
//!
//! let source = LibrarySource::Scan(PathBuf::from("/media/player/music"));
//! let mut library = Library::open(&source, &TagReader)?;
//! library.build(true);
//! library.save(&PathBuf::from("library.json"))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregate;
use crate::artist::{Artist, SimilarArtist, Tag};
use crate::identity::{canonicalise_name, Identity, NameTally, SynonymTable};
use crate::resolve;
use crate::similarity::ArtistInfo;
use crate::track::TrackReader;
use crate::tree::{LibraryTree, TrackRef};

/// Number of an artist's top tags that enter the tag index.
pub const TAGS_PER_ARTIST: usize = 4;

/// Where a run gets its library from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// Scan the whole library rooted at this directory.
    Scan(PathBuf),
    /// Reload a saved library.
    Load(PathBuf),
    /// Reload a saved library and graft a fresh scan of `subtree` into it.
    Update { saved: PathBuf, subtree: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub tree: LibraryTree,
    #[serde(default)]
    pub synonyms: SynonymTable,
    #[serde(default)]
    pub names: BTreeMap<Identity, NameTally>,
    #[serde(default)]
    pub artists: BTreeMap<Identity, Artist>,
    /// Similar-artist data by identity, kept across runs.
    #[serde(default)]
    pub similar_cache: BTreeMap<Identity, ArtistInfo>,
    /// Tags keyed by lowercase name.
    #[serde(default)]
    pub tags: BTreeMap<String, Tag>,
    #[serde(default)]
    pub musicspace_dimension: usize,
}

impl Library {
    pub fn new(tree: LibraryTree) -> Self {
        Self {
            tree,
            synonyms: SynonymTable::default(),
            names: BTreeMap::new(),
            artists: BTreeMap::new(),
            similar_cache: BTreeMap::new(),
            tags: BTreeMap::new(),
            musicspace_dimension: 0,
        }
    }

    /// Scan, load, or load-and-update a library.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned, the saved file cannot
    /// be read, or an update subtree lies outside the saved library.
    pub fn open(source: &LibrarySource, reader: &dyn TrackReader) -> Result<Self> {
        match source {
            LibrarySource::Scan(root) => {
                info!("Scanning library rooted at {}", root.display());
                Ok(Self::new(LibraryTree::scan(root, reader)?))
            }
            LibrarySource::Load(saved) => Self::load(saved),
            LibrarySource::Update { saved, subtree } => {
                let mut library = Self::load(saved)?;
                library.update(subtree, reader)?;
                Ok(library)
            }
        }
    }

    /// Resolve identities and rebuild the artist table from the current tree.
    ///
    /// The similar-artist cache survives; everything derived from the tree is
    /// recomputed.
    pub fn build(&mut self, unify_subtrees: bool) {
        info!("Constructing database of artists in library");
        let resolution = resolve::resolve(&mut self.tree);
        self.synonyms = resolution.synonyms;
        self.names = resolution.names;
        self.artists = aggregate::create_artists(&self.tree, &self.names, unify_subtrees);
        self.tags.clear();
        self.musicspace_dimension = 0;
        info!("Library has {} artists", self.artists.len());
    }

    /// Graft a fresh scan of `subtree` into the saved tree.
    ///
    /// # Errors
    ///
    /// Fails if `subtree` cannot be scanned or does not lie within the library root.
    pub fn update(&mut self, subtree: &Path, reader: &dyn TrackReader) -> Result<()> {
        info!("Updating library subtree rooted at {}", subtree.display());
        let fresh = LibraryTree::scan(subtree, reader)?;
        self.tree.graft(fresh)?;
        self.artists.clear();
        self.names.clear();
        self.tags.clear();
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        self.tree.root_path()
    }

    /// Identity of the library artist referred to by an (mbid, name) pair.
    pub fn lookup_identity(&self, mbid: Option<&str>, name: &str) -> Option<&Identity> {
        if let Some(mbid) = mbid {
            if let Some((key, _)) = self.artists.get_key_value(mbid) {
                return Some(key);
            }
        }
        let canonical = canonicalise_name(name);
        if let Some((key, _)) = self.artists.get_key_value(&canonical) {
            return Some(key);
        }
        self.synonyms
            .mbid_for(name)
            .and_then(|mbid| self.artists.get_key_value(mbid))
            .map(|(key, _)| key)
    }

    /// Library artist referred to by a similar-artist entry.
    pub fn lookup_similar(&self, similar: &SimilarArtist) -> Option<&Artist> {
        self.lookup_identity(similar.mbid.as_deref(), &similar.name)
            .and_then(|id| self.artists.get(id))
    }

    pub fn artist(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    /// Artists with at least `min_tracks` primary tracks, ordered by name.
    pub fn artists_with_min_tracks(&self, min_tracks: usize) -> Vec<&Artist> {
        let mut artists: Vec<&Artist> = self
            .artists
            .values()
            .filter(|a| a.tracks.len() >= min_tracks)
            .collect();
        artists.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        artists
    }

    pub fn track_path(&self, r: TrackRef) -> &Path {
        self.tree.track(r).path()
    }

    /// Rebuild the tag index from each artist's leading tags.
    pub fn tabulate_tags(&mut self) {
        self.tags.clear();
        for artist in self.artists.values() {
            for tag_name in artist.tags.iter().take(TAGS_PER_ARTIST) {
                let tag = self
                    .tags
                    .entry(tag_name.to_lowercase())
                    .or_insert_with(|| Tag::new(tag_name));
                if !tag.artists.contains(&artist.id) {
                    tag.artists.push(artist.id.clone());
                }
            }
        }
        debug!("Tabulated {} tags", self.tags.len());
    }

    /// Write the whole library to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        info!("Saving library to {}", path.display());
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, self).context("Failed to serialize library")?;
            writer.flush().context("Failed to flush library file")?;
        }
        file.persist(path)
            .with_context(|| format!("Failed to write library file {}", path.display()))?;
        Ok(())
    }

    /// Load a library previously written by [`Library::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a saved library.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading saved library file {}", path.display());
        let file = fs::File::open(path)
            .with_context(|| format!("Could not open saved library file {}", path.display()))?;
        let library: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not load saved library file {}", path.display()))?;
        info!("Loaded library with {} artists", library.artists.len());
        Ok(library)
    }
}
