//! # Configuration Module
//!
//! Run settings and data directory setup for musedex.
//!
//! ## Data Storage
//!
//! Unless told otherwise, musedex keeps its saved library in the platform-standard
//! data directory:
//! - Linux: `~/.local/share/musedex/library.json`
//! - macOS: `~/Library/Application Support/musedex/library.json`
//! - Windows: `%APPDATA%\musedex\library.json`
//!
//! ## Settings
//!
//! [`Settings`] gathers every tunable of a run. The command line fills it in;
//! [`Settings::validate`] rejects combinations that make the run meaningless
//! before any scanning starts.

use anyhow::{anyhow, ensure, Context, Result};
use clap::ValueEnum;
use path_absolutize::Absolutize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::similarity::FetchOptions;

/// Name of the saved library inside the data directory.
pub const LIBRARY_FILE_NAME: &str = "library.json";

/// Pause between attempts of a failed similar-artist fetch.
pub const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Returns the platform-appropriate data directory for musedex.
///
/// Creates the `musedex` subdirectory if it doesn't exist.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The musedex subdirectory cannot be created
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow!("Could not determine system data directory. Please ensure your platform supports standard data directories.")
    })?;

    let musedex_dir = data_dir.join("musedex");
    fs::create_dir_all(&musedex_dir).with_context(|| {
        format!(
            "Failed to create musedex data directory at {}. Please check file permissions.",
            musedex_dir.display()
        )
    })?;
    Ok(musedex_dir)
}

/// Returns the default location of the saved library.
///
/// # Examples
///
/// ```no_run
/// use musedex::config::default_library_file;
///
/// let path = default_library_file()?;
/// println!("Library location: {}", path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// Fails when [`get_data_dir`] does.
pub fn default_library_file() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(LIBRARY_FILE_NAME))
}

/// Kind of player the written paths are meant for.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Paths relative to the device mount point, `/`-separated
    #[default]
    Rockbox,
    /// Paths exactly as found on disk
    Native,
}

/// Everything a run can be tuned with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Artists with fewer primary tracks get no per-artist artifacts.
    pub min_artist_tracks: usize,
    /// Attempts per artist when fetching similar-artist data.
    pub numtries: u32,
    /// Query the similarity service; when false only cached data is used.
    pub query_similar: bool,
    /// Write playlists and link files.
    pub create_files: bool,
    pub musicspace_dropoff: f64,
    /// Tracks drawn per sampled playlist.
    pub sample_size: usize,
    /// Tracks per all-artists playlist file.
    pub chunk_size: usize,
    /// Tags carried by fewer artists get no artifacts.
    pub min_tag_artists: usize,
    /// Worker threads for the fetch stage.
    pub threads: usize,
    pub unify_subtrees: bool,
    pub target: Target,
    /// Directory where the player is mounted; defaults to the parent of the library root.
    pub rockbox_mount: Option<PathBuf>,
    pub lastfm_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_artist_tracks: 0,
            numtries: 3,
            query_similar: true,
            create_files: true,
            musicspace_dropoff: 3.0,
            sample_size: 1000,
            chunk_size: 1000,
            min_tag_artists: 1,
            threads: 4,
            unify_subtrees: true,
            target: Target::Rockbox,
            rockbox_mount: None,
            lastfm_api_key: None,
        }
    }
}

impl Settings {
    /// Reject settings no run can work with.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative or non-finite dropoff, a zero sample size, a
    /// zero chunk size or zero attempts.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.musicspace_dropoff.is_finite() && self.musicspace_dropoff >= 0.0,
            "Music-space dropoff must be non-negative, got {}",
            self.musicspace_dropoff
        );
        ensure!(self.sample_size > 0, "Sample size must be at least 1");
        ensure!(self.chunk_size > 0, "Playlist chunk size must be at least 1");
        ensure!(self.numtries > 0, "Number of attempts must be at least 1");
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            query: self.query_similar,
            numtries: self.numtries,
            pause: RETRY_PAUSE,
            threads: self.threads.max(1),
        }
    }
}

/// Absolute form of `path`, without touching the file system.
///
/// # Errors
///
/// Returns an error if the current directory is needed and unavailable.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Could not make {} absolute", path.display()))?
        .into_owned())
}

/// Absolute path of an existing library root directory.
///
/// # Errors
///
/// Fails if `path` is not a directory.
pub fn check_library_root(path: &Path) -> Result<PathBuf> {
    let root = absolute(path)?;
    ensure!(root.is_dir(), "Music library directory {} is not valid", root.display());
    Ok(root)
}

/// Absolute path of an existing saved library file.
///
/// # Errors
///
/// Fails if `path` is not a file.
pub fn check_library_file(path: &Path) -> Result<PathBuf> {
    let file = absolute(path)?;
    ensure!(file.is_file(), "Saved library file {} is not valid", file.display());
    Ok(file)
}
