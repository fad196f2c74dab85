//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for musedex using Clap derive
//! macros.
//!
//! ## Commands
//!
//! - `build`: Resolve artists, fetch similar artists and write playlists and links
//! - `show-library`: Print the directory tree with each folder's artists
//! - `show-artists`: Print every artist with its MusicBrainz ID
//! - `show-musicspace`: Print each artist's nearest music-space neighbours
//! - `musicspace-skeleton`: Write a music-space file to fill in
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! musedex build -i /media/player/music -o ~/player-output
//! musedex build -u /media/player/music/New -o ~/player-output
//! musedex show-artists
//! ```

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{self, Settings, Target};
use crate::library::LibrarySource;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "musedex")]
#[command(about = "musedex: artist index, similar-artist playlists and links for your music library")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Where the library comes from.
///
/// With `--library` the whole library is scanned. With `--update` the saved
/// library is loaded and the given subtree rescanned into it. Otherwise the
/// saved library is loaded as is.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct LibraryArgs {
    /// Root of the music library to scan
    #[arg(short = 'i', long = "library", value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub library: Option<PathBuf>,

    /// Saved library file [default: library.json in the data directory]
    #[arg(short = 'f', long = "libfile", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub libfile: Option<PathBuf>,

    /// Rescan this folder of the saved library instead of the whole library
    #[arg(short = 'u', long = "update", value_name = "DIR", conflicts_with = "library")]
    pub update: Option<PathBuf>,
}

impl LibraryArgs {
    /// The saved library file to read and write.
    ///
    /// # Errors
    ///
    /// Fails if no file was given and the data directory is unavailable.
    pub fn libfile(&self) -> Result<PathBuf> {
        match &self.libfile {
            Some(file) => config::absolute(file),
            None => config::default_library_file(),
        }
    }

    /// Check the given paths and decide how to obtain the library.
    ///
    /// # Errors
    ///
    /// Fails if a library folder is not a directory or the saved library file
    /// does not exist.
    pub fn source(&self) -> Result<LibrarySource> {
        if let Some(root) = &self.library {
            return Ok(LibrarySource::Scan(config::check_library_root(root)?));
        }
        let saved = config::check_library_file(&self.libfile()?)
            .context("No saved library; scan one with -i DIR first")?;
        match &self.update {
            Some(subtree) => Ok(LibrarySource::Update {
                saved,
                subtree: config::check_library_root(subtree)?,
            }),
            None => Ok(LibrarySource::Load(saved)),
        }
    }
}

/// Tunables of the build command.
#[derive(ClapArgs, Debug, Clone)]
pub struct BuildArgs {
    /// Folder to receive output
    #[arg(short = 'o', long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub outdir: PathBuf,

    /// Music-space file
    #[arg(short = 's', long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub musicspace: Option<PathBuf>,

    /// How fast inclusion probability falls away with music-space distance
    ///
    /// 0 includes every other artist with equal probability; above 5 or so you
    /// will rarely get anybody but the artist itself.
    #[arg(long, default_value_t = 3.0)]
    pub dropoff: f64,

    /// Only artists with at least this many tracks get playlists and link files
    #[arg(long = "mintracks", default_value_t = 0)]
    pub min_artist_tracks: usize,

    /// Attempts per artist when querying the similarity service
    #[arg(long, default_value_t = 3)]
    pub numtries: u32,

    /// Don't query the similarity service; use saved data only
    #[arg(long)]
    pub noweb: bool,

    /// Don't create any playlists or link files
    #[arg(short = 'n', long = "no-files")]
    pub no_files: bool,

    /// Platform the playlists and links are written for
    #[arg(short = 't', long, value_enum, default_value_t = Target::Rockbox)]
    pub target: Target,

    /// Mount point of the player [default: parent of the library root]
    #[arg(short = 'r', long = "rockbox", value_name = "DIR")]
    pub rockbox_mount: Option<PathBuf>,

    /// Tracks drawn for each sampled playlist
    #[arg(long, default_value_t = 1000)]
    pub sample_size: usize,

    /// Tracks per all-artists playlist file
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Only tags shared by at least this many artists get playlists and link files
    #[arg(long = "mintagartists", default_value_t = 1)]
    pub min_tag_artists: usize,

    /// Worker threads for similarity queries
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Keep pure folders of one artist separate even when they share a parent
    #[arg(long)]
    pub no_unify: bool,

    /// Last.fm API key
    #[arg(long, env = "LASTFM_API_KEY", hide_env_values = true)]
    pub lastfm_api_key: Option<String>,
}

impl BuildArgs {
    /// # Errors
    ///
    /// Returns an error if the resulting settings are invalid or the mount
    /// point cannot be made absolute.
    pub fn settings(&self) -> Result<Settings> {
        let settings = Settings {
            min_artist_tracks: self.min_artist_tracks,
            numtries: self.numtries,
            query_similar: !self.noweb,
            create_files: !self.no_files,
            musicspace_dropoff: self.dropoff,
            sample_size: self.sample_size,
            chunk_size: self.chunk_size,
            min_tag_artists: self.min_tag_artists,
            threads: self.threads,
            unify_subtrees: !self.no_unify,
            target: self.target,
            rockbox_mount: self.rockbox_mount.as_deref().map(config::absolute).transpose()?,
            lastfm_api_key: self.lastfm_api_key.clone().filter(|k| !k.is_empty()),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Build the artist index and write playlists and link files
    ///
    /// Scans or loads the library, resolves artist identities, fetches similar
    /// artists, tags and biographies, places artists in music space when a
    /// music-space file is given, saves the library and writes the output tree.
    Build {
        #[command(flatten)]
        source: LibraryArgs,

        #[command(flatten)]
        options: BuildArgs,
    },

    /// Print the library tree with the artists found in each folder
    ShowLibrary {
        #[command(flatten)]
        source: LibraryArgs,

        /// Include individual tracks
        #[arg(long)]
        tracks: bool,
    },

    /// Print every artist with its MusicBrainz ID
    ShowArtists {
        #[command(flatten)]
        source: LibraryArgs,
    },

    /// Print each artist's nearest music-space neighbours
    ShowMusicspace {
        #[command(flatten)]
        source: LibraryArgs,

        /// Music-space file
        #[arg(short = 's', long, value_name = "FILE")]
        musicspace: PathBuf,

        /// Music-space dropoff
        #[arg(long, default_value_t = 3.0)]
        dropoff: f64,
    },

    /// Write a music-space file listing every artist, ready to be filled in
    ///
    /// Coordinates already present in the given music-space file are kept.
    MusicspaceSkeleton {
        #[command(flatten)]
        source: LibraryArgs,

        /// Existing music-space file to carry coordinates over from
        #[arg(short = 's', long, value_name = "FILE")]
        musicspace: Option<PathBuf>,

        /// Output file [default: standard output]
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    ///
    /// Usage: musedex completion bash > ~/.local/share/bash-completion/completions/musedex
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
