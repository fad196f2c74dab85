//! Artist-centric index of a tagged music library, with similar-artist playlists
//! and link files for a portable player.
//!
//! Core modules:
//! - [`tree`] - Directory tree with per-folder artist footprints
//! - [`resolve`] - Two-pass artist identity resolution
//! - [`aggregate`] - One artist per identity, with its folders and tracks
//! - [`similarity`] - Cached, retried similar-artist fetching
//! - [`musicspace`] - Distance-weighted artist neighbourhoods
//! - [`sampler`] - Playlist and link-set sampling
//! - [`output`] - Playlist and link file writers
//!
//! ### Supporting Modules
//!
//! - [`track`] - Tag records and the tag reader
//! - [`identity`] - Canonical names, synonym table, name tallies
//! - [`artist`] - Artist, subtree and tag entities
//! - [`library`] - The per-run context and its persistence
//! - [`lastfm`] - Last.fm web-service client
//! - [`config`] - Settings and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//! - [`report`] - Plain-text reports
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use musedex::config::{Settings, default_library_file};
//! use musedex::library::{Library, LibrarySource};
//! use musedex::output::{write_artifacts, OutputLayout};
//! use musedex::track::TagReader;
//! use std::path::{Path, PathBuf};
//!
//! let settings = Settings::default();
//! let source = LibrarySource::Scan(PathBuf::from("/media/player/music"));
//! let mut library = Library::open(&source, &TagReader)?;
//! library.build(settings.unify_subtrees);
//! library.save(&default_library_file()?)?;
//!
//! let layout = OutputLayout::create(Path::new("player-output"))?;
//! write_artifacts(&library, &settings, &layout, &mut rand::thread_rng());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Artist Identities
//!
//! Tags name artists inconsistently: some files carry a MusicBrainz artist ID,
//! some only a name, some spell the name differently. Every artist gets one
//! identity, its MBID when any of its files carry one and its canonical name
//! (lowercase, leading "the" dropped, spaces joined by `_`) otherwise. A file
//! tagged only "The Beatles" joins the MBID seen on any other file tagged
//! "Beatles".
//!
//! ## Error Handling
//!
//! Fallible public functions return `anyhow::Result`. Tagging inconsistencies,
//! failed similarity queries and unwritable output files are logged and skipped;
//! only bad settings and unreadable inputs stop a run.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod aggregate;
pub mod artist;
pub mod cli;
pub mod completion;
pub mod config;
pub mod identity;
pub mod lastfm;
pub mod library;
pub mod musicspace;
pub mod output;
pub mod report;
pub mod resolve;
pub mod sampler;
pub mod similarity;
pub mod track;
pub mod tree;
