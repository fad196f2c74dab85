//! # musedex
//!
//! Builds an artist-centric index of a tagged music library and writes
//! similar-artist playlists and link files for a portable player.
//!
//! ## Usage
//!
//! ```bash
//! # Scan a library, fetch similar artists and write the output tree
//! musedex build -i /media/player/music -o ~/player-output
//!
//! # Reuse the saved library, adding music-space playlists
//! musedex build -s musicspace.csv -o ~/player-output
//!
//! # Inspect the saved library
//! musedex show-artists
//! musedex show-library --tracks
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use musedex::cli::{self, LibraryArgs};
use musedex::config::Settings;
use musedex::lastfm::LastFm;
use musedex::library::{Library, LibrarySource};
use musedex::output::{self, OutputLayout};
use musedex::similarity::{self, SimilarityProvider};
use musedex::track::TagReader;
use musedex::{completion, musicspace, report};

/// Main entry point.
///
/// Initializes logging, parses command-line arguments, and routes commands.
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=info musedex build ...` - Progress of each stage
/// - `RUST_LOG=musedex::similarity=debug musedex build ...` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Build { source, options } => {
            let settings = options.settings()?;
            build(&source, options.musicspace.as_deref(), &options.outdir, &settings)?;
        }
        cli::Command::ShowLibrary { source, tracks } => {
            let library = open_library(&source, true)?;
            with_stdout(|out| report::show_library(&library, tracks, out))?;
        }
        cli::Command::ShowArtists { source } => {
            let library = open_library(&source, true)?;
            with_stdout(|out| report::show_artists(&library, out))?;
        }
        cli::Command::ShowMusicspace {
            source,
            musicspace,
            dropoff,
        } => {
            let mut library = open_library(&source, true)?;
            populate_musicspace(&mut library, &musicspace, dropoff)?;
            with_stdout(|out| report::show_musicspace(&library, out))?;
        }
        cli::Command::MusicspaceSkeleton {
            source,
            musicspace,
            output,
        } => {
            let mut library = open_library(&source, true)?;
            if let Some(file) = musicspace {
                populate_musicspace(&mut library, &file, Settings::default().musicspace_dropoff)?;
            }
            match output {
                Some(path) => {
                    let file = fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let mut out = BufWriter::new(file);
                    musicspace::write_skeleton(&library, &mut out)?;
                    out.flush()?;
                    info!("Wrote music-space skeleton to {}", path.display());
                }
                None => with_stdout(|out| musicspace::write_skeleton(&library, out))?,
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(shell),
                &mut cmd,
                &mut io::stdout(),
            );
        }
    }

    Ok(())
}

fn with_stdout(f: impl FnOnce(&mut BufWriter<io::StdoutLock<'static>>) -> Result<()>) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    f(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Obtain the library and resolve its artists.
fn open_library(args: &LibraryArgs, unify_subtrees: bool) -> Result<Library> {
    let source = args.source()?;
    let mut library = Library::open(&source, &TagReader)?;
    library.build(unify_subtrees);
    Ok(library)
}

fn populate_musicspace(library: &mut Library, file: &Path, dropoff: f64) -> Result<()> {
    info!("Populating music space from {}", file.display());
    let handle =
        fs::File::open(file).with_context(|| format!("Could not open music-space file {}", file.display()))?;
    let rows = musicspace::read_rows(BufReader::new(handle))?;
    musicspace::populate(library, &rows, dropoff)?;
    Ok(())
}

fn build(args: &LibraryArgs, musicspace_file: Option<&Path>, outdir: &Path, settings: &Settings) -> Result<()> {
    let source = args.source()?;
    let libfile = args.libfile()?;

    let mut library = Library::open(&source, &TagReader)?;
    if settings.create_files && !matches!(source, LibrarySource::Load(_)) {
        library.save(&libfile)?;
    }

    library.build(settings.unify_subtrees);

    if let Some(file) = musicspace_file {
        populate_musicspace(&mut library, file, settings.musicspace_dropoff)?;
    }

    let lastfm = match (&settings.lastfm_api_key, settings.query_similar) {
        (Some(key), true) => Some(LastFm::new(key)?),
        (None, true) => {
            warn!("No Last.fm API key given (set LASTFM_API_KEY); using saved similar-artist data only");
            None
        }
        _ => None,
    };
    if lastfm.is_some() {
        info!("Retrieving similar artist lists from Last.fm");
    }
    let stop = AtomicBool::new(false);
    let summary = similarity::download_similarity_data(
        &mut library,
        lastfm.as_ref().map(|p| p as &dyn SimilarityProvider),
        &settings.fetch_options(),
        &stop,
    )?;
    info!(
        "Similar artists: {} fetched, {} cached, {} failed",
        summary.fetched, summary.cached, summary.failed
    );

    if settings.create_files {
        library.save(&libfile)?;

        info!("Creating playlists and link files in {}", outdir.display());
        let layout = OutputLayout::create(outdir)?;
        let written = output::write_artifacts(&library, settings, &layout, &mut rand::thread_rng());
        if written.failed > 0 {
            warn!("{} files could not be written", written.failed);
        }
        info!("Done");
    }
    Ok(())
}
