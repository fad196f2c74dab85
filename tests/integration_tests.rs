//! # Integration Tests for musedex
//!
//! End-to-end tests over real directory trees: scanning, identity resolution,
//! saving and updating a library, writing the output tree and driving the
//! command-line binary.
//!
//! Audio tags are faked: each "music file" holds one line of
//! `artist|artist mbid|album artist|album`, read by [`LineReader`].

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use musedex::artist::SimilarArtist;
use musedex::config::{Settings, Target};
use musedex::library::{Library, LibrarySource};
use musedex::output::{self, OutputLayout};
use musedex::track::{non_empty, TrackReader, TrackRecord};
use musedex::tree::IGNORE_MARKER;

const BJORK: &str = "87c5dedd-371d-4a53-9f7f-80522fb7f3cb";

struct LineReader;

impl TrackReader for LineReader {
    fn read_track(&self, path: &Path) -> Result<TrackRecord> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut fields = text.trim_end().split('|');
        let mut next = || non_empty(fields.next());
        Ok(TrackRecord {
            path: path.to_path_buf(),
            artist_name: next(),
            artist_mbid: next(),
            album_artist_name: next(),
            album: next(),
            ..TrackRecord::default()
        })
    }
}

fn write_track(root: &Path, relative: &str, tags: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, tags).unwrap();
}

/// A small library:
/// - Björk, tagged with an MBID on one album and by name only on another
/// - Low, two albums under one folder
/// - a compilation mixing Can and Neu!
/// - an ignored folder and a non-music file
fn create_library_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_track(root, "Bjork/Debut/01.flac", &format!("Björk|{BJORK}||Debut"));
    write_track(root, "Bjork/Post/01.flac", "the Björk|||Post");
    write_track(root, "Low/Things We Lost/01.flac", "Low|||Things We Lost");
    write_track(root, "Low/Things We Lost/02.flac", "Low|||Things We Lost");
    write_track(root, "Low/Secret Name/01.flac", "Low|||Secret Name");
    write_track(root, "Comp/01.flac", "Can||Various|Krautrock");
    write_track(root, "Comp/02.flac", "Neu!||Various|Krautrock");
    write_track(root, "Comp/cover.jpg", "not music");
    write_track(root, "Unsorted/01.mp3", "Stray|||");
    fs::write(root.join("Unsorted").join(IGNORE_MARKER), "").unwrap();
    dir
}

fn scan(dir: &TempDir) -> Library {
    let mut library = Library::open(&LibrarySource::Scan(dir.path().to_path_buf()), &LineReader).unwrap();
    library.build(true);
    library
}

#[cfg(test)]
mod library_tests {
    use super::*;

    #[test]
    fn test_scan_resolves_identities() {
        let dir = create_library_dir();
        let library = scan(&dir);

        let mut ids: Vec<_> = library.artists.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec![BJORK, "can", "low", "neu!", "various"]);

        let bjork = &library.artists[BJORK];
        assert_eq!(bjork.tracks.len(), 2, "name-only track joins the MBID");
        assert_eq!(bjork.subtrees.len(), 1);
        assert_eq!(bjork.subtrees.iter().next().unwrap().path, dir.path().join("Bjork"));

        assert!(library.tree.check_footprints());
        assert!(library.artist("stray").is_none(), "ignored folder contributes no tracks");
        assert!(library.tree.find(&dir.path().join("Unsorted")).is_some());
    }

    #[test]
    fn test_save_load_and_update() {
        let dir = create_library_dir();
        let state = TempDir::new().unwrap();
        let saved = state.path().join("library.json");
        scan(&dir).save(&saved).unwrap();

        write_track(dir.path(), "Low/Trust/01.flac", "Low|||Trust");
        write_track(dir.path(), "Can/Tago Mago/01.flac", "Can|||Tago Mago");

        let source = LibrarySource::Update {
            saved: saved.clone(),
            subtree: dir.path().join("Low"),
        };
        let mut library = Library::open(&source, &LineReader).unwrap();
        library.build(true);
        assert_eq!(library.artists["low"].tracks.len(), 4);
        assert_eq!(library.artists["can"].tracks.len(), 1, "only the given subtree is rescanned");
        assert!(library.tree.check_footprints());

        let outside = LibrarySource::Update {
            saved,
            subtree: state.path().to_path_buf(),
        };
        assert!(Library::open(&outside, &LineReader).is_err());
    }
}

#[cfg(test)]
mod output_tests {
    use super::*;

    fn read(path: PathBuf) -> String {
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    #[test]
    fn test_write_artifacts() {
        let dir = create_library_dir();
        let out = TempDir::new().unwrap();
        let mut library = scan(&dir);
        {
            let low = library.artists.get_mut("low").unwrap();
            low.similar = vec![
                SimilarArtist::new(Some(BJORK), "Björk"),
                SimilarArtist::new(None, "Ghost Artist"),
            ];
            low.tags = vec!["slowcore".to_string()];
            low.bio = "<p>Low are a band from Duluth.</p>".to_string();
        }
        library.tabulate_tags();

        let settings = Settings {
            target: Target::Native,
            sample_size: 20,
            chunk_size: 4,
            ..Settings::default()
        };
        let layout = OutputLayout::create(out.path()).unwrap();
        let summary = output::write_artifacts(&library, &settings, &layout, &mut StdRng::seed_from_u64(3));
        assert_eq!(summary.failed, 0);

        assert_eq!(read(layout.recommended.join("Low.link")), "Ghost Artist\n");

        let links = read(layout.similar_links.join("Low.link"));
        let lines: Vec<_> = links.lines().collect();
        assert_eq!(lines[0], format!("{}/\tLow", dir.path().join("Low").display()));
        assert_eq!(lines[1], format!("{}/\tBjörk", dir.path().join("Bjork").display()));

        let single = read(layout.single_artist_playlists.join("Low.m3u"));
        assert_eq!(single.lines().count(), 3);

        let similar = read(layout.similar_playlists.join("Low.m3u"));
        assert!(similar.lines().count() <= 5, "playlists hold distinct tracks");

        let comp = read(layout.similar_links.join("Can.link"));
        assert!(comp.ends_with("/\tCan in Krautrock by Various\n"));

        assert!(layout.a_to_z_links.join("L.link").is_file());
        assert!(layout.tag_links.join("slowcore.link").is_file());
        assert_eq!(read(layout.biographies.join("Low.txt")), "Low are a band from Duluth.");

        let chunks = [read(layout.all_artists_playlists.join("01.m3u")), read(layout.all_artists_playlists.join("02.m3u"))];
        assert_eq!(chunks.iter().map(|c| c.lines().count()).sum::<usize>(), 7);
        assert!(!layout.all_artists_playlists.join("03.m3u").exists());
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn musedex() -> Command {
        Command::new(env!("CARGO_BIN_EXE_musedex"))
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = musedex().arg("--help").output().expect("Failed to run help command");
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("musedex"));
        assert!(stdout.contains("build"));
        assert!(stdout.contains("show-artists"));
    }

    #[test]
    fn test_build_then_show_artists() {
        let library = TempDir::new().unwrap();
        fs::create_dir_all(library.path().join("Empty")).unwrap();
        let state = TempDir::new().unwrap();
        let libfile = state.path().join("library.json");
        let outdir = state.path().join("out");

        let output = musedex()
            .arg("build")
            .arg("-i")
            .arg(library.path())
            .arg("-f")
            .arg(&libfile)
            .arg("-o")
            .arg(&outdir)
            .arg("--noweb")
            .env_remove("LASTFM_API_KEY")
            .output()
            .expect("Failed to run build");
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert!(libfile.is_file());
        assert!(outdir.join("Links").join("A-Z").is_dir());

        let output = musedex()
            .args(["show-artists", "-f"])
            .arg(&libfile)
            .output()
            .expect("Failed to run show-artists");
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_invalid_settings_fail_before_scanning() {
        let output = musedex()
            .args(["build", "-i", "/definitely/not/a/library", "--dropoff=-2"])
            .output()
            .expect("Failed to run build");
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("dropoff"));
    }

    #[test]
    fn test_missing_library_is_reported() {
        let state = TempDir::new().unwrap();
        let output = musedex()
            .args(["show-artists", "-f"])
            .arg(state.path().join("nothing.json"))
            .output()
            .expect("Failed to run show-artists");
        assert!(!output.status.success());
    }
}
