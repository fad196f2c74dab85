//! # Output Artifacts
//!
//! Writes the playlists and link files a player browses. All files are plain UTF-8,
//! one entry per line.
//!
//! - Playlists (`.m3u`) hold one player path per track, duplicates removed.
//! - Link files (`.link`) hold one line per subtree:
//!   `path/<TAB>artist[ in [album by ]album-artist]`.
//!
//! ## Layout
//!
//! ```text
//! <outdir>/
//!   Links/{Last.fm_Similar, Musicspace_Similar, A-Z, Tags}/
//!   Playlists/{Single_Artists, All_Artists, Last.fm_Similar, Musicspace_Similar, Tags}/
//!   Recommended/
//!   Biographies/
//! ```
//!
//! A file that fails to write is logged and skipped; the rest of the run goes on.

use anyhow::{Context, Result};
use log::{error, info};
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::artist::{clean_file_name, Artist, ArtistSubtree};
use crate::config::{Settings, Target};
use crate::library::Library;
use crate::sampler;
use crate::tree::TrackRef;

/// Maps paths on this machine to the paths the player sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    target: Target,
    mount: PathBuf,
}

impl PathMapper {
    /// Mapper for `target`; a missing `mount` defaults to the parent of `library_root`.
    pub fn new(target: Target, mount: Option<&Path>, library_root: &Path) -> Self {
        let mount = match mount {
            Some(m) => m.to_path_buf(),
            None => library_root.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Self { target, mount }
    }

    pub fn map(&self, path: &Path) -> String {
        match self.target {
            Target::Native => path.display().to_string(),
            Target::Rockbox => {
                let relative = path.strip_prefix(&self.mount).unwrap_or(path);
                let parts: Vec<String> = relative
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();
                format!("/{}", parts.join("/"))
            }
        }
    }
}

/// Write `paths` to a playlist, dropping repeats but keeping first-seen order.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_playlist<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
    mapper: &PathMapper,
    file: &Path,
) -> Result<()> {
    let mut seen = HashSet::new();
    let lines: Vec<String> = paths
        .into_iter()
        .filter(|p| seen.insert(*p))
        .map(|p| mapper.map(p))
        .collect();
    write_lines(&lines, file)
}

/// One link-file line for `subtree`.
pub fn link_line(library: &Library, subtree: &ArtistSubtree, mapper: &PathMapper) -> String {
    let name_of = |id: &str| library.artist(id).map(|a| a.name.clone()).unwrap_or_default();
    let mut line = format!("{}/\t{}", mapper.map(&subtree.path), name_of(subtree.artist.as_str()));
    if let Some(album_artist) = subtree.album_artist.as_ref().filter(|a| **a != subtree.artist) {
        line.push_str(" in ");
        if let Some(album) = &subtree.album {
            line.push_str(album);
            line.push_str(" by ");
        }
        line.push_str(&name_of(album_artist.as_str()));
    }
    line
}

/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_linkfile(
    library: &Library,
    subtrees: &[&ArtistSubtree],
    mapper: &PathMapper,
    file: &Path,
) -> Result<()> {
    let lines: Vec<String> = subtrees.iter().map(|s| link_line(library, s, mapper)).collect();
    write_lines(&lines, file)
}

fn write_lines(lines: &[String], file: &Path) -> Result<()> {
    let handle = fs::File::create(file).with_context(|| format!("Failed to create {}", file.display()))?;
    let mut out = BufWriter::new(handle);
    for line in lines {
        writeln!(out, "{line}").with_context(|| format!("Failed to write {}", file.display()))?;
    }
    out.flush().with_context(|| format!("Failed to write {}", file.display()))?;
    Ok(())
}

/// Remove everything between `<` and `>`.
pub fn strip_html_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// The directories artifacts are written to.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub similar_links: PathBuf,
    pub musicspace_links: PathBuf,
    pub a_to_z_links: PathBuf,
    pub tag_links: PathBuf,
    pub single_artist_playlists: PathBuf,
    pub all_artists_playlists: PathBuf,
    pub similar_playlists: PathBuf,
    pub musicspace_playlists: PathBuf,
    pub tag_playlists: PathBuf,
    pub recommended: PathBuf,
    pub biographies: PathBuf,
}

impl OutputLayout {
    pub fn new(outdir: &Path) -> Self {
        let links = outdir.join("Links");
        let playlists = outdir.join("Playlists");
        Self {
            similar_links: links.join("Last.fm_Similar"),
            musicspace_links: links.join("Musicspace_Similar"),
            a_to_z_links: links.join("A-Z"),
            tag_links: links.join("Tags"),
            single_artist_playlists: playlists.join("Single_Artists"),
            all_artists_playlists: playlists.join("All_Artists"),
            similar_playlists: playlists.join("Last.fm_Similar"),
            musicspace_playlists: playlists.join("Musicspace_Similar"),
            tag_playlists: playlists.join("Tags"),
            recommended: outdir.join("Recommended"),
            biographies: outdir.join("Biographies"),
        }
    }

    /// Lay out `outdir`, creating every directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn create(outdir: &Path) -> Result<Self> {
        let layout = Self::new(outdir);
        for dir in layout.dirs() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(layout)
    }

    fn dirs(&self) -> [&Path; 11] {
        [
            &self.similar_links,
            &self.musicspace_links,
            &self.a_to_z_links,
            &self.tag_links,
            &self.single_artist_playlists,
            &self.all_artists_playlists,
            &self.similar_playlists,
            &self.musicspace_playlists,
            &self.tag_playlists,
            &self.recommended,
            &self.biographies,
        ]
    }
}

/// Files written and files skipped after an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

struct Writer<'a> {
    library: &'a Library,
    mapper: &'a PathMapper,
    summary: WriteSummary,
}

impl Writer<'_> {
    fn record(&mut self, what: &str, result: Result<()>) {
        match result {
            Ok(()) => self.summary.written += 1,
            Err(e) => {
                error!("Failed to create {what}: {e:#}");
                self.summary.failed += 1;
            }
        }
    }

    fn playlist(&mut self, what: &str, tracks: &[TrackRef], file: &Path) {
        let library = self.library;
        let result = write_playlist(tracks.iter().map(|r| library.track_path(*r)), self.mapper, file);
        self.record(what, result);
    }

    fn links(&mut self, what: &str, subtrees: &[&ArtistSubtree], file: &Path) {
        let result = write_linkfile(self.library, subtrees, self.mapper, file);
        self.record(what, result);
    }

    fn text(&mut self, what: &str, text: &str, file: &Path) {
        let result = fs::write(file, text).with_context(|| format!("Failed to write {}", file.display()));
        self.record(what, result);
    }
}

fn progress(label: &str, i: usize, n: usize) {
    if i % 10 == 0 || i == n {
        info!("{label}: \t{i} / {n}");
    }
}

fn artist_file(dir: &Path, artist: &Artist, extension: &str) -> PathBuf {
    dir.join(format!("{}.{extension}", artist.clean_name()))
}

/// Write every artifact for `library` under `layout`.
pub fn write_artifacts<R: Rng + ?Sized>(
    library: &Library,
    settings: &Settings,
    layout: &OutputLayout,
    rng: &mut R,
) -> WriteSummary {
    let mapper = PathMapper::new(settings.target, settings.rockbox_mount.as_deref(), library.root_path());
    let mut w = Writer {
        library,
        mapper: &mapper,
        summary: WriteSummary::default(),
    };
    let n = settings.sample_size;

    let artists = library.artists_with_min_tracks(settings.min_artist_tracks);
    let total = artists.len();
    for (i, artist) in artists.iter().enumerate() {
        progress("Similar artists link files and playlists", i + 1, total);
        let subtrees = sampler::similar_subtrees(library, artist);
        w.links(
            &format!("similar link file for {}", artist.name),
            &subtrees,
            &artist_file(&layout.similar_links, artist, "link"),
        );
        let tracks = sampler::similar_playlist(library, artist, n, rng);
        w.playlist(
            &format!("similar playlist for {}", artist.name),
            &tracks,
            &artist_file(&layout.similar_playlists, artist, "m3u"),
        );

        let absent = sampler::recommended_absent(library, artist);
        let mut text = absent.join("\n");
        text.push('\n');
        w.text(
            &format!("recommended file for {}", artist.name),
            &text,
            &artist_file(&layout.recommended, artist, "link"),
        );

        let tracks = sampler::single_artist_playlist(artist, rng);
        w.playlist(
            &format!("single artist playlist for {}", artist.name),
            &tracks,
            &artist_file(&layout.single_artist_playlists, artist, "m3u"),
        );
    }

    let located: Vec<&&Artist> = artists.iter().filter(|a| a.has_location()).collect();
    let total = located.len();
    for (i, artist) in located.iter().enumerate() {
        progress("Music-space similar artists link files and playlists", i + 1, total);
        let subtrees = sampler::musicspace_subtrees(library, artist);
        w.links(
            &format!("music-space link file for {}", artist.name),
            &subtrees,
            &artist_file(&layout.musicspace_links, artist, "link"),
        );
        let tracks = sampler::musicspace_playlist(library, artist, n, rng);
        if !tracks.is_empty() {
            w.playlist(
                &format!("music-space playlist for {}", artist.name),
                &tracks,
                &artist_file(&layout.musicspace_playlists, artist, "m3u"),
            );
        }
    }

    let index = sampler::a_to_z_index(library);
    for (initial, subtrees) in &index {
        info!("Artist index link files: \t{initial}");
        let file = layout.a_to_z_links.join(format!("{}.link", clean_file_name(initial)));
        w.links(&format!("link file for index letter {initial}"), subtrees, &file);
    }

    let tags: Vec<_> = library
        .tags
        .values()
        .filter(|t| t.artists.len() >= settings.min_tag_artists)
        .collect();
    let total = tags.len();
    for (i, tag) in tags.iter().enumerate() {
        progress("Tag link files and playlists", i + 1, total);
        let name = clean_file_name(&tag.name);
        let subtrees = sampler::tag_subtrees(library, tag);
        w.links(
            &format!("link file for tag {}", tag.name),
            &subtrees,
            &layout.tag_links.join(format!("{name}.link")),
        );
        let tracks = sampler::tag_playlist(library, tag, n, rng);
        w.playlist(
            &format!("playlist for tag {}", tag.name),
            &tracks,
            &layout.tag_playlists.join(format!("{name}.m3u")),
        );
    }

    for artist in library.artists.values().filter(|a| !a.bio.is_empty()) {
        w.text(
            &format!("biography for {}", artist.name),
            &strip_html_tags(&artist.bio),
            &artist_file(&layout.biographies, artist, "txt"),
        );
    }

    for (i, chunk) in sampler::all_artists_playlists(library, settings.chunk_size, rng).iter().enumerate() {
        info!("All artists playlists: \t{}", i + 1);
        w.playlist(
            "all artists playlist",
            chunk,
            &layout.all_artists_playlists.join(sampler::chunk_file_name(i)),
        );
    }

    info!("Wrote {} files ({} failed)", w.summary.written, w.summary.failed);
    w.summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackRecord;
    use crate::tree::LibraryTree;

    fn library() -> Library {
        let record = |path: &str, artist: &str, album_artist: Option<&str>, album: Option<&str>| TrackRecord {
            path: PathBuf::from(path),
            artist_name: Some(artist.to_string()),
            album_artist_name: album_artist.map(str::to_string),
            album: album.map(str::to_string),
            ..TrackRecord::default()
        };
        let tree = LibraryTree::from_records(
            Path::new("/media/player/music"),
            vec![
                record("/media/player/music/Low/01.flac", "Low", None, None),
                record("/media/player/music/Comp/01.flac", "Can", Some("Various"), Some("Krautrock")),
                record("/media/player/music/Comp/02.flac", "Neu!", Some("Various"), Some("Krautrock")),
            ],
        )
        .unwrap();
        let mut library = Library::new(tree);
        library.build(true);
        library
    }

    #[test]
    fn test_rockbox_paths_strip_mount() {
        let mapper = PathMapper::new(Target::Rockbox, None, Path::new("/media/player/music"));
        assert_eq!(mapper.map(Path::new("/media/player/music/Low/01.flac")), "/music/Low/01.flac");

        let mounted = PathMapper::new(Target::Rockbox, Some(Path::new("/media")), Path::new("/media/player/music"));
        assert_eq!(mounted.map(Path::new("/media/player/music/Low")), "/player/music/Low");

        let native = PathMapper::new(Target::Native, None, Path::new("/media/player/music"));
        assert_eq!(native.map(Path::new("/media/player/music/Low")), "/media/player/music/Low");
    }

    #[test]
    fn test_link_lines() {
        let library = library();
        let mapper = PathMapper::new(Target::Rockbox, None, library.root_path());

        let low = library.artists["low"].subtrees.iter().next().unwrap();
        assert_eq!(link_line(&library, low, &mapper), "/music/Low/\tLow");

        let can = library.artists["can"].subtrees.iter().next().unwrap();
        assert_eq!(link_line(&library, can, &mapper), "/music/Comp/\tCan in Krautrock by Various");

        let no_album = ArtistSubtree {
            album: None,
            ..can.clone()
        };
        assert_eq!(link_line(&library, &no_album, &mapper), "/music/Comp/\tCan in Various");
    }

    #[test]
    fn test_playlist_deduplicates_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("p.m3u");
        let mapper = PathMapper::new(Target::Native, None, Path::new("/m"));
        let paths = [Path::new("/m/b"), Path::new("/m/a"), Path::new("/m/b")];

        write_playlist(paths, &mapper, &file).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "/m/b\n/m/a\n");
    }

    #[test]
    fn test_write_failure_is_reported_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let mapper = PathMapper::new(Target::Native, None, Path::new("/m"));
        assert!(write_playlist([Path::new("/m/a")], &mapper, &dir.path().join("missing/p.m3u")).is_err());
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(
            strip_html_tags("<p>Low is a <a href=\"x\">band</a>.</p>"),
            "Low is a band."
        );
        assert_eq!(strip_html_tags("1 > 0"), "1 > 0");
    }

    #[test]
    fn test_layout_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = OutputLayout::create(dir.path()).unwrap();
        assert!(layout.a_to_z_links.ends_with("Links/A-Z"));
        assert!(layout.dirs().iter().all(|d| d.is_dir()));
    }
}
