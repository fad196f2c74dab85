//! # Similar-Artist Data
//!
//! Similar artists, top tags and biographies come from an external service behind
//! the [`SimilarityProvider`] trait. [`download_similarity_data`] fetches them for
//! every artist that owns a subtree, on a bounded `rayon` pool:
//!
//! - each artist is fetched at most once per run: results are written once into a
//!   shared [`SimilarityCache`], which also carries results over from earlier runs;
//! - a failing fetch is retried up to `numtries` times with a short pause, then the
//!   artist is left with no similarity data;
//! - raising the stop flag prevents new fetches from starting.
//!
//! No single artist's failure stops the stage.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::artist::SimilarArtist;
use crate::identity::{is_mbid, Identity};
use crate::library::Library;

/// External source of similar-artist lists, tags and biographies.
pub trait SimilarityProvider: Send + Sync {
    /// Canonical service name of the artist with this MBID.
    fn name_for_mbid(&self, mbid: &str) -> Result<String>;

    fn similar_artists(&self, name: &str) -> Result<Vec<SimilarArtist>>;

    /// Tag names, most popular first.
    fn top_tags(&self, name: &str) -> Result<Vec<String>>;

    fn biography(&self, name: &str) -> Result<String>;
}

/// Everything fetched for one artist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub validated_name: Option<String>,
    pub similar: Vec<SimilarArtist>,
    pub tags: Vec<String>,
    pub bio: String,
}

/// Identity -> fetched data; each slot is written at most once.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    slots: Mutex<HashMap<Identity, ArtistInfo>>,
}

impl SimilarityCache {
    pub fn new(initial: BTreeMap<Identity, ArtistInfo>) -> Self {
        Self {
            slots: Mutex::new(initial.into_iter().collect()),
        }
    }

    pub fn get(&self, id: &str) -> Option<ArtistInfo> {
        self.slots.lock().ok().and_then(|slots| slots.get(id).cloned())
    }

    /// Store `info` for `id` unless a value is already present.
    ///
    /// Returns whether the value was stored.
    pub fn insert_once(&self, id: &str, info: ArtistInfo) -> bool {
        match self.slots.lock() {
            Ok(mut slots) => {
                if slots.contains_key(id) {
                    false
                } else {
                    slots.insert(id.to_string(), info);
                    true
                }
            }
            Err(_) => false,
        }
    }

    pub fn into_inner(self) -> BTreeMap<Identity, ArtistInfo> {
        match self.slots.into_inner() {
            Ok(slots) => slots.into_iter().collect(),
            Err(poisoned) => poisoned.into_inner().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Make network queries at all; when false only cached data is used.
    pub query: bool,
    /// Attempts per artist before giving up.
    pub numtries: u32,
    pub pause: Duration,
    /// Worker threads.
    pub threads: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            query: true,
            numtries: 3,
            pause: Duration::from_millis(100),
            threads: 4,
        }
    }
}

/// Counts of how each artist's data was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub cached: usize,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Outcome {
    Cached(ArtistInfo),
    Fetched(ArtistInfo),
    Failed,
    Skipped,
}

/// Fetch one artist's data, retrying on failure.
///
/// Returns `None` once all attempts have failed.
pub fn fetch_artist_info(
    provider: &dyn SimilarityProvider,
    id: &str,
    display_name: &str,
    options: &FetchOptions,
) -> Option<ArtistInfo> {
    let mut validated_name: Option<String> = None;
    let mut validated = !is_mbid(id);

    for attempt in 1..=options.numtries {
        if !validated {
            match provider.name_for_mbid(id) {
                Ok(name) => validated_name = Some(name),
                Err(e) => warn!("Name lookup failed for artist {id}: {e:#}"),
            }
            validated = true;
        }
        let name = validated_name.as_deref().unwrap_or(display_name);
        let status = if validated_name.is_some() { "validated" } else { "unvalidated" };
        let shown_id = if is_mbid(id) { id } else { "no MusicBrainz ID" };

        let result = provider.similar_artists(name).and_then(|similar| {
            let tags = provider.top_tags(name)?;
            let bio = provider.biography(name)?;
            Ok((similar, tags, bio))
        });

        match result {
            Ok((similar, tags, bio)) => {
                info!(
                    "Similar-artist query: {status} name {name} ({shown_id}) got {} artists",
                    similar.len()
                );
                return Some(ArtistInfo {
                    validated_name,
                    similar,
                    tags,
                    bio,
                });
            }
            Err(e) => {
                info!("Similar-artist query: {status} name {name} ({shown_id}) FAILED (attempt {attempt}): {e:#}");
                if attempt < options.numtries {
                    std::thread::sleep(options.pause);
                }
            }
        }
    }
    None
}

/// Fill in similar artists, tags and biography for every artist that owns a
/// subtree, then rebuild the tag index.
///
/// With `provider` absent or `options.query` false, only cached data is applied.
///
/// # Errors
///
/// Returns an error only if the worker pool cannot be created.
pub fn download_similarity_data(
    library: &mut Library,
    provider: Option<&dyn SimilarityProvider>,
    options: &FetchOptions,
    stop: &AtomicBool,
) -> Result<FetchSummary> {
    let targets: Vec<(Identity, String)> = library
        .artists
        .values()
        .filter(|a| !a.subtrees.is_empty())
        .map(|a| (a.id.clone(), a.query_name().to_string()))
        .collect();
    let cache = SimilarityCache::new(std::mem::take(&mut library.similar_cache));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .build()
        .context("Failed to create similarity worker pool")?;

    let outcomes: Vec<(Identity, Outcome)> = pool.install(|| {
        targets
            .par_iter()
            .map(|(id, name)| {
                let outcome = if let Some(info) = cache.get(id) {
                    Outcome::Cached(info)
                } else {
                    match provider {
                        Some(provider) if options.query && !stop.load(Ordering::Relaxed) => {
                            match fetch_artist_info(provider, id, name, options) {
                                Some(info) => {
                                    cache.insert_once(id, info.clone());
                                    Outcome::Fetched(info)
                                }
                                None => {
                                    warn!("Giving up on similar-artist data for {name} after {} attempts", options.numtries);
                                    Outcome::Failed
                                }
                            }
                        }
                        _ => Outcome::Skipped,
                    }
                };
                (id.clone(), outcome)
            })
            .collect()
    });

    let mut summary = FetchSummary::default();
    for (id, outcome) in outcomes {
        let info = match outcome {
            Outcome::Cached(info) => {
                summary.cached += 1;
                info
            }
            Outcome::Fetched(info) => {
                summary.fetched += 1;
                info
            }
            Outcome::Failed => {
                summary.failed += 1;
                continue;
            }
            Outcome::Skipped => {
                summary.skipped += 1;
                continue;
            }
        };
        if let Some(artist) = library.artists.get_mut(&id) {
            artist.validated_name = info.validated_name;
            artist.similar = info.similar;
            artist.tags = info.tags;
            artist.bio = info.bio;
        }
    }

    library.similar_cache = cache.into_inner();
    library.tabulate_tags();
    debug!("Similarity stage: {summary:?}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackRecord;
    use crate::tree::LibraryTree;
    use anyhow::anyhow;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;

    /// Provider failing the first `failures` similar-artist calls for every name.
    struct FlakyProvider {
        failures: usize,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: Mutex::new(HashMap::new()),
                total: AtomicUsize::new(0),
            }
        }
    }

    impl SimilarityProvider for FlakyProvider {
        fn name_for_mbid(&self, _mbid: &str) -> Result<String> {
            Ok("Björk".to_string())
        }

        fn similar_artists(&self, name: &str) -> Result<Vec<SimilarArtist>> {
            self.total.fetch_add(1, Ordering::SeqCst);
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(name.to_string()).or_insert(0);
            *count += 1;
            if *count <= self.failures {
                return Err(anyhow!("service unavailable"));
            }
            Ok(vec![SimilarArtist::new(None, "Ghost Artist")])
        }

        fn top_tags(&self, _name: &str) -> Result<Vec<String>> {
            Ok(vec!["ambient".to_string()])
        }

        fn biography(&self, name: &str) -> Result<String> {
            Ok(format!("<p>{name}</p>"))
        }
    }

    fn options(numtries: u32) -> FetchOptions {
        FetchOptions {
            numtries,
            pause: Duration::from_millis(1),
            threads: 2,
            ..FetchOptions::default()
        }
    }

    fn library() -> Library {
        let records = vec![
            TrackRecord {
                path: PathBuf::from("/music/Bjork/01.flac"),
                artist_name: Some("Björk".to_string()),
                artist_mbid: Some("87c5dedd-371d-4a53-9f7f-80522fb7f3cb".to_string()),
                ..TrackRecord::default()
            },
            TrackRecord {
                path: PathBuf::from("/music/Low/01.flac"),
                artist_name: Some("Low".to_string()),
                ..TrackRecord::default()
            },
        ];
        let mut library = Library::new(LibraryTree::from_records(Path::new("/music"), records).unwrap());
        library.build(true);
        library
    }

    #[test]
    fn test_retry_then_success() {
        let provider = FlakyProvider::new(2);
        let info = fetch_artist_info(&provider, "low", "Low", &options(3)).unwrap();
        assert_eq!(info.similar.len(), 1);
        assert_eq!(info.validated_name, None);
        assert_eq!(provider.total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_retries_yield_none() {
        let provider = FlakyProvider::new(5);
        assert!(fetch_artist_info(&provider, "low", "Low", &options(3)).is_none());
        assert_eq!(provider.total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_mbid_identity_gets_validated_name() {
        let provider = FlakyProvider::new(0);
        let info =
            fetch_artist_info(&provider, "87c5dedd-371d-4a53-9f7f-80522fb7f3cb", "Bjork", &options(1)).unwrap();
        assert_eq!(info.validated_name.as_deref(), Some("Björk"));
    }

    #[test]
    fn test_download_populates_artists_and_cache() {
        let mut library = library();
        let provider = FlakyProvider::new(0);
        let stop = AtomicBool::new(false);

        let summary = download_similarity_data(&mut library, Some(&provider), &options(3), &stop).unwrap();
        assert_eq!(summary.fetched, 2);
        assert_eq!(library.similar_cache.len(), 2);
        assert_eq!(library.artists["low"].tags, vec!["ambient".to_string()]);
        assert_eq!(library.tags["ambient"].artists.len(), 2);

        // A second run reads through the cache without querying.
        let calls_before = provider.total.load(Ordering::SeqCst);
        let summary = download_similarity_data(&mut library, Some(&provider), &options(3), &stop).unwrap();
        assert_eq!(summary.cached, 2);
        assert_eq!(provider.total.load(Ordering::SeqCst), calls_before);
    }

    #[test]
    fn test_failed_artist_does_not_stop_the_stage() {
        let mut library = library();
        let provider = FlakyProvider::new(10);
        let stop = AtomicBool::new(false);

        let summary = download_similarity_data(&mut library, Some(&provider), &options(2), &stop).unwrap();
        assert_eq!(summary.failed, 2);
        assert!(library.artists["low"].similar.is_empty());
        assert!(library.similar_cache.is_empty());
    }

    #[test]
    fn test_stop_flag_and_disabled_queries_skip_fetching() {
        let mut library = library();
        let provider = FlakyProvider::new(0);

        let stop = AtomicBool::new(true);
        let summary = download_similarity_data(&mut library, Some(&provider), &options(3), &stop).unwrap();
        assert_eq!(summary.skipped, 2);

        let stop = AtomicBool::new(false);
        let offline = FetchOptions { query: false, ..options(3) };
        let summary = download_similarity_data(&mut library, Some(&provider), &offline, &stop).unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(provider.total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cache_slots_are_write_once() {
        let cache = SimilarityCache::default();
        assert!(cache.insert_once("low", ArtistInfo { bio: "first".into(), ..ArtistInfo::default() }));
        assert!(!cache.insert_once("low", ArtistInfo { bio: "second".into(), ..ArtistInfo::default() }));
        assert_eq!(cache.get("low").unwrap().bio, "first");
    }
}
