//! # musedex Performance Benchmarks
//!
//! Benchmarks for the whole-library passes that dominate a run.
//!
//! ## Benchmark Categories
//!
//! - **Resolution**: identity resolution and artist aggregation over synthetic libraries
//! - **Music Space**: neighbour ranking for growing numbers of placed artists
//! - **Sampling**: similar-artist and music-space playlist drawing
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench resolution
//! cargo bench musicspace
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;
use std::path::{Path, PathBuf};

use musedex::artist::SimilarArtist;
use musedex::library::Library;
use musedex::musicspace::{self, MusicSpaceRow};
use musedex::sampler;
use musedex::track::TrackRecord;
use musedex::tree::LibraryTree;

/// `artists` artists with three albums of ten tracks each; every third artist
/// carries an MBID on its first album only.
fn create_records(artists: usize) -> Vec<TrackRecord> {
    let mut records = Vec::with_capacity(artists * 30);
    for a in 0..artists {
        let name = format!("Artist {a}");
        for album in 0..3 {
            for track in 0..10 {
                let mbid = (a % 3 == 0 && album == 0).then(|| format!("{a:08x}-0000-0000-0000-000000000000"));
                records.push(TrackRecord {
                    path: PathBuf::from(format!("/music/{name}/Album {album}/{track:02}.flac")),
                    artist_name: Some(name.clone()),
                    artist_mbid: mbid,
                    album: Some(format!("Album {album}")),
                    ..TrackRecord::default()
                });
            }
        }
    }
    records
}

fn create_library(artists: usize) -> Library {
    let tree = LibraryTree::from_records(Path::new("/music"), create_records(artists))
        .expect("Failed to build tree");
    let mut library = Library::new(tree);
    library.build(true);
    library
}

fn create_rows(artists: usize) -> Vec<MusicSpaceRow> {
    (0..artists)
        .map(|a| MusicSpaceRow {
            name: format!("Artist {a}"),
            mbid: None,
            fields: vec![format!("{}", 1 + a % 17), format!("{}", 1 + a % 5), format!("{}", 1 + a % 11)],
        })
        .collect()
}

fn benchmark_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for size in [10, 100, 500].iter() {
        let records = create_records(*size);
        group.bench_with_input(BenchmarkId::new("resolve_and_aggregate", size), &records, |b, records| {
            b.iter_batched(
                || LibraryTree::from_records(Path::new("/music"), records.clone()).expect("Failed to build tree"),
                |tree| {
                    let mut library = Library::new(tree);
                    library.build(black_box(true));
                    library
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn benchmark_musicspace(c: &mut Criterion) {
    let mut group = c.benchmark_group("musicspace");

    for size in [10, 100, 300].iter() {
        let library = create_library(*size);
        let rows = create_rows(*size);
        group.bench_with_input(BenchmarkId::new("populate", size), &rows, |b, rows| {
            b.iter_batched(
                || library.clone(),
                |mut library| musicspace::populate(&mut library, black_box(rows), 3.0).expect("populate"),
                BatchSize::LargeInput,
            )
        });
    }

    group.bench_function("weight", |b| {
        b.iter(|| musicspace::weight(black_box(&[1.0, 2.0, 3.0]), black_box(&[4.0, 5.0, 6.0]), 3.0))
    });

    group.finish();
}

fn benchmark_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");

    let mut library = create_library(100);
    musicspace::populate(&mut library, &create_rows(100), 3.0).expect("populate");
    let similar: Vec<SimilarArtist> = (1..20).map(|a| SimilarArtist::new(None, &format!("Artist {a}"))).collect();
    let id = library
        .lookup_identity(None, "Artist 0")
        .cloned()
        .expect("Artist 0 in library");
    if let Some(artist) = library.artists.get_mut(&id) {
        artist.similar = similar;
    }
    let artist = library.artists[&id].clone();

    group.bench_function("similar_playlist", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| sampler::similar_playlist(&library, black_box(&artist), 1000, &mut rng))
    });

    group.bench_function("musicspace_playlist", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| sampler::musicspace_playlist(&library, black_box(&artist), 1000, &mut rng))
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolution, benchmark_musicspace, benchmark_sampling);
criterion_main!(benches);
