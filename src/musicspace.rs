//! # Music Space
//!
//! An optional geometric embedding of artists. A music-space file holds one
//! comma-separated row per artist:
//!
//! ```text
//! "Björk",87c5dedd-371d-4a53-9f7f-80522fb7f3cb,0.31,1.7,2.2
//! "Low",,1.2,0.4,0.9
//! ```
//!
//! The first two fields name the artist (display name, then MBID or empty), the
//! rest are coordinates. Rows resolve to library artists by the usual identity
//! rule. Once populated, every located artist carries a neighbour list ranked by
//!
//! ```text
//! weight(i, j) = (1 + distance(i, j)) ^ -dropoff
//! ```
//!
//! [`write_skeleton`] emits a file of the same shape for every library artist,
//! ready to be filled in.

use anyhow::{bail, ensure, Context, Result};
use log::{debug, info};
use std::io::{BufRead, Write};

use crate::identity::{is_mbid, Identity};
use crate::library::Library;

/// One parsed row of a music-space file.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicSpaceRow {
    pub name: String,
    pub mbid: Option<String>,
    /// Raw coordinate fields; trailing empty fields are dropped.
    pub fields: Vec<String>,
}

impl MusicSpaceRow {
    /// Coordinates of this row, or `None` if any field is not a number.
    pub fn coordinates(&self) -> Option<Vec<f64>> {
        self.fields.iter().map(|f| f.trim().parse::<f64>().ok()).collect()
    }
}

/// Split one line of comma-separated fields, honouring double quotes.
///
/// Inside quotes a doubled quote stands for a literal one.
///
/// # Errors
///
/// Returns an error if a quoted field is not terminated.
pub fn parse_row(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            (true, c) => field.push(c),
            (false, '"') => quoted = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, c) => field.push(c),
        }
    }
    if quoted {
        bail!("Unterminated quoted field in line: {line}");
    }
    fields.push(field);
    Ok(fields)
}

/// Read every row of a music-space file; rows with fewer than two fields are skipped.
///
/// # Errors
///
/// Returns an error on a read failure or malformed quoting.
pub fn read_rows(reader: impl BufRead) -> Result<Vec<MusicSpaceRow>> {
    let mut rows = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read music-space file")?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = parse_row(line).with_context(|| format!("Music-space line {}", n + 1))?;
        if fields.len() < 2 {
            debug!("Skipping short music-space line {}", n + 1);
            continue;
        }
        while fields.last().is_some_and(|f| f.trim().is_empty()) && fields.len() > 2 {
            fields.pop();
        }
        let coords = fields.split_off(2);
        let mbid = fields.pop().filter(|m| !m.trim().is_empty()).map(|m| m.trim().to_string());
        let name = fields.pop().unwrap_or_default();
        rows.push(MusicSpaceRow {
            name,
            mbid,
            fields: coords,
        });
    }
    Ok(rows)
}

/// Euclidean distance over the dimensions both points have.
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[must_use]
pub fn weight(a: &[f64], b: &[f64], dropoff: f64) -> f64 {
    (1.0 + distance(a, b)).powf(-dropoff)
}

/// Place library artists in music space and rank their neighbours.
///
/// Any earlier placement is cleared first. Returns the number of artists placed.
///
/// # Errors
///
/// Returns an error if `dropoff` is negative or not finite.
pub fn populate(library: &mut Library, rows: &[MusicSpaceRow], dropoff: f64) -> Result<usize> {
    ensure!(
        dropoff.is_finite() && dropoff >= 0.0,
        "Music-space dropoff must be a non-negative number, got {dropoff}"
    );

    for artist in library.artists.values_mut() {
        artist.location.clear();
        artist.neighbours = None;
    }

    let mut located: Vec<Identity> = Vec::new();
    let mut dimension = 0;
    for row in rows {
        let Some(id) = library
            .synonyms
            .identity_for(row.mbid.as_deref(), Some(row.name.as_str()))
        else {
            continue;
        };
        let Some(artist) = library.artists.get_mut(&id) else {
            continue;
        };
        let Some(location) = row.coordinates() else {
            debug!("Discarding unparseable music-space row for {}", row.name);
            continue;
        };
        if location.is_empty() || location.iter().any(|&x| !x.is_finite() || x == 0.0) {
            debug!("Discarding empty, zero or non-finite music-space row for {}", row.name);
            continue;
        }
        dimension = dimension.max(location.len());
        if artist.location.is_empty() {
            located.push(id);
        }
        artist.location = location;
    }
    library.musicspace_dimension = dimension;

    let locations: Vec<(Identity, Vec<f64>)> = located
        .iter()
        .filter_map(|id| library.artists.get(id).map(|a| (id.clone(), a.location.clone())))
        .collect();

    for (id, here) in &locations {
        let mut neighbours: Vec<(Identity, f64)> = locations
            .iter()
            .filter(|(other, _)| other != id)
            .map(|(other, there)| (other.clone(), weight(here, there, dropoff)))
            .collect();
        neighbours.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(artist) = library.artists.get_mut(id) {
            artist.neighbours = Some(neighbours);
        }
    }

    info!(
        "Placed {} artists in {}-dimensional music space",
        locations.len(),
        dimension
    );
    Ok(locations.len())
}

/// Write one row per library artist, padded to the library's dimensionality.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_skeleton(library: &Library, out: &mut impl Write) -> Result<()> {
    for artist in library.artists.values() {
        let mbid = if is_mbid(&artist.id) { artist.id.as_str() } else { "" };
        let coords: Vec<String> = artist.location.iter().map(f64::to_string).collect();
        let padding = library.musicspace_dimension.saturating_sub(artist.location.len());
        writeln!(
            out,
            "\"{}\",{},{}{}",
            artist.name.replace('"', "\"\""),
            mbid,
            coords.join(","),
            ",".repeat(padding)
        )
        .context("Failed to write music-space skeleton")?;
    }
    Ok(())
}
