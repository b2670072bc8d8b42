#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tree data ingestion: turns the raw inventory table into typed,
//! styled, map-ready [`TreeRecord`]s.
//!
//! Normalization is defensive because the source tables are
//! hand-maintained field surveys: numeric fields that fail to parse
//! become `None` and the row is kept, with two documented exceptions.
//! Rows without usable coordinates are dropped (a marker cannot be
//! placed for them), and duplicate tree codes are disambiguated with a
//! numeric suffix rather than silently letting the last row win.

use tree_map_tabular::Row;
use tree_map_tree_models::{GenusStyleBook, StylePalette, TreeRecord};

/// Pixels per meter at the map's reference zoom level (18), used to
/// convert crown extents into an on-screen canopy radius.
pub const CANOPY_PIXELS_PER_METER: f64 = 5.0;

/// Errors from the tree data fetch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Tree data fetch failed. Fatal: there is nothing to render.
    #[error("tree data request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration for normalization, injected rather than global so
/// repeated loads are deterministic.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Meters → pixels conversion for the canopy radius.
    pub scale: f64,
    /// Color/shape palettes for genus style assignment.
    pub palette: StylePalette,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            scale: CANOPY_PIXELS_PER_METER,
            palette: StylePalette::default(),
        }
    }
}

/// Derives the on-screen canopy radius from optional crown extents
/// (meters).
///
/// Both extents present: `((ns + ew) / 4) * scale`, the mean of the two
/// half-extents, scaled. One present: `(value / 2) * scale`. Neither:
/// `None`.
#[must_use]
pub fn canopy_radius(crown_ns: Option<f64>, crown_ew: Option<f64>, scale: f64) -> Option<f64> {
    match (crown_ns, crown_ew) {
        (Some(ns), Some(ew)) => Some(((ns + ew) / 4.0) * scale),
        (Some(value), None) | (None, Some(value)) => Some((value / 2.0) * scale),
        (None, None) => None,
    }
}

/// Normalizes parsed rows into styled tree records.
///
/// Genus styles are assigned over the *raw* rows in input order (first
/// occurrence of each non-empty genus claims the next palette slot), so
/// style assignment is unaffected by rows later dropped for bad
/// coordinates. Output record order preserves input row order; the
/// navigator's next/previous sequencing depends on it.
#[must_use]
pub fn normalize(
    rows: &[Row],
    photo_base_url: Option<&str>,
    options: &NormalizeOptions,
) -> (Vec<TreeRecord>, GenusStyleBook) {
    let styles = GenusStyleBook::assign(first_seen_genera(rows), &options.palette);

    let mut records: Vec<TreeRecord> = Vec::with_capacity(rows.len());
    let mut seen_codes = std::collections::BTreeSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;

        let Some((lat, lon)) = parse_coordinates(row) else {
            log::warn!("Row {row_number}: unparseable lat/lon, dropping row");
            continue;
        };

        let raw_code = field(row, &["treecode", "treeCode"])
            .map_or_else(|| format!("tree-{row_number}"), ToString::to_string);
        let tree_code = disambiguate_code(raw_code.clone(), &mut seen_codes, row_number);

        let genus = field(row, &["genus"]).unwrap_or_default().to_string();
        let species = field(row, &["species"]).unwrap_or_default().to_string();
        let style = styles.style_for(&genus);

        let crown_ns = field(row, &["crownNSm", "crownNS"]).and_then(parse_crown_extent);
        let crown_ew = field(row, &["crownEWm", "crownEW"]).and_then(parse_crown_extent);

        // The photo convention is keyed by the code painted on the tree,
        // so a disambiguated duplicate still points at the raw code's
        // photo.
        let photo_url = field(row, &["photoPath"]).map_or_else(
            || photo_base_url.map(|base| format!("{base}/{raw_code}.jpg")),
            |path| Some(path.to_string()),
        );

        records.push(TreeRecord {
            tree_code,
            lat,
            lon,
            species,
            dbh: field(row, &["dbh"]).map(ToString::to_string),
            height: field(row, &["height"]).map(ToString::to_string),
            crown_ns,
            crown_ew,
            canopy_radius: canopy_radius(crown_ns, crown_ew, options.scale),
            color: style.color.clone(),
            shape: style.shape,
            photo_url,
            genus,
        });
    }

    (records, styles)
}

/// Fetches, parses, and normalizes a school's tree data table.
///
/// # Errors
///
/// Returns [`IngestError::Http`] if the fetch fails or returns a
/// non-success status. Unlike the boundary overlay, missing tree data
/// is fatal.
pub async fn load_tree_data(
    client: &reqwest::Client,
    data_url: &str,
    photo_base_url: Option<&str>,
    options: &NormalizeOptions,
) -> Result<(Vec<TreeRecord>, GenusStyleBook), IngestError> {
    log::debug!("Fetching tree data from {data_url}");

    let text = client
        .get(data_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let rows = tree_map_tabular::parse(&text);
    let (records, styles) = normalize(&rows, photo_base_url, options);

    log::info!(
        "Loaded {} trees across {} genera from {data_url}",
        records.len(),
        styles.len()
    );

    Ok((records, styles))
}

fn first_seen_genera(rows: &[Row]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut genera = Vec::new();

    for row in rows {
        if let Some(genus) = field(row, &["genus"])
            && seen.insert(genus.to_string())
        {
            genera.push(genus.to_string());
        }
    }

    genera
}

fn parse_coordinates(row: &Row) -> Option<(f64, f64)> {
    let lat = field(row, &["lat"]).and_then(parse_finite)?;
    let lon = field(row, &["lon"]).and_then(parse_finite)?;
    Some((lat, lon))
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A crown extent is a physical length; a negative value is survey
/// noise and is treated as unparseable so the canopy radius stays
/// non-negative.
fn parse_crown_extent(value: &str) -> Option<f64> {
    parse_finite(value).filter(|v| *v >= 0.0)
}

/// First non-empty value among the accepted header spellings.
fn field<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| row.get(*key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Ensures `tree_code` uniqueness within one load.
///
/// A repeated code gets `-2`, `-3`, ... appended. The registry and the
/// selection cursor both key on the code, so last-write-wins would
/// silently drop markers.
fn disambiguate_code(
    raw: String,
    seen: &mut std::collections::BTreeSet<String>,
    row_number: usize,
) -> String {
    if seen.insert(raw.clone()) {
        return raw;
    }

    let mut suffix = 2;
    loop {
        let candidate = format!("{raw}-{suffix}");
        if seen.insert(candidate.clone()) {
            log::warn!("Row {row_number}: duplicate tree code {raw:?}, renamed to {candidate:?}");
            return candidate;
        }
        suffix += 1;
    }
}
