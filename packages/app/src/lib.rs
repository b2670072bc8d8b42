#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Top-level session orchestration for the tree map.
//!
//! Wires the registry, the ingestion pipeline, the marker synchronizer,
//! and the selection navigator together. This is the only layer that
//! surfaces errors to the user; everything below reports typed failures
//! upward. A load cycle resolves the school, fetches the boundary and
//! tree data concurrently, and applies the result unless a newer load
//! has started in the meantime, in which case the stale result is
//! discarded.

use geojson::GeoJson;
use tree_map_ingest::{IngestError, NormalizeOptions};
use tree_map_map::{
    BasemapStyle, MarkerSynchronizer, RenderingSurface, SearchResults, SelectionNavigator,
    SurfaceError,
};
use tree_map_school::SchoolError;
use tree_map_tree_models::{GenusStyleBook, SchoolConfig, TreeRecord};

/// Fallback school when no identifier is supplied. Overridable from the
/// CLI; kept out of resolution logic itself.
pub const DEFAULT_SCHOOL_ID: &str = "wildav";

/// Errors surfaced by a load cycle.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Registry resolution or boundary parsing failed.
    #[error(transparent)]
    School(#[from] SchoolError),

    /// Tree data fetch failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The rendering surface rejected an operation.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Everything a load cycle fetched, before being applied to the session.
#[derive(Debug)]
pub struct SchoolData {
    /// Normalized tree records in table order.
    pub records: Vec<TreeRecord>,
    /// Genus style assignment for this load.
    pub styles: GenusStyleBook,
    /// Boundary overlay, when the school has one.
    pub boundary: Option<GeoJson>,
}

/// Summary of an applied load, for logging and the UI header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Resolved school id.
    pub school_id: String,
    /// Resolved school display name.
    pub school_name: String,
    /// Number of records applied.
    pub tree_count: usize,
    /// Number of distinct genera that received a palette slot.
    pub genus_count: usize,
    /// Whether a boundary overlay was loaded.
    pub has_boundary: bool,
}

/// Result of applying a fetched load to the session.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The load was current and is now rendered.
    Applied(LoadSummary),
    /// A newer load started while this one was in flight; nothing
    /// changed.
    Superseded,
}

/// One rendering session: registry, synchronizer, navigator, and the
/// load-generation guard.
pub struct Session<S> {
    schools: Vec<SchoolConfig>,
    sync: MarkerSynchronizer<S>,
    nav: SelectionNavigator,
    styles: GenusStyleBook,
    options: NormalizeOptions,
    /// Monotonic load counter. Fetch results carry the generation they
    /// started with; only the newest generation may apply.
    generation: u64,
}

impl<S: RenderingSurface> Session<S> {
    /// Creates a session over a resolved registry and a surface.
    #[must_use]
    pub fn new(surface: S, schools: Vec<SchoolConfig>) -> Self {
        Self {
            schools,
            sync: MarkerSynchronizer::new(surface),
            nav: SelectionNavigator::new(),
            styles: GenusStyleBook::default(),
            options: NormalizeOptions::default(),
            generation: 0,
        }
    }

    /// Resolves a school id against the session's registry.
    ///
    /// # Errors
    ///
    /// Returns [`SchoolError::NotFound`] for an unknown id.
    pub fn resolve(&self, school_id: &str) -> Result<SchoolConfig, AppError> {
        Ok(tree_map_school::resolve(&self.schools, school_id)?.clone())
    }

    /// Starts a new load cycle, returning its generation. Any load
    /// started earlier becomes stale immediately.
    pub const fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Applies fetched data if it is still the newest load.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Surface`] if the marker rebuild fails.
    pub fn apply_load(
        &mut self,
        generation: u64,
        config: &SchoolConfig,
        data: SchoolData,
    ) -> Result<LoadOutcome, AppError> {
        if generation != self.generation {
            log::info!(
                "Discarding stale load for {} (generation {generation}, current {})",
                config.id,
                self.generation
            );
            return Ok(LoadOutcome::Superseded);
        }

        let summary = LoadSummary {
            school_id: config.id.clone(),
            school_name: config.name.clone(),
            tree_count: data.records.len(),
            genus_count: data.styles.len(),
            has_boundary: data.boundary.is_some(),
        };

        self.sync.set_records(&data.records, data.boundary)?;
        self.nav.set_records(data.records);
        self.styles = data.styles;
        self.sync.set_highlight(self.nav.selected_code());

        Ok(LoadOutcome::Applied(summary))
    }

    /// Full load cycle: resolve, fetch concurrently, apply.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] for an unknown school, a failed tree data
    /// fetch, a malformed boundary document, or a surface failure. A
    /// missing boundary is not an error.
    pub async fn load_school(
        &mut self,
        client: &reqwest::Client,
        school_id: &str,
    ) -> Result<LoadOutcome, AppError> {
        let config = self.resolve(school_id)?;
        let generation = self.begin_load();

        let data = fetch_school_data(client, &config, &self.options).await?;

        self.apply_load(generation, &config, data)
    }

    /// Selects a tree by code, forwarding focus and highlight. No-op
    /// for an absent code.
    pub fn select(&mut self, code: &str) {
        if let Some(focus) = self.nav.select(code) {
            self.sync.focus(focus);
        }
        self.sync.set_highlight(self.nav.selected_code());
    }

    /// A marker click reports the clicked record's code; behaves as a
    /// selection.
    pub fn marker_clicked(&mut self, code: &str) {
        self.select(code);
    }

    /// Advances the selection cursor with wraparound.
    pub fn next(&mut self) {
        if let Some(focus) = self.nav.next() {
            self.sync.focus(focus);
            self.sync.set_highlight(self.nav.selected_code());
        }
    }

    /// Moves the selection cursor back with wraparound.
    pub fn previous(&mut self) {
        if let Some(focus) = self.nav.previous() {
            self.sync.focus(focus);
            self.sync.set_highlight(self.nav.selected_code());
        }
    }

    /// Clears the selection and its highlight.
    pub fn clear_selection(&mut self) {
        self.nav.clear();
        self.sync.set_highlight(None);
    }

    /// Runs a search over the loaded records.
    pub fn search(&mut self, query: &str) -> SearchResults<'_> {
        self.nav.search(query)
    }

    /// Requests a basemap swap; returns the request id its completion
    /// signal must carry.
    pub fn change_basemap(&mut self, style: BasemapStyle) -> u64 {
        self.sync.request_basemap(style)
    }

    /// Delivers a basemap swap completion signal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Surface`] if boundary re-attachment fails.
    pub fn basemap_loaded(&mut self, request: u64) -> Result<(), AppError> {
        Ok(self.sync.basemap_loaded(request)?)
    }

    /// The resolved registry.
    #[must_use]
    pub fn schools(&self) -> &[SchoolConfig] {
        &self.schools
    }

    /// The selection navigator.
    #[must_use]
    pub const fn navigator(&self) -> &SelectionNavigator {
        &self.nav
    }

    /// The genus legend for the current load.
    #[must_use]
    pub const fn genus_styles(&self) -> &GenusStyleBook {
        &self.styles
    }

    /// The marker synchronizer.
    #[must_use]
    pub const fn synchronizer(&self) -> &MarkerSynchronizer<S> {
        &self.sync
    }
}

/// Fetches a school's boundary and tree data concurrently.
///
/// Both fetches must complete before the marker build runs; the
/// boundary is optional, the tree data is not.
///
/// # Errors
///
/// Returns [`AppError`] if the tree data fetch fails or the boundary
/// document is malformed.
pub async fn fetch_school_data(
    client: &reqwest::Client,
    config: &SchoolConfig,
    options: &NormalizeOptions,
) -> Result<SchoolData, AppError> {
    let (boundary, data) = futures::join!(
        tree_map_school::load_boundary(client, &config.boundary_url),
        tree_map_ingest::load_tree_data(
            client,
            &config.data_url,
            Some(&config.photos_url),
            options,
        ),
    );

    let boundary = boundary?;
    let (records, styles) = data?;

    Ok(SchoolData {
        records,
        styles,
        boundary,
    })
}
