//! Reconciles rendered map state against the loaded record set.
//!
//! The synchronizer is the sole owner of the marker registry and the
//! boundary overlay layer. A record-set replacement tears the registry
//! down and rebuilds it so no marker can outlive its record. Basemap
//! swaps are asynchronous; the boundary layer is re-attached only when
//! the swap's completion signal arrives, and only if it is actually
//! missing, because a duplicate layer add is an error on most map
//! engines.

use std::collections::BTreeMap;

use geo::{BoundingRect, Coord, Rect};
use geojson::GeoJson;
use tree_map_tree_models::TreeRecord;

use crate::surface::{
    BasemapStyle, CameraFocus, MarkerId, MarkerSpec, RenderingSurface, SurfaceError,
};

/// Synchronizer lifecycle for one rendering session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No records applied yet; no fit-view issued.
    Uninitialized,
    /// Markers exist, registry populated, boundary attached if present.
    Ready,
    /// A basemap swap is in flight; waiting on its completion signal.
    StyleTransition,
}

/// Owns the rendered markers and boundary layer for one surface.
pub struct MarkerSynchronizer<S> {
    surface: S,
    registry: BTreeMap<String, MarkerId>,
    boundary: Option<GeoJson>,
    state: SyncState,
    /// Monotonic id for basemap swap requests. A completion signal
    /// carrying an older id belongs to a superseded swap and is
    /// ignored, so each request's signal fires at most once.
    style_request: u64,
    highlighted: Option<String>,
}

impl<S: RenderingSurface> MarkerSynchronizer<S> {
    /// Creates a synchronizer owning `surface`.
    pub const fn new(surface: S) -> Self {
        Self {
            surface,
            registry: BTreeMap::new(),
            boundary: None,
            state: SyncState::Uninitialized,
            style_request: 0,
            highlighted: None,
        }
    }

    /// Replaces the rendered record set.
    ///
    /// Discards the entire marker registry and recreates one marker per
    /// record; stale markers referencing removed records cannot
    /// survive. The previous load's boundary layer is detached the same
    /// way before the new load's boundary (if any) is attached. On the
    /// first non-empty set, computes the focal region
    /// (boundary bounds, else tree-coordinate bounds, else a degenerate
    /// default) and issues a single fit-view instruction.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the surface rejects a marker or
    /// layer operation.
    pub fn set_records(
        &mut self,
        records: &[TreeRecord],
        boundary: Option<GeoJson>,
    ) -> Result<(), SurfaceError> {
        for id in std::mem::take(&mut self.registry).into_values() {
            self.surface.remove_marker(id)?;
        }
        self.highlighted = None;

        if self.surface.has_boundary_layer() {
            self.surface.remove_boundary_layer()?;
        }
        self.boundary = boundary;

        for record in records {
            let id = self.surface.add_marker(&MarkerSpec::for_tree(record))?;
            self.registry.insert(record.tree_code.clone(), id);
        }

        if let Some(boundary) = &self.boundary
            && !self.surface.has_boundary_layer()
        {
            self.surface.add_boundary_layer(boundary)?;
        }

        if self.state == SyncState::Uninitialized && !records.is_empty() {
            let bounds = self
                .boundary
                .as_ref()
                .and_then(boundary_bounds)
                .or_else(|| tree_bounds(records))
                .unwrap_or_else(|| {
                    Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 })
                });
            self.surface.fit_bounds(bounds);
            self.state = SyncState::Ready;
        }

        Ok(())
    }

    /// Requests a basemap swap, returning the request id the completion
    /// signal must carry.
    ///
    /// Markers are independent of basemap layers and are not rebuilt.
    pub fn request_basemap(&mut self, style: BasemapStyle) -> u64 {
        self.style_request += 1;
        log::debug!("Basemap swap #{} to {style}", self.style_request);
        self.surface.set_basemap(style);
        self.state = SyncState::StyleTransition;
        self.style_request
    }

    /// Handles a basemap swap completion signal.
    ///
    /// A signal for a superseded request is ignored. For the current
    /// request, re-attaches the boundary layer if one is loaded and the
    /// swap cleared it. Presence is checked, never counted, so the
    /// re-add is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if re-attaching the boundary layer
    /// fails.
    pub fn basemap_loaded(&mut self, request: u64) -> Result<(), SurfaceError> {
        if request != self.style_request {
            log::debug!(
                "Ignoring stale basemap completion #{request} (current #{})",
                self.style_request
            );
            return Ok(());
        }

        if let Some(boundary) = &self.boundary
            && !self.surface.has_boundary_layer()
        {
            self.surface.add_boundary_layer(boundary)?;
        }

        self.state = SyncState::Ready;
        Ok(())
    }

    /// Applies the selection highlight as a pure function of
    /// `(registry, selected code)`: the previous highlight is cleared
    /// and the new one set through the registry, never via surface-wide
    /// lookups.
    pub fn set_highlight(&mut self, code: Option<&str>) {
        if let Some(previous) = self.highlighted.take()
            && let Some(&id) = self.registry.get(&previous)
        {
            self.surface.set_marker_highlight(id, false);
        }

        if let Some(code) = code
            && let Some(&id) = self.registry.get(code)
        {
            self.surface.set_marker_highlight(id, true);
            self.highlighted = Some(code.to_string());
        }
    }

    /// Forwards a camera focus request to the surface.
    pub fn focus(&mut self, focus: CameraFocus) {
        self.surface.fly_to(focus);
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Number of registered markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether a marker is registered for `code`.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.registry.contains_key(code)
    }

    /// Read access to the owned surface.
    pub const fn surface(&self) -> &S {
        &self.surface
    }
}

/// Union bounding box over every polygon/multipolygon in the boundary
/// document. Non-areal geometries contribute their bounds too; the
/// boundary is otherwise opaque pass-through data.
fn boundary_bounds(boundary: &GeoJson) -> Option<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;

    let mut add_geometry = |geometry: &geojson::Geometry| {
        let Ok(geom) = geo::Geometry::<f64>::try_from(geometry.clone()) else {
            log::warn!("Skipping unconvertible boundary geometry");
            return;
        };
        if let Some(rect) = geom.bounding_rect() {
            bounds = Some(bounds.map_or(rect, |acc| union(acc, rect)));
        }
    };

    match boundary {
        GeoJson::Geometry(geometry) => add_geometry(geometry),
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                add_geometry(geometry);
            }
        }
        GeoJson::FeatureCollection(collection) => {
            for feature in &collection.features {
                if let Some(geometry) = &feature.geometry {
                    add_geometry(geometry);
                }
            }
        }
    }

    bounds
}

/// Bounding box of all tree coordinates.
fn tree_bounds(records: &[TreeRecord]) -> Option<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;

    for record in records {
        let point = Rect::new(
            Coord {
                x: record.lon,
                y: record.lat,
            },
            Coord {
                x: record.lon,
                y: record.lat,
            },
        );
        bounds = Some(bounds.map_or(point, |acc| union(acc, point)));
    }

    bounds
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use tree_map_tree_models::{MARKER_SHAPES, TreeRecord};

    fn record(code: &str, lat: f64, lon: f64) -> TreeRecord {
        TreeRecord {
            tree_code: code.to_string(),
            lat,
            lon,
            genus: "Quercus".to_string(),
            species: "alba".to_string(),
            dbh: None,
            height: None,
            crown_ns: None,
            crown_ew: None,
            canopy_radius: None,
            color: "red".to_string(),
            shape: MARKER_SHAPES[0],
            photo_url: None,
        }
    }

    fn square_boundary() -> GeoJson {
        r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-75.2, 40.0], [-75.0, 40.0], [-75.0, 40.2], [-75.2, 40.2], [-75.2, 40.0]]]
                }
            }]
        }"#
        .parse()
        .unwrap()
    }

    fn sync_with(
        records: &[TreeRecord],
        boundary: Option<GeoJson>,
    ) -> MarkerSynchronizer<HeadlessSurface> {
        let mut sync = MarkerSynchronizer::new(HeadlessSurface::default());
        sync.set_records(records, boundary).unwrap();
        sync
    }

    #[test]
    fn first_load_fits_view_and_becomes_ready() {
        let records = vec![record("T1", 40.1, -75.1), record("T2", 40.15, -75.05)];
        let sync = sync_with(&records, Some(square_boundary()));

        assert_eq!(sync.state(), SyncState::Ready);
        assert_eq!(sync.marker_count(), 2);

        // The boundary box wins over the tree extent.
        let bounds = sync.surface().fitted_bounds().unwrap();
        assert!((bounds.min().x - -75.2).abs() < f64::EPSILON);
        assert!((bounds.max().y - 40.2).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_boundary_falls_back_to_tree_extent() {
        let records = vec![record("T1", 40.1, -75.1), record("T2", 40.3, -75.4)];
        let sync = sync_with(&records, None);

        assert_eq!(sync.state(), SyncState::Ready);
        assert_eq!(sync.surface().marker_count(), 2);

        let bounds = sync.surface().fitted_bounds().unwrap();
        assert!((bounds.min().x - -75.4).abs() < f64::EPSILON);
        assert!((bounds.min().y - 40.1).abs() < f64::EPSILON);
        assert!((bounds.max().x - -75.1).abs() < f64::EPSILON);
        assert!((bounds.max().y - 40.3).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_set_stays_uninitialized() {
        let sync = sync_with(&[], None);

        assert_eq!(sync.state(), SyncState::Uninitialized);
        assert!(sync.surface().fitted_bounds().is_none());
    }

    #[test]
    fn reload_rebuilds_registry_without_stale_markers() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1), record("T2", 40.2, -75.2)], None);

        sync.set_records(&[record("T3", 41.0, -76.0)], None).unwrap();

        assert_eq!(sync.marker_count(), 1);
        assert_eq!(sync.surface().marker_count(), 1);
        assert!(sync.contains("T3"));
        assert!(!sync.contains("T1"));
    }

    #[test]
    fn reload_without_boundary_detaches_the_old_layer() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], Some(square_boundary()));
        assert!(sync.surface().has_boundary_layer());

        sync.set_records(&[record("T2", 41.0, -76.0)], None).unwrap();

        assert!(!sync.surface().has_boundary_layer());
        assert_eq!(sync.surface().boundary_adds(), 1);
    }

    #[test]
    fn reload_with_a_boundary_replaces_the_old_layer() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], Some(square_boundary()));

        sync.set_records(&[record("T2", 41.0, -76.0)], Some(square_boundary()))
            .unwrap();

        assert!(sync.surface().has_boundary_layer());
        // Old layer detached, new one attached; never stacked.
        assert_eq!(sync.surface().boundary_adds(), 2);
    }

    #[test]
    fn boundary_attaches_on_first_load_with_one() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], None);
        assert!(!sync.surface().has_boundary_layer());

        sync.set_records(&[record("T1", 40.1, -75.1)], Some(square_boundary()))
            .unwrap();

        assert!(sync.surface().has_boundary_layer());
    }

    #[test]
    fn consecutive_style_swaps_keep_exactly_one_boundary_layer() {
        let records = vec![record("T1", 40.1, -75.1)];
        let mut sync = sync_with(&records, Some(square_boundary()));

        let first = sync.request_basemap(BasemapStyle::Satellite);
        sync.basemap_loaded(first).unwrap();
        let second = sync.request_basemap(BasemapStyle::Osm);
        sync.basemap_loaded(second).unwrap();

        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync.surface().has_boundary_layer());
        assert_eq!(sync.surface().marker_count(), records.len());
        // Attached once at load, once per completed swap; never doubled.
        assert_eq!(sync.surface().boundary_adds(), 3);
    }

    #[test]
    fn stale_style_completion_is_ignored() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], Some(square_boundary()));

        let first = sync.request_basemap(BasemapStyle::Satellite);
        let second = sync.request_basemap(BasemapStyle::Osm);

        // The superseded swap's signal arrives late and does nothing.
        sync.basemap_loaded(first).unwrap();
        assert_eq!(sync.state(), SyncState::StyleTransition);
        assert!(!sync.surface().has_boundary_layer());

        sync.basemap_loaded(second).unwrap();
        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync.surface().has_boundary_layer());
    }

    #[test]
    fn style_swap_without_boundary_completes_cleanly() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], None);

        let request = sync.request_basemap(BasemapStyle::Osm);
        sync.basemap_loaded(request).unwrap();

        assert_eq!(sync.state(), SyncState::Ready);
        assert!(!sync.surface().has_boundary_layer());
    }

    #[test]
    fn highlight_follows_selection_through_registry() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1), record("T2", 40.2, -75.2)], None);

        sync.set_highlight(Some("T1"));
        assert_eq!(sync.surface().highlighted_codes(), vec!["T1"]);

        sync.set_highlight(Some("T2"));
        assert_eq!(sync.surface().highlighted_codes(), vec!["T2"]);

        sync.set_highlight(None);
        assert!(sync.surface().highlighted_codes().is_empty());
    }

    #[test]
    fn highlighting_an_absent_code_is_a_no_op() {
        let mut sync = sync_with(&[record("T1", 40.1, -75.1)], None);

        sync.set_highlight(Some("ghost"));
        assert!(sync.surface().highlighted_codes().is_empty());
    }
}
