//! The rendering-surface seam.
//!
//! The actual map engine (tile loading, pan/zoom, marker placement
//! primitives) is an external collaborator. [`RenderingSurface`] is the
//! narrow interface the synchronizer drives it through, and
//! [`HeadlessSurface`] is the in-process implementation used by the CLI
//! and the test suite.

use std::collections::{BTreeMap, BTreeSet};

use geo::Rect;
use geojson::GeoJson;
use strum_macros::{AsRefStr, Display, EnumString};
use tree_map_tree_models::{ShapeSpec, TreeRecord};

/// Zoom level used when focusing the camera on a single tree.
pub const DETAIL_ZOOM: f64 = 19.0;

/// Smooth-transition duration for camera focus requests.
pub const FLY_DURATION_MS: u64 = 1000;

/// Background tile layer configuration, independent of overlay content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum BasemapStyle {
    /// `OpenStreetMap` raster tiles.
    Osm,
    /// `CartoDB` light raster tiles.
    #[default]
    Cartodb,
    /// Esri World Imagery.
    Satellite,
}

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    /// Longitude in degrees.
    pub lng: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

/// A pan-and-zoom instruction forwarded to the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFocus {
    /// Target center.
    pub center: LngLat,
    /// Target zoom level.
    pub zoom: f64,
    /// Transition duration in milliseconds.
    pub duration_ms: u64,
}

impl CameraFocus {
    /// Standard single-tree focus: center on the tree at detail zoom
    /// with a smooth transition.
    #[must_use]
    pub const fn on_tree(record: &TreeRecord) -> Self {
        Self {
            center: LngLat {
                lng: record.lon,
                lat: record.lat,
            },
            zoom: DETAIL_ZOOM,
            duration_ms: FLY_DURATION_MS,
        }
    }
}

/// Everything the surface needs to draw one tree marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    /// Identity key. The rest of the system addresses markers by tree
    /// code, never by surface internals.
    pub tree_code: String,
    /// Marker position.
    pub position: LngLat,
    /// Genus color.
    pub color: String,
    /// Genus polygon shape.
    pub shape: ShapeSpec,
    /// Canopy circle radius in pixels, when crown extents were known.
    pub canopy_radius: Option<f64>,
}

impl MarkerSpec {
    /// Builds the marker spec for one record.
    #[must_use]
    pub fn for_tree(record: &TreeRecord) -> Self {
        Self {
            tree_code: record.tree_code.clone(),
            position: LngLat {
                lng: record.lon,
                lat: record.lat,
            },
            color: record.color.clone(),
            shape: record.shape,
            canopy_radius: record.canopy_radius,
        }
    }
}

/// Opaque handle to a rendered marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u64);

/// Errors reported by a rendering surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The boundary layer was added while already attached. Most map
    /// engines treat a duplicate layer id as fatal, so the synchronizer
    /// must check presence first.
    #[error("boundary layer is already attached")]
    DuplicateBoundaryLayer,

    /// A marker handle did not resolve to a live marker.
    #[error("unknown marker handle: {0:?}")]
    UnknownMarker(MarkerId),

    /// The boundary layer was removed while not attached. Like the
    /// duplicate add, most map engines treat removing a missing layer
    /// id as fatal, so callers must check presence first.
    #[error("boundary layer is not attached")]
    BoundaryLayerNotAttached,
}

/// The narrow interface the synchronizer drives the map engine through.
///
/// Implementations hold the actual rendering state; the synchronizer is
/// the only caller that mutates overlay content.
pub trait RenderingSurface {
    /// Places a marker, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the surface rejects the marker.
    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerId, SurfaceError>;

    /// Removes a marker by handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownMarker`] for a stale handle.
    fn remove_marker(&mut self, id: MarkerId) -> Result<(), SurfaceError>;

    /// Toggles the selected-marker highlight.
    fn set_marker_highlight(&mut self, id: MarkerId, highlighted: bool);

    /// Whether the boundary layer is currently attached.
    fn has_boundary_layer(&self) -> bool;

    /// Attaches the boundary outline layer.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateBoundaryLayer`] if already
    /// attached.
    fn add_boundary_layer(&mut self, boundary: &GeoJson) -> Result<(), SurfaceError>;

    /// Detaches the boundary outline layer.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::BoundaryLayerNotAttached`] if no layer
    /// is attached.
    fn remove_boundary_layer(&mut self) -> Result<(), SurfaceError>;

    /// Begins an asynchronous basemap swap. Swapping the base style
    /// clears non-marker layers; completion is signalled back to the
    /// synchronizer out of band.
    fn set_basemap(&mut self, style: BasemapStyle);

    /// Fits the viewport to a bounding region.
    fn fit_bounds(&mut self, bounds: Rect<f64>);

    /// Executes a camera focus request.
    fn fly_to(&mut self, focus: CameraFocus);
}

/// In-process rendering surface.
///
/// Mirrors the observable semantics of the real map engine: marker
/// handles, a single boundary layer slot (duplicate add is an error),
/// and basemap swaps that clear attached layers while leaving markers
/// alone. Used by the headless CLI and throughout the test suite.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_id: u64,
    markers: BTreeMap<MarkerId, MarkerSpec>,
    highlighted: BTreeSet<MarkerId>,
    boundary_attached: bool,
    boundary_adds: u64,
    basemap: BasemapStyle,
    fitted: Option<Rect<f64>>,
    camera: Option<CameraFocus>,
}

impl HeadlessSurface {
    /// Number of live markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Marker codes currently highlighted.
    #[must_use]
    pub fn highlighted_codes(&self) -> Vec<&str> {
        self.highlighted
            .iter()
            .filter_map(|id| self.markers.get(id).map(|m| m.tree_code.as_str()))
            .collect()
    }

    /// Total number of successful boundary-layer attaches over the
    /// surface's lifetime.
    #[must_use]
    pub const fn boundary_adds(&self) -> u64 {
        self.boundary_adds
    }

    /// Current basemap style.
    #[must_use]
    pub const fn basemap(&self) -> BasemapStyle {
        self.basemap
    }

    /// The last fitted bounds, if any.
    #[must_use]
    pub const fn fitted_bounds(&self) -> Option<Rect<f64>> {
        self.fitted
    }

    /// The last camera focus request, if any.
    #[must_use]
    pub const fn camera(&self) -> Option<CameraFocus> {
        self.camera
    }
}

impl RenderingSurface for HeadlessSurface {
    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerId, SurfaceError> {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.insert(id, spec.clone());
        Ok(id)
    }

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), SurfaceError> {
        self.highlighted.remove(&id);
        self.markers
            .remove(&id)
            .map(|_| ())
            .ok_or(SurfaceError::UnknownMarker(id))
    }

    fn set_marker_highlight(&mut self, id: MarkerId, highlighted: bool) {
        if highlighted {
            self.highlighted.insert(id);
        } else {
            self.highlighted.remove(&id);
        }
    }

    fn has_boundary_layer(&self) -> bool {
        self.boundary_attached
    }

    fn add_boundary_layer(&mut self, _boundary: &GeoJson) -> Result<(), SurfaceError> {
        if self.boundary_attached {
            return Err(SurfaceError::DuplicateBoundaryLayer);
        }
        self.boundary_attached = true;
        self.boundary_adds += 1;
        Ok(())
    }

    fn remove_boundary_layer(&mut self) -> Result<(), SurfaceError> {
        if !self.boundary_attached {
            return Err(SurfaceError::BoundaryLayerNotAttached);
        }
        self.boundary_attached = false;
        Ok(())
    }

    fn set_basemap(&mut self, style: BasemapStyle) {
        log::debug!("Basemap swap to {style}");
        self.basemap = style;
        // A style swap rebuilds the layer stack; attached overlay layers
        // are gone until re-added. Markers live outside the layer stack.
        self.boundary_attached = false;
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.fitted = Some(bounds);
    }

    fn fly_to(&mut self, focus: CameraFocus) {
        self.camera = Some(focus);
    }
}
