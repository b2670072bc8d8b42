#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Marker synchronization and selection navigation.
//!
//! [`MarkerSynchronizer`] exclusively owns the rendering surface's
//! overlay state: the per-tree marker registry and the boundary layer.
//! It reconciles them against the loaded record set and keeps the
//! boundary layer alive across asynchronous basemap style swaps without
//! leaking or duplicating elements. [`SelectionNavigator`] owns the
//! selection cursor and the search filter over the same record
//! sequence. Neither component renders UI; camera moves are forwarded
//! to the surface as requests.

pub mod navigate;
pub mod surface;
pub mod sync;

pub use navigate::{SEARCH_DISPLAY_LIMIT, SearchResults, SelectionNavigator};
pub use surface::{
    BasemapStyle, CameraFocus, DETAIL_ZOOM, FLY_DURATION_MS, HeadlessSurface, LngLat, MarkerId,
    MarkerSpec, RenderingSurface, SurfaceError,
};
pub use sync::{MarkerSynchronizer, SyncState};
