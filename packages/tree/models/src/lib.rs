#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Core tree inventory types shared across the tree-map system.
//!
//! Defines the canonical [`TreeRecord`] produced by the ingestion pipeline,
//! the genus → (color, shape) style assignment, and the resolved
//! [`SchoolConfig`] describing where a school's resources live. All types
//! here are plain data; fetching and normalization live in other crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Marker colors assigned to genera, in palette order.
///
/// CSS color names understood by the map frontend. Assignment cycles
/// through this list in genus first-seen order.
pub const MARKER_COLORS: [&str; 12] = [
    "red",
    "blue",
    "green",
    "purple",
    "orange",
    "darkred",
    "darkblue",
    "darkgreen",
    "cadetblue",
    "pink",
    "black",
    "gray",
];

/// Marker polygon shapes assigned to genera, in palette order.
pub const MARKER_SHAPES: [ShapeSpec; 7] = [
    // triangle
    ShapeSpec {
        sides: 3,
        rotation_deg: 0,
    },
    // diamond
    ShapeSpec {
        sides: 4,
        rotation_deg: 45,
    },
    // pentagon
    ShapeSpec {
        sides: 5,
        rotation_deg: 0,
    },
    // hexagon
    ShapeSpec {
        sides: 6,
        rotation_deg: 0,
    },
    // octagon
    ShapeSpec {
        sides: 8,
        rotation_deg: 0,
    },
    // inverted triangle
    ShapeSpec {
        sides: 3,
        rotation_deg: 180,
    },
    // square
    ShapeSpec {
        sides: 4,
        rotation_deg: 0,
    },
];

/// Display label used wherever a record has no genus or species value.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A regular polygon descriptor used to draw a genus marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSpec {
    /// Number of polygon sides.
    pub sides: u8,
    /// Rotation applied before drawing, in degrees clockwise.
    pub rotation_deg: u16,
}

/// The (color, shape) pair assigned to one genus for a single dataset load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenusStyle {
    /// CSS color name from [`MARKER_COLORS`].
    pub color: String,
    /// Polygon descriptor from [`MARKER_SHAPES`].
    pub shape: ShapeSpec,
}

/// Immutable palette configuration injected into style assignment.
///
/// Kept as configuration rather than mutable module state so repeated
/// loads are deterministic and assignment is testable in isolation.
#[derive(Debug, Clone, Copy)]
pub struct StylePalette {
    /// Colors assigned cyclically in genus first-seen order.
    pub colors: &'static [&'static str],
    /// Shapes assigned cyclically in genus first-seen order.
    pub shapes: &'static [ShapeSpec],
    /// Color used for records with no genus value.
    pub fallback_color: &'static str,
    /// Shape used for records with no genus value.
    pub fallback_shape: ShapeSpec,
}

impl Default for StylePalette {
    fn default() -> Self {
        Self {
            colors: &MARKER_COLORS,
            shapes: &MARKER_SHAPES,
            fallback_color: "gray",
            fallback_shape: ShapeSpec {
                sides: 4,
                rotation_deg: 0,
            },
        }
    }
}

/// Genus → style mapping for one dataset load, preserving first-seen order.
///
/// Within one load the same genus always resolves to the same style. The
/// assignment is *not* stable across loads whose input ordering differs;
/// palette index is purely the ordinal position of first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenusStyleBook {
    order: Vec<String>,
    styles: BTreeMap<String, GenusStyle>,
    fallback: GenusStyle,
}

impl Default for GenusStyleBook {
    /// An empty book: every genus resolves to the fallback style.
    fn default() -> Self {
        Self::assign(Vec::new(), &StylePalette::default())
    }
}

impl GenusStyleBook {
    /// Assigns styles to genera cyclically from the palette.
    ///
    /// `genera` must be the distinct non-empty genus values in first-seen
    /// order; index `i` receives `colors[i % len]` and `shapes[i % len]`.
    /// The empty genus never consumes a palette slot; it resolves to the
    /// palette's fallback style instead.
    #[must_use]
    pub fn assign(genera: Vec<String>, palette: &StylePalette) -> Self {
        let mut styles = BTreeMap::new();

        for (index, genus) in genera.iter().enumerate() {
            styles.insert(
                genus.clone(),
                GenusStyle {
                    color: palette.colors[index % palette.colors.len()].to_string(),
                    shape: palette.shapes[index % palette.shapes.len()],
                },
            );
        }

        Self {
            order: genera,
            styles,
            fallback: GenusStyle {
                color: palette.fallback_color.to_string(),
                shape: palette.fallback_shape,
            },
        }
    }

    /// Resolves the style for a genus, falling back to the unknown style
    /// for genera absent from this load (including the empty genus).
    #[must_use]
    pub fn style_for(&self, genus: &str) -> &GenusStyle {
        self.styles.get(genus).unwrap_or(&self.fallback)
    }

    /// Returns `true` when the genus consumed a palette slot in this load.
    #[must_use]
    pub fn is_known(&self, genus: &str) -> bool {
        self.styles.contains_key(genus)
    }

    /// Legend entries in first-seen order.
    pub fn legend(&self) -> impl Iterator<Item = (&str, &GenusStyle)> {
        self.order
            .iter()
            .filter_map(|genus| self.styles.get(genus).map(|style| (genus.as_str(), style)))
    }

    /// Number of distinct genera that received a palette slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when no genus received a palette slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One normalized tree in the inventory.
///
/// Produced once per load cycle from a parsed row and immutable
/// thereafter; a reload replaces the whole record set rather than
/// mutating it. `tree_code` is unique within a loaded set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    /// Unique code used as the primary key for markers and selection.
    pub tree_code: String,
    /// Latitude in degrees. Always finite.
    pub lat: f64,
    /// Longitude in degrees. Always finite.
    pub lon: f64,
    /// Taxonomic genus; empty when the source row had none.
    pub genus: String,
    /// Taxonomic species; empty when the source row had none.
    pub species: String,
    /// Diameter at breast height, kept as the source's display string.
    pub dbh: Option<String>,
    /// Tree height, kept as the source's display string.
    pub height: Option<String>,
    /// North-south crown extent in meters.
    pub crown_ns: Option<f64>,
    /// East-west crown extent in meters.
    pub crown_ew: Option<f64>,
    /// Derived canopy radius in render pixels at the reference zoom.
    pub canopy_radius: Option<f64>,
    /// Assigned genus color.
    pub color: String,
    /// Assigned genus marker shape.
    pub shape: ShapeSpec,
    /// Photo URL, explicit from the row or derived from the photo
    /// directory convention.
    pub photo_url: Option<String>,
}

impl TreeRecord {
    /// Genus for display, substituting [`UNKNOWN_LABEL`] when empty.
    #[must_use]
    pub fn genus_display(&self) -> &str {
        if self.genus.is_empty() {
            UNKNOWN_LABEL
        } else {
            &self.genus
        }
    }

    /// Case-insensitive substring match against code, genus, and species.
    ///
    /// `needle_lower` must already be lowercased by the caller.
    #[must_use]
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.tree_code.to_lowercase().contains(needle_lower)
            || self.genus.to_lowercase().contains(needle_lower)
            || self.species.to_lowercase().contains(needle_lower)
    }
}

/// Resolved configuration for one school's dataset.
///
/// Immutable once resolved; one instance active per session. URLs are
/// fully joined against the deployment base path by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolConfig {
    /// Registry identifier (e.g. `"wildav"`).
    pub id: String,
    /// Human-readable school name.
    pub name: String,
    /// Street address, when the registry provides one.
    pub address: Option<String>,
    /// School logo image URL.
    pub logo_url: String,
    /// Tree data table URL.
    pub data_url: String,
    /// Boundary overlay URL. The resource itself is optional; the URL is
    /// always derivable.
    pub boundary_url: String,
    /// Photo directory URL used by the `{photos_url}/{tree_code}.jpg`
    /// convention.
    pub photos_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, genus: &str, species: &str) -> TreeRecord {
        TreeRecord {
            tree_code: code.to_string(),
            lat: 40.0,
            lon: -75.0,
            genus: genus.to_string(),
            species: species.to_string(),
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

    #[test]
    fn first_genus_gets_palette_index_zero() {
        let book = GenusStyleBook::assign(
            vec!["Quercus".to_string(), "Acer".to_string()],
            &StylePalette::default(),
        );

        assert_eq!(book.style_for("Quercus").color, MARKER_COLORS[0]);
        assert_eq!(book.style_for("Quercus").shape, MARKER_SHAPES[0]);
        assert_eq!(book.style_for("Acer").color, MARKER_COLORS[1]);
    }

    #[test]
    fn palette_assignment_cycles() {
        let genera: Vec<String> = (0..15).map(|i| format!("Genus{i}")).collect();
        let book = GenusStyleBook::assign(genera, &StylePalette::default());

        // 13th genus wraps to color index 0 and shape index 12 % 7 == 5.
        assert_eq!(book.style_for("Genus12").color, MARKER_COLORS[0]);
        assert_eq!(book.style_for("Genus12").shape, MARKER_SHAPES[5]);
    }

    #[test]
    fn unknown_genus_resolves_to_fallback_without_slot() {
        let book =
            GenusStyleBook::assign(vec!["Quercus".to_string()], &StylePalette::default());

        assert_eq!(book.len(), 1);
        assert!(!book.is_known(""));
        assert_eq!(book.style_for("").color, "gray");
        assert_eq!(
            book.style_for("").shape,
            ShapeSpec {
                sides: 4,
                rotation_deg: 0
            }
        );
    }

    #[test]
    fn legend_preserves_first_seen_order() {
        let book = GenusStyleBook::assign(
            vec![
                "Quercus".to_string(),
                "Acer".to_string(),
                "Betula".to_string(),
            ],
            &StylePalette::default(),
        );

        let genera: Vec<&str> = book.legend().map(|(genus, _)| genus).collect();
        assert_eq!(genera, vec!["Quercus", "Acer", "Betula"]);
    }

    #[test]
    fn genus_display_substitutes_unknown() {
        assert_eq!(record("T1", "", "").genus_display(), UNKNOWN_LABEL);
        assert_eq!(record("T2", "Quercus", "").genus_display(), "Quercus");
    }

    #[test]
    fn matches_is_case_insensitive_across_fields() {
        let r = record("OAK-01", "Quercus", "alba");
        assert!(r.matches("oak"));
        assert!(r.matches("quer"));
        assert!(r.matches("alba"));
        assert!(!r.matches("maple"));
    }
}
