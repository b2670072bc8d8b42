#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! School registry resolution and boundary overlay loading.
//!
//! The registry is a delimited table (`schools.csv`) listing every school
//! with optional per-school resource overrides. When an override column is
//! blank, conventional paths are derived from the school id:
//! `trees/{id}.csv`, `boundaries/{id}.geojson`, `photos/{id}`,
//! `logos/{id}.png`.

use geojson::GeoJson;
use tree_map_tree_models::SchoolConfig;

/// Registry file name, resolved relative to the deployment base URL.
pub const REGISTRY_FILE: &str = "schools.csv";

/// Errors from registry resolution and boundary loading.
#[derive(Debug, thiserror::Error)]
pub enum SchoolError {
    /// Registry fetch failed. Fatal: without the registry no school can
    /// be resolved.
    #[error("school registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested identifier is absent from the registry.
    #[error("school not found: {school_id}")]
    NotFound {
        /// The identifier that failed to resolve.
        school_id: String,
    },

    /// The boundary resource was fetched successfully but its body is not
    /// valid `GeoJSON`. Distinct from an absent boundary, which is not an
    /// error at all.
    #[error("malformed boundary document: {0}")]
    Boundary(#[from] geojson::Error),
}

/// Parses the school registry table into resolved configurations.
///
/// Rows with a blank `id` are skipped with a warning. All resource
/// paths, explicit or conventional, are joined against `base_url`.
#[must_use]
pub fn parse_registry(text: &str, base_url: &str) -> Vec<SchoolConfig> {
    tree_map_tabular::parse(text)
        .iter()
        .filter_map(|row| {
            let id = non_empty(row.get("id"))?.to_string();

            let logo = non_empty(row.get("logo"))
                .map_or_else(|| format!("logos/{id}.png"), ToString::to_string);
            let data_file = non_empty(row.get("data_file"))
                .map_or_else(|| format!("trees/{id}.csv"), ToString::to_string);
            let boundary_file = non_empty(row.get("boundary_file"))
                .map_or_else(|| format!("boundaries/{id}.geojson"), ToString::to_string);
            let photos_folder = non_empty(row.get("photos_folder"))
                .map_or_else(|| format!("photos/{id}"), ToString::to_string);

            Some(SchoolConfig {
                name: non_empty(row.get("school_name")).unwrap_or(&id).to_string(),
                address: non_empty(row.get("address")).map(ToString::to_string),
                logo_url: join_url(base_url, &logo),
                data_url: join_url(base_url, &data_file),
                boundary_url: join_url(base_url, &boundary_file),
                photos_url: join_url(base_url, &photos_folder),
                id,
            })
        })
        .collect()
}

/// Resolves a school id against the parsed registry.
///
/// # Errors
///
/// Returns [`SchoolError::NotFound`] when the identifier is absent.
pub fn resolve<'a>(
    schools: &'a [SchoolConfig],
    school_id: &str,
) -> Result<&'a SchoolConfig, SchoolError> {
    schools
        .iter()
        .find(|school| school.id == school_id)
        .ok_or_else(|| SchoolError::NotFound {
            school_id: school_id.to_string(),
        })
}

/// Fetches and parses the school registry from the deployment base URL.
///
/// # Errors
///
/// Returns [`SchoolError::Http`] if the request fails or returns a
/// non-success status.
pub async fn fetch_registry(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<SchoolConfig>, SchoolError> {
    let url = join_url(base_url, REGISTRY_FILE);
    log::debug!("Fetching school registry from {url}");

    let text = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    Ok(parse_registry(&text, base_url))
}

/// Parses a boundary document body.
///
/// # Errors
///
/// Returns [`SchoolError::Boundary`] when the body is not valid
/// `GeoJSON`.
pub fn parse_boundary(text: &str) -> Result<GeoJson, SchoolError> {
    Ok(text.parse::<GeoJson>()?)
}

/// Loads a school's optional boundary overlay.
///
/// A failed fetch or missing resource yields `Ok(None)` with a logged
/// warning; the pipeline continues without an overlay. A successful
/// fetch whose body fails to parse is an error: the boundary was
/// configured but the document is broken, which should surface rather
/// than be silently dropped.
///
/// # Errors
///
/// Returns [`SchoolError::Boundary`] for a malformed document.
pub async fn load_boundary(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<GeoJson>, SchoolError> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Boundary fetch failed, continuing without one: {url}: {e}");
            return Ok(None);
        }
    };

    if !response.status().is_success() {
        log::warn!(
            "No boundary file at {url} (status {}), continuing without one",
            response.status()
        );
        return Ok(None);
    }

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Boundary body read failed, continuing without one: {url}: {e}");
            return Ok(None);
        }
    };

    parse_boundary(&text).map(Some)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = "\
id,school_name,address,logo,data_file,boundary_file,photos_folder
wildav,Wildwood Avenue School,\"12 Wildwood Ave, Somewhere\",,,,
eastside,Eastside Academy,,art/eastside.svg,custom/eastside_trees.csv,custom/eastside.geojson,imgs/eastside
";

    #[test]
    fn conventional_paths_derive_from_id() {
        let schools = parse_registry(REGISTRY, "https://example.org/app/");
        let wildav = resolve(&schools, "wildav").unwrap();

        assert_eq!(wildav.name, "Wildwood Avenue School");
        assert_eq!(wildav.address.as_deref(), Some("12 Wildwood Ave, Somewhere"));
        assert_eq!(wildav.logo_url, "https://example.org/app/logos/wildav.png");
        assert_eq!(wildav.data_url, "https://example.org/app/trees/wildav.csv");
        assert_eq!(
            wildav.boundary_url,
            "https://example.org/app/boundaries/wildav.geojson"
        );
        assert_eq!(wildav.photos_url, "https://example.org/app/photos/wildav");
    }

    #[test]
    fn explicit_overrides_win_over_conventions() {
        let schools = parse_registry(REGISTRY, "https://example.org");
        let eastside = resolve(&schools, "eastside").unwrap();

        assert_eq!(
            eastside.data_url,
            "https://example.org/custom/eastside_trees.csv"
        );
        assert_eq!(
            eastside.boundary_url,
            "https://example.org/custom/eastside.geojson"
        );
        assert_eq!(eastside.photos_url, "https://example.org/imgs/eastside");
        assert_eq!(eastside.logo_url, "https://example.org/art/eastside.svg");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let schools = parse_registry(REGISTRY, "https://example.org");
        let err = resolve(&schools, "nowhere").unwrap_err();

        assert!(matches!(err, SchoolError::NotFound { school_id } if school_id == "nowhere"));
    }

    #[test]
    fn blank_id_rows_are_skipped() {
        let schools = parse_registry("id,school_name\n,Ghost School\nreal,Real School\n", "/");
        assert_eq!(schools.len(), 1);
        assert_eq!(schools[0].id, "real");
    }

    #[test]
    fn boundary_parses_polygon_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            }]
        }"#;

        assert!(matches!(
            parse_boundary(text).unwrap(),
            GeoJson::FeatureCollection(_)
        ));
    }

    #[test]
    fn malformed_boundary_is_an_error() {
        assert!(matches!(
            parse_boundary("<html>404</html>"),
            Err(SchoolError::Boundary(_))
        ));
    }
}
