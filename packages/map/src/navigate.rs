//! Selection cursor and search over the loaded record sequence.
//!
//! The navigator holds its own handle on the ordered record sequence a
//! selection was made against, so next/previous stay consistent even
//! while a reload is in flight elsewhere. Selection always points at a
//! record present in the current set or is null; selecting an absent
//! code is a no-op, not an error.

use tree_map_tree_models::TreeRecord;

use crate::surface::CameraFocus;

/// Maximum number of search matches surfaced to the display. A display
/// policy, not a data contract: the remaining-match count is reported
/// alongside.
pub const SEARCH_DISPLAY_LIMIT: usize = 20;

/// A capped, order-preserving view of the records matching a query.
#[derive(Debug)]
pub struct SearchResults<'a> {
    /// Matches to display, in original record order, at most
    /// [`SEARCH_DISPLAY_LIMIT`].
    pub visible: Vec<&'a TreeRecord>,
    /// Number of further matches beyond the display cap.
    pub hidden: usize,
}

impl SearchResults<'_> {
    /// Total number of matches, shown and hidden.
    #[must_use]
    pub fn total(&self) -> usize {
        self.visible.len() + self.hidden
    }
}

/// Owns the "currently selected tree" cursor and the search query.
#[derive(Debug, Default)]
pub struct SelectionNavigator {
    records: Vec<TreeRecord>,
    selected: Option<usize>,
    query: String,
}

impl SelectionNavigator {
    /// Creates an empty navigator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            selected: None,
            query: String::new(),
        }
    }

    /// Replaces the record sequence on a new load.
    ///
    /// The selection is re-resolved by code against the new sequence
    /// and cleared when the code no longer exists, keeping the
    /// invariant that a selection always points into the loaded set.
    pub fn set_records(&mut self, records: Vec<TreeRecord>) {
        let previous_code = self.selected_code().map(ToString::to_string);
        self.records = records;
        self.selected = previous_code
            .and_then(|code| self.records.iter().position(|r| r.tree_code == code));
    }

    /// Selects the record with `code`, returning the camera focus
    /// request for it. Selecting a code absent from the set is a no-op.
    pub fn select(&mut self, code: &str) -> Option<CameraFocus> {
        let index = self.records.iter().position(|r| r.tree_code == code)?;
        self.selected = Some(index);
        Some(CameraFocus::on_tree(&self.records[index]))
    }

    /// Moves the selection forward with wraparound. No-op without a
    /// selection or with an empty sequence.
    pub fn next(&mut self) -> Option<CameraFocus> {
        self.step(1)
    }

    /// Moves the selection backward with wraparound. No-op without a
    /// selection or with an empty sequence.
    pub fn previous(&mut self) -> Option<CameraFocus> {
        self.step(-1)
    }

    /// Clears the selection.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Stores and runs a search query: case-insensitive substring match
    /// against code, genus, and species, preserving original order. An
    /// empty query matches every record.
    pub fn search(&mut self, query: &str) -> SearchResults<'_> {
        self.query = query.to_string();
        let needle = query.to_lowercase();

        let mut matches = self
            .records
            .iter()
            .filter(|record| needle.is_empty() || record.matches(&needle));

        let visible: Vec<&TreeRecord> = matches.by_ref().take(SEARCH_DISPLAY_LIMIT).collect();
        let hidden = matches.count();

        SearchResults { visible, hidden }
    }

    /// The stored search query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The selected record, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&TreeRecord> {
        self.selected.and_then(|index| self.records.get(index))
    }

    /// The selected record's code, if any.
    #[must_use]
    pub fn selected_code(&self) -> Option<&str> {
        self.selected().map(|record| record.tree_code.as_str())
    }

    /// The full record sequence in load order.
    #[must_use]
    pub fn records(&self) -> &[TreeRecord] {
        &self.records
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn step(&mut self, delta: isize) -> Option<CameraFocus> {
        if self.records.is_empty() {
            return None;
        }
        let current = self.selected?;

        let len = self.records.len();
        let next = (current as isize + delta).rem_euclid(len as isize) as usize;

        self.selected = Some(next);
        Some(CameraFocus::on_tree(&self.records[next]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::DETAIL_ZOOM;
    use tree_map_tree_models::MARKER_SHAPES;

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

    fn navigator() -> SelectionNavigator {
        let mut nav = SelectionNavigator::new();
        nav.set_records(vec![
            record("T1", "Quercus", "alba"),
            record("T2", "Acer", "rubrum"),
            record("T3", "Quercus", "rubra"),
        ]);
        nav
    }

    #[test]
    fn select_focuses_camera_at_detail_zoom() {
        let mut nav = navigator();

        let focus = nav.select("T2").unwrap();
        assert_eq!(nav.selected_code(), Some("T2"));
        assert!((focus.zoom - DETAIL_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn selecting_an_absent_code_is_a_no_op() {
        let mut nav = navigator();
        nav.select("T1").unwrap();

        assert!(nav.select("ghost").is_none());
        assert_eq!(nav.selected_code(), Some("T1"));
    }

    #[test]
    fn next_wraps_from_last_to_first() {
        let mut nav = navigator();
        nav.select("T3").unwrap();

        nav.next().unwrap();
        assert_eq!(nav.selected_code(), Some("T1"));
    }

    #[test]
    fn previous_wraps_from_first_to_last() {
        let mut nav = navigator();
        nav.select("T1").unwrap();

        nav.previous().unwrap();
        assert_eq!(nav.selected_code(), Some("T3"));
    }

    #[test]
    fn navigation_without_selection_is_a_no_op() {
        let mut nav = navigator();

        assert!(nav.next().is_none());
        assert!(nav.previous().is_none());
        assert!(nav.selected_code().is_none());
    }

    #[test]
    fn navigation_on_empty_sequence_is_a_no_op() {
        let mut nav = SelectionNavigator::new();

        assert!(nav.next().is_none());
        assert!(nav.previous().is_none());
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let mut nav = SelectionNavigator::new();
        nav.set_records(vec![
            record("T1", "Oak", "alba"),
            record("T2", "Maple", "Oaktree"),
            record("T3", "Betula", "pendula"),
        ]);

        let results = nav.search("oak");
        let codes: Vec<&str> = results.visible.iter().map(|r| r.tree_code.as_str()).collect();
        assert_eq!(codes, vec!["T1", "T2"]);
        assert_eq!(results.hidden, 0);
    }

    #[test]
    fn empty_query_returns_the_full_sequence() {
        let mut nav = navigator();

        let results = nav.search("");
        assert_eq!(results.visible.len(), 3);
        assert_eq!(results.total(), 3);
    }

    #[test]
    fn matching_nothing_is_empty_not_an_error() {
        let mut nav = navigator();

        let results = nav.search("sequoia");
        assert!(results.visible.is_empty());
        assert_eq!(results.total(), 0);
    }

    #[test]
    fn search_caps_visible_results_and_counts_the_rest() {
        let mut nav = SelectionNavigator::new();
        nav.set_records(
            (0..25)
                .map(|i| record(&format!("T{i}"), "Quercus", "alba"))
                .collect(),
        );

        let results = nav.search("quercus");
        assert_eq!(results.visible.len(), SEARCH_DISPLAY_LIMIT);
        assert_eq!(results.hidden, 5);
        assert_eq!(results.total(), 25);
        // Original order preserved under the cap.
        assert_eq!(results.visible[0].tree_code, "T0");
    }

    #[test]
    fn reload_preserves_selection_when_code_survives() {
        let mut nav = navigator();
        nav.select("T2").unwrap();

        nav.set_records(vec![record("T2", "Acer", "rubrum"), record("T9", "Pinus", "")]);
        assert_eq!(nav.selected_code(), Some("T2"));

        nav.set_records(vec![record("T9", "Pinus", "")]);
        assert!(nav.selected_code().is_none());
    }

    #[test]
    fn clear_nulls_the_selection() {
        let mut nav = navigator();
        nav.select("T1").unwrap();

        nav.clear();
        assert!(nav.selected().is_none());
    }
}
