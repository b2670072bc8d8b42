#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tolerant delimited-text parsing for the tree-map data tables.
//!
//! The published school and tree tables are hand-maintained CSV exports,
//! so parsing is deliberately forgiving: quoted fields may contain the
//! delimiter, field whitespace is trimmed, and row width mismatches are
//! repaired rather than rejected. A strict RFC 4180 reader (e.g. the
//! `csv` crate) rejects exactly the malformed rows these tables contain,
//! which is why this parser exists.

use std::collections::BTreeMap;

/// Field delimiter.
pub const DELIMITER: char = ',';

/// Quote character. Toggles an "inside quotes" flag while scanning a
/// line and is otherwise stripped from the field value.
pub const QUOTE: char = '"';

/// One parsed row: header name → trimmed field value.
pub type Row = BTreeMap<String, String>;

/// Parses delimited text into rows keyed by the header line.
///
/// The first non-blank line is the header; each subsequent non-blank
/// line yields one row. Width mismatches are implementation-defined
/// rather than fatal: a short row is padded with empty strings for its
/// missing trailing fields, and a long row is truncated to the header
/// width. Empty input (no header line) yields an empty result.
#[must_use]
pub fn parse(text: &str) -> Vec<Row> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };

    let headers = parse_line(header_line);

    lines
        .map(|line| {
            let values = parse_line(line);
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = values.get(i).cloned().unwrap_or_default();
                    (header.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Splits one line into trimmed fields, honoring [`QUOTE`] regions.
///
/// A delimiter inside a quoted region is literal. Quote characters
/// themselves never appear in the output.
#[must_use]
pub fn parse_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        if ch == QUOTE {
            in_quotes = !in_quotes;
        } else if ch == DELIMITER && !in_quotes {
            values.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    values.push(current.trim().to_string());

    values
}

/// Serializes rows back into delimited text that [`parse`] reproduces.
///
/// Fields containing the delimiter are wrapped in quotes. Two parser
/// behaviors make the round-trip lossy for some inputs, so the
/// serializer normalizes them away up front: quote characters are
/// stripped (the parser never emits them) and fields are trimmed (the
/// parser trims at field boundaries).
#[must_use]
pub fn serialize(headers: &[&str], rows: &[Row]) -> String {
    let mut out = String::new();

    let header_line: Vec<String> = headers.iter().map(|h| escape_field(h)).collect();
    out.push_str(&header_line.join(","));
    out.push('\n');

    for row in rows {
        let fields: Vec<String> = headers
            .iter()
            .map(|header| escape_field(row.get(*header).map_or("", String::as_str)))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

fn escape_field(value: &str) -> String {
    let cleaned: String = value.chars().filter(|&c| c != QUOTE).collect();
    let cleaned = cleaned.trim();

    if cleaned.contains(DELIMITER) {
        format!("{QUOTE}{cleaned}{QUOTE}")
    } else {
        cleaned.to_string()
    }
}
