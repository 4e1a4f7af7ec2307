//! Readers for the raw survey catalogs.
//!
//! All readers work on CSV exports and locate columns by header name, so the
//! column order of an export does not matter. Positions are read in degrees.

pub mod gaia;
pub mod survey;

use std::str::FromStr;

use anyhow::Context;

/// Position of a named column in a CSV header.
pub(crate) fn column_index(headers: &csv::StringRecord, name: &str) -> anyhow::Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .with_context(|| format!("missing column '{}'", name))
}

/// Parse a mandatory cell; empty or malformed cells are errors.
pub(crate) fn parse_required<T>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let cell = record
        .get(idx)
        .with_context(|| format!("line {}: missing value for '{}'", line, name))?;
    cell.trim()
        .parse()
        .with_context(|| format!("line {}: cannot parse '{}' as {}", line, cell, name))
}

/// Reject declinations outside [-90, 90] degrees.
pub(crate) fn check_declination(record: &csv::StringRecord, dec_deg: f64) -> anyhow::Result<()> {
    if !(-90.0..=90.0).contains(&dec_deg) {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        anyhow::bail!("line {}: declination {} out of range", line, dec_deg);
    }
    Ok(())
}

/// Parse an optional cell; absent columns, empty or unparseable cells read as `None`.
pub(crate) fn parse_optional<T: FromStr>(record: &csv::StringRecord, idx: Option<usize>) -> Option<T> {
    match idx.and_then(|i| record.get(i)) {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}
