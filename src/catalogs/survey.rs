//! Generic reader for HST and HSC source lists.
//!
//! Imaging-survey exports name their columns differently (`ALPHA_J2000`,
//! `ra`, `i_ra`, ...), so the header names are supplied by the caller through
//! [`CatalogColumns`].

use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::{check_declination, column_index, parse_optional, parse_required};
use crate::{Star, Survey};

/// Header names used to read a survey catalog.
#[derive(Debug, Clone)]
pub struct CatalogColumns {
    /// Source identifier column. Optional in the file; rows are numbered
    /// from 0 when absent. Default `"id"`.
    pub id: String,
    /// Right ascension column, degrees. Default `"ra"`.
    pub ra: String,
    /// Declination column, degrees. Default `"dec"`.
    pub dec: String,
    /// Magnitude column. Optional in the file. Default `"mag"`.
    pub mag: String,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            ra: "ra".to_string(),
            dec: "dec".to_string(),
            mag: "mag".to_string(),
        }
    }
}

/// Read an HST or HSC catalog into stars tagged with `survey`.
pub fn read_survey_csv<P: AsRef<Path>>(
    file: P,
    survey: Survey,
    columns: &CatalogColumns,
) -> anyhow::Result<Vec<Star>> {
    let path = file.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {} catalog {}", survey, path.display()))?;
    let headers = rdr.headers()?.clone();

    let id_col = column_index(&headers, &columns.id).ok();
    let ra_col = column_index(&headers, &columns.ra)?;
    let dec_col = column_index(&headers, &columns.dec)?;
    let mag_col = column_index(&headers, &columns.mag).ok();

    let stars = rdr
        .records()
        .enumerate()
        .map(|(row, result)| -> anyhow::Result<Star> {
            let record = result?;
            let id = match id_col {
                Some(col) => parse_required(&record, col, &columns.id)?,
                None => row as u64,
            };
            let ra_deg: f64 = parse_required(&record, ra_col, &columns.ra)?;
            let dec_deg: f64 = parse_required(&record, dec_col, &columns.dec)?;
            check_declination(&record, dec_deg)?;
            Ok(Star {
                id,
                ra_rad: ra_deg.to_radians(),
                dec_rad: dec_deg.to_radians(),
                mag: parse_optional(&record, mag_col).unwrap_or(f32::NAN),
                survey,
            })
        })
        .collect::<anyhow::Result<Vec<Star>>>()
        .with_context(|| format!("reading {} catalog {}", survey, path.display()))?;

    info!("Loaded {} {} stars from {}", stars.len(), survey, path.display());
    Ok(stars)
}
