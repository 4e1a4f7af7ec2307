use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::{check_declination, column_index, parse_optional, parse_required};

/// A row of a Gaia source table, as exported from the Gaia archive.
#[derive(Debug, Clone, PartialEq)]
pub struct GaiaStar {
    pub source_id: u64,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub phot_g_mean_mag: Option<f32>,
    pub parallax: Option<f64>,
    /// Proper motion in RA, mu_alpha * cos(delta), mas/yr.
    pub pmra: Option<f64>,
    /// Proper motion in Dec, mas/yr.
    pub pmdec: Option<f64>,
}

/// Read a Gaia CSV export.
///
/// Columns are located by header name: `source_id`, `ra` and `dec` are
/// required; `phot_g_mean_mag`, `parallax`, `pmra` and `pmdec` are optional
/// and empty cells read as `None`.
pub fn read_gaia_csv<P: AsRef<Path>>(file: P) -> anyhow::Result<Vec<GaiaStar>> {
    let path = file.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening Gaia catalog {}", path.display()))?;
    let headers = rdr.headers()?.clone();

    let id_col = column_index(&headers, "source_id")?;
    let ra_col = column_index(&headers, "ra")?;
    let dec_col = column_index(&headers, "dec")?;
    let mag_col = column_index(&headers, "phot_g_mean_mag").ok();
    let plx_col = column_index(&headers, "parallax").ok();
    let pmra_col = column_index(&headers, "pmra").ok();
    let pmdec_col = column_index(&headers, "pmdec").ok();

    let stars = rdr
        .records()
        .map(|result| -> anyhow::Result<GaiaStar> {
            let record = result?;
            let dec_deg: f64 = parse_required(&record, dec_col, "dec")?;
            check_declination(&record, dec_deg)?;
            Ok(GaiaStar {
                source_id: parse_required(&record, id_col, "source_id")?,
                ra_deg: parse_required(&record, ra_col, "ra")?,
                dec_deg,
                phot_g_mean_mag: parse_optional(&record, mag_col),
                parallax: parse_optional(&record, plx_col),
                pmra: parse_optional(&record, pmra_col),
                pmdec: parse_optional(&record, pmdec_col),
            })
        })
        .collect::<anyhow::Result<Vec<GaiaStar>>>()
        .with_context(|| format!("reading Gaia catalog {}", path.display()))?;

    info!("Loaded {} Gaia stars from {}", stars.len(), path.display());
    Ok(stars)
}
