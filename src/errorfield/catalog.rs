//! Catalogs of astrometric error samples and their on-disk formats.
//!
//! The CSV layout is one sample per row with header
//! `ra,dec,modulus,angle,ra_error,dec_error`. Positions, modulus and the
//! RA/Dec errors are in degrees, the angle in radians. When reading, the
//! position is taken from the first two columns and the errors from the
//! last two, so tables with extra columns in between are accepted.

use std::path::Path;

use anyhow::Context;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info};

use crate::summary::median;

/// A sky position with the measured astrometric offset at that position.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct ErrorSample {
    pub ra_rad: f64,
    pub dec_rad: f64,
    /// Offset modulus (angular separation of the matched pair), radians.
    pub modulus_rad: f64,
    /// Offset direction in the RA/Dec plane, radians.
    pub angle_rad: f64,
    /// Offset along RA (not scaled by cos(dec)), radians.
    pub ra_error_rad: f64,
    /// Offset along Dec, radians.
    pub dec_error_rad: f64,
}

/// Configuration for outlier rejection on error samples.
#[derive(Debug, Clone)]
pub struct SigmaClipConfig {
    /// Sigma threshold for iterative outlier rejection. Default 3.0.
    pub sigma_clip: f64,
    /// Maximum clipping iterations. Default 20.
    pub max_iterations: u32,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            sigma_clip: 3.0,
            max_iterations: 20,
        }
    }
}

/// An ordered collection of error samples.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct ErrorCatalog {
    pub samples: Vec<ErrorSample>,
}

impl ErrorCatalog {
    pub fn new(samples: Vec<ErrorSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write the catalog as CSV (degrees, angle in radians).
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating error catalog {}", path.display()))?;
        wtr.write_record(["ra", "dec", "modulus", "angle", "ra_error", "dec_error"])?;
        for s in &self.samples {
            wtr.write_record(&[
                s.ra_rad.to_degrees().to_string(),
                s.dec_rad.to_degrees().to_string(),
                s.modulus_rad.to_degrees().to_string(),
                s.angle_rad.to_string(),
                s.ra_error_rad.to_degrees().to_string(),
                s.dec_error_rad.to_degrees().to_string(),
            ])?;
        }
        wtr.flush()?;
        info!("Wrote {} error samples to {}", self.samples.len(), path.display());
        Ok(())
    }

    /// Read a catalog written by [`write_csv`](Self::write_csv) or a compatible table.
    ///
    /// Rows need at least four columns: `ra, dec, ..., ra_error, dec_error`.
    /// With six or more columns, columns 2 and 3 are read as modulus and angle;
    /// otherwise they are recomputed from the errors.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(path)
            .with_context(|| format!("opening error catalog {}", path.display()))?;

        let samples = rdr
            .records()
            .map(|result| -> anyhow::Result<ErrorSample> {
                let record = result?;
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                let n = record.len();
                if n < 4 {
                    anyhow::bail!("line {}: expected at least 4 columns, found {}", line, n);
                }
                let cell = |i: usize| -> anyhow::Result<f64> {
                    let raw = record.get(i).unwrap_or("");
                    raw.trim()
                        .parse::<f64>()
                        .with_context(|| format!("line {}: cannot parse '{}'", line, raw))
                };

                let ra_error_rad = cell(n - 2)?.to_radians();
                let dec_error_rad = cell(n - 1)?.to_radians();
                let (modulus_rad, angle_rad) = if n >= 6 {
                    (cell(2)?.to_radians(), cell(3)?)
                } else {
                    (
                        ra_error_rad.hypot(dec_error_rad),
                        dec_error_rad.atan2(ra_error_rad),
                    )
                };
                Ok(ErrorSample {
                    ra_rad: cell(0)?.to_radians(),
                    dec_rad: cell(1)?.to_radians(),
                    modulus_rad,
                    angle_rad,
                    ra_error_rad,
                    dec_error_rad,
                })
            })
            .collect::<anyhow::Result<Vec<ErrorSample>>>()
            .with_context(|| format!("reading error catalog {}", path.display()))?;

        info!("Loaded {} error samples from {}", samples.len(), path.display());
        Ok(Self { samples })
    }

    /// Serialize the catalog to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Save the catalog to a file using rkyv.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Saved error catalog to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Load a catalog from an rkyv file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        // Archived data must be aligned; a plain Vec<u8> gives no such guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(&bytes);
        let catalog = rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        info!("Loaded error catalog: {} samples", catalog.len());
        Ok(catalog)
    }

    /// Iteratively reject samples whose modulus deviates from the median by
    /// more than `sigma_clip` robust standard deviations (1.4826 × MAD).
    ///
    /// Returns the kept samples (in original order) and the number rejected.
    pub fn sigma_clip(&self, config: &SigmaClipConfig) -> (ErrorCatalog, usize) {
        let n = self.samples.len();
        let moduli: Vec<f64> = self.samples.iter().map(|s| s.modulus_rad).collect();
        let mut mask = vec![true; n];

        for iter in 0..config.max_iterations {
            let inliers: Vec<f64> = moduli
                .iter()
                .zip(&mask)
                .filter(|(_, &m)| m)
                .map(|(&r, _)| r)
                .collect();
            if inliers.len() < 3 {
                break;
            }

            let med = median(&inliers);
            let abs_devs: Vec<f64> = inliers.iter().map(|&r| (r - med).abs()).collect();
            let sigma = median(&abs_devs) * 1.4826;
            if sigma < 1e-15 {
                break;
            }

            let threshold = config.sigma_clip * sigma;
            let new_mask: Vec<bool> = moduli.iter().map(|&r| (r - med).abs() <= threshold).collect();
            let changed = mask != new_mask;
            mask = new_mask;
            debug!(
                "Sigma clip iteration {}: {} of {} samples kept",
                iter + 1,
                mask.iter().filter(|&&m| m).count(),
                n
            );
            if !changed {
                break;
            }
        }

        let kept: Vec<ErrorSample> = self
            .samples
            .iter()
            .zip(&mask)
            .filter(|(_, &m)| m)
            .map(|(s, _)| *s)
            .collect();
        let rejected = n - kept.len();
        (ErrorCatalog::new(kept), rejected)
    }
}

impl From<Vec<ErrorSample>> for ErrorCatalog {
    fn from(samples: Vec<ErrorSample>) -> Self {
        Self::new(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("cosmos_astrometry_{}_{}", std::process::id(), name))
    }

    fn sample(ra_deg: f64, dec_deg: f64, d_ra_mas: f64, d_dec_mas: f64) -> ErrorSample {
        let d_ra = (d_ra_mas / 3.6e6).to_radians();
        let d_dec = (d_dec_mas / 3.6e6).to_radians();
        ErrorSample {
            ra_rad: ra_deg.to_radians(),
            dec_rad: dec_deg.to_radians(),
            modulus_rad: d_ra.hypot(d_dec),
            angle_rad: d_dec.atan2(d_ra),
            ra_error_rad: d_ra,
            dec_error_rad: d_dec,
        }
    }

    #[test]
    fn csv_preserves_samples() {
        let catalog = ErrorCatalog::new(vec![
            sample(150.1, 2.2, 12.0, -4.0),
            sample(150.3, 2.0, -7.5, 30.0),
        ]);
        let path = tmp_path("errors.csv");
        catalog.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ra,dec,modulus,angle,ra_error,dec_error"));

        let loaded = ErrorCatalog::read_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.len(), 2);
        for (a, b) in catalog.samples.iter().zip(&loaded.samples) {
            assert!((a.ra_rad - b.ra_rad).abs() < 1e-14);
            assert!((a.dec_error_rad - b.dec_error_rad).abs() < 1e-20);
            assert!((a.angle_rad - b.angle_rad).abs() < 1e-14);
        }
    }

    #[test]
    fn csv_reader_uses_last_two_columns_for_errors() {
        let path = tmp_path("errors_extra.csv");
        std::fs::write(
            &path,
            "ra,dec,modulus,angle,flag,ra_error,dec_error\n150.0,2.0,0.1,0.2,7,0.001,0.002\n",
        )
        .unwrap();
        let loaded = ErrorCatalog::read_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let s = loaded.samples[0];
        assert!((s.ra_error_rad - 0.001_f64.to_radians()).abs() < 1e-15);
        assert!((s.dec_error_rad - 0.002_f64.to_radians()).abs() < 1e-15);
        assert!((s.modulus_rad - 0.1_f64.to_radians()).abs() < 1e-15);
    }

    #[test]
    fn csv_reader_recomputes_modulus_for_short_rows() {
        let path = tmp_path("errors_short.csv");
        std::fs::write(&path, "ra,dec,ra_error,dec_error\n150.0,2.0,0.0003,0.0004\n").unwrap();
        let loaded = ErrorCatalog::read_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let s = loaded.samples[0];
        assert!((s.modulus_rad - 0.0005_f64.to_radians()).abs() < 1e-15);
    }

    #[test]
    fn csv_reader_rejects_narrow_rows() {
        let path = tmp_path("errors_narrow.csv");
        std::fs::write(&path, "ra,dec,err\n150.0,2.0,0.1\n").unwrap();
        assert!(ErrorCatalog::read_csv(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rkyv_save_and_load() {
        let catalog = ErrorCatalog::new(vec![sample(150.1, 2.2, 1.0, 2.0)]);
        let path = tmp_path("errors.rkyv");
        catalog.save_to_file(&path).unwrap();
        let loaded = ErrorCatalog::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn sigma_clip_rejects_mismatches() {
        let mut samples: Vec<ErrorSample> = (0..50)
            .map(|i| {
                let wobble = (i as f64 * 0.7).sin() * 2.0;
                sample(150.0 + 0.01 * i as f64, 2.0, 10.0 + wobble, 5.0)
            })
            .collect();
        // Two spurious matches far out in the tail.
        samples.push(sample(150.6, 2.1, 400.0, 300.0));
        samples.push(sample(150.7, 2.1, -350.0, 200.0));

        let (kept, rejected) = ErrorCatalog::new(samples).sigma_clip(&SigmaClipConfig::default());
        assert_eq!(rejected, 2);
        assert_eq!(kept.len(), 50);
        assert!(kept.samples.iter().all(|s| s.modulus_rad < (100.0 / 3.6e6_f64).to_radians()));
    }

    #[test]
    fn sigma_clip_keeps_small_catalogs() {
        let catalog = ErrorCatalog::new(vec![sample(150.0, 2.0, 1.0, 1.0), sample(150.1, 2.0, 900.0, 0.0)]);
        let (kept, rejected) = catalog.sigma_clip(&SigmaClipConfig::default());
        assert_eq!(rejected, 0);
        assert_eq!(kept.len(), 2);
    }
}
