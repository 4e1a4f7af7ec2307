//! Per-survey astrometric error model for the COSMOS field.
//!
//! Holds one [`ErrorField`] for HST and one for HSC, both measured against
//! Gaia. The fields are either built from the raw catalogs
//! ([`SurveyErrorModel::build`]) or loaded from previously written results
//! (`HST_astrometric_errors.csv` and `HSC_astrometric_errors.csv`).
//!
//! Building also returns the raw [`SurveyMatches`], from which callers derive
//! [`MatchSummary`](crate::MatchSummary) statistics and histograms.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::crossmatch::{cross_match, MatchConfig, MatchResult};
use crate::errorfield::{AstrometricError, ErrorCatalog, ErrorField, Interpolation, SigmaClipConfig};
use crate::{Star, Survey};

/// File name of the HST-vs-Gaia error catalog inside a results directory.
pub const HST_ERRORS_FILE: &str = "HST_astrometric_errors.csv";
/// File name of the HSC-vs-Gaia error catalog inside a results directory.
pub const HSC_ERRORS_FILE: &str = "HSC_astrometric_errors.csv";

/// Errors of both surveys at one sky position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurveyErrors {
    pub hst: Option<AstrometricError>,
    pub hsc: Option<AstrometricError>,
}

/// Gaia cross-match results for both surveys.
#[derive(Debug, Clone, Default)]
pub struct SurveyMatches {
    pub hst: MatchResult,
    pub hsc: MatchResult,
}

impl SurveyMatches {
    pub fn get(&self, survey: Survey) -> Option<&MatchResult> {
        match survey {
            Survey::Hst => Some(&self.hst),
            Survey::Hsc => Some(&self.hsc),
            Survey::Gaia => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurveyErrorModel {
    hst: ErrorField,
    hsc: ErrorField,
}

impl SurveyErrorModel {
    pub fn new(hst: ErrorCatalog, hsc: ErrorCatalog) -> Self {
        Self {
            hst: ErrorField::new(hst),
            hsc: ErrorField::new(hsc),
        }
    }

    /// Load both error catalogs from a results directory.
    pub fn load<P: AsRef<Path>>(results_dir: P) -> anyhow::Result<Self> {
        let dir = results_dir.as_ref();
        let hst = ErrorCatalog::read_csv(dir.join(HST_ERRORS_FILE))
            .with_context(|| format!("loading HST errors from {}", dir.display()))?;
        let hsc = ErrorCatalog::read_csv(dir.join(HSC_ERRORS_FILE))
            .with_context(|| format!("loading HSC errors from {}", dir.display()))?;
        Ok(Self::new(hst, hsc))
    }

    /// Match HST and HSC against Gaia and build both error fields.
    ///
    /// Gaia is the reference catalog, so every sample sits at a Gaia position
    /// and holds the survey-minus-Gaia offset. Every match is kept; use
    /// [`from_matches`](Self::from_matches) to rebuild with outlier rejection.
    pub fn build(
        gaia: &[Star],
        hst: &[Star],
        hsc: &[Star],
        config: &MatchConfig,
    ) -> (Self, SurveyMatches) {
        let matches = SurveyMatches {
            hst: match_survey(gaia, hst, Survey::Hst, config),
            hsc: match_survey(gaia, hsc, Survey::Hsc, config),
        };
        (Self::from_matches(&matches, None), matches)
    }

    /// Build both error fields from existing matches, optionally sigma-clipping
    /// each survey's samples first.
    pub fn from_matches(matches: &SurveyMatches, clip: Option<&SigmaClipConfig>) -> Self {
        let to_catalog = |survey: Survey, result: &MatchResult| {
            let catalog = ErrorCatalog::new(result.error_samples());
            match clip {
                Some(config) => {
                    let (kept, rejected) = catalog.sigma_clip(config);
                    info!("Rejected {} of {} {} error samples", rejected, catalog.len(), survey);
                    kept
                }
                None => catalog,
            }
        };
        Self::new(
            to_catalog(Survey::Hst, &matches.hst),
            to_catalog(Survey::Hsc, &matches.hsc),
        )
    }

    /// Write both error catalogs into `results_dir`, creating it if needed.
    pub fn write_results<P: AsRef<Path>>(&self, results_dir: P) -> anyhow::Result<()> {
        let dir = results_dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating results directory {}", dir.display()))?;
        ErrorCatalog::new(self.hst.samples().to_vec()).write_csv(dir.join(HST_ERRORS_FILE))?;
        ErrorCatalog::new(self.hsc.samples().to_vec()).write_csv(dir.join(HSC_ERRORS_FILE))?;
        Ok(())
    }

    pub fn field(&self, survey: Survey) -> Option<&ErrorField> {
        match survey {
            Survey::Hst => Some(&self.hst),
            Survey::Hsc => Some(&self.hsc),
            Survey::Gaia => None,
        }
    }

    /// Errors of HST and HSC relative to Gaia at `(ra_rad, dec_rad)`.
    pub fn errors_at(&self, ra_rad: f64, dec_rad: f64, method: Interpolation) -> SurveyErrors {
        SurveyErrors {
            hst: self.hst.estimate(ra_rad, dec_rad, method),
            hsc: self.hsc.estimate(ra_rad, dec_rad, method),
        }
    }
}

fn match_survey(gaia: &[Star], survey_stars: &[Star], survey: Survey, config: &MatchConfig) -> MatchResult {
    info!("Matching {} against Gaia", survey);
    cross_match(gaia, survey_stars, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errorfield::ErrorSample;
    use crate::sphere::ARCSEC_TO_RAD;

    fn constant_catalog(d_ra_arcsec: f64, d_dec_arcsec: f64) -> ErrorCatalog {
        let samples = (0..30)
            .map(|i| {
                let k = i as f64 + 1.0;
                let ra = 149.6 + (k * 0.754_877_666).fract();
                let dec = 1.7 + (k * 0.569_840_291).fract();
                let d_ra = d_ra_arcsec * ARCSEC_TO_RAD;
                let d_dec = d_dec_arcsec * ARCSEC_TO_RAD;
                ErrorSample {
                    ra_rad: f64::to_radians(ra),
                    dec_rad: f64::to_radians(dec),
                    modulus_rad: d_ra.hypot(d_dec),
                    angle_rad: d_dec.atan2(d_ra),
                    ra_error_rad: d_ra,
                    dec_error_rad: d_dec,
                }
            })
            .collect();
        ErrorCatalog::new(samples)
    }

    #[test]
    fn hst_and_hsc_use_their_own_catalogs() {
        let model = SurveyErrorModel::new(constant_catalog(0.01, 0.02), constant_catalog(-0.05, 0.03));
        let errors = model.errors_at(
            150.1_f64.to_radians(),
            2.2_f64.to_radians(),
            Interpolation::Linear,
        );
        let hst = errors.hst.expect("HST error should be defined");
        let hsc = errors.hsc.expect("HSC error should be defined");
        assert!((hst.ra_error_arcsec() - 0.01).abs() < 1e-9);
        assert!((hst.dec_error_arcsec() - 0.02).abs() < 1e-9);
        assert!((hsc.ra_error_arcsec() + 0.05).abs() < 1e-9);
        assert!((hsc.dec_error_arcsec() - 0.03).abs() < 1e-9);
        assert!(model.field(Survey::Gaia).is_none());
    }

    #[test]
    fn results_directory_roundtrip() {
        let model = SurveyErrorModel::new(constant_catalog(0.01, 0.0), constant_catalog(0.0, 0.04));
        let dir = std::env::temp_dir().join(format!("cosmos_astrometry_results_{}", std::process::id()));
        model.write_results(&dir).unwrap();
        assert!(dir.join(HST_ERRORS_FILE).exists());
        assert!(dir.join(HSC_ERRORS_FILE).exists());

        let loaded = SurveyErrorModel::load(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let errors = loaded.errors_at(150.1_f64.to_radians(), 2.2_f64.to_radians(), Interpolation::Nearest);
        assert!((errors.hst.unwrap().ra_error_arcsec() - 0.01).abs() < 1e-9);
        assert!((errors.hsc.unwrap().dec_error_arcsec() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn from_matches_clips_each_survey() {
        use crate::crossmatch::MatchRecord;
        use crate::Star;

        let star = |id: u64, ra_deg: f64, dec_deg: f64, survey: Survey| Star {
            id,
            ra_rad: ra_deg.to_radians(),
            dec_rad: dec_deg.to_radians(),
            mag: 20.0,
            survey,
        };
        let records = |survey: Survey, outliers: usize| -> MatchResult {
            let matches = (0..40_u64)
                .map(|i| {
                    let k = i as f64 + 1.0;
                    let ra = 149.6 + (k * 0.754_877_666).fract();
                    let dec = 1.7 + (k * 0.569_840_291).fract();
                    let jitter = 0.002 * (k * 1.7).sin();
                    let offset = if (i as usize) < outliers { 0.4 } else { 0.05 + jitter };
                    let reference = star(i, ra, dec, Survey::Gaia);
                    let candidate = star(i, ra, dec + offset / 3600.0, survey);
                    let sep = crate::sphere::angular_separation(
                        reference.ra_rad,
                        reference.dec_rad,
                        candidate.ra_rad,
                        candidate.dec_rad,
                    );
                    MatchRecord::new(&reference, &candidate, sep)
                })
                .collect();
            MatchResult {
                matches,
                unmatched: Vec::new(),
            }
        };
        let matches = SurveyMatches {
            hst: records(Survey::Hst, 0),
            hsc: records(Survey::Hsc, 3),
        };
        assert_eq!(matches.get(Survey::Hsc).map(|m| m.matches.len()), Some(40));
        assert!(matches.get(Survey::Gaia).is_none());

        let raw = SurveyErrorModel::from_matches(&matches, None);
        assert_eq!(raw.field(Survey::Hsc).map(|f| f.len()), Some(40));

        let clipped = SurveyErrorModel::from_matches(&matches, Some(&SigmaClipConfig::default()));
        assert_eq!(clipped.field(Survey::Hst).map(|f| f.len()), Some(40));
        assert_eq!(clipped.field(Survey::Hsc).map(|f| f.len()), Some(37));
    }

    #[test]
    fn missing_results_are_an_error() {
        assert!(SurveyErrorModel::load("/nonexistent/results").is_err());
    }
}
