//! Nearest-neighbour cross-matching between two star catalogs.
//!
//! Every star of the *reference* catalog (typically Gaia) is paired with the
//! closest star of the *candidate* catalog (HST or HSC) lying within a match
//! radius. The positional offset `candidate - reference` of each pair is the
//! astrometric error of the candidate survey at the reference position.
//!
//! Matching is nearest-only, not one-to-one: a candidate may be the nearest
//! neighbour of several reference stars. Reference stars without a candidate
//! inside the radius are returned as `unmatched` rather than treated as errors.

use tracing::{debug, info};

use crate::errorfield::ErrorSample;
use crate::sphere::{wrap_ra_difference, ARCSEC_TO_RAD};
use crate::{Star, StarCatalog};

/// Parameters controlling a cross-match.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Maximum separation for a pair to count as a match, arcseconds. Default 1.0.
    pub radius_arcsec: f64,
    /// Faintest reference magnitude considered. None = no cut.
    pub reference_max_magnitude: Option<f32>,
    /// Faintest candidate magnitude considered. None = no cut.
    pub candidate_max_magnitude: Option<f32>,
    /// `nside` of the spatial index built over the candidates. Default 256
    /// (cells of roughly 0.2° on a side).
    pub catalog_nside: u32,
    /// Log a progress line every this many reference stars. Default 3000.
    pub progress_interval: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            radius_arcsec: 1.0,
            reference_max_magnitude: None,
            candidate_max_magnitude: None,
            catalog_nside: 256,
            progress_interval: 3000,
        }
    }
}

impl MatchConfig {
    pub fn radius_rad(&self) -> f64 {
        self.radius_arcsec * ARCSEC_TO_RAD
    }
}

/// A reference star paired with its nearest candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub reference: Star,
    pub candidate: Star,
    /// Great-circle distance between the pair (the offset modulus), radians.
    pub separation_rad: f64,
    /// Direction of the offset in the RA/Dec plane, `atan2(d_dec, d_ra)`, radians.
    pub position_angle_rad: f64,
    /// `candidate.ra - reference.ra`, wrapped into `[-π, π)`. Not scaled by cos(dec).
    pub d_ra_rad: f64,
    /// `candidate.dec - reference.dec`, radians.
    pub d_dec_rad: f64,
}

impl MatchRecord {
    pub(crate) fn new(reference: &Star, candidate: &Star, separation_rad: f64) -> Self {
        let d_ra_rad = wrap_ra_difference(candidate.ra_rad - reference.ra_rad);
        let d_dec_rad = candidate.dec_rad - reference.dec_rad;
        Self {
            reference: reference.clone(),
            candidate: candidate.clone(),
            separation_rad,
            position_angle_rad: d_dec_rad.atan2(d_ra_rad),
            d_ra_rad,
            d_dec_rad,
        }
    }

    pub fn separation_arcsec(&self) -> f64 {
        self.separation_rad / ARCSEC_TO_RAD
    }

    /// RA offset projected on the sky, `d_ra * cos(dec)`, radians.
    pub fn d_ra_cos_dec_rad(&self) -> f64 {
        self.d_ra_rad * self.reference.dec_rad.cos()
    }

    /// Error sample anchored at the reference star.
    pub fn to_error_sample(&self) -> ErrorSample {
        ErrorSample {
            ra_rad: self.reference.ra_rad,
            dec_rad: self.reference.dec_rad,
            modulus_rad: self.separation_rad,
            angle_rad: self.position_angle_rad,
            ra_error_rad: self.d_ra_rad,
            dec_error_rad: self.d_dec_rad,
        }
    }
}

/// Outcome of [`cross_match`].
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// Matched pairs, in reference-catalog order.
    pub matches: Vec<MatchRecord>,
    /// Reference stars with no candidate inside the radius, in reference order.
    pub unmatched: Vec<Star>,
}

impl MatchResult {
    /// Fraction of (magnitude-cut) reference stars that found a match.
    pub fn match_fraction(&self) -> f64 {
        let total = self.matches.len() + self.unmatched.len();
        if total == 0 {
            return 0.0;
        }
        self.matches.len() as f64 / total as f64
    }

    /// One error sample per match, anchored at the reference position.
    pub fn error_samples(&self) -> Vec<ErrorSample> {
        self.matches.iter().map(MatchRecord::to_error_sample).collect()
    }
}

/// Match every reference star to its nearest candidate within the configured radius.
pub fn cross_match(reference: &[Star], candidates: &[Star], config: &MatchConfig) -> MatchResult {
    let radius = config.radius_rad();

    let candidate_stars: Vec<Star> = candidates
        .iter()
        .filter(|s| s.brighter_than(config.candidate_max_magnitude))
        .cloned()
        .collect();
    let candidate_catalog = StarCatalog::new(config.catalog_nside, candidate_stars);

    let reference_stars: Vec<&Star> = reference
        .iter()
        .filter(|s| s.brighter_than(config.reference_max_magnitude))
        .collect();
    let total = reference_stars.len();
    info!(
        "Cross-matching {} reference stars against {} candidates (radius {:.3}\")",
        total,
        candidate_catalog.len(),
        config.radius_arcsec
    );

    let mut result = MatchResult::default();
    for (i, star) in reference_stars.into_iter().enumerate() {
        if config.progress_interval > 0 && i % config.progress_interval == 0 {
            debug!("Point number {} out of {}", i, total);
        }

        match candidate_catalog.nearest(star.ra_rad, star.dec_rad, radius) {
            Some((idx, sep)) => {
                let candidate = &candidate_catalog.stars()[idx];
                result.matches.push(MatchRecord::new(star, candidate, sep));
            }
            None => result.unmatched.push(star.clone()),
        }
    }

    info!(
        "Matched {} of {} reference stars ({:.1}%)",
        result.matches.len(),
        total,
        100.0 * result.match_fraction()
    );
    result
}
