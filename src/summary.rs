//! Numeric summaries of a cross-match: offset statistics and histograms.
//!
//! These carry the same information as the diagnostic plots of a matching
//! run (distribution of offset moduli and angles, fraction of matches within
//! a detector pixel) without depending on a plotting stack.

use crate::crossmatch::MatchRecord;
use crate::sphere::ARCSEC_TO_RAD;

/// A named pixel scale used to express offsets in detector pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelScale {
    pub label: String,
    pub arcsec: f64,
}

impl PixelScale {
    pub fn new(label: impl Into<String>, arcsec: f64) -> Self {
        Self {
            label: label.into(),
            arcsec,
        }
    }

    /// HST/ACS WFC, 0.05"/px.
    pub fn hst_acs() -> Self {
        Self::new("HST ACS", 0.05)
    }

    /// Subaru HSC, 0.168"/px.
    pub fn hsc() -> Self {
        Self::new("HSC", 0.168)
    }
}

/// Summary statistics of the matched offsets. Separations are in arcseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub num_matches: usize,
    pub mean_separation_arcsec: f64,
    pub median_separation_arcsec: f64,
    pub rms_separation_arcsec: f64,
    pub max_separation_arcsec: f64,
    /// 1.4826 × median absolute deviation of the separations.
    pub robust_sigma_arcsec: f64,
    /// Mean `d_ra * cos(dec)`, arcseconds.
    pub mean_d_ra_arcsec: f64,
    /// Mean `d_dec`, arcseconds.
    pub mean_d_dec_arcsec: f64,
    /// For each supplied pixel scale, the fraction of matches closer than one pixel.
    pub within_pixel: Vec<(PixelScale, f64)>,
}

impl MatchSummary {
    pub fn from_matches(matches: &[MatchRecord], pixel_scales: &[PixelScale]) -> Self {
        let seps: Vec<f64> = matches.iter().map(|m| m.separation_arcsec()).collect();
        let n = seps.len();

        let mean_sep = mean(&seps);
        let rms = if n == 0 {
            0.0
        } else {
            (seps.iter().map(|s| s * s).sum::<f64>() / n as f64).sqrt()
        };
        let max_sep = seps.iter().cloned().fold(0.0, f64::max);
        let median_sep = median(&seps);
        let abs_devs: Vec<f64> = seps.iter().map(|s| (s - median_sep).abs()).collect();

        let d_ra: Vec<f64> = matches
            .iter()
            .map(|m| m.d_ra_cos_dec_rad() / ARCSEC_TO_RAD)
            .collect();
        let d_dec: Vec<f64> = matches
            .iter()
            .map(|m| m.d_dec_rad / ARCSEC_TO_RAD)
            .collect();

        let within_pixel = pixel_scales
            .iter()
            .map(|scale| {
                let frac = if n == 0 {
                    0.0
                } else {
                    seps.iter().filter(|&&s| s <= scale.arcsec).count() as f64 / n as f64
                };
                (scale.clone(), frac)
            })
            .collect();

        Self {
            num_matches: n,
            mean_separation_arcsec: mean_sep,
            median_separation_arcsec: median_sep,
            rms_separation_arcsec: rms,
            max_separation_arcsec: max_sep,
            robust_sigma_arcsec: 1.4826 * median_of(abs_devs),
            mean_d_ra_arcsec: mean(&d_ra),
            mean_d_dec_arcsec: mean(&d_dec),
            within_pixel,
        }
    }
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges, ascending.
    pub bin_edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Histogram `values` into `n_bins` equal-width bins spanning their range.
    ///
    /// Non-finite values are ignored. The last bin is closed on the right.
    /// If all values are equal a single bin holds them all.
    pub fn new(values: &[f64], n_bins: usize) -> Self {
        let finite: Vec<f64> = values.iter().cloned().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || n_bins == 0 {
            return Self::default();
        }
        let lo = finite.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if hi <= lo {
            return Self {
                bin_edges: vec![lo, hi],
                counts: vec![finite.len()],
            };
        }

        let width = (hi - lo) / n_bins as f64;
        let bin_edges = (0..=n_bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; n_bins];
        for v in finite {
            let idx = (((v - lo) / width).floor() as usize).min(n_bins - 1);
            counts[idx] += 1;
        }
        Self { bin_edges, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Histogram of the offset moduli, arcseconds.
pub fn separation_histogram(matches: &[MatchRecord], n_bins: usize) -> Histogram {
    let seps: Vec<f64> = matches.iter().map(|m| m.separation_arcsec()).collect();
    Histogram::new(&seps, n_bins)
}

/// Histogram of the offset directions, radians.
pub fn position_angle_histogram(matches: &[MatchRecord], n_bins: usize) -> Histogram {
    let angles: Vec<f64> = matches.iter().map(|m| m.position_angle_rad).collect();
    Histogram::new(&angles, n_bins)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn median(values: &[f64]) -> f64 {
    median_of(values.to_vec())
}

fn median_of(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}
