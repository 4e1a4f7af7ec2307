//! Astrometric error fields: scattered error samples turned into a surface
//! that can be queried anywhere on the sky.
//!
//! Samples are projected onto the gnomonic tangent plane at the catalog's
//! mean direction and triangulated (Delaunay). Queries are projected the same
//! way and interpolated with one of three schemes:
//!
//! - [`Interpolation::Nearest`]: value of the closest sample, defined everywhere.
//! - [`Interpolation::Linear`]: barycentric interpolation, `None` outside the convex hull.
//! - [`Interpolation::Cubic`]: cubic Bézier triangles with estimated vertex
//!   gradients, `None` outside the convex hull.
//!
//! [`ErrorField::estimate_local`] restricts the interpolation to the samples
//! surrounding the query (the `n` nearest, or those within a radius), which
//! keeps the surface local when the field has large-scale structure.

pub mod catalog;
mod interpolate;
pub mod triangulation;

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

pub use catalog::{ErrorCatalog, ErrorSample, SigmaClipConfig};
pub use triangulation::Triangulation;

use crate::sphere::{angular_separation, radec_to_uvec, tan_project, uvec_to_radec, ARCSEC_TO_RAD};
use interpolate::{Gradients, Values};

/// Interpolation scheme used to evaluate an [`ErrorField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    Linear,
    #[default]
    Cubic,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Linear => "linear",
            Interpolation::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

impl FromStr for Interpolation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "linear" => Ok(Interpolation::Linear),
            "cubic" => Ok(Interpolation::Cubic),
            other => anyhow::bail!(
                "unknown interpolation method '{}' (expected nearest, linear or cubic)",
                other
            ),
        }
    }
}

/// Interpolated astrometric error at a sky position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AstrometricError {
    /// Offset along RA (not scaled by cos(dec)), radians.
    pub ra_error_rad: f64,
    /// Offset along Dec, radians.
    pub dec_error_rad: f64,
}

impl AstrometricError {
    pub fn ra_error_arcsec(&self) -> f64 {
        self.ra_error_rad / ARCSEC_TO_RAD
    }

    pub fn dec_error_arcsec(&self) -> f64 {
        self.dec_error_rad / ARCSEC_TO_RAD
    }

    /// Offset modulus in the RA/Dec plane, radians.
    pub fn modulus_rad(&self) -> f64 {
        self.ra_error_rad.hypot(self.dec_error_rad)
    }
}

/// Which samples take part in a local estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalSelection {
    /// The `n` samples nearest to the query position.
    Nearest(usize),
    /// Samples strictly closer than this angular radius, radians.
    Radius(f64),
}

impl Default for LocalSelection {
    fn default() -> Self {
        LocalSelection::Nearest(10)
    }
}

/// An interpolated error surface over a catalog of error samples.
#[derive(Debug, Clone)]
pub struct ErrorField {
    samples: Vec<ErrorSample>,
    /// Tangent point `(ra, dec)` of the projection, radians.
    crval: (f64, f64),
    triangulation: Triangulation,
    values: Vec<Values>,
    gradients: Vec<Gradients>,
}

impl ErrorField {
    /// Build a field from a catalog of samples.
    ///
    /// Samples more than 90° from the catalog's mean direction cannot be
    /// projected and are dropped.
    pub fn new(catalog: ErrorCatalog) -> Self {
        let crval = mean_direction(&catalog.samples);

        let mut samples = Vec::with_capacity(catalog.len());
        let mut plane = Vec::with_capacity(catalog.len());
        for s in catalog.samples {
            match tan_project(s.ra_rad, s.dec_rad, crval.0, crval.1) {
                Some((xi, eta)) => {
                    plane.push([xi, eta]);
                    samples.push(s);
                }
                None => warn!(
                    "Dropping error sample at ({:.5}, {:.5}) deg: not projectable",
                    s.ra_rad.to_degrees(),
                    s.dec_rad.to_degrees()
                ),
            }
        }

        let triangulation = Triangulation::new(&plane);
        let values: Vec<Values> = samples
            .iter()
            .map(|s| [s.ra_error_rad, s.dec_error_rad])
            .collect();
        let gradients = interpolate::estimate_gradients(&triangulation, &values);

        Self {
            samples,
            crval,
            triangulation,
            values,
            gradients,
        }
    }

    pub fn samples(&self) -> &[ErrorSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Tangent point of the internal projection, `(ra, dec)` radians.
    pub fn tangent_point(&self) -> (f64, f64) {
        self.crval
    }

    /// Estimate the astrometric error at `(ra_rad, dec_rad)`.
    ///
    /// Returns `None` for an empty field, or for `Linear`/`Cubic` queries
    /// outside the convex hull of the samples.
    pub fn estimate(
        &self,
        ra_rad: f64,
        dec_rad: f64,
        method: Interpolation,
    ) -> Option<AstrometricError> {
        if self.samples.is_empty() {
            return None;
        }
        let value = match method {
            Interpolation::Nearest => {
                let idx = self.nearest_sample(ra_rad, dec_rad)?;
                self.values[idx]
            }
            Interpolation::Linear => {
                let q = tan_project(ra_rad, dec_rad, self.crval.0, self.crval.1)?;
                let (face, w) = self.triangulation.locate([q.0, q.1])?;
                interpolate::linear(&self.triangulation, face, w, &self.values)
            }
            Interpolation::Cubic => {
                let q = tan_project(ra_rad, dec_rad, self.crval.0, self.crval.1)?;
                let (face, w) = self.triangulation.locate([q.0, q.1])?;
                interpolate::cubic(&self.triangulation, face, w, &self.values, &self.gradients)
            }
        };
        Some(AstrometricError {
            ra_error_rad: value[0],
            dec_error_rad: value[1],
        })
    }

    /// Estimate the error from the samples surrounding the query only.
    ///
    /// The selected samples are triangulated on their own, so the result is
    /// `None` when the query lies outside their convex hull (for `Linear`
    /// and `Cubic`) or when no sample is selected.
    pub fn estimate_local(
        &self,
        ra_rad: f64,
        dec_rad: f64,
        selection: &LocalSelection,
        method: Interpolation,
    ) -> Option<AstrometricError> {
        let subset = self.select(ra_rad, dec_rad, selection);
        if subset.is_empty() {
            return None;
        }
        ErrorField::new(ErrorCatalog::new(subset)).estimate(ra_rad, dec_rad, method)
    }

    /// [`estimate`](Self::estimate) for many `(ra, dec)` positions, in order.
    pub fn estimate_many(
        &self,
        positions: &[(f64, f64)],
        method: Interpolation,
    ) -> Vec<Option<AstrometricError>> {
        let out: Vec<Option<AstrometricError>> = positions
            .iter()
            .map(|&(ra, dec)| self.estimate(ra, dec, method))
            .collect();
        log_coverage(&out, method);
        out
    }

    /// [`estimate_local`](Self::estimate_local) for many `(ra, dec)` positions, in order.
    pub fn estimate_local_many(
        &self,
        positions: &[(f64, f64)],
        selection: &LocalSelection,
        method: Interpolation,
    ) -> Vec<Option<AstrometricError>> {
        let out: Vec<Option<AstrometricError>> = positions
            .iter()
            .map(|&(ra, dec)| self.estimate_local(ra, dec, selection, method))
            .collect();
        log_coverage(&out, method);
        out
    }

    fn nearest_sample(&self, ra_rad: f64, dec_rad: f64) -> Option<usize> {
        self.samples
            .iter()
            .map(|s| angular_separation(ra_rad, dec_rad, s.ra_rad, s.dec_rad))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn select(&self, ra_rad: f64, dec_rad: f64, selection: &LocalSelection) -> Vec<ErrorSample> {
        let mut by_distance: Vec<(f64, usize)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (angular_separation(ra_rad, dec_rad, s.ra_rad, s.dec_rad), i))
            .collect();

        let radius = match *selection {
            LocalSelection::Radius(r) => r,
            LocalSelection::Nearest(n) => {
                by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                if n >= by_distance.len() {
                    f64::INFINITY
                } else {
                    // Strictly closer than the (n+1)-th sample.
                    by_distance[n].0
                }
            }
        };

        let mut picked: Vec<usize> = by_distance
            .into_iter()
            .filter(|&(d, _)| d < radius)
            .map(|(_, i)| i)
            .collect();
        picked.sort_unstable();
        picked.into_iter().map(|i| self.samples[i]).collect()
    }
}

impl From<ErrorCatalog> for ErrorField {
    fn from(catalog: ErrorCatalog) -> Self {
        ErrorField::new(catalog)
    }
}

fn mean_direction(samples: &[ErrorSample]) -> (f64, f64) {
    let sum = samples
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, s| acc + radec_to_uvec(s.ra_rad, s.dec_rad));
    uvec_to_radec(&sum)
}

fn log_coverage(out: &[Option<AstrometricError>], method: Interpolation) {
    let defined = out.iter().filter(|e| e.is_some()).count();
    info!(
        "Interpolated ({}) error at {} of {} positions",
        method,
        defined,
        out.len()
    );
}
