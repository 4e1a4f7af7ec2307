//! Spatial star catalog optimized for fast cone (angular-radius) searches.
//!
//! `StarCatalog` stores stars in an equal-area ring binning:
//! latitude is partitioned into `3 * nside` bins in `z = sin(dec)`, and
//! longitude into `4 * nside` bins in right ascension, for a total of
//! `12 * nside^2` cells. Each cell maps to a compact slice of star indices.
//!
//! Query flow:
//! 1. Compute candidate cells intersecting the cone around a pointing direction.
//! 2. Scan only stars in those cells.
//! 3. Prefilter with a padded dot-product threshold, then apply the exact
//!    angular test.
//!
//! Cross-matching uses very small cones (around an arcsecond) on fields a
//! couple of degrees across, so catalogs built for matching use a fine
//! `nside` (see [`MatchConfig::catalog_nside`](crate::MatchConfig)).

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;

use crate::sphere::{angular_separation, radec_to_uvec};
use crate::Star;

/// Relative and absolute padding applied to search radii before the exact
/// separation test.
const RADIUS_PAD_REL: f64 = 1e-6;
const RADIUS_PAD_ABS: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct StarCatalog {
    n_lat: u32,
    n_lon: u32,
    stars: Vec<Star>,
    cell_offsets: Vec<u32>,
    star_indices: Vec<u32>,
}

impl StarCatalog {
    /// Build a catalog and spatial index from owned stars.
    ///
    /// `nside` controls resolution and must be greater than zero.
    /// The number of sky cells is `12 * nside^2`.
    pub fn new(nside: u32, stars: Vec<Star>) -> Self {
        assert!(nside > 0, "nside must be > 0");
        let n_lat = 3 * nside;
        let n_lon = 4 * nside;
        let n_cells = (n_lat * n_lon) as usize;

        // Counting sort into cells keeps memory flat even for large nside.
        let cells: Vec<u32> = stars
            .iter()
            .map(|s| Self::cell_for_radec(n_lat, n_lon, s.ra_rad, s.dec_rad))
            .collect();
        let mut cell_offsets = vec![0u32; n_cells + 1];
        for &cell in &cells {
            cell_offsets[cell as usize + 1] += 1;
        }
        for i in 0..n_cells {
            cell_offsets[i + 1] += cell_offsets[i];
        }
        let mut fill = cell_offsets.clone();
        let mut star_indices = vec![0u32; stars.len()];
        for (star_idx, &cell) in cells.iter().enumerate() {
            let slot = &mut fill[cell as usize];
            star_indices[*slot as usize] = star_idx as u32;
            *slot += 1;
        }

        Self {
            n_lat,
            n_lon,
            stars,
            cell_offsets,
            star_indices,
        }
    }

    /// Return the total number of stars in the catalog.
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    /// Return `true` when the catalog contains no stars.
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Return all catalog stars as an immutable slice.
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Query stars within an angular radius of a pointing direction.
    ///
    /// Input coordinates are in radians (`ra_rad`, `dec_rad`, `radius_rad`).
    /// Returns sorted indices into the internal star storage.
    pub fn query_indices(&self, ra_rad: f64, dec_rad: f64, radius_rad: f64) -> Vec<usize> {
        let dir = radec_to_uvec(ra_rad, dec_rad);
        self.query_indices_from_uvec(dir, radius_rad)
    }

    /// Query stars within an angular radius of a pointing direction.
    ///
    /// Input coordinates are in radians (`ra_rad`, `dec_rad`, `radius_rad`).
    /// Returns references to matching stars.
    pub fn query_stars(&self, ra_rad: f64, dec_rad: f64, radius_rad: f64) -> Vec<&Star> {
        self.query_indices(ra_rad, dec_rad, radius_rad)
            .into_iter()
            .map(|idx| &self.stars[idx])
            .collect()
    }

    /// Nearest star within `max_radius_rad` of a position.
    ///
    /// Returns the star index and its angular separation in radians. Ties
    /// resolve to the lowest index.
    pub fn nearest(&self, ra_rad: f64, dec_rad: f64, max_radius_rad: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        // The padded cone keeps stars sitting exactly on the radius; the
        // separation check below has the final say.
        let search_radius = max_radius_rad * (1.0 + RADIUS_PAD_REL) + RADIUS_PAD_ABS;
        for idx in self.query_indices(ra_rad, dec_rad, search_radius) {
            let star = &self.stars[idx];
            let sep = angular_separation(ra_rad, dec_rad, star.ra_rad, star.dec_rad);
            if sep > max_radius_rad {
                continue;
            }
            // Indices arrive sorted, so strict comparison keeps the lowest on ties.
            match best {
                Some((_, best_sep)) if sep >= best_sep => {}
                _ => best = Some((idx, sep)),
            }
        }
        best
    }

    /// Query stars around a (possibly non-unit) direction vector.
    ///
    /// `dir` is normalized internally; `radius_rad` is clamped to `[0, π]`.
    /// Returns sorted indices into the internal star storage.
    pub fn query_indices_from_uvec(&self, dir: Vector3<f64>, radius_rad: f64) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let radius = radius_rad.clamp(0.0, PI);
        let dir = normalize_or_fallback(dir);
        // Dot products lose precision at arcsecond radii, so the dot test is
        // only a loose prefilter ahead of the exact angle test.
        let cos_prefilter = (radius * (1.0 + RADIUS_PAD_REL) + RADIUS_PAD_ABS).min(PI).cos();

        let z_step = 2.0 / self.n_lat as f64;
        let lon_step = TAU / self.n_lon as f64;

        let z_center = dir.z.clamp(-1.0, 1.0);
        // Chord length bounds the change in sin(dec) across the cone.
        let z_reach = 2.0 * (radius / 2.0).sin();
        let z_min = (z_center - z_reach).max(-1.0);
        let z_max = (z_center + z_reach).min(1.0);

        let mut phi = dir.y.atan2(dir.x);
        if phi < 0.0 {
            phi += TAU;
        }

        let mut out = Vec::new();
        for lat_bin in Self::z_bin_range(self.n_lat, z_min, z_max) {
            // The bin edge farthest from the equator has the widest RA extent:
            // |dRA| <= 2 asin(sin(r/2) / sqrt(cos(dec) cos(dec0))).
            let z_lo = -1.0 + lat_bin as f64 * z_step;
            let z_hi = z_lo + z_step;
            let z_far = if z_lo.abs() > z_hi.abs() { z_lo } else { z_hi };
            let cos_far = (1.0 - z_far * z_far).max(0.0).sqrt();
            let cos_center = (1.0 - z_center * z_center).max(0.0).sqrt();
            let denom = (cos_far * cos_center).sqrt();
            let ratio = if denom > 0.0 {
                (radius / 2.0).sin() / denom
            } else {
                f64::INFINITY
            };

            let full_circle = ratio >= 1.0;
            let lon_half_span = if full_circle {
                PI
            } else {
                2.0 * ratio.asin() + lon_step
            };
            let lon_min = phi - lon_half_span;
            let lon_max = phi + lon_half_span;

            if full_circle || lon_max - lon_min >= TAU {
                for lon_bin in 0..self.n_lon {
                    self.collect_cell_matches(lat_bin, lon_bin, dir, radius, cos_prefilter, &mut out);
                }
                continue;
            }

            self.for_each_wrapped_lon_bin(lon_min, lon_max, |lon_bin| {
                self.collect_cell_matches(lat_bin, lon_bin, dir, radius, cos_prefilter, &mut out);
            });
        }

        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_cell_matches(
        &self,
        lat_bin: u32,
        lon_bin: u32,
        dir: Vector3<f64>,
        radius: f64,
        cos_prefilter: f64,
        out: &mut Vec<usize>,
    ) {
        let cell = (lat_bin * self.n_lon + lon_bin) as usize;
        let start = self.cell_offsets[cell] as usize;
        let end = self.cell_offsets[cell + 1] as usize;

        for flat_idx in start..end {
            let star_idx = self.star_indices[flat_idx] as usize;
            let star_dir = self.stars[star_idx].uvec();
            let dot = dir.dot(&star_dir);
            if dot >= cos_prefilter && dir.cross(&star_dir).norm().atan2(dot) <= radius {
                out.push(star_idx);
            }
        }
    }

    fn for_each_wrapped_lon_bin<F>(&self, lon_min: f64, lon_max: f64, mut f: F)
    where
        F: FnMut(u32),
    {
        let start = wrap_angle(lon_min);
        let end = wrap_angle(lon_max);

        let start_bin = Self::phi_to_lon_bin(self.n_lon, start);
        let end_bin = Self::phi_to_lon_bin(self.n_lon, end);

        if start_bin <= end_bin {
            for lon_bin in start_bin..=end_bin {
                f(lon_bin);
            }
            return;
        }

        for lon_bin in start_bin..self.n_lon {
            f(lon_bin);
        }
        for lon_bin in 0..=end_bin {
            f(lon_bin);
        }
    }

    fn z_bin_range(n_lat: u32, z_min: f64, z_max: f64) -> std::ops::RangeInclusive<u32> {
        let start = Self::z_to_lat_bin(n_lat, z_min);
        let end = Self::z_to_lat_bin(n_lat, z_max);
        start..=end
    }

    fn cell_for_radec(n_lat: u32, n_lon: u32, ra_rad: f64, dec_rad: f64) -> u32 {
        let phi = wrap_angle(ra_rad);
        let z = dec_rad.sin().clamp(-1.0, 1.0);
        let lat_bin = Self::z_to_lat_bin(n_lat, z);
        let lon_bin = Self::phi_to_lon_bin(n_lon, phi);
        lat_bin * n_lon + lon_bin
    }

    fn z_to_lat_bin(n_lat: u32, z: f64) -> u32 {
        let u = ((z.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0);
        ((u * n_lat as f64).floor() as u32).min(n_lat - 1)
    }

    fn phi_to_lon_bin(n_lon: u32, phi: f64) -> u32 {
        let u = (phi / TAU).clamp(0.0, 1.0);
        ((u * n_lon as f64).floor() as u32).min(n_lon - 1)
    }
}

fn wrap_angle(theta_rad: f64) -> f64 {
    let wrapped = theta_rad.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

fn normalize_or_fallback(v: Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n > 0.0 {
        v / n
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    }
}
