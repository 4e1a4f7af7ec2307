//! Spherical geometry helpers shared by matching and interpolation.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;

/// Radians per arcsecond.
pub const ARCSEC_TO_RAD: f64 = PI / (180.0 * 3600.0);

pub fn radec_to_uvec(ra_rad: f64, dec_rad: f64) -> Vector3<f64> {
    let (sin_ra, cos_ra) = ra_rad.sin_cos();
    let (sin_dec, cos_dec) = dec_rad.sin_cos();
    Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}

/// RA/Dec (radians) of a direction vector. RA is returned in `[0, 2π)`.
pub fn uvec_to_radec(v: &Vector3<f64>) -> (f64, f64) {
    let n = v.norm();
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let dec = (v.z / n).clamp(-1.0, 1.0).asin();
    let ra = v.y.atan2(v.x).rem_euclid(TAU);
    (ra, dec)
}

/// Great-circle distance between two points, in radians.
///
/// Uses the Vincenty formula, which stays accurate down to sub-milliarcsecond
/// separations where `acos(dot)` runs out of `f64` precision.
pub fn angular_separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let d_ra = ra2 - ra1;
    let (sin_d_ra, cos_d_ra) = d_ra.sin_cos();
    let (sin_dec1, cos_dec1) = dec1.sin_cos();
    let (sin_dec2, cos_dec2) = dec2.sin_cos();

    let num1 = cos_dec2 * sin_d_ra;
    let num2 = cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_d_ra;
    let denom = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_d_ra;
    (num1 * num1 + num2 * num2).sqrt().atan2(denom)
}

/// Wrap an RA difference into `[-π, π)`.
pub fn wrap_ra_difference(d_ra: f64) -> f64 {
    (d_ra + PI).rem_euclid(TAU) - PI
}

/// Forward gnomonic (TAN) projection.
///
/// Projects celestial point `(ra, dec)` onto the tangent plane at `(crval_ra, crval_dec)`.
/// Returns `(ξ, η)` in radians, or `None` if the point is on or behind the tangent plane.
///
/// Reference: Calabretta & Greisen (2002), FITS WCS Paper II, §5.1.1.
#[inline]
pub fn tan_project(ra: f64, dec: f64, crval_ra: f64, crval_dec: f64) -> Option<(f64, f64)> {
    let da = ra - crval_ra;
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let (sin_da, cos_da) = da.sin_cos();

    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None;
    }

    let xi = cos_dec * sin_da / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

/// Inverse gnomonic (TAN) projection.
///
/// Given tangent-plane coordinates `(ξ, η)` in radians at reference point
/// `(crval_ra, crval_dec)`, returns celestial coordinates `(ra, dec)` in radians.
#[inline]
pub fn inverse_tan_project(xi: f64, eta: f64, crval_ra: f64, crval_dec: f64) -> (f64, f64) {
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let rho_sq = xi * xi + eta * eta;

    if rho_sq < 1e-30 {
        return (crval_ra, crval_dec);
    }

    let rho = rho_sq.sqrt();
    let c = rho.atan();
    let (sin_c, cos_c) = c.sin_cos();

    let dec = (cos_c * sin_dec0 + eta * sin_c * cos_dec0 / rho).asin();
    let ra = crval_ra + (xi * sin_c).atan2(rho * cos_dec0 * cos_c - eta * sin_dec0 * sin_c);
    (ra, dec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separation_matches_dot_product_for_large_angles() {
        let (ra1, dec1) = (0.3_f64, 0.1_f64);
        let (ra2, dec2) = (1.1_f64, -0.4_f64);
        let expected = radec_to_uvec(ra1, dec1)
            .dot(&radec_to_uvec(ra2, dec2))
            .acos();
        assert!((angular_separation(ra1, dec1, ra2, dec2) - expected).abs() < 1e-12);
    }

    #[test]
    fn separation_resolves_milliarcseconds() {
        let dec = 2.2_f64.to_radians();
        let one_mas = ARCSEC_TO_RAD / 1000.0;
        let sep = angular_separation(2.62, dec, 2.62, dec + one_mas);
        assert!(((sep - one_mas) / one_mas).abs() < 1e-6, "sep {sep} vs {one_mas}");
    }

    #[test]
    fn ra_difference_wraps() {
        let d = wrap_ra_difference(1.0_f64.to_radians() - 359.0_f64.to_radians());
        assert!((d - 2.0_f64.to_radians()).abs() < 1e-12);
        let d = wrap_ra_difference(359.0_f64.to_radians() - 1.0_f64.to_radians());
        assert!((d + 2.0_f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn tan_project_roundtrip() {
        let crval_ra = 150.12_f64.to_radians();
        let crval_dec = 2.21_f64.to_radians();

        let test_points = [
            (150.13_f64, 2.22_f64),
            (149.6, 1.6),
            (150.8, 2.9),
            (150.12, 2.21),
        ];

        for &(ra, dec) in &test_points {
            let (ra, dec) = (ra.to_radians(), dec.to_radians());
            let (xi, eta) = tan_project(ra, dec, crval_ra, crval_dec).unwrap();
            let (ra2, dec2) = inverse_tan_project(xi, eta, crval_ra, crval_dec);
            assert!(
                (ra - ra2).abs() < 1e-12 && (dec - dec2).abs() < 1e-12,
                "Roundtrip failed for ({}, {}): got ({}, {})",
                ra,
                dec,
                ra2,
                dec2,
            );
        }
    }

    #[test]
    fn tan_project_behind_is_none() {
        assert!(tan_project(PI, 0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn uvec_roundtrip() {
        let (ra, dec) = uvec_to_radec(&radec_to_uvec(5.9, -0.7));
        assert!((ra - 5.9).abs() < 1e-12);
        assert!((dec + 0.7).abs() < 1e-12);
    }
}
