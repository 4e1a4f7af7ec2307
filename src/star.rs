use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};

use crate::catalogs::gaia::GaiaStar;

/// Survey a catalog entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum Survey {
    /// Hubble Space Telescope imaging.
    Hst,
    /// Subaru Hyper Suprime-Cam imaging.
    Hsc,
    /// Gaia astrometric reference.
    Gaia,
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Survey::Hst => "HST",
            Survey::Hsc => "HSC",
            Survey::Gaia => "Gaia",
        };
        f.write_str(name)
    }
}

impl FromStr for Survey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hst" => Ok(Survey::Hst),
            "hsc" => Ok(Survey::Hsc),
            "gaia" => Ok(Survey::Gaia),
            other => anyhow::bail!("unknown survey '{}'", other),
        }
    }
}

/// A catalog star used for cross-matching.
///
/// Positions are ICRS radians at the catalog's observation epoch (Gaia stars
/// may have been propagated, see [`star_from_gaia`]). The magnitude is
/// survey-dependent and only used for brightness cuts; it is `NaN` when the
/// source catalog does not provide one.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Star {
    pub id: u64,
    pub ra_rad: f64,
    pub dec_rad: f64,
    pub mag: f32,
    pub survey: Survey,
}

impl Star {
    /// Unit vector pointing to the star's position on the celestial sphere.
    pub fn uvec(&self) -> nalgebra::Vector3<f64> {
        crate::sphere::radec_to_uvec(self.ra_rad, self.dec_rad)
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra_rad.to_degrees()
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec_rad.to_degrees()
    }

    /// `true` if the star passes an optional faint-end magnitude cut.
    /// Stars without a magnitude always pass.
    pub fn brighter_than(&self, max_mag: Option<f32>) -> bool {
        match max_mag {
            Some(limit) if !self.mag.is_nan() => self.mag <= limit,
            _ => true,
        }
    }
}

/// Gaia DR2 reference epoch (Julian year).
pub const GAIA_DR2_EPOCH_YEAR: f64 = 2015.5;

/// Convert a Gaia row to a generic Star, optionally propagating proper motion.
///
/// `epoch_year`: Target year for proper motion propagation (e.g. 2006.0 for
/// the HST/ACS COSMOS mosaic). If None, or if the row carries no proper
/// motion, the catalog position at J2015.5 is used.
///
/// As for other catalogs, proper motion near the celestial poles
/// (|cos dec| <= 0.05) is ignored.
pub fn star_from_gaia(star: &GaiaStar, epoch_year: Option<f64>) -> Star {
    // Convert milliarcseconds/year to radians/year
    const MAS_PER_YR_TO_RAD_PER_YR: f64 =
        2.0 * std::f64::consts::PI / (3600.0 * 1000.0 * 360.0);

    let ra = star.ra_deg.to_radians();
    let dec = star.dec_deg.to_radians();

    let (ra, dec) = match (epoch_year, star.pmra, star.pmdec) {
        (Some(target_year), Some(pmra), Some(pmdec)) => {
            let dt_years = target_year - GAIA_DR2_EPOCH_YEAR;
            let cos_dec = dec.cos();
            // pmra from Gaia is mu_alpha*cos(delta)
            let (mu_ra, mu_dec) = if cos_dec.abs() > 0.05 {
                (
                    pmra * MAS_PER_YR_TO_RAD_PER_YR / cos_dec,
                    pmdec * MAS_PER_YR_TO_RAD_PER_YR,
                )
            } else {
                (0.0, 0.0)
            };
            (ra + mu_ra * dt_years, dec + mu_dec * dt_years)
        }
        _ => (ra, dec),
    };

    Star {
        id: star.source_id,
        ra_rad: ra,
        dec_rad: dec,
        mag: star.phot_g_mean_mag.unwrap_or(f32::NAN),
        survey: Survey::Gaia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaia_row(pmra: Option<f64>, pmdec: Option<f64>) -> GaiaStar {
        GaiaStar {
            source_id: 3_836_000_000_000_000_001,
            ra_deg: 150.1,
            dec_deg: 2.2,
            phot_g_mean_mag: Some(18.5),
            parallax: None,
            pmra,
            pmdec,
        }
    }

    #[test]
    fn survey_names_parse_case_insensitively() {
        assert_eq!("HST".parse::<Survey>().unwrap(), Survey::Hst);
        assert_eq!(" hsc ".parse::<Survey>().unwrap(), Survey::Hsc);
        assert_eq!("Gaia".parse::<Survey>().unwrap(), Survey::Gaia);
        assert!("sdss".parse::<Survey>().is_err());
        assert_eq!(Survey::Hsc.to_string(), "HSC");
    }

    #[test]
    fn gaia_without_epoch_keeps_reference_position() {
        let star = star_from_gaia(&gaia_row(Some(10.0), Some(-5.0)), None);
        assert!((star.ra_deg() - 150.1).abs() < 1e-12);
        assert!((star.dec_deg() - 2.2).abs() < 1e-12);
        assert_eq!(star.survey, Survey::Gaia);
        assert_eq!(star.mag, 18.5);
    }

    #[test]
    fn gaia_proper_motion_is_propagated_backwards() {
        // 10 mas/yr in Dec over 10 years back -> -100 mas
        let star = star_from_gaia(&gaia_row(Some(0.0), Some(10.0)), Some(2005.5));
        let d_dec_mas = (star.dec_deg() - 2.2) * 3600.0 * 1000.0;
        assert!((d_dec_mas + 100.0).abs() < 1e-6, "got {d_dec_mas}");
        assert!((star.ra_deg() - 150.1).abs() < 1e-12);
    }

    #[test]
    fn gaia_missing_proper_motion_is_not_propagated() {
        let star = star_from_gaia(&gaia_row(None, None), Some(2005.5));
        assert!((star.dec_deg() - 2.2).abs() < 1e-12);
    }

    #[test]
    fn magnitude_cut_passes_unknown_magnitudes() {
        let mut star = star_from_gaia(&gaia_row(None, None), None);
        assert!(star.brighter_than(Some(19.0)));
        assert!(!star.brighter_than(Some(18.0)));
        assert!(star.brighter_than(None));
        star.mag = f32::NAN;
        assert!(star.brighter_than(Some(10.0)));
    }
}
