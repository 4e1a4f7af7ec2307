//! # cosmos-astrometry
//!
//! Astrometric cross-matching of the **HST** and **HSC** imaging surveys of the
//! COSMOS field against the **Gaia** reference catalog, and interpolation of the
//! resulting astrometric error field.
//!
//! Every Gaia star is paired with its nearest survey counterpart within a
//! tolerance radius. The positional offset of each pair becomes an error sample
//! anchored at the Gaia position, and the samples are interpolated into a smooth
//! field that can be queried anywhere in the footprint.
//!
//! ## Features
//!
//! - **Catalog readers** for Gaia CSV exports (with optional proper-motion
//!   propagation) and generic HST/HSC position tables
//! - **Fast cone search** over an equal-area ring-binned [`StarCatalog`]
//! - **Nearest-neighbour cross-match** with per-catalog magnitude cuts
//! - **Match summaries** (robust scatter, pixel-scale fractions, histograms)
//! - **Error fields** with nearest, linear and cubic interpolation over a
//!   Delaunay triangulation, globally or restricted to a local neighbourhood
//! - **Persistence** of error catalogs as CSV or [rkyv](https://docs.rs/rkyv)
//!
//! ## Example
//!
//! ```no_run
//! use cosmos_astrometry::{
//!     cross_match, read_gaia_csv, read_survey_csv, star_from_gaia, CatalogColumns,
//!     ErrorCatalog, ErrorField, Interpolation, MatchConfig, Survey,
//! };
//!
//! let gaia: Vec<_> = read_gaia_csv("data/gaia_cosmos.csv")
//!     .unwrap()
//!     .iter()
//!     .map(|g| star_from_gaia(g, Some(2006.0)))
//!     .collect();
//! let hst = read_survey_csv("data/hst_cosmos.csv", Survey::Hst, &CatalogColumns::default())
//!     .unwrap();
//!
//! let config = MatchConfig {
//!     radius_arcsec: 0.5,
//!     ..Default::default()
//! };
//! let result = cross_match(&gaia, &hst, &config);
//! println!("{:.1}% of Gaia stars matched", 100.0 * result.match_fraction());
//!
//! let catalog = ErrorCatalog::new(result.error_samples());
//! catalog.write_csv("Results/HST_astrometric_errors.csv").unwrap();
//!
//! let field = ErrorField::new(catalog);
//! if let Some(err) = field.estimate(150.1_f64.to_radians(), 2.2_f64.to_radians(), Interpolation::Cubic) {
//!     println!("dRA = {:.4}\"  dDec = {:.4}\"", err.ra_error_arcsec(), err.dec_error_arcsec());
//! }
//! ```
//!
//! ## Pipeline overview
//!
//! 1. **Load** the Gaia, HST and HSC catalogs ([`catalogs`])
//! 2. **Match** each reference star to its nearest counterpart within the
//!    radius ([`cross_match`])
//! 3. **Record** the offset at the reference position ([`ErrorSample`])
//! 4. **Interpolate** a smooth error surface over the samples ([`ErrorField`])
//! 5. **Query** the surface at arbitrary sky positions, per survey with
//!    [`SurveyErrorModel`]
//!

/// Star catalog readers: Gaia exports and HST/HSC position tables
pub mod catalogs;
pub mod cosmos;
pub mod crossmatch;
pub mod errorfield;
pub mod sphere;
pub mod star;
pub mod starcatalog;
pub mod summary;

pub use catalogs::gaia::{read_gaia_csv, GaiaStar};
pub use catalogs::survey::{read_survey_csv, CatalogColumns};
pub use cosmos::{SurveyErrorModel, SurveyErrors, SurveyMatches};
pub use crossmatch::{cross_match, MatchConfig, MatchRecord, MatchResult};
pub use errorfield::{
    AstrometricError, ErrorCatalog, ErrorField, ErrorSample, Interpolation, LocalSelection,
    SigmaClipConfig,
};
pub use star::*;
pub use starcatalog::*;
pub use summary::{Histogram, MatchSummary, PixelScale};
