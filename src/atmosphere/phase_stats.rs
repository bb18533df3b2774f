//! von Karman phase statistics
//!
//! Phase variance, covariance and structure function in rad² for the Fried parameter
//! `r0` and the outer scale `L0`, both in meters.

use std::f64::consts::PI;

use libm::tgamma;
use scilib::math::bessel;
use serde::{Deserialize, Serialize};

use super::PhaseScreenMetadata;

// scilib computes K from the difference of the modified Bessel functions of the first kind,
// which cancels for large arguments where the asymptotic expansion takes over
const BESSEL_K_ASYMPTOTIC: f64 = 3.;
const BESSEL_K_ASYMPTOTIC_TERMS: usize = 5;

// Modified Bessel function of the second kind `K_nu(u)` for `u>0`
fn modified_bessel_k(nu: f64, u: f64) -> f64 {
    if u < BESSEL_K_ASYMPTOTIC {
        return bessel::k(nu, u.into()).re;
    }
    let mu = 4. * nu * nu;
    let (series, _) = (1..=BESSEL_K_ASYMPTOTIC_TERMS).fold((1f64, 1f64), |(series, term), k| {
        let odd = (2 * k - 1) as f64;
        let term = term * (mu - odd * odd) / (8. * k as f64 * u);
        (series + term, term)
    });
    (0.5 * PI / u).sqrt() * (-u).exp() * series
}

fn l0_r0_ratio(r0: f64, l0: f64) -> f64 {
    (l0 / r0).powf(5. / 3.)
}
fn kolmogorov_cst() -> f64 {
    (24. * tgamma(6. / 5.) / 5.).powf(5. / 6.)
}

/// Phase variance
pub fn variance(r0: f64, l0: f64) -> f64 {
    kolmogorov_cst() * (tgamma(11. / 6.) * tgamma(5. / 6.) / (2. * PI.powf(8. / 3.)))
        * l0_r0_ratio(r0, l0)
}

/// Phase covariance at separation `rho` in meters
pub fn covariance(rho: f64, r0: f64, l0: f64) -> f64 {
    if rho == 0f64 {
        return variance(r0, l0);
    }
    let cst = kolmogorov_cst() * (tgamma(11. / 6.) / (2f64.powf(5. / 6.) * PI.powf(8. / 3.)))
        * l0_r0_ratio(r0, l0);
    let u = 2. * PI * rho.abs() / l0;
    cst * u.powf(5. / 6.) * modified_bessel_k(5. / 6., u)
}

/// Phase structure function at separation `rho` in meters
pub fn structure_function(rho: f64, r0: f64, l0: f64) -> f64 {
    2. * (variance(r0, l0) - covariance(rho, r0, l0))
}

/// Atmosphere optical transfer function at separation `rho` in meters
pub fn atm_otf(rho: f64, r0: f64, l0: f64) -> f64 {
    (-0.5 * structure_function(rho, r0, l0)).exp()
}

/// von Karman turbulence
///
/// The Fried parameter and the outer scale in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurbulenceStatistics {
    pub r0: f64,
    #[serde(rename = "L0")]
    pub l0: f64,
}
impl Default for TurbulenceStatistics {
    fn default() -> Self {
        Self { r0: 0.15, l0: 25. }
    }
}
impl From<&PhaseScreenMetadata> for TurbulenceStatistics {
    fn from(metadata: &PhaseScreenMetadata) -> Self {
        Self {
            r0: metadata.r0,
            l0: metadata.l0,
        }
    }
}
impl TurbulenceStatistics {
    pub fn new(r0: f64, l0: f64) -> Self {
        Self { r0, l0 }
    }
    pub fn variance(&self) -> f64 {
        variance(self.r0, self.l0)
    }
    pub fn covariance(&self, rho: f64) -> f64 {
        covariance(rho, self.r0, self.l0)
    }
    pub fn structure_function(&self, rho: f64) -> f64 {
        structure_function(rho, self.r0, self.l0)
    }
    pub fn otf(&self, rho: f64) -> f64 {
        atm_otf(rho, self.r0, self.l0)
    }
    /// Returns the covariances at the separations `rho`
    pub fn covariances(&self, rho: &[f64]) -> Vec<f64> {
        rho.iter().map(|&rho| self.covariance(rho)).collect()
    }
    /// Returns the structure function at the separations `rho`
    pub fn structure_functions(&self, rho: &[f64]) -> Vec<f64> {
        let variance = self.variance();
        self.covariances(rho)
            .into_iter()
            .map(|c| 2. * (variance - c))
            .collect()
    }
    /// Returns the optical transfer function at the separations `rho`
    pub fn otfs(&self, rho: &[f64]) -> Vec<f64> {
        self.structure_functions(rho)
            .into_iter()
            .map(|d| (-0.5 * d).exp())
            .collect()
    }
}
