use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution};

use crate::errors::SimulationError;

/// Bounded logistic click model
///
/// `p_click = max_click_prob / (1 + exp(-theta))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickModel {
    pub max_click_prob: f64,
}

impl ClickModel {
    pub fn new(max_click_prob: f64) -> Self {
        Self { max_click_prob }
    }

    /// Click probability of an arrival with sensitivity `theta`
    ///
    /// The winning bid is accepted but does not enter the exponent; the coefficient
    /// on the bid is zero in every engine variant this model reproduces.
    pub fn click_probability(&self, theta: f64, _bid: f64) -> f64 {
        self.max_click_prob / (1.0 + (-theta).exp())
    }

    /// Binomial number of clicks out of `num_auctions`
    pub fn sample_clicks(&self, num_auctions: u64, click_probability: f64, rng: &mut StdRng) -> Result<u64, SimulationError> {
        if num_auctions == 0 {
            return Ok(0);
        }
        let binomial = Binomial::new(num_auctions, click_probability).map_err(|e| {
            SimulationError::InvalidParameter(format!("Binomial({}, {}): {}", num_auctions, click_probability, e))
        })?;
        Ok(binomial.sample(rng))
    }
}

impl Default for ClickModel {
    fn default() -> Self {
        Self::new(0.5)
    }
}
