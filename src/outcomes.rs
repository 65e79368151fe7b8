use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution, Gamma};

use crate::errors::SimulationError;

/// Gamma shape used for revenue; scale is `avg_revenue / REVENUE_SHAPE` so the mean matches
pub const REVENUE_SHAPE: f64 = 4.0;

/// Per-click conversion and revenue draws
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeSampler;

/// Conversion flag and counted revenue of one click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickOutcome {
    pub conversion: u32,
    /// Revenue counted for the click, zero unless it converted
    pub revenue: f64,
}

impl OutcomeSampler {
    /// Draw `num_clicks` conversions, each Bernoulli(`prob_conversion`)
    pub fn sample_conversions(&self, prob_conversion: f64, num_clicks: usize, rng: &mut StdRng) -> Result<Vec<u32>, SimulationError> {
        if num_clicks == 0 {
            return Ok(Vec::new());
        }
        let bernoulli = Bernoulli::new(prob_conversion)
            .map_err(|e| SimulationError::InvalidParameter(format!("Bernoulli({}): {}", prob_conversion, e)))?;
        Ok((0..num_clicks).map(|_| u32::from(bernoulli.sample(rng))).collect())
    }

    /// Draw `num_clicks` revenues from Gamma(4, avg_revenue / 4)
    /// A non-positive average gives zero revenue without drawing
    pub fn sample_revenues(&self, avg_revenue: f64, num_clicks: usize, rng: &mut StdRng) -> Result<Vec<f64>, SimulationError> {
        if avg_revenue <= 0.0 {
            return Ok(vec![0.0; num_clicks]);
        }
        let gamma = Gamma::new(REVENUE_SHAPE, avg_revenue / REVENUE_SHAPE)
            .map_err(|e| SimulationError::InvalidParameter(format!("Gamma({}, {}): {}", REVENUE_SHAPE, avg_revenue / REVENUE_SHAPE, e)))?;
        Ok((0..num_clicks).map(|_| gamma.sample(rng)).collect())
    }

    /// Sample every click of an arrival: all conversions first, then all revenues
    /// Revenue is drawn for every click but only counted when the click converted
    pub fn sample(&self, prob_conversion: f64, avg_revenue: f64, num_clicks: usize, rng: &mut StdRng) -> Result<Vec<ClickOutcome>, SimulationError> {
        let conversions = self.sample_conversions(prob_conversion, num_clicks, rng)?;
        let revenues = self.sample_revenues(avg_revenue, num_clicks, rng)?;
        Ok(conversions
            .into_iter()
            .zip(revenues)
            .map(|(conversion, revenue)| ClickOutcome {
                conversion,
                revenue: conversion as f64 * revenue,
            })
            .collect())
    }
}
