use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashMap;

use super::{closest_bid, random_bid, PolicyConfig, PolicyEntry, PolicyPort};
use crate::aggregation::PolicyFeedback;
use crate::attributes::Attribute;

/// Running sample mean of observed revenue for one attribute
#[derive(Debug, Clone, Copy, PartialEq)]
struct RevenueEstimate {
    mean: f64,
    count: u64,
}

/// Bids the bid-space value closest to the sample mean of revenue observed per attribute
///
/// Estimates start at a random bid and only records that carry conversions update them.
pub struct ExpectedRevenuePolicy {
    name: String,
    attributes: Vec<Attribute>,
    possible_bids: Vec<f64>,
    estimates: HashMap<Attribute, RevenueEstimate>,
}

impl ExpectedRevenuePolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let estimates = config
            .all_attributes
            .iter()
            .map(|attribute| {
                let mean = random_bid(&config.possible_bids, &mut rng);
                (attribute.clone(), RevenueEstimate { mean, count: 0 })
            })
            .collect();
        Self {
            name: config.name.clone(),
            attributes: config.all_attributes.clone(),
            possible_bids: config.possible_bids.clone(),
            estimates,
        }
    }

    /// Current revenue estimate of an attribute
    pub fn estimate(&self, attribute: &Attribute) -> Option<f64> {
        self.estimates.get(attribute).map(|e| e.mean)
    }
}

impl PolicyPort for ExpectedRevenuePolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn bid(&mut self, attribute: &Attribute) -> f64 {
        let target = self.estimate(attribute).unwrap_or(0.0);
        closest_bid(&self.possible_bids, target)
    }

    fn learn(&mut self, feedback: &[PolicyFeedback]) -> bool {
        for record in feedback {
            let Some(revenue_per_conversion) = record.revenue_per_conversion else {
                continue;
            };
            let observed = revenue_per_conversion * record.num_conversion as f64;
            let estimate = self
                .estimates
                .entry(record.attribute.clone())
                .or_insert(RevenueEstimate { mean: 0.0, count: 0 });
            estimate.count += 1;
            let n = estimate.count as f64;
            estimate.mean = observed / n + (n - 1.0) / n * estimate.mean;
        }
        true
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

fn build(config: &PolicyConfig) -> Box<dyn PolicyPort> {
    Box::new(ExpectedRevenuePolicy::new(config))
}

inventory::submit!(PolicyEntry {
    id: "expected_revenue",
    build,
});
