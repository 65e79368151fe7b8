use rand::{rngs::StdRng, SeedableRng};

use super::{random_bid, PolicyConfig, PolicyEntry, PolicyPort};
use crate::aggregation::PolicyFeedback;
use crate::attributes::Attribute;

/// Bids uniformly at random from the bid space and never learns
pub struct RandomPolicy {
    name: String,
    attributes: Vec<Attribute>,
    possible_bids: Vec<f64>,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            attributes: config.all_attributes.clone(),
            possible_bids: config.possible_bids.clone(),
            rng: StdRng::seed_from_u64(config.random_seed),
        }
    }
}

impl PolicyPort for RandomPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn bid(&mut self, _attribute: &Attribute) -> f64 {
        random_bid(&self.possible_bids, &mut self.rng)
    }

    fn learn(&mut self, _feedback: &[PolicyFeedback]) -> bool {
        true
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

fn build(config: &PolicyConfig) -> Box<dyn PolicyPort> {
    Box::new(RandomPolicy::new(config))
}

inventory::submit!(PolicyEntry {
    id: "random",
    build,
});
