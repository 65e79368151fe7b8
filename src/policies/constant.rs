use super::{PolicyConfig, PolicyEntry, PolicyPort};
use crate::aggregation::PolicyFeedback;
use crate::attributes::Attribute;

/// Always bids the same value
/// Built from the registry it bids the median of the bid space
pub struct ConstantPolicy {
    name: String,
    attributes: Vec<Attribute>,
    bid: f64,
}

impl ConstantPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        let mut sorted = config.possible_bids.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let bid = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
        Self::with_bid(config, bid)
    }

    pub fn with_bid(config: &PolicyConfig, bid: f64) -> Self {
        Self {
            name: config.name.clone(),
            attributes: config.all_attributes.clone(),
            bid,
        }
    }
}

impl PolicyPort for ConstantPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn bid(&mut self, _attribute: &Attribute) -> f64 {
        self.bid
    }

    fn learn(&mut self, _feedback: &[PolicyFeedback]) -> bool {
        true
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

fn build(config: &PolicyConfig) -> Box<dyn PolicyPort> {
    Box::new(ConstantPolicy::new(config))
}

inventory::submit!(PolicyEntry {
    id: "constant",
    build,
});
