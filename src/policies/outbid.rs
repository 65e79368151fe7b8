use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashMap;

use super::{random_bid, smallest_bid_above, PolicyConfig, PolicyEntry, PolicyPort};
use crate::aggregation::PolicyFeedback;
use crate::attributes::Attribute;

#[derive(Debug, Clone, Copy, PartialEq)]
struct AttributeState {
    bid: f64,
    revenue_per_click: f64,
    clicks: u64,
}

/// Tracks revenue per click and outbids the market while that stays profitable
///
/// After each record: if the winning bid exceeds the observed revenue per click, bid the
/// smallest value above revenue per click; otherwise bid the smallest value above the winning bid.
pub struct OutbidPolicy {
    name: String,
    attributes: Vec<Attribute>,
    possible_bids: Vec<f64>,
    states: HashMap<Attribute, AttributeState>,
}

impl OutbidPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let states = config
            .all_attributes
            .iter()
            .map(|attribute| {
                let state = AttributeState {
                    bid: random_bid(&config.possible_bids, &mut rng),
                    revenue_per_click: 0.0,
                    clicks: 0,
                };
                (attribute.clone(), state)
            })
            .collect();
        Self {
            name: config.name.clone(),
            attributes: config.all_attributes.clone(),
            possible_bids: config.possible_bids.clone(),
            states,
        }
    }

    pub fn revenue_per_click(&self, attribute: &Attribute) -> Option<f64> {
        self.states.get(attribute).map(|s| s.revenue_per_click)
    }
}

impl PolicyPort for OutbidPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn bid(&mut self, attribute: &Attribute) -> f64 {
        match self.states.get(attribute) {
            Some(state) => state.bid,
            None => smallest_bid_above(&self.possible_bids, f64::NEG_INFINITY),
        }
    }

    fn learn(&mut self, feedback: &[PolicyFeedback]) -> bool {
        for record in feedback {
            let state = self.states.entry(record.attribute.clone()).or_insert(AttributeState {
                bid: 0.0,
                revenue_per_click: 0.0,
                clicks: 0,
            });
            if record.num_click > 0 {
                let old_revenue = state.revenue_per_click * state.clicks as f64;
                let added_revenue = record
                    .revenue_per_conversion
                    .map(|rpc| rpc * record.num_conversion as f64)
                    .unwrap_or(0.0);
                state.clicks += record.num_click;
                state.revenue_per_click = (old_revenue + added_revenue) / state.clicks as f64;
            }
            let threshold = if record.winning_bid > state.revenue_per_click {
                state.revenue_per_click
            } else {
                record.winning_bid
            };
            state.bid = smallest_bid_above(&self.possible_bids, threshold);
        }
        true
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

fn build(config: &PolicyConfig) -> Box<dyn PolicyPort> {
    Box::new(OutbidPolicy::new(config))
}

inventory::submit!(PolicyEntry {
    id: "outbid",
    build,
});
