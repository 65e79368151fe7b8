// Policies own their learning state and random stream. In parallel mode the boxed policy
// moves into a worker and comes back after bidding, hence `Send`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::aggregation::PolicyFeedback;
use crate::attributes::Attribute;
use crate::errors::SimulationError;
use crate::utils::derive_seed;

pub mod constant;
pub mod expected_revenue;
pub mod outbid;
pub mod random;

pub use constant::ConstantPolicy;
pub use expected_revenue::ExpectedRevenuePolicy;
pub use outbid::OutbidPolicy;
pub use random::RandomPolicy;

/// Contract every bidding strategy implements
pub trait PolicyPort: Send {
    /// Unique name used in event logs, feedback exports and time accounting
    fn name(&self) -> &str;

    /// Bid for one auction of `attribute` at the current timestep
    fn bid(&mut self, attribute: &Attribute) -> f64;

    /// Learn from all feedback records of one timestep
    /// Returns an acknowledgement; the simulator logs a refusal but keeps going
    fn learn(&mut self, feedback: &[PolicyFeedback]) -> bool;

    /// Attribute set the policy was built for, compared against the schedule at load
    fn attributes(&self) -> &[Attribute];
}

/// Construction bundle handed to every policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub name: String,
    pub all_attributes: Vec<Attribute>,
    pub possible_bids: Vec<f64>,
    pub max_timesteps: usize,
    pub random_seed: u64,
}

impl PolicyConfig {
    pub fn new(name: &str, all_attributes: Vec<Attribute>, possible_bids: Vec<f64>, max_timesteps: usize, random_seed: u64) -> Self {
        Self {
            name: name.to_string(),
            all_attributes,
            possible_bids,
            max_timesteps,
            random_seed,
        }
    }

    /// Same bundle under another name and seed
    pub fn renamed(&self, name: &str, random_seed: u64) -> Self {
        Self {
            name: name.to_string(),
            random_seed,
            ..self.clone()
        }
    }
}

/// Constructor stored in the registry
pub type PolicyBuildFn = fn(config: &PolicyConfig) -> Box<dyn PolicyPort>;

/// Entry in the policy registry
#[derive(Clone)]
pub struct PolicyEntry {
    pub id: &'static str,
    pub build: PolicyBuildFn,
}

inventory::collect!(PolicyEntry);

// Policies register themselves next to their implementation:
// inventory::submit!(PolicyEntry {
//     id: "name",
//     build: constructor,
// });

/// Identifiers of all registered policies, sorted
pub fn registered_policy_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = inventory::iter::<PolicyEntry>
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Build one registered policy
pub fn build_policy(id: &str, config: &PolicyConfig) -> Result<Box<dyn PolicyPort>, SimulationError> {
    inventory::iter::<PolicyEntry>
        .into_iter()
        .find(|entry| entry.id == id)
        .map(|entry| (entry.build)(config))
        .ok_or_else(|| SimulationError::UnknownPolicy(id.to_string()))
}

/// Build registered policies in order
///
/// Each policy is named after its identifier and gets its own seed derived from
/// `base.random_seed` and its position, so no two policies share a stream.
pub fn build_policies(ids: &[&str], base: &PolicyConfig) -> Result<Vec<Box<dyn PolicyPort>>, SimulationError> {
    ids.iter()
        .enumerate()
        .map(|(ix, id)| build_policy(id, &base.renamed(id, derive_seed(base.random_seed, ix as u64))))
        .collect()
}

/// Uniform choice from the bid space, 0 for an empty bid space
pub(crate) fn random_bid(possible_bids: &[f64], rng: &mut StdRng) -> f64 {
    possible_bids.choose(rng).copied().unwrap_or(0.0)
}

/// Bid-space value closest to `target`; ties go to the lower value
pub(crate) fn closest_bid(possible_bids: &[f64], target: f64) -> f64 {
    possible_bids
        .iter()
        .copied()
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
        .unwrap_or(0.0)
}

/// Smallest bid-space value strictly above `threshold`, or the largest bid if none is
pub(crate) fn smallest_bid_above(possible_bids: &[f64], threshold: f64) -> f64 {
    possible_bids
        .iter()
        .copied()
        .filter(|&b| b > threshold)
        .min_by(|a, b| a.total_cmp(b))
        .or_else(|| possible_bids.iter().copied().max_by(|a, b| a.total_cmp(b)))
        .unwrap_or(0.0)
}
