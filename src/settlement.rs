// `rank` runs once per arrival, before clicks are sampled, and `settle_click` once per click.
// Shared stream draw order: shuffle, clicks, conversions, revenues, per-click winners.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::AuctionFormat;
use crate::errors::SimulationError;

/// Attention of the top slot before normalization
pub const ATTENTION_BASE: f64 = 0.3;
/// Attention decay from one slot to the next
pub const ATTENTION_DECAY: f64 = 0.7;

/// Geometric attention weights `0.3 * 0.7^i`, normalized to sum to one over `slots`
pub fn attention_weights(slots: usize) -> Vec<f64> {
    let raw: Vec<f64> = (0..slots).map(|i| ATTENTION_BASE * ATTENTION_DECAY.powi(i as i32)).collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Single-slot cost: the second-highest bid
///
/// A tie at the top charges the tied bid itself; otherwise the winner pays the
/// second-highest distinct bid. A lone bidder pays its own bid.
///
/// # Arguments
/// * `bids` - All bids of the arrival, one per policy
pub fn second_price_cost(bids: &[f64]) -> Option<f64> {
    let mut sorted = bids.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    match sorted.as_slice() {
        [] => None,
        [only] => Some(*only),
        [_, second, ..] => Some(*second),
    }
}

/// Multi-slot cost: the next-lower distinct bid below `bid`, or `bid` itself if it is the lowest
///
/// # Arguments
/// * `bid` - Bid of the policy that received the click
/// * `sorted_unique` - Distinct bids of the arrival in descending order
pub fn next_lower_distinct_bid(bid: f64, sorted_unique: &[f64]) -> f64 {
    sorted_unique.iter().copied().find(|&b| b < bid).unwrap_or(bid)
}

/// Ordering of one arrival's bids, computed once before any click is drawn
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRanking {
    /// Policy indices holding the maximum bid, in policy order
    pub max_bidders: Vec<usize>,
    /// Policy indices shown in the slots, best slot first
    pub slot_holders: Vec<usize>,
    /// Distinct bids, descending
    pub sorted_unique: Vec<f64>,
}

/// Outcome of settling one click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickAllocation {
    pub policy_index: usize,
    pub winning_bid: f64,
    pub cost: f64,
}

/// Settlement for a fixed auction format and policy count
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    format: AuctionFormat,
    slots: usize,
    weights: Vec<f64>,
    slot_picker: Option<WeightedIndex<f64>>,
}

impl SettlementEngine {
    /// Create an engine for `num_policies` bidders
    /// The multi-slot count is capped at the number of policies
    pub fn new(format: AuctionFormat, num_policies: usize) -> Result<Self, SimulationError> {
        if num_policies == 0 {
            return Err(SimulationError::InvalidParameter("Settlement needs at least one policy".to_string()));
        }
        match format {
            AuctionFormat::SingleSlot => Ok(Self {
                format,
                slots: 1,
                weights: vec![1.0],
                slot_picker: None,
            }),
            AuctionFormat::MultiSlot { slots } => {
                if slots == 0 {
                    return Err(SimulationError::InvalidParameter("Multi-slot auction needs at least one slot".to_string()));
                }
                let slots = slots.min(num_policies);
                let weights = attention_weights(slots);
                let picker = WeightedIndex::new(&weights)
                    .map_err(|e| SimulationError::InvalidParameter(format!("Attention weights: {}", e)))?;
                Ok(Self {
                    format,
                    slots,
                    weights,
                    slot_picker: Some(picker),
                })
            }
        }
    }

    /// Slots actually used after capping at the number of policies
    pub fn effective_slots(&self) -> usize {
        self.slots
    }

    pub fn attention(&self) -> &[f64] {
        &self.weights
    }

    /// Rank the bids of one arrival
    ///
    /// Multi-slot ranking shuffles policy indices before a stable descending sort, so ties at the
    /// slot boundary are cut at random while no omitted bid exceeds an included one.
    pub fn rank(&self, bids: &[f64], rng: &mut StdRng) -> Result<SlotRanking, SimulationError> {
        let max_bid = bids
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
            .ok_or_else(|| SimulationError::InvalidParameter("No bids to settle".to_string()))?;
        let max_bidders: Vec<usize> = bids
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == max_bid)
            .map(|(ix, _)| ix)
            .collect();

        let mut sorted_unique = bids.to_vec();
        sorted_unique.sort_by(|a, b| b.total_cmp(a));
        sorted_unique.dedup();

        let slot_holders = match self.format {
            AuctionFormat::SingleSlot => max_bidders.clone(),
            AuctionFormat::MultiSlot { .. } => {
                let mut order: Vec<usize> = (0..bids.len()).collect();
                order.shuffle(rng);
                order.sort_by(|&a, &b| bids[b].total_cmp(&bids[a]));
                order.truncate(self.slots);
                order
            }
        };

        Ok(SlotRanking {
            max_bidders,
            slot_holders,
            sorted_unique,
        })
    }

    /// Assign one click to a policy and price it
    pub fn settle_click(&self, bids: &[f64], ranking: &SlotRanking, rng: &mut StdRng) -> Result<ClickAllocation, SimulationError> {
        match &self.slot_picker {
            None => {
                let winner = self.no_click_winner(ranking, rng)?;
                let cost = second_price_cost(bids).unwrap_or(bids[winner]);
                Ok(ClickAllocation {
                    policy_index: winner,
                    winning_bid: bids[winner],
                    cost,
                })
            }
            Some(picker) => {
                let slot = picker.sample(rng);
                let winner = *ranking.slot_holders.get(slot).ok_or_else(|| {
                    SimulationError::InvalidParameter(format!("Slot {} has no holder", slot))
                })?;
                let winning_bid = bids[winner];
                Ok(ClickAllocation {
                    policy_index: winner,
                    winning_bid,
                    cost: next_lower_distinct_bid(winning_bid, &ranking.sorted_unique),
                })
            }
        }
    }

    /// Winner recorded for an arrival that produced no click: uniform among max bidders
    pub fn no_click_winner(&self, ranking: &SlotRanking, rng: &mut StdRng) -> Result<usize, SimulationError> {
        ranking
            .max_bidders
            .choose(rng)
            .copied()
            .ok_or_else(|| SimulationError::InvalidParameter("No max bidder to choose from".to_string()))
    }
}
