// Events of a timestep arrive attribute by attribute, so each attribute forms one contiguous
// bunch. Every policy gets a feedback record per bunch, won or not.

use serde::{Deserialize, Serialize};

use crate::attributes::Attribute;
use crate::config::AuctionFormat;
use crate::utils::mean;

/// One realized click, or the zero-click record of an arrival without clicks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub timestep: usize,
    pub attribute: Attribute,
    pub num_auctions: u64,
    pub bids: Vec<f64>,
    pub winning_policy: usize,
    pub winning_policy_name: String,
    pub winning_bid: f64,
    /// 1 for a click, 0 for the zero-click record
    pub num_click: u32,
    /// Undefined on the zero-click record
    pub cost_per_click: Option<f64>,
    pub conversion: u32,
    /// Revenue counted for the click (zero unless converted), undefined on the zero-click record
    pub revenue: Option<f64>,
    pub costs_cumulative: Vec<f64>,
    pub revenues_cumulative: Vec<f64>,
    pub profits_cumulative: Vec<f64>,
}

/// Aggregated outcome handed to a policy's `learn`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFeedback {
    pub timestep: usize,
    pub attribute: Attribute,
    pub num_auctions: u64,
    pub your_bid: f64,
    /// Single-slot: winning bid of the bunch. Multi-slot: highest bid that received a click
    pub winning_bid: f64,
    /// Multi-slot only: mean of the bids that received a click
    pub winning_bid_avg: Option<f64>,
    pub num_impression: u64,
    pub num_click: u64,
    pub cost_per_click: Option<f64>,
    pub num_conversion: u64,
    pub revenue_per_conversion: Option<f64>,
    pub cumulative_profit: f64,
}

/// How impressions and winning bids are summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Impressions are the policy's wins in the bunch
    SingleSlot,
    /// Impressions are the policy's share of wins scaled to the auction count
    MultiSlot,
}

impl From<AuctionFormat> for AggregationMode {
    fn from(format: AuctionFormat) -> Self {
        match format {
            AuctionFormat::SingleSlot => AggregationMode::SingleSlot,
            AuctionFormat::MultiSlot { .. } => AggregationMode::MultiSlot,
        }
    }
}

/// Split events into contiguous runs sharing timestep and attribute
pub fn attribute_bunches(events: &[ClickEvent]) -> Vec<&[ClickEvent]> {
    let mut bunches = Vec::new();
    let mut start = 0;
    for ix in 1..=events.len() {
        let boundary = ix == events.len()
            || events[ix].attribute != events[start].attribute
            || events[ix].timestep != events[start].timestep;
        if boundary {
            bunches.push(&events[start..ix]);
            start = ix;
        }
    }
    bunches
}

pub struct AggregationPipeline {
    mode: AggregationMode,
}

impl AggregationPipeline {
    pub fn new(mode: AggregationMode) -> Self {
        Self { mode }
    }

    /// Feedback records of one policy for one timestep's events
    ///
    /// # Arguments
    /// * `events` - Events of the timestep in arrival order
    /// * `policy_index` - Index of the policy in the bid vectors
    /// * `previous_profit` - Cumulative profit carried by the policy's last record
    pub fn aggregate(&self, events: &[ClickEvent], policy_index: usize, previous_profit: f64) -> Vec<PolicyFeedback> {
        let mut profit = previous_profit;
        attribute_bunches(events)
            .into_iter()
            .map(|bunch| {
                let record = self.aggregate_bunch(bunch, policy_index, profit);
                profit = record.cumulative_profit;
                record
            })
            .collect()
    }

    /// Feedback records for every policy, in policy order
    pub fn aggregate_all(&self, events: &[ClickEvent], previous_profits: &[f64]) -> Vec<Vec<PolicyFeedback>> {
        previous_profits
            .iter()
            .enumerate()
            .map(|(policy_index, &previous)| self.aggregate(events, policy_index, previous))
            .collect()
    }

    fn aggregate_bunch(&self, bunch: &[ClickEvent], policy_index: usize, previous_profit: f64) -> PolicyFeedback {
        let first = &bunch[0];
        let won: Vec<&ClickEvent> = bunch.iter().filter(|e| e.winning_policy == policy_index).collect();

        let num_click: u64 = won.iter().map(|e| e.num_click as u64).sum();
        let num_conversion: u64 = won.iter().map(|e| e.conversion as u64).sum();
        let costs: Vec<f64> = won.iter().filter_map(|e| e.cost_per_click).collect();
        let revenue: f64 = won.iter().filter_map(|e| e.revenue).sum();
        let cost: f64 = costs.iter().sum();

        let cost_per_click = if num_click > 0 { mean(&costs) } else { None };
        let revenue_per_conversion = if num_conversion > 0 {
            Some(revenue / num_conversion as f64)
        } else {
            None
        };

        let clicked_bids: Vec<f64> = bunch.iter().map(|e| e.winning_bid).collect();
        let (winning_bid, winning_bid_avg, num_impression) = match self.mode {
            AggregationMode::SingleSlot => (first.winning_bid, None, won.len() as u64),
            AggregationMode::MultiSlot => {
                let max_bid = clicked_bids.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let impressions = first.num_auctions * won.len() as u64 / bunch.len() as u64;
                (max_bid, mean(&clicked_bids), impressions)
            }
        };

        PolicyFeedback {
            timestep: first.timestep,
            attribute: first.attribute.clone(),
            num_auctions: first.num_auctions,
            your_bid: first.bids.get(policy_index).copied().unwrap_or(f64::NAN),
            winning_bid,
            winning_bid_avg,
            num_impression,
            num_click,
            cost_per_click,
            num_conversion,
            revenue_per_conversion,
            cumulative_profit: previous_profit + revenue - cost,
        }
    }
}
