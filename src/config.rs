use crate::attributes::{AttributeDimension, RandomRanges};

/// Number of slots used by the multi-slot format when nothing else is requested
pub const DEFAULT_SLOTS: usize = 8;

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 12345;

/// Auction mechanism used for settlement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuctionFormat {
    /// Highest bid wins every click, cost is the second-highest bid
    SingleSlot,
    /// Top `slots` bids are shown and clicks are spread over them by decaying attention
    MultiSlot { slots: usize },
}

impl AuctionFormat {
    pub fn slots(&self) -> usize {
        match self {
            AuctionFormat::SingleSlot => 1,
            AuctionFormat::MultiSlot { slots } => *slots,
        }
    }
}

/// How bids are collected from policies each arrival
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BidCollection {
    /// Policies are queried one after another on the orchestrator thread
    Sequential,
    /// Policies are moved into a bounded worker pool and returned after bidding
    /// `workers: None` sizes the pool to the available hardware concurrency
    Parallel { workers: Option<usize> },
}

impl BidCollection {
    /// Resolve the worker count for the parallel mode
    pub fn worker_count(&self) -> usize {
        match self {
            BidCollection::Sequential => 1,
            BidCollection::Parallel { workers: Some(n) } => (*n).max(1),
            BidCollection::Parallel { workers: None } => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Seed of the settlement/outcome stream and base seed for policy streams
    pub random_seed: u64,
    /// Legal bid values handed to policies at construction
    pub possible_bids: Vec<f64>,
    pub auction_format: AuctionFormat,
    pub bid_collection: BidCollection,
    /// Upper bound of the click probability logistic
    pub max_click_prob: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            random_seed: DEFAULT_SEED,
            possible_bids: (0..10).map(|b| b as f64).collect(),
            auction_format: AuctionFormat::SingleSlot,
            bid_collection: BidCollection::Sequential,
            max_click_prob: 0.5,
        }
    }
}

impl SimulatorConfig {
    /// Multi-slot configuration with the finer bid space (0.0 to 9.9 in steps of 0.1)
    pub fn multi_slot(slots: usize) -> Self {
        Self {
            possible_bids: (0..100).map(|b| b as f64 / 10.0).collect(),
            auction_format: AuctionFormat::MultiSlot { slots },
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    pub fn with_bid_collection(mut self, bid_collection: BidCollection) -> Self {
        self.bid_collection = bid_collection;
        self
    }
}

/// Arrival generator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub dimensions: Vec<AttributeDimension>,
    /// Horizon, timesteps run from 1 to `max_t` inclusive
    pub max_t: usize,
    pub random_seed: u64,
    pub random_ranges: RandomRanges,
}

impl GeneratorConfig {
    pub fn new(dimensions: Vec<AttributeDimension>, max_t: usize) -> Self {
        Self {
            dimensions,
            max_t,
            random_seed: DEFAULT_SEED,
            random_ranges: RandomRanges::default(),
        }
    }

    pub fn with_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_simulator_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.random_seed, 12345);
        assert_eq!(config.possible_bids.len(), 10);
        assert_eq!(config.possible_bids[9], 9.0);
        assert_eq!(config.auction_format.slots(), 1);
    }

    #[test]
    fn test_multi_slot_config() {
        let config = SimulatorConfig::multi_slot(DEFAULT_SLOTS);
        assert_eq!(config.possible_bids.len(), 100);
        assert!((config.possible_bids[99] - 9.9).abs() < 1e-12);
        assert_eq!(config.auction_format, AuctionFormat::MultiSlot { slots: 8 });
        assert_eq!(config.max_click_prob, 0.5);
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(BidCollection::Sequential.worker_count(), 1);
        assert_eq!(BidCollection::Parallel { workers: Some(3) }.worker_count(), 3);
        assert_eq!(BidCollection::Parallel { workers: Some(0) }.worker_count(), 1);
        assert!(BidCollection::Parallel { workers: None }.worker_count() >= 1);
    }
}
