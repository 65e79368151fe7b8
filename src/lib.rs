//! Repeated sealed-bid ad auction simulator.
//!
//! Policies bid on arrivals of auction demand keyed by categorical attributes. Winners pay a
//! second price, clicks, conversions and revenue are sampled, and every policy learns from
//! aggregated feedback once per timestep.

pub mod aggregation;
pub mod arrivals;
pub mod attributes;
pub mod charts;
pub mod click_model;
pub mod config;
pub mod errors;
pub mod export;
pub mod logger;
pub mod outcomes;
pub mod policies;
pub mod settlement;
pub mod simulation;
pub mod utils;

pub use aggregation::{AggregationMode, AggregationPipeline, ClickEvent, PolicyFeedback};
pub use arrivals::{Arrival, ArrivalGenerator, ArrivalSchedule};
pub use attributes::{Attribute, AttributeDimension, AttributeParam, AttributeSpec, RandomRanges};
pub use click_model::ClickModel;
pub use config::{AuctionFormat, BidCollection, GeneratorConfig, SimulatorConfig};
pub use errors::SimulationError;
pub use logger::{LogEvent, Logger};
pub use outcomes::OutcomeSampler;
pub use policies::{build_policies, build_policy, registered_policy_ids, PolicyConfig, PolicyPort};
pub use settlement::SettlementEngine;
pub use simulation::{AuctionRecord, RunSummary, SimulationPhase, Simulator, StepOutcome};
