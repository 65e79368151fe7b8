// One step per timestep: collect bids, settle clicks, sample outcomes, aggregate feedback,
// then learn. Bids may come from a rayon pool; everything else runs on the calling thread
// with the simulator's own random stream.

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::aggregation::{AggregationMode, AggregationPipeline, ClickEvent, PolicyFeedback};
use crate::arrivals::{Arrival, ArrivalSchedule};
use crate::attributes::Attribute;
use crate::click_model::ClickModel;
use crate::config::{AuctionFormat, BidCollection, SimulatorConfig};
use crate::errors::SimulationError;
use crate::logger::{LogEvent, Logger};
use crate::outcomes::OutcomeSampler;
use crate::policies::{build_policies, PolicyConfig, PolicyPort};
use crate::settlement::SettlementEngine;
use crate::utils::{format_list, format_optional, mean};
use crate::{errln, logln, warnln};

/// Lifecycle of a simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPhase {
    NotInitialized,
    /// Schedule and policies loaded, no step taken yet
    Ready,
    Stepping,
    /// Last timestep with arrivals has been processed
    Finished,
    /// A fatal error occurred; no further steps are possible
    Aborted,
}

/// Result of one `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    AuctionHappened,
    /// No arrival at this timestep; history was not touched
    NoAuction,
}

/// Master aggregate history row, one per processed arrival
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub timestep: usize,
    pub attribute: Attribute,
    pub arrival_rate: f64,
    pub num_auctions: u64,
    pub bids: Vec<f64>,
    pub theta: f64,
    pub p_click: f64,
    pub num_click: u64,
    /// Mean cost over all clicks of the arrival
    pub cost_per_click: Option<f64>,
    pub num_conversion: u64,
    pub revenue_per_conversion: Option<f64>,
    pub costs_cumulative: Vec<f64>,
    pub revenues_cumulative: Vec<f64>,
    pub profits_cumulative: Vec<f64>,
    /// Seconds spent in each policy so far
    pub time_spent: Vec<f64>,
}

/// Cumulative per-policy money and click counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyLedger {
    pub costs: Vec<f64>,
    pub revenues: Vec<f64>,
    pub profits: Vec<f64>,
    pub clicks: Vec<u64>,
    pub conversions: Vec<u64>,
}

impl PolicyLedger {
    pub fn new(num_policies: usize) -> Self {
        Self {
            costs: vec![0.0; num_policies],
            revenues: vec![0.0; num_policies],
            profits: vec![0.0; num_policies],
            clicks: vec![0; num_policies],
            conversions: vec![0; num_policies],
        }
    }

    /// Charge one click to a policy
    pub fn record_click(&mut self, policy_index: usize, cost: f64, revenue: f64, conversion: u32) {
        self.costs[policy_index] += cost;
        self.revenues[policy_index] += revenue;
        self.profits[policy_index] = self.revenues[policy_index] - self.costs[policy_index];
        self.clicks[policy_index] += 1;
        self.conversions[policy_index] += conversion as u64;
    }

    /// Index of the first policy whose profit is not revenue minus cost
    pub fn profit_mismatch(&self) -> Option<usize> {
        (0..self.profits.len()).find(|&ix| self.profits[ix] != self.revenues[ix] - self.costs[ix])
    }
}

/// Wall time spent in the simulator itself and inside each policy (bid and learn)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeLedger {
    simulator: Duration,
    policies: Vec<Duration>,
}

impl TimeLedger {
    pub fn new(num_policies: usize) -> Self {
        Self {
            simulator: Duration::ZERO,
            policies: vec![Duration::ZERO; num_policies],
        }
    }

    pub fn add_simulator(&mut self, elapsed: Duration) {
        self.simulator += elapsed;
    }

    pub fn add_policy(&mut self, policy_index: usize, elapsed: Duration) {
        if let Some(total) = self.policies.get_mut(policy_index) {
            *total += elapsed;
        }
    }

    pub fn simulator_seconds(&self) -> f64 {
        self.simulator.as_secs_f64()
    }

    pub fn policy_seconds(&self, policy_index: usize) -> f64 {
        self.policies.get(policy_index).map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    pub fn policy_seconds_all(&self) -> Vec<f64> {
        self.policies.iter().map(|d| d.as_secs_f64()).collect()
    }

    fn policy_total(&self) -> Duration {
        self.policies.iter().sum()
    }
}

/// Totals of one policy at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTotals {
    pub name: String,
    pub cost: f64,
    pub revenue: f64,
    pub profit: f64,
    pub clicks: u64,
    pub conversions: u64,
    pub seconds: f64,
}

/// Summary returned by `Simulator::run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timesteps: usize,
    pub simulator_seconds: f64,
    pub policies: Vec<PolicyTotals>,
}

/// Bid returned from a worker together with the policy that produced it
struct BidReply {
    result: Result<f64, String>,
    elapsed: Duration,
    policy: Box<dyn PolicyPort>,
}

/// Repeated sealed-bid auction simulator
pub struct Simulator {
    config: SimulatorConfig,
    phase: SimulationPhase,
    timestep: usize,
    schedule: ArrivalSchedule,
    policies: Vec<Box<dyn PolicyPort>>,
    policy_names: Vec<String>,
    engine: Option<SettlementEngine>,
    click_model: ClickModel,
    outcomes: OutcomeSampler,
    aggregation: AggregationPipeline,
    pool: Option<rayon::ThreadPool>,
    rng: StdRng,
    ledger: PolicyLedger,
    time: TimeLedger,
    history: Vec<AuctionRecord>,
    events: Vec<ClickEvent>,
    feedback_history: Vec<Vec<PolicyFeedback>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            click_model: ClickModel::new(config.max_click_prob),
            outcomes: OutcomeSampler,
            aggregation: AggregationPipeline::new(AggregationMode::from(config.auction_format)),
            rng: StdRng::seed_from_u64(config.random_seed),
            config,
            phase: SimulationPhase::NotInitialized,
            timestep: 0,
            schedule: ArrivalSchedule::default(),
            policies: Vec::new(),
            policy_names: Vec::new(),
            engine: None,
            pool: None,
            ledger: PolicyLedger::default(),
            time: TimeLedger::default(),
            history: Vec::new(),
            events: Vec::new(),
            feedback_history: Vec::new(),
        }
    }

    /// Load an arrival schedule and the competing policies
    ///
    /// Loading resets all run state. Any configuration problem is fatal: the simulator is left
    /// in the aborted phase and the error is returned before a single timestep runs.
    ///
    /// # Arguments
    /// * `schedule` - Arrival schedule to replay
    /// * `policies` - Competing policies; their index is their position in every bid vector
    /// * `logger` - Logger for run and validation messages
    pub fn load(&mut self, schedule: ArrivalSchedule, policies: Vec<Box<dyn PolicyPort>>, logger: &mut Logger) -> Result<(), SimulationError> {
        match self.prepare(schedule, policies, logger) {
            Ok(()) => {
                self.phase = SimulationPhase::Ready;
                logln!(logger, LogEvent::Run, "Loaded {} arrivals over {} timesteps for {} policies: {}",
                    self.schedule.len(), self.schedule.max_timestep(), self.policies.len(), self.policy_names.join(", "));
                if logger.is_enabled(LogEvent::Auction) {
                    logln!(logger, LogEvent::Auction, "timestep,attribute,num_auctions,bids,theta,p_click,num_click,cost_per_click,num_conversion,revenue_per_conversion");
                }
                Ok(())
            }
            Err(e) => {
                self.phase = SimulationPhase::Aborted;
                errln!(logger, LogEvent::Run, "Load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Build registered policies by identifier and load them with the schedule
    /// Policies get the schedule's attribute set, the configured bid space and per-policy seeds
    pub fn load_registered(&mut self, schedule: ArrivalSchedule, ids: &[&str], logger: &mut Logger) -> Result<(), SimulationError> {
        let base = PolicyConfig::new(
            "",
            schedule.attributes(),
            self.config.possible_bids.clone(),
            schedule.max_timestep(),
            self.config.random_seed,
        );
        let policies = match build_policies(ids, &base) {
            Ok(policies) => policies,
            Err(e) => {
                self.phase = SimulationPhase::Aborted;
                errln!(logger, LogEvent::Run, "Load failed: {}", e);
                return Err(e);
            }
        };
        self.load(schedule, policies, logger)
    }

    fn prepare(&mut self, schedule: ArrivalSchedule, policies: Vec<Box<dyn PolicyPort>>, logger: &mut Logger) -> Result<(), SimulationError> {
        if schedule.is_empty() {
            return Err(SimulationError::EmptySchedule);
        }
        if schedule.arrivals().iter().any(|a| a.timestep == 0) {
            return Err(SimulationError::InvalidParameter("Arrival timesteps start at 1".to_string()));
        }
        if policies.is_empty() {
            return Err(SimulationError::InvalidParameter("At least one policy is required".to_string()));
        }

        let mut seen = HashSet::new();
        for policy in &policies {
            let name = policy.name();
            if name.is_empty() || name.contains([',', '\n', '\r']) {
                return Err(SimulationError::InvalidParameter(format!("Policy name {:?} cannot be written to a CSV cell", name)));
            }
            if !seen.insert(name.to_string()) {
                return Err(SimulationError::DuplicatePolicy(name.to_string()));
            }
        }

        let schedule_attributes = schedule.attributes();
        for policy in &policies {
            check_attributes(policy.as_ref(), &schedule_attributes)?;
        }

        if let AuctionFormat::MultiSlot { slots } = self.config.auction_format {
            if slots > policies.len() {
                warnln!(logger, LogEvent::Run, "{} slots requested but only {} policies compete, using {} slots",
                    slots, policies.len(), policies.len());
            }
        }
        let engine = SettlementEngine::new(self.config.auction_format, policies.len())?;

        self.pool = match self.config.bid_collection {
            BidCollection::Sequential => None,
            BidCollection::Parallel { .. } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.bid_collection.worker_count())
                    .build()?,
            ),
        };

        let num_policies = policies.len();
        self.policy_names = policies.iter().map(|p| p.name().to_string()).collect();
        self.policies = policies;
        self.schedule = schedule;
        self.engine = Some(engine);
        self.rng = StdRng::seed_from_u64(self.config.random_seed);
        self.timestep = 0;
        self.ledger = PolicyLedger::new(num_policies);
        self.time = TimeLedger::new(num_policies);
        self.history.clear();
        self.events.clear();
        self.feedback_history = vec![Vec::new(); num_policies];
        Ok(())
    }

    /// Advance to the next timestep and process its arrivals
    ///
    /// An error aborts the run: the simulator moves to the aborted phase and every later call
    /// returns `SimulationError::Aborted`. After the last timestep the simulator is finished and
    /// further calls report `NoAuction` without changing anything.
    pub fn step(&mut self, logger: &mut Logger) -> Result<StepOutcome, SimulationError> {
        match self.phase {
            SimulationPhase::NotInitialized => return Err(SimulationError::NotReady),
            SimulationPhase::Aborted => return Err(SimulationError::Aborted),
            SimulationPhase::Finished => return Ok(StepOutcome::NoAuction),
            SimulationPhase::Ready | SimulationPhase::Stepping => {}
        }
        match self.step_timestep(logger) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.phase = SimulationPhase::Aborted;
                errln!(logger, LogEvent::Timestep, "Timestep {} aborted: {}", self.timestep, e);
                Err(e)
            }
        }
    }

    /// Step until the schedule is exhausted
    pub fn run(&mut self, logger: &mut Logger) -> Result<RunSummary, SimulationError> {
        while self.phase != SimulationPhase::Finished {
            self.step(logger)?;
        }
        let summary = self.summary();
        for totals in &summary.policies {
            logln!(logger, LogEvent::Run, "{}: cost {:.2}, revenue {:.2}, profit {:.2}, clicks {}, conversions {}, {:.3}s",
                totals.name, totals.cost, totals.revenue, totals.profit, totals.clicks, totals.conversions, totals.seconds);
        }
        logln!(logger, LogEvent::Run, "Run finished after {} timesteps", summary.timesteps);
        Ok(summary)
    }

    fn step_timestep(&mut self, logger: &mut Logger) -> Result<StepOutcome, SimulationError> {
        let step_start = Instant::now();
        let policy_time_before = self.time.policy_total();
        self.phase = SimulationPhase::Stepping;
        self.timestep += 1;
        let timestep = self.timestep;

        let arrivals: Vec<Arrival> = self.schedule.arrivals_at(timestep).to_vec();
        if arrivals.is_empty() {
            if timestep >= self.schedule.max_timestep() {
                self.phase = SimulationPhase::Finished;
            }
            logln!(logger, LogEvent::Timestep, "Timestep {}: no auction", timestep);
            return Ok(StepOutcome::NoAuction);
        }

        let mut step_events = Vec::new();
        for arrival in &arrivals {
            self.settle_arrival(arrival, &mut step_events, logger)?;
        }

        let previous_profits: Vec<f64> = self
            .feedback_history
            .iter()
            .map(|records| records.last().map(|r| r.cumulative_profit).unwrap_or(0.0))
            .collect();
        let feedback = self.aggregation.aggregate_all(&step_events, &previous_profits);

        for (ix, (policy, records)) in self.policies.iter_mut().zip(feedback.iter()).enumerate() {
            let start = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| policy.learn(records)));
            let elapsed = start.elapsed();
            self.time.add_policy(ix, elapsed);
            let acknowledged = result.map_err(|payload| SimulationError::WorkerFailed {
                policy: self.policy_names[ix].clone(),
                message: panic_message(payload.as_ref()),
            })?;
            if !acknowledged {
                warnln!(logger, LogEvent::Feedback, "Policy {} did not acknowledge feedback at timestep {}", self.policy_names[ix], timestep);
            }
            logln!(logger, LogEvent::Feedback, "Timestep {}: {} learned from {} records in {:.3} ms",
                timestep, self.policy_names[ix], records.len(), elapsed.as_secs_f64() * 1000.0);
        }
        for (history, records) in self.feedback_history.iter_mut().zip(feedback) {
            history.extend(records);
        }
        self.events.extend(step_events);

        self.validate(timestep, arrivals.len(), logger)?;

        let policy_time = self.time.policy_total().saturating_sub(policy_time_before);
        self.time.add_simulator(step_start.elapsed().saturating_sub(policy_time));

        logln!(logger, LogEvent::Timestep, "Timestep {}: {} arrivals, profits {}",
            timestep, arrivals.len(), format_list(&self.ledger.profits));

        if timestep >= self.schedule.max_timestep() {
            self.phase = SimulationPhase::Finished;
        }
        Ok(StepOutcome::AuctionHappened)
    }

    /// Collect bids, settle every click of one arrival and record history
    fn settle_arrival(&mut self, arrival: &Arrival, step_events: &mut Vec<ClickEvent>, logger: &mut Logger) -> Result<(), SimulationError> {
        let bids = self.collect_bids(&arrival.attribute)?;
        if let Some(ix) = bids.iter().position(|b| !b.is_finite()) {
            return Err(SimulationError::InvalidParameter(format!(
                "Policy {} returned non-finite bid {} for attribute {}",
                self.policy_names[ix], bids[ix], arrival.attribute
            )));
        }
        let engine = self.engine.as_ref().ok_or(SimulationError::NotReady)?;

        let ranking = engine.rank(&bids, &mut self.rng)?;
        let max_bid = ranking.max_bidders.first().map(|&ix| bids[ix]).unwrap_or(0.0);
        let p_click = self.click_model.click_probability(arrival.theta, max_bid);
        let num_clicks = self.click_model.sample_clicks(arrival.num_auctions, p_click, &mut self.rng)?;
        let outcomes = self.outcomes.sample(arrival.prob_conversion, arrival.avg_revenue, num_clicks as usize, &mut self.rng)?;

        let mut costs = Vec::with_capacity(outcomes.len());
        for outcome in &outcomes {
            let click = engine.settle_click(&bids, &ranking, &mut self.rng)?;
            self.ledger.record_click(click.policy_index, click.cost, outcome.revenue, outcome.conversion);
            costs.push(click.cost);
            step_events.push(ClickEvent {
                timestep: arrival.timestep,
                attribute: arrival.attribute.clone(),
                num_auctions: arrival.num_auctions,
                bids: bids.clone(),
                winning_policy: click.policy_index,
                winning_policy_name: self.policy_names[click.policy_index].clone(),
                winning_bid: click.winning_bid,
                num_click: 1,
                cost_per_click: Some(click.cost),
                conversion: outcome.conversion,
                revenue: Some(outcome.revenue),
                costs_cumulative: self.ledger.costs.clone(),
                revenues_cumulative: self.ledger.revenues.clone(),
                profits_cumulative: self.ledger.profits.clone(),
            });
        }
        if num_clicks == 0 {
            let winner = engine.no_click_winner(&ranking, &mut self.rng)?;
            step_events.push(ClickEvent {
                timestep: arrival.timestep,
                attribute: arrival.attribute.clone(),
                num_auctions: arrival.num_auctions,
                bids: bids.clone(),
                winning_policy: winner,
                winning_policy_name: self.policy_names[winner].clone(),
                winning_bid: bids[winner],
                num_click: 0,
                cost_per_click: None,
                conversion: 0,
                revenue: None,
                costs_cumulative: self.ledger.costs.clone(),
                revenues_cumulative: self.ledger.revenues.clone(),
                profits_cumulative: self.ledger.profits.clone(),
            });
        }

        let num_conversion: u64 = outcomes.iter().map(|o| o.conversion as u64).sum();
        let revenue: f64 = outcomes.iter().map(|o| o.revenue).sum();
        let record = AuctionRecord {
            timestep: arrival.timestep,
            attribute: arrival.attribute.clone(),
            arrival_rate: arrival.arrival_rate,
            num_auctions: arrival.num_auctions,
            bids,
            theta: arrival.theta,
            p_click,
            num_click: num_clicks,
            cost_per_click: mean(&costs),
            num_conversion,
            revenue_per_conversion: if num_conversion > 0 { Some(revenue / num_conversion as f64) } else { None },
            costs_cumulative: self.ledger.costs.clone(),
            revenues_cumulative: self.ledger.revenues.clone(),
            profits_cumulative: self.ledger.profits.clone(),
            time_spent: self.time.policy_seconds_all(),
        };
        if logger.is_enabled(LogEvent::Auction) {
            logln!(logger, LogEvent::Auction, "{},{},{},{},{},{},{},{},{},{}",
                record.timestep, record.attribute, record.num_auctions, format_list(&record.bids), record.theta,
                record.p_click, record.num_click, format_optional(record.cost_per_click), record.num_conversion,
                format_optional(record.revenue_per_conversion));
        }
        self.history.push(record);
        Ok(())
    }

    /// Ask every policy for its bid, in policy order
    fn collect_bids(&mut self, attribute: &Attribute) -> Result<Vec<f64>, SimulationError> {
        match self.config.bid_collection {
            BidCollection::Sequential => {
                let mut bids = Vec::with_capacity(self.policies.len());
                for (ix, policy) in self.policies.iter_mut().enumerate() {
                    let start = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| policy.bid(attribute)));
                    self.time.add_policy(ix, start.elapsed());
                    match result {
                        Ok(bid) => bids.push(bid),
                        Err(payload) => {
                            return Err(SimulationError::WorkerFailed {
                                policy: policy.name().to_string(),
                                message: panic_message(payload.as_ref()),
                            })
                        }
                    }
                }
                Ok(bids)
            }
            BidCollection::Parallel { .. } => self.collect_bids_parallel(attribute),
        }
    }

    /// Move every policy into the worker pool, bid, and take the policies back
    ///
    /// Replies come back in policy order regardless of completion order. All policies are
    /// restored before a failure is reported, and a failed bid set is never settled.
    fn collect_bids_parallel(&mut self, attribute: &Attribute) -> Result<Vec<f64>, SimulationError> {
        let pool = self.pool.as_ref().ok_or(SimulationError::NotReady)?;
        let policies = std::mem::take(&mut self.policies);

        let replies: Vec<BidReply> = pool.install(|| {
            policies
                .into_par_iter()
                .map(|mut policy| {
                    let start = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| policy.bid(attribute)))
                        .map_err(|payload| panic_message(payload.as_ref()));
                    BidReply {
                        result,
                        elapsed: start.elapsed(),
                        policy,
                    }
                })
                .collect()
        });

        let mut bids = Vec::with_capacity(replies.len());
        let mut failure = None;
        for (ix, reply) in replies.into_iter().enumerate() {
            self.time.add_policy(ix, reply.elapsed);
            match reply.result {
                Ok(bid) => bids.push(bid),
                Err(message) => {
                    if failure.is_none() {
                        failure = Some((reply.policy.name().to_string(), message));
                    }
                }
            }
            self.policies.push(reply.policy);
        }

        match failure {
            Some((policy, message)) => Err(SimulationError::WorkerFailed { policy, message }),
            None => Ok(bids),
        }
    }

    /// Check bookkeeping invariants after a step
    fn validate(&self, timestep: usize, num_arrivals: usize, logger: &mut Logger) -> Result<(), SimulationError> {
        if let Some(ix) = self.ledger.profit_mismatch() {
            let detail = format!("profit of policy {} at timestep {} is not revenue minus cost", self.policy_names[ix], timestep);
            errln!(logger, LogEvent::Validation, "{}", detail);
            return Err(SimulationError::InvariantViolated(detail));
        }
        let start = self.history.len().saturating_sub(num_arrivals);
        for record in &self.history[start..] {
            if record.num_click > record.num_auctions || record.num_conversion > record.num_click {
                let detail = format!("arrival {} at timestep {} has {} auctions, {} clicks, {} conversions",
                    record.attribute, timestep, record.num_auctions, record.num_click, record.num_conversion);
                errln!(logger, LogEvent::Validation, "{}", detail);
                return Err(SimulationError::InvariantViolated(detail));
            }
        }
        logln!(logger, LogEvent::Validation, "Timestep {}: invariants hold", timestep);
        Ok(())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// Last timestep processed (0 before the first step)
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn schedule(&self) -> &ArrivalSchedule {
        &self.schedule
    }

    pub fn policies(&self) -> &[Box<dyn PolicyPort>] {
        &self.policies
    }

    pub fn policy_names(&self) -> &[String] {
        &self.policy_names
    }

    /// Slots actually used by the settlement engine
    pub fn effective_slots(&self) -> usize {
        self.engine.as_ref().map(|e| e.effective_slots()).unwrap_or(0)
    }

    pub fn history(&self) -> &[AuctionRecord] {
        &self.history
    }

    pub fn events(&self) -> &[ClickEvent] {
        &self.events
    }

    /// Feedback records handed to each policy, indexed by policy
    pub fn feedback_history(&self) -> &[Vec<PolicyFeedback>] {
        &self.feedback_history
    }

    pub fn ledger(&self) -> &PolicyLedger {
        &self.ledger
    }

    pub fn time_spent(&self) -> &TimeLedger {
        &self.time
    }

    pub fn summary(&self) -> RunSummary {
        let policies = self
            .policy_names
            .iter()
            .enumerate()
            .map(|(ix, name)| PolicyTotals {
                name: name.clone(),
                cost: self.ledger.costs[ix],
                revenue: self.ledger.revenues[ix],
                profit: self.ledger.profits[ix],
                clicks: self.ledger.clicks[ix],
                conversions: self.ledger.conversions[ix],
                seconds: self.time.policy_seconds(ix),
            })
            .collect();
        RunSummary {
            timesteps: self.timestep,
            simulator_seconds: self.time.simulator_seconds(),
            policies,
        }
    }
}

/// Compare a policy's attribute set with the schedule's
fn check_attributes(policy: &dyn PolicyPort, schedule_attributes: &[Attribute]) -> Result<(), SimulationError> {
    let mut policy_attributes = policy.attributes().to_vec();
    policy_attributes.sort();
    policy_attributes.dedup();
    if policy_attributes == schedule_attributes {
        return Ok(());
    }
    let detail = match schedule_attributes.iter().find(|a| policy_attributes.binary_search(*a).is_err()) {
        Some(missing) => format!("schedule attribute {} is unknown to the policy", missing),
        None => format!("policy has {} attributes, schedule has {}", policy_attributes.len(), schedule_attributes.len()),
    };
    Err(SimulationError::ConfigurationMismatch {
        policy: policy.name().to_string(),
        detail,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "policy panicked".to_string()
    }
}
