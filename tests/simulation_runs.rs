use bidarena::aggregation::PolicyFeedback;
use bidarena::export::{export_run, write_events};
use bidarena::logger::MemoryReceiver;
use bidarena::policies::ConstantPolicy;
use bidarena::{
    ArrivalGenerator, ArrivalSchedule, Attribute, AttributeDimension, BidCollection, GeneratorConfig, LogEvent, Logger,
    PolicyConfig, PolicyPort, SimulationError, SimulationPhase, Simulator, SimulatorConfig, StepOutcome,
};
use tempfile::TempDir;

const POLICY_IDS: [&str; 4] = ["constant", "expected_revenue", "outbid", "random"];

fn generator_config() -> GeneratorConfig {
    GeneratorConfig::new(
        vec![
            AttributeDimension::random("device", vec![0, 1]),
            AttributeDimension::random("region", vec![0, 1, 2]).with_arrival_rate(vec![8.0, 0.0, 15.0]),
        ],
        6,
    )
}

fn schedule() -> ArrivalSchedule {
    ArrivalGenerator::new(&generator_config()).unwrap().generate().unwrap()
}

fn run_registered(config: SimulatorConfig) -> Simulator {
    let mut logger = Logger::new();
    let mut sim = Simulator::new(config);
    sim.load_registered(schedule(), &POLICY_IDS, &mut logger).unwrap();
    sim.run(&mut logger).unwrap();
    sim
}

/// Bids 1, 2, 3, ... (mod 10), one step per call
struct CountingPolicy {
    name: String,
    attributes: Vec<Attribute>,
    bids_made: u64,
    panic_on: Option<u64>,
    panic_on_learn: bool,
}

impl CountingPolicy {
    fn new(name: &str, attributes: Vec<Attribute>, panic_on: Option<u64>) -> Self {
        Self { name: name.to_string(), attributes, bids_made: 0, panic_on, panic_on_learn: false }
    }

    fn failing_to_learn(name: &str, attributes: Vec<Attribute>) -> Self {
        Self { panic_on_learn: true, ..Self::new(name, attributes, None) }
    }
}

impl PolicyPort for CountingPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn bid(&mut self, _attribute: &Attribute) -> f64 {
        self.bids_made += 1;
        if Some(self.bids_made) == self.panic_on {
            panic!("counting policy gave up");
        }
        (self.bids_made % 10) as f64
    }

    fn learn(&mut self, _feedback: &[PolicyFeedback]) -> bool {
        if self.panic_on_learn {
            panic!("counting policy cannot learn");
        }
        true
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

#[test]
fn test_identical_runs_write_identical_event_logs() {
    let first = run_registered(SimulatorConfig::default());
    let second = run_registered(SimulatorConfig::default());

    let dir = TempDir::new().unwrap();
    let path_a = dir.path().join("events_a.jsonl");
    let path_b = dir.path().join("events_b.jsonl");
    write_events(&path_a, first.events()).unwrap();
    write_events(&path_b, second.events()).unwrap();
    let bytes_a = std::fs::read(&path_a).unwrap();
    let bytes_b = std::fs::read(&path_b).unwrap();
    assert!(!bytes_a.is_empty());
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_sequential_and_parallel_settle_identically() {
    let sequential = run_registered(SimulatorConfig::default());
    let parallel = run_registered(
        SimulatorConfig::default().with_bid_collection(BidCollection::Parallel { workers: Some(3) }),
    );
    assert_eq!(sequential.events(), parallel.events());
    assert_eq!(sequential.history().len(), parallel.history().len());
    assert_eq!(sequential.ledger(), parallel.ledger());
    assert_eq!(sequential.feedback_history(), parallel.feedback_history());
}

#[test]
fn test_multi_slot_sequential_and_parallel_settle_identically() {
    let sequential = run_registered(SimulatorConfig::multi_slot(8));
    let parallel = run_registered(
        SimulatorConfig::multi_slot(8).with_bid_collection(BidCollection::Parallel { workers: None }),
    );
    assert_eq!(sequential.effective_slots(), 4);
    assert_eq!(sequential.events(), parallel.events());
    assert_eq!(sequential.ledger(), parallel.ledger());
}

#[test]
fn test_profit_invariant_holds_after_every_step() {
    let mut logger = Logger::new();
    let mut sim = Simulator::new(SimulatorConfig::multi_slot(3));
    sim.load_registered(schedule(), &POLICY_IDS, &mut logger).unwrap();
    while sim.phase() != SimulationPhase::Finished {
        sim.step(&mut logger).unwrap();
        let ledger = sim.ledger();
        for ix in 0..POLICY_IDS.len() {
            assert_eq!(ledger.profits[ix], ledger.revenues[ix] - ledger.costs[ix]);
        }
    }
    assert_eq!(sim.timestep(), 6);
}

#[test]
fn test_click_and_conversion_bounds() {
    for config in [SimulatorConfig::default(), SimulatorConfig::multi_slot(8)] {
        let sim = run_registered(config);
        assert_eq!(sim.history().len(), schedule().len());
        for record in sim.history() {
            assert!(record.num_click <= record.num_auctions);
            assert!(record.num_conversion <= record.num_click);
        }
        for records in sim.feedback_history() {
            for record in records {
                assert_eq!(record.cost_per_click.is_none(), record.num_click == 0);
                assert_eq!(record.revenue_per_conversion.is_none(), record.num_conversion == 0);
                assert!(record.num_conversion <= record.num_click);
            }
        }
    }
}

#[test]
fn test_multi_slot_costs_never_exceed_winning_bid() {
    let sim = run_registered(SimulatorConfig::multi_slot(8));
    for event in sim.events() {
        if let Some(cost) = event.cost_per_click {
            assert!(cost <= event.winning_bid);
            assert_eq!(event.bids[event.winning_policy], event.winning_bid);
        }
    }
}

#[test]
fn test_parallel_mode_keeps_policy_state() {
    let schedule = schedule();
    let attributes = schedule.attributes();
    let policies: Vec<Box<dyn PolicyPort>> = vec![
        Box::new(CountingPolicy::new("counter", attributes.clone(), None)),
        Box::new(ConstantPolicy::with_bid(&PolicyConfig::new("flat", attributes, vec![0.0], 6, 1), 0.5)),
    ];
    let mut logger = Logger::new();
    let mut sim = Simulator::new(SimulatorConfig::default().with_bid_collection(BidCollection::Parallel { workers: Some(2) }));
    sim.load(schedule, policies, &mut logger).unwrap();
    sim.run(&mut logger).unwrap();

    for (k, record) in sim.history().iter().enumerate() {
        assert_eq!(record.bids[0], ((k as u64 + 1) % 10) as f64);
        assert_eq!(record.bids[1], 0.5);
    }
}

#[test]
fn test_worker_panic_aborts_run() {
    for bid_collection in [BidCollection::Sequential, BidCollection::Parallel { workers: Some(2) }] {
        let schedule = schedule();
        let attributes = schedule.attributes();
        let policies: Vec<Box<dyn PolicyPort>> = vec![
            Box::new(CountingPolicy::new("steady", attributes.clone(), None)),
            Box::new(CountingPolicy::new("fragile", attributes, Some(8))),
        ];
        let (receiver, handle) = MemoryReceiver::new(vec![LogEvent::Run]);
        let mut logger = Logger::new();
        logger.add_receiver(receiver);
        let mut sim = Simulator::new(SimulatorConfig::default().with_bid_collection(bid_collection));
        sim.load(schedule, policies, &mut logger).unwrap();

        let error = sim.run(&mut logger).unwrap_err();
        match error {
            SimulationError::WorkerFailed { policy, message } => {
                assert_eq!(policy, "fragile");
                assert!(message.contains("gave up"));
            }
            other => panic!("unexpected error {}", other),
        }
        assert_eq!(sim.phase(), SimulationPhase::Aborted);
        assert_eq!(sim.policies().len(), 2);
        assert!(matches!(sim.step(&mut logger), Err(SimulationError::Aborted)));
        assert!(handle.contents().contains("ERROR Timestep 2 aborted"));
    }
}

#[test]
fn test_learn_panic_aborts_run() {
    for bid_collection in [BidCollection::Sequential, BidCollection::Parallel { workers: Some(2) }] {
        let schedule = schedule();
        let attributes = schedule.attributes();
        let policies: Vec<Box<dyn PolicyPort>> = vec![
            Box::new(CountingPolicy::new("steady", attributes.clone(), None)),
            Box::new(CountingPolicy::failing_to_learn("forgetful", attributes)),
        ];
        let (receiver, handle) = MemoryReceiver::new(vec![LogEvent::Run]);
        let mut logger = Logger::new();
        logger.add_receiver(receiver);
        let mut sim = Simulator::new(SimulatorConfig::default().with_bid_collection(bid_collection));
        sim.load(schedule, policies, &mut logger).unwrap();

        match sim.step(&mut logger) {
            Err(SimulationError::WorkerFailed { policy, message }) => {
                assert_eq!(policy, "forgetful");
                assert!(message.contains("cannot learn"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sim.phase(), SimulationPhase::Aborted);
        assert_eq!(sim.policies().len(), 2);
        assert!(matches!(sim.step(&mut logger), Err(SimulationError::Aborted)));
        assert!(sim.feedback_history().iter().all(|records| records.is_empty()));
        assert!(handle.contents().contains("ERROR Timestep 1 aborted"));
    }
}

#[test]
fn test_attribute_mismatch_aborts_before_first_step() {
    let schedule = schedule();
    let mut attributes = schedule.attributes();
    attributes.pop();
    let policies: Vec<Box<dyn PolicyPort>> = vec![Box::new(CountingPolicy::new("short", attributes, None))];
    let mut logger = Logger::new();
    let mut sim = Simulator::new(SimulatorConfig::default());
    assert!(matches!(
        sim.load(schedule, policies, &mut logger),
        Err(SimulationError::ConfigurationMismatch { .. })
    ));
    assert_eq!(sim.timestep(), 0);
    assert!(matches!(sim.step(&mut logger), Err(SimulationError::Aborted)));
}

#[test]
fn test_saved_schedule_replays_identically() {
    let original = schedule();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schedule.json");
    original.save_json(&path).unwrap();
    let replayed = ArrivalSchedule::load_json(&path).unwrap();
    assert_eq!(original, replayed);

    let mut logger = Logger::new();
    let mut a = Simulator::new(SimulatorConfig::default());
    a.load_registered(original, &POLICY_IDS, &mut logger).unwrap();
    a.run(&mut logger).unwrap();
    let mut b = Simulator::new(SimulatorConfig::default());
    b.load_registered(replayed, &POLICY_IDS, &mut logger).unwrap();
    b.run(&mut logger).unwrap();
    assert_eq!(a.events(), b.events());
}

#[test]
fn test_export_run_writes_every_table() {
    let sim = run_registered(SimulatorConfig::default());
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("export");
    let written = export_run(&sim, &dir).unwrap();
    assert_eq!(written.len(), 4 + POLICY_IDS.len());
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }
    let history = std::fs::read_to_string(dir.join("aggregate_history.csv")).unwrap();
    assert_eq!(history.lines().count(), 1 + sim.history().len());
    let events = std::fs::read_to_string(dir.join("events.jsonl")).unwrap();
    assert_eq!(events.lines().count(), sim.events().len());
}

#[test]
fn test_first_step_on_empty_timestep_reports_no_auction() {
    let mut arrivals = schedule().arrivals().to_vec();
    for arrival in &mut arrivals {
        arrival.timestep += 1;
    }
    let shifted = ArrivalSchedule::from_arrivals(arrivals);
    let mut logger = Logger::new();
    let mut sim = Simulator::new(SimulatorConfig::default());
    sim.load_registered(shifted, &POLICY_IDS, &mut logger).unwrap();
    assert_eq!(sim.step(&mut logger).unwrap(), StepOutcome::NoAuction);
    assert!(sim.history().is_empty());
    assert_eq!(sim.step(&mut logger).unwrap(), StepOutcome::AuctionHappened);
}
