// CSV tables are written through a logger file receiver: header row, then comma joined
// rows, undefined values left empty. Events go out as JSON lines.

use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregation::{ClickEvent, PolicyFeedback};
use crate::errors::SimulationError;
use crate::logger::{sanitize_filename, FileReceiver, LogEvent, Logger};
use crate::simulation::{AuctionRecord, RunSummary, Simulator, TimeLedger};
use crate::utils::{format_list, format_optional};

/// Write a CSV table through a dedicated logger
fn write_table<I>(path: &Path, header: &[&str], rows: I) -> Result<(), SimulationError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut logger = Logger::new();
    logger.add_receiver(FileReceiver::new(path, vec![LogEvent::Run])?);
    logger.logln(LogEvent::Run, &header.join(","))?;
    for row in rows {
        logger.logln(LogEvent::Run, &row.join(","))?;
    }
    logger.flush()?;
    Ok(())
}

/// Master aggregate history, one row per processed arrival
pub fn write_master_history(path: &Path, history: &[AuctionRecord]) -> Result<(), SimulationError> {
    let header = [
        "timestep", "attribute", "arrival_rate", "num_auctions", "bids", "theta", "p_click", "num_click",
        "cost_per_click", "num_conversion", "revenue_per_conversion", "costs_cumulative",
        "revenues_cumulative", "profits_cumulative", "time_spent",
    ];
    let rows = history.iter().map(|h| {
        vec![
            h.timestep.to_string(),
            h.attribute.to_string(),
            h.arrival_rate.to_string(),
            h.num_auctions.to_string(),
            format_list(&h.bids),
            h.theta.to_string(),
            h.p_click.to_string(),
            h.num_click.to_string(),
            format_optional(h.cost_per_click),
            h.num_conversion.to_string(),
            format_optional(h.revenue_per_conversion),
            format_list(&h.costs_cumulative),
            format_list(&h.revenues_cumulative),
            format_list(&h.profits_cumulative),
            format_list(&h.time_spent),
        ]
    });
    write_table(path, &header, rows)
}

/// Feedback records handed to one policy
pub fn write_policy_feedback(path: &Path, records: &[PolicyFeedback]) -> Result<(), SimulationError> {
    let header = [
        "timestep", "attribute", "num_auctions", "your_bid", "winning_bid", "winning_bid_avg",
        "num_impression", "num_click", "cost_per_click", "num_conversion", "revenue_per_conversion",
        "cumulative_profit",
    ];
    let rows = records.iter().map(|r| {
        vec![
            r.timestep.to_string(),
            r.attribute.to_string(),
            r.num_auctions.to_string(),
            r.your_bid.to_string(),
            r.winning_bid.to_string(),
            format_optional(r.winning_bid_avg),
            r.num_impression.to_string(),
            r.num_click.to_string(),
            format_optional(r.cost_per_click),
            r.num_conversion.to_string(),
            format_optional(r.revenue_per_conversion),
            r.cumulative_profit.to_string(),
        ]
    });
    write_table(path, &header, rows)
}

/// Seconds spent in the simulator and in every policy
pub fn write_time_spent(path: &Path, time: &TimeLedger, policy_names: &[String]) -> Result<(), SimulationError> {
    let mut rows = vec![vec!["simulator".to_string(), time.simulator_seconds().to_string()]];
    rows.extend(
        policy_names
            .iter()
            .enumerate()
            .map(|(ix, name)| vec![name.clone(), time.policy_seconds(ix).to_string()]),
    );
    write_table(path, &["name", "seconds"], rows)
}

/// Final cost, revenue and profit of every policy
pub fn write_policy_totals(path: &Path, summary: &RunSummary) -> Result<(), SimulationError> {
    let rows = summary.policies.iter().map(|p| {
        vec![
            p.name.clone(),
            p.cost.to_string(),
            p.revenue.to_string(),
            p.profit.to_string(),
            p.clicks.to_string(),
            p.conversions.to_string(),
        ]
    });
    write_table(path, &["name", "cost", "revenue", "profit", "clicks", "conversions"], rows)
}

/// Write any serializable records as JSON lines
pub fn write_json_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<(), SimulationError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Event log of a run as JSON lines; identical runs produce identical files
pub fn write_events(path: &Path, events: &[ClickEvent]) -> Result<(), SimulationError> {
    write_json_lines(path, events)
}

/// Write every result table of a simulator into `dir`
///
/// Returns the paths written: `aggregate_history.csv`, one `policy_feedback_<name>.csv` per
/// policy, `time_spent.csv`, `policy_totals.csv` and `events.jsonl`.
pub fn export_run(simulator: &Simulator, dir: &Path) -> Result<Vec<PathBuf>, SimulationError> {
    create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join("aggregate_history.csv");
    write_master_history(&path, simulator.history())?;
    written.push(path);

    for (name, records) in simulator.policy_names().iter().zip(simulator.feedback_history()) {
        let path = dir.join(format!("policy_feedback_{}.csv", sanitize_filename(name)));
        write_policy_feedback(&path, records)?;
        written.push(path);
    }

    let path = dir.join("time_spent.csv");
    write_time_spent(&path, simulator.time_spent(), simulator.policy_names())?;
    written.push(path);

    let path = dir.join("policy_totals.csv");
    write_policy_totals(&path, &simulator.summary())?;
    written.push(path);

    let path = dir.join("events.jsonl");
    write_events(&path, simulator.events())?;
    written.push(path);

    Ok(written)
}
