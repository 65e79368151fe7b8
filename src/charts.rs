use plotters::prelude::*;
use std::path::Path;

use crate::errors::SimulationError;
use crate::simulation::AuctionRecord;

/// Cumulative profit of each policy at the end of each timestep
///
/// Returns one series per policy of `(timestep, profit)` points, taken from the last
/// history row of every timestep.
pub fn profit_series(history: &[AuctionRecord], num_policies: usize) -> Vec<Vec<(f64, f64)>> {
    let mut series = vec![Vec::new(); num_policies];
    for (ix, record) in history.iter().enumerate() {
        let last_of_timestep = history.get(ix + 1).map_or(true, |next| next.timestep != record.timestep);
        if !last_of_timestep {
            continue;
        }
        for (policy, points) in series.iter_mut().enumerate() {
            if let Some(&profit) = record.profits_cumulative.get(policy) {
                points.push((record.timestep as f64, profit));
            }
        }
    }
    series
}

/// Draw cumulative profit per policy over time as an SVG line chart
///
/// The crate is built without a font backend, so the chart carries lines only; policy `i`
/// is drawn in `Palette99::pick(i)`.
///
/// # Arguments
/// * `history` - Master aggregate history of a run
/// * `num_policies` - Number of competing policies
/// * `path` - Output file, parent directories are created
pub fn generate_profit_chart(history: &[AuctionRecord], num_policies: usize, path: &Path) -> Result<(), SimulationError> {
    let series = profit_series(history, num_policies);
    let points: Vec<&(f64, f64)> = series.iter().flatten().collect();
    if points.is_empty() {
        return Err(SimulationError::Chart("No history to draw".to_string()));
    }

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &&(x, y) in &points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    let y_pad = ((y_max - y_min) * 0.05).max(1.0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x_min..x_max, (y_min - y_pad)..(y_max + y_pad))
        .map_err(chart_error)?;

    chart
        .draw_series(LineSeries::new(vec![(x_min, 0.0), (x_max, 0.0)], &BLACK.mix(0.3)))
        .map_err(chart_error)?;
    for (ix, points) in series.into_iter().enumerate() {
        chart
            .draw_series(LineSeries::new(points, &Palette99::pick(ix)))
            .map_err(chart_error)?;
    }

    root.present().map_err(chart_error)?;
    Ok(())
}

fn chart_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> SimulationError {
    SimulationError::Chart(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;

    fn record(timestep: usize, profits: Vec<f64>) -> AuctionRecord {
        AuctionRecord {
            timestep,
            attribute: Attribute::new(vec![0]),
            arrival_rate: 1.0,
            num_auctions: 1,
            bids: vec![1.0; profits.len()],
            theta: 0.0,
            p_click: 0.25,
            num_click: 0,
            cost_per_click: None,
            num_conversion: 0,
            revenue_per_conversion: None,
            costs_cumulative: vec![0.0; profits.len()],
            revenues_cumulative: vec![0.0; profits.len()],
            profits_cumulative: profits,
            time_spent: vec![0.0, 0.0],
        }
    }

    #[test]
    fn test_profit_series_takes_last_row_per_timestep() {
        let history = vec![
            record(1, vec![1.0, 0.0]),
            record(1, vec![2.0, -1.0]),
            record(2, vec![4.0, -3.0]),
        ];
        let series = profit_series(&history, 2);
        assert_eq!(series[0], vec![(1.0, 2.0), (2.0, 4.0)]);
        assert_eq!(series[1], vec![(1.0, -1.0), (2.0, -3.0)]);
    }

    #[test]
    fn test_generate_profit_chart_writes_svg() {
        let history = vec![record(1, vec![1.0, 0.0]), record(2, vec![3.0, -2.0])];
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profit.svg");
        generate_profit_chart(&history, 2, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(generate_profit_chart(&[], 2, &path).is_err());
    }
}
