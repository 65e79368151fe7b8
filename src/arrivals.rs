// Auction demand, one Arrival per (timestep, attribute). The whole schedule is generated
// up front; only the auction count is redrawn per timestep.

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::attributes::{Attribute, AttributeSet, AttributeSpec};
use crate::config::GeneratorConfig;
use crate::errors::SimulationError;

/// One (timestep, attribute) unit of auction demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub timestep: usize,
    pub attribute: Attribute,
    /// Summed Poisson mean the auction count was drawn from
    pub arrival_rate: f64,
    pub num_auctions: u64,
    /// Summed click sensitivity
    pub theta: f64,
    pub avg_revenue: f64,
    pub prob_conversion: f64,
}

/// Ordered arrival schedule (by timestep, then attribute)
///
/// Serialized as the bare arrival list; deserializing goes through `from_arrivals`, so a
/// hand-edited or reordered file still yields an ordered schedule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Arrival>", into = "Vec<Arrival>")]
pub struct ArrivalSchedule {
    arrivals: Vec<Arrival>,
}

impl From<Vec<Arrival>> for ArrivalSchedule {
    fn from(arrivals: Vec<Arrival>) -> Self {
        ArrivalSchedule::from_arrivals(arrivals)
    }
}

impl From<ArrivalSchedule> for Vec<Arrival> {
    fn from(schedule: ArrivalSchedule) -> Self {
        schedule.arrivals
    }
}

impl ArrivalSchedule {
    /// Build a schedule from arbitrary arrivals; they are put in (timestep, attribute) order
    pub fn from_arrivals(mut arrivals: Vec<Arrival>) -> Self {
        arrivals.sort_by(|a, b| a.timestep.cmp(&b.timestep).then_with(|| a.attribute.cmp(&b.attribute)));
        Self { arrivals }
    }

    pub fn arrivals(&self) -> &[Arrival] {
        &self.arrivals
    }

    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Distinct attributes of the schedule, sorted
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> = self.arrivals.iter().map(|a| a.attribute.clone()).collect();
        attributes.sort();
        attributes.dedup();
        attributes
    }

    /// Last timestep with at least one arrival, 0 for an empty schedule
    pub fn max_timestep(&self) -> usize {
        self.arrivals.last().map(|a| a.timestep).unwrap_or(0)
    }

    /// All arrivals of one timestep, in attribute order
    pub fn arrivals_at(&self, timestep: usize) -> &[Arrival] {
        let start = self.arrivals.partition_point(|a| a.timestep < timestep);
        let end = self.arrivals.partition_point(|a| a.timestep <= timestep);
        &self.arrivals[start..end]
    }

    /// Persist the schedule as JSON so a later run can replay the same demand
    pub fn save_json(&self, path: &Path) -> Result<(), SimulationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load a schedule written by `save_json`
    pub fn load_json(path: &Path) -> Result<Self, SimulationError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Builds arrival schedules from attribute dimension configuration
pub struct ArrivalGenerator {
    attribute_set: AttributeSet,
    max_t: usize,
    rng: StdRng,
}

impl ArrivalGenerator {
    /// Realize every dimension (random parameters are drawn here, once)
    pub fn new(config: &GeneratorConfig) -> Result<Self, SimulationError> {
        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let num_dimensions = config.dimensions.len();
        let specs = config
            .dimensions
            .iter()
            .map(|dimension| AttributeSpec::realize(dimension, &config.random_ranges, num_dimensions, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            attribute_set: AttributeSet::new(specs),
            max_t: config.max_t,
            rng,
        })
    }

    pub fn all_attributes(&self) -> Vec<Attribute> {
        self.attribute_set.all_attributes()
    }

    /// Generate arrivals for timesteps `1..=max_t` and every attribute
    pub fn generate(&mut self) -> Result<ArrivalSchedule, SimulationError> {
        let attributes = self.attribute_set.all_attributes();
        let mut arrivals = Vec::with_capacity(self.max_t * attributes.len());
        for timestep in 1..=self.max_t {
            for attribute in &attributes {
                let params = self.attribute_set.composite(attribute).ok_or_else(|| {
                    SimulationError::InvalidParameter(format!("Attribute {} is outside the configured dimensions", attribute))
                })?;
                let num_auctions = sample_auction_count(params.arrival_rate, &mut self.rng)?;
                arrivals.push(Arrival {
                    timestep,
                    attribute: attribute.clone(),
                    arrival_rate: params.arrival_rate,
                    num_auctions,
                    theta: params.theta,
                    avg_revenue: params.avg_revenue,
                    prob_conversion: params.prob_conversion,
                });
            }
        }
        Ok(ArrivalSchedule { arrivals })
    }
}

/// Poisson draw of the auction count; a non-positive rate means no auctions
fn sample_auction_count(arrival_rate: f64, rng: &mut StdRng) -> Result<u64, SimulationError> {
    if arrival_rate <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(arrival_rate)
        .map_err(|e| SimulationError::InvalidParameter(format!("Poisson({}): {}", arrival_rate, e)))?;
    let draw: f64 = poisson.sample(rng);
    Ok(draw as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeDimension;

    fn two_dimension_config(seed: u64) -> GeneratorConfig {
        GeneratorConfig::new(
            vec![
                AttributeDimension::random("device", vec![0, 1]),
                AttributeDimension::random("region", vec![0, 1, 2]).with_arrival_rate(vec![5.0, 0.0, 10.0]),
            ],
            4,
        )
        .with_seed(seed)
    }

    #[test]
    fn test_schedule_covers_every_timestep_and_attribute() {
        let mut generator = ArrivalGenerator::new(&two_dimension_config(1)).unwrap();
        let schedule = generator.generate().unwrap();
        assert_eq!(schedule.len(), 4 * 6);
        assert_eq!(schedule.max_timestep(), 4);
        assert_eq!(schedule.attributes().len(), 6);
        for t in 1..=4 {
            let at = schedule.arrivals_at(t);
            assert_eq!(at.len(), 6);
            assert!(at.iter().all(|a| a.timestep == t));
            assert!(at.windows(2).all(|w| w[0].attribute < w[1].attribute));
        }
        assert!(schedule.arrivals_at(5).is_empty());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = ArrivalGenerator::new(&two_dimension_config(7)).unwrap().generate().unwrap();
        let b = ArrivalGenerator::new(&two_dimension_config(7)).unwrap().generate().unwrap();
        let c = ArrivalGenerator::new(&two_dimension_config(8)).unwrap().generate().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parameters_frozen_across_timesteps() {
        let schedule = ArrivalGenerator::new(&two_dimension_config(3)).unwrap().generate().unwrap();
        let first = schedule.arrivals_at(1);
        let last = schedule.arrivals_at(4);
        for (a, b) in first.iter().zip(last.iter()) {
            assert_eq!(a.attribute, b.attribute);
            assert_eq!(a.theta, b.theta);
            assert_eq!(a.avg_revenue, b.avg_revenue);
            assert_eq!(a.prob_conversion, b.prob_conversion);
            assert_eq!(a.arrival_rate, b.arrival_rate);
        }
    }

    #[test]
    fn test_zero_rate_gives_zero_auctions() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_auction_count(0.0, &mut rng).unwrap(), 0);
        assert_eq!(sample_auction_count(-3.0, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_json_round_trip_and_ordering() {
        let schedule = ArrivalGenerator::new(&two_dimension_config(5)).unwrap().generate().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schedule.json");
        schedule.save_json(&path).unwrap();
        let loaded = ArrivalSchedule::load_json(&path).unwrap();
        assert_eq!(schedule, loaded);

        let mut reversed = schedule.arrivals().to_vec();
        reversed.reverse();
        assert_eq!(ArrivalSchedule::from_arrivals(reversed), schedule);
    }

    #[test]
    fn test_deserializing_unordered_arrivals_restores_order() {
        let schedule = ArrivalGenerator::new(&two_dimension_config(9)).unwrap().generate().unwrap();
        let mut shuffled: Vec<Arrival> = schedule.arrivals_at(2).to_vec();
        shuffled.extend(schedule.arrivals_at(1).iter().cloned());
        let json = serde_json::to_string(&shuffled).unwrap();

        let loaded: ArrivalSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.max_timestep(), 2);
        assert_eq!(loaded.arrivals_at(1).len(), 6);
        assert!(loaded.arrivals_at(1).iter().all(|a| a.timestep == 1));
        assert_eq!(loaded.arrivals_at(2), schedule.arrivals_at(2));
    }
}
