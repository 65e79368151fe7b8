// Parameters of a composite attribute are the sums of its per-dimension components, each
// indexed by the value's position in that dimension's domain.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::SimulationError;
use crate::utils::scaled_beta_samples;

/// Immutable tuple of categorical values identifying a market segment
/// Ordering is lexicographic, which gives deterministic iteration everywhere attributes are keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Attribute(pub Vec<usize>);

impl Attribute {
    pub fn new(values: Vec<usize>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(" "))
    }
}

/// How a parameter of an attribute dimension is configured
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeParam {
    /// One value per element of the dimension domain, used for every timestep
    Fixed(Vec<f64>),
    /// Drawn once at setup from a scaled Beta(2, 2) and frozen for the run
    Random,
}

/// Configuration of one attribute dimension
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDimension {
    pub name: String,
    pub values: Vec<usize>,
    pub arrival_rate: AttributeParam,
    pub click_sensitivity: AttributeParam,
    pub avg_revenue: AttributeParam,
    pub prob_conversion: AttributeParam,
}

impl AttributeDimension {
    /// Create a dimension whose parameters are all drawn at random
    pub fn random(name: &str, values: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            values,
            arrival_rate: AttributeParam::Random,
            click_sensitivity: AttributeParam::Random,
            avg_revenue: AttributeParam::Random,
            prob_conversion: AttributeParam::Random,
        }
    }

    pub fn with_arrival_rate(mut self, values: Vec<f64>) -> Self {
        self.arrival_rate = AttributeParam::Fixed(values);
        self
    }

    pub fn with_click_sensitivity(mut self, values: Vec<f64>) -> Self {
        self.click_sensitivity = AttributeParam::Fixed(values);
        self
    }

    pub fn with_avg_revenue(mut self, values: Vec<f64>) -> Self {
        self.avg_revenue = AttributeParam::Fixed(values);
        self
    }

    pub fn with_prob_conversion(mut self, values: Vec<f64>) -> Self {
        self.prob_conversion = AttributeParam::Fixed(values);
        self
    }
}

/// Ranges used when a parameter is configured as `Random`
///
/// Revenue and conversion ranges are totals over all dimensions: each dimension gets
/// `range / number_of_dimensions`, so the composite sums land inside the total range.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomRanges {
    pub arrival_rate: (f64, f64),
    pub click_sensitivity: (f64, f64),
    pub avg_revenue_total: (f64, f64),
    pub prob_conversion_total: (f64, f64),
}

impl Default for RandomRanges {
    fn default() -> Self {
        Self {
            arrival_rate: (0.0, 100.0),
            click_sensitivity: (-0.75, 0.75),
            avg_revenue_total: (30.0, 70.0),
            prob_conversion_total: (0.0, 0.15),
        }
    }
}

/// Realized parameters of one attribute dimension, immutable after setup
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub values: Vec<usize>,
    pub arrival_rate: Vec<f64>,
    pub click_sensitivity: Vec<f64>,
    pub avg_revenue: Vec<f64>,
    pub prob_conversion: Vec<f64>,
}

/// Sum of per-dimension parameters for one composite attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub arrival_rate: f64,
    pub theta: f64,
    pub avg_revenue: f64,
    pub prob_conversion: f64,
}

impl AttributeSpec {
    /// Realize a dimension configuration, drawing `Random` parameters once
    ///
    /// # Arguments
    /// * `dimension` - Dimension configuration
    /// * `ranges` - Ranges for randomly drawn parameters
    /// * `num_dimensions` - Total number of dimensions (revenue and conversion ranges are split across them)
    /// * `rng` - Generator stream owned by the arrival generator
    pub fn realize(dimension: &AttributeDimension, ranges: &RandomRanges, num_dimensions: usize, rng: &mut StdRng) -> Result<Self, SimulationError> {
        let n = num_dimensions.max(1) as f64;
        let size = dimension.values.len();
        let realize_param = |param: &AttributeParam, label: &str, (low, high): (f64, f64), rng: &mut StdRng| -> Result<Vec<f64>, SimulationError> {
            match param {
                AttributeParam::Fixed(values) => {
                    if values.len() != size {
                        return Err(SimulationError::InvalidParameter(format!(
                            "Dimension '{}' has {} values but {} has {} entries",
                            dimension.name, size, label, values.len()
                        )));
                    }
                    Ok(values.clone())
                }
                AttributeParam::Random => scaled_beta_samples(low, high, size, rng),
            }
        };

        let arrival_rate = realize_param(&dimension.arrival_rate, "arrival_rate", ranges.arrival_rate, rng)?;
        let click_sensitivity = realize_param(&dimension.click_sensitivity, "click_sensitivity", ranges.click_sensitivity, rng)?;
        let (rev_low, rev_high) = ranges.avg_revenue_total;
        let avg_revenue = realize_param(&dimension.avg_revenue, "avg_revenue", (rev_low / n, rev_high / n), rng)?;
        let (conv_low, conv_high) = ranges.prob_conversion_total;
        let prob_conversion = realize_param(&dimension.prob_conversion, "prob_conversion", (conv_low / n, conv_high / n), rng)?;

        Ok(Self {
            name: dimension.name.clone(),
            values: dimension.values.clone(),
            arrival_rate,
            click_sensitivity,
            avg_revenue,
            prob_conversion,
        })
    }

    /// Position of a categorical value inside the dimension domain
    pub fn position(&self, value: usize) -> Option<usize> {
        self.values.iter().position(|&v| v == value)
    }
}

/// All realized dimensions of a run
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    pub specs: Vec<AttributeSpec>,
}

impl AttributeSet {
    pub fn new(specs: Vec<AttributeSpec>) -> Self {
        Self { specs }
    }

    /// Cartesian product of all dimension domains, in lexicographic order of the domains
    pub fn all_attributes(&self) -> Vec<Attribute> {
        let mut combinations: Vec<Vec<usize>> = vec![Vec::new()];
        for spec in &self.specs {
            let mut next = Vec::with_capacity(combinations.len() * spec.values.len());
            for prefix in &combinations {
                for &value in &spec.values {
                    let mut combination = prefix.clone();
                    combination.push(value);
                    next.push(combination);
                }
            }
            combinations = next;
        }
        combinations.into_iter().map(Attribute).collect()
    }

    /// Composite parameters of an attribute (sum of per-dimension components)
    /// Returns None if the attribute does not belong to this set
    pub fn composite(&self, attribute: &Attribute) -> Option<CompositeParams> {
        if attribute.0.len() != self.specs.len() {
            return None;
        }
        let mut params = CompositeParams {
            arrival_rate: 0.0,
            theta: 0.0,
            avg_revenue: 0.0,
            prob_conversion: 0.0,
        };
        for (spec, &value) in self.specs.iter().zip(attribute.0.iter()) {
            let ix = spec.position(value)?;
            params.arrival_rate += spec.arrival_rate[ix];
            params.theta += spec.click_sensitivity[ix];
            params.avg_revenue += spec.avg_revenue[ix];
            params.prob_conversion += spec.prob_conversion[ix];
        }
        Some(params)
    }
}
