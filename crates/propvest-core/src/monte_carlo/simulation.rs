use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Triangular, Uniform};
use std::time::Instant;

use crate::deal::inputs::DealInputs;
use crate::error::PropvestError;
use crate::parallel::par_map;
use crate::projection::{check_metric, ProjectionEngine};
use crate::scenarios::sensitivity::prepare_variables;
use crate::types::{with_metadata_f64, ComputationOutput, SensitivityVariable, TargetMetric};
use crate::PropvestResult;

const MAX_ITERATIONS: u32 = 100_000;
const BATCH_SIZE: usize = 100;
const HISTOGRAM_BINS: usize = 20;
/// Redraws before a truncated normal sample is clamped instead.
const MAX_REJECTIONS: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How each variable's range is read as a distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    /// Mean at base, sigma = (max - min) / 6, truncated to [min, max]
    #[default]
    Normal,
    Uniform,
    /// Mode at base
    Triangular,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub property_type: String,
    pub base_inputs: DealInputs,
    pub metric: TargetMetric,
    /// Falls back to the template's default ranges when empty
    #[serde(default)]
    pub variables: Vec<SensitivityVariable>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default)]
    pub distribution: DistributionKind,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Return every successful sample alongside the summary
    #[serde(default)]
    pub include_samples: bool,
}

fn default_iterations() -> u32 {
    1_000
}

/// Percentile summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McPercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// A single histogram bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

/// Distribution of the target metric across successful iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub metric: TargetMetric,
    pub iterations: u32,
    pub successful_iterations: u32,
    pub excluded_iterations: u32,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: McPercentiles,
    /// Share of iterations with a negative metric
    pub probability_of_loss: f64,
    /// 5th percentile
    pub value_at_risk_95: f64,
    /// Mean of the samples at or below the 5th percentile
    pub expected_shortfall: f64,
    pub histogram: Vec<HistogramBin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

enum Sampler {
    /// Degenerate range: always the exact base value
    Fixed(Decimal),
    Normal { dist: Normal, min: f64, max: f64 },
    Uniform(Uniform),
    Triangular(Triangular),
}

fn to_f64(value: Decimal, field: &str) -> PropvestResult<f64> {
    value.to_f64().ok_or_else(|| PropvestError::InvalidParameter {
        field: field.to_string(),
        reason: format!("{value} cannot be represented as f64"),
    })
}

fn invalid_distribution(field: &str, kind: &str, e: impl std::fmt::Display) -> PropvestError {
    PropvestError::InvalidParameter {
        field: field.to_string(),
        reason: format!("Invalid {kind} parameters: {e}"),
    }
}

impl Sampler {
    fn new(var: &SensitivityVariable, kind: DistributionKind) -> PropvestResult<Self> {
        if var.is_degenerate() {
            return Ok(Self::Fixed(var.base_value));
        }
        let field = format!("variable:{}", var.name);
        let min = to_f64(var.min, &field)?;
        let max = to_f64(var.max, &field)?;
        let base = to_f64(var.base_value, &field)?;

        Ok(match kind {
            DistributionKind::Normal => Self::Normal {
                dist: Normal::new(base, (max - min) / 6.0)
                    .map_err(|e| invalid_distribution(&field, "Normal", e))?,
                min,
                max,
            },
            DistributionKind::Uniform => Self::Uniform(
                Uniform::new(min, max).map_err(|e| invalid_distribution(&field, "Uniform", e))?,
            ),
            DistributionKind::Triangular => Self::Triangular(
                Triangular::new(min, max, base)
                    .map_err(|e| invalid_distribution(&field, "Triangular", e))?,
            ),
        })
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Fixed(v) => v.to_f64().unwrap_or_default(),
            Self::Normal { dist, min, max } => {
                let mut x = rng.sample(dist);
                for _ in 0..MAX_REJECTIONS {
                    if x >= *min && x <= *max {
                        return x;
                    }
                    x = rng.sample(dist);
                }
                x.clamp(*min, *max)
            }
            Self::Uniform(dist) => rng.sample(dist),
            Self::Triangular(dist) => rng.sample(dist),
        }
    }

    /// Draw and convert back to a decimal input inside the variable's bounds.
    fn draw_decimal(&self, rng: &mut StdRng, var: &SensitivityVariable) -> PropvestResult<Decimal> {
        if let Self::Fixed(v) = self {
            return Ok(*v);
        }
        let x = self.draw(rng);
        let value = Decimal::from_f64(x).ok_or_else(|| {
            PropvestError::SimulationFailed(format!("sample {x} for '{}' is not finite", var.name))
        })?;
        Ok(value.max(var.min).min(var.max))
    }
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Build a histogram with `num_bins` equal-width bins.
fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    // Handle case where all values are the same
    if (max_val - min_val).abs() < f64::EPSILON {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| HistogramBin {
            lower: min_val + i as f64 * bin_width,
            upper: if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            },
            count: 0,
            frequency: 0.0,
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }
    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }
    bins
}

/// Summarise successful samples. `values` is sorted in place.
fn summarise(
    values: &mut [f64],
    metric: TargetMetric,
    iterations: u32,
    include_samples: bool,
) -> MonteCarloResult {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len() as f64;

    let mean = values.iter().sum::<f64>() / n;
    let median = if values.len() % 2 == 0 {
        let mid = values.len() / 2;
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[values.len() / 2]
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let percentiles = McPercentiles {
        p5: percentile_sorted(values, 5.0),
        p25: percentile_sorted(values, 25.0),
        p50: percentile_sorted(values, 50.0),
        p75: percentile_sorted(values, 75.0),
        p95: percentile_sorted(values, 95.0),
    };

    let tail: Vec<f64> = values
        .iter()
        .copied()
        .take_while(|v| *v <= percentiles.p5)
        .collect();
    let expected_shortfall = if tail.is_empty() {
        values[0]
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    let losses = values.iter().filter(|v| **v < 0.0).count();

    MonteCarloResult {
        metric,
        iterations,
        successful_iterations: values.len() as u32,
        excluded_iterations: iterations - values.len() as u32,
        mean,
        median,
        std_dev: variance.sqrt(),
        min: values[0],
        max: values[values.len() - 1],
        value_at_risk_95: percentiles.p5,
        expected_shortfall,
        probability_of_loss: losses as f64 / n,
        percentiles,
        histogram: build_histogram(values, HISTOGRAM_BINS),
        samples: include_samples.then(|| values.to_vec()),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate the target metric with every variable drawn from its range.
///
/// Iterations run in batches of 100, each batch seeded from a master RNG,
/// so a seeded run gives the same result whatever the thread count.
pub fn run_monte_carlo(
    engine: &ProjectionEngine,
    request: &MonteCarloRequest,
) -> PropvestResult<ComputationOutput<MonteCarloResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // Validation
    if request.iterations == 0 || request.iterations > MAX_ITERATIONS {
        return Err(PropvestError::InvalidParameter {
            field: "iterations".into(),
            reason: format!("Must be between 1 and {MAX_ITERATIONS}"),
        });
    }
    let template = engine.template(&request.property_type)?;
    check_metric(template, request.metric)?;
    let variables = prepare_variables(template, &request.base_inputs, &request.variables)?;
    let samplers = variables
        .iter()
        .map(|v| Sampler::new(v, request.distribution))
        .collect::<PropvestResult<Vec<_>>>()?;

    let mut master = match request.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let n = request.iterations as usize;
    let batch_seeds: Vec<(usize, u64)> = (0..n.div_ceil(BATCH_SIZE))
        .map(|i| (i, master.gen::<u64>()))
        .collect();

    log::debug!(
        "monte carlo on {} for '{}': {} iterations, {} batches, {:?} distribution",
        request.metric,
        request.property_type,
        n,
        batch_seeds.len(),
        request.distribution
    );

    let batches = par_map(&batch_seeds, |(i, seed)| {
        let mut rng = StdRng::seed_from_u64(*seed);
        let size = BATCH_SIZE.min(n - i * BATCH_SIZE);
        (0..size)
            .map(|_| {
                let draws = variables
                    .iter()
                    .zip(&samplers)
                    .map(|(var, sampler)| Ok((var.name.as_str(), sampler.draw_decimal(&mut rng, var)?)))
                    .collect::<PropvestResult<Vec<_>>>()?;
                let inputs = request.base_inputs.with_values(draws);
                engine.evaluate(&request.property_type, &inputs, request.metric)
            })
            .collect::<Vec<_>>()
    });

    let mut values = Vec::with_capacity(n);
    let mut excluded = 0u32;
    let mut last_error = None;
    for outcome in batches.into_iter().flatten() {
        match outcome {
            Ok(v) => values.push(to_f64(v, request.metric.key())?),
            Err(e) if e.is_computational() => {
                excluded += 1;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    if values.is_empty() {
        return Err(PropvestError::SimulationFailed(format!(
            "all {} iterations failed; last error: {}",
            request.iterations,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )));
    }
    if excluded > 0 {
        log::warn!("{excluded} of {} iterations excluded", request.iterations);
        warnings.push(format!(
            "{excluded} of {} iterations excluded from aggregation",
            request.iterations
        ));
    }

    let output = summarise(
        &mut values,
        request.metric,
        request.iterations,
        request.include_samples,
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo simulation of deal metric",
        &serde_json::json!({
            "property_type": request.property_type,
            "metric": request.metric,
            "iterations": request.iterations,
            "distribution": request.distribution,
            "seed": request.seed,
            "variables": variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
