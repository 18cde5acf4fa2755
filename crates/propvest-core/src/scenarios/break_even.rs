use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::sensitivity::{base_case, prepare_variables, ExcludedVariable};
use crate::deal::inputs::DealInputs;
use crate::parallel::par_map;
use crate::projection::{check_metric, ProjectionEngine};
use crate::types::*;
use crate::PropvestResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenRequest {
    pub property_type: String,
    pub base_inputs: DealInputs,
    pub metric: TargetMetric,
    /// Threshold to solve for; defaults per metric (1.0 for DSCR and MOIC, 0 for cash metrics)
    #[serde(default)]
    pub target: Option<Decimal>,
    /// Falls back to the template's default ranges when empty
    #[serde(default)]
    pub variables: Vec<SensitivityVariable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakEvenStatus {
    Solved,
    NotAchievable,
}

/// How far a variable must move from its base value to hit the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Under 10%
    Easy,
    /// 10% to 25%
    Moderate,
    /// 25% to 50%
    Challenging,
    /// 50% or more
    Difficult,
    /// Threshold not crossed anywhere in the range
    Impossible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEvenResult {
    pub variable_name: String,
    pub label: String,
    pub base_value: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub status: BreakEvenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_even_value: Option<Decimal>,
    /// Metric at the solved value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_at_break_even: Option<Decimal>,
    /// Signed change from base, in percent of |base|
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<Decimal>,
    pub difficulty: Difficulty,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenOutput {
    pub metric: TargetMetric,
    pub target: Decimal,
    pub base_metric: Decimal,
    pub results: Vec<BreakEvenResult>,
    pub excluded: Vec<ExcludedVariable>,
}

// ---------------------------------------------------------------------------
// Bisection
// ---------------------------------------------------------------------------

/// Stopping rules for the threshold search.
#[derive(Debug, Clone, Copy)]
pub struct BisectionConfig {
    /// Stop once the bracket is narrower than this share of the full range
    pub relative_tolerance: Decimal,
    pub max_iterations: u32,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: dec!(0.0001),
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Found {
        value: Decimal,
        metric: Decimal,
        iterations: u32,
    },
    /// Both endpoints lie on the same side of the threshold
    NotAchievable,
}

/// Locate where `f` crosses `threshold` on `[min, max]`.
///
/// Assumes a single crossing; for non-monotonic metrics the first crossing
/// the bracket happens to narrow onto is returned.
pub fn solve_threshold<F>(
    min: Decimal,
    max: Decimal,
    threshold: Decimal,
    config: &BisectionConfig,
    f: F,
) -> PropvestResult<Crossing>
where
    F: Fn(Decimal) -> PropvestResult<Decimal>,
{
    let gap = |v: Decimal| -> PropvestResult<Decimal> { Ok(f(v)? - threshold) };

    let mut lo = min;
    let mut hi = max;
    let mut g_lo = gap(lo)?;
    let g_hi = gap(hi)?;

    if g_lo.is_zero() {
        return Ok(Crossing::Found {
            value: lo,
            metric: threshold,
            iterations: 0,
        });
    }
    if g_hi.is_zero() {
        return Ok(Crossing::Found {
            value: hi,
            metric: threshold,
            iterations: 0,
        });
    }
    if g_lo.is_sign_negative() == g_hi.is_sign_negative() {
        return Ok(Crossing::NotAchievable);
    }

    let tolerance = config.relative_tolerance * (max - min);
    let mut iterations = 0;
    while iterations < config.max_iterations && hi - lo >= tolerance {
        iterations += 1;
        let mid = (lo + hi) / dec!(2);
        let g_mid = gap(mid)?;
        if g_mid.is_zero() {
            return Ok(Crossing::Found {
                value: mid,
                metric: threshold,
                iterations,
            });
        }
        if g_mid.is_sign_negative() == g_lo.is_sign_negative() {
            lo = mid;
            g_lo = g_mid;
        } else {
            hi = mid;
        }
    }

    let value = (lo + hi) / dec!(2);
    Ok(Crossing::Found {
        value,
        metric: f(value)?,
        iterations,
    })
}

/// Difficulty band for moving from `base` to `solved`.
///
/// A zero base has no relative scale: reaching zero is easy, anything else
/// is rated difficult with no percent change.
pub fn classify(base: Decimal, solved: Decimal) -> (Option<Decimal>, Difficulty) {
    if base.is_zero() {
        return if solved.is_zero() {
            (Some(Decimal::ZERO), Difficulty::Easy)
        } else {
            (None, Difficulty::Difficult)
        };
    }
    let change = (solved - base) / base.abs();
    let magnitude = change.abs();
    let difficulty = if magnitude < dec!(0.10) {
        Difficulty::Easy
    } else if magnitude < dec!(0.25) {
        Difficulty::Moderate
    } else if magnitude < dec!(0.50) {
        Difficulty::Challenging
    } else {
        Difficulty::Difficult
    };
    (Some(change * dec!(100)), difficulty)
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Solve, per variable, the value at which the metric reaches the threshold.
pub fn break_even_analysis(
    engine: &ProjectionEngine,
    request: &BreakEvenRequest,
) -> PropvestResult<ComputationOutput<BreakEvenOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let template = engine.template(&request.property_type)?;
    check_metric(template, request.metric)?;
    let variables = prepare_variables(template, &request.base_inputs, &request.variables)?;
    let target = request
        .target
        .unwrap_or_else(|| request.metric.default_threshold());

    let base_inputs = base_case(&request.base_inputs, &variables);
    let base_metric = engine.evaluate(&request.property_type, &base_inputs, request.metric)?;
    let config = BisectionConfig::default();

    let crossings = par_map(&variables, |var| {
        solve_threshold(var.min, var.max, target, &config, |value| {
            engine.evaluate(
                &request.property_type,
                &base_inputs.with_value(&var.name, value),
                request.metric,
            )
        })
    });

    let mut results = Vec::with_capacity(variables.len());
    let mut excluded = Vec::new();
    for (var, crossing) in variables.iter().zip(crossings) {
        let mut result = BreakEvenResult {
            variable_name: var.name.clone(),
            label: var.display_label().to_string(),
            base_value: var.base_value,
            min: var.min,
            max: var.max,
            status: BreakEvenStatus::NotAchievable,
            break_even_value: None,
            metric_at_break_even: None,
            percent_change: None,
            difficulty: Difficulty::Impossible,
            iterations: 0,
        };
        match crossing {
            Ok(Crossing::Found {
                value,
                metric,
                iterations,
            }) => {
                let (percent_change, difficulty) = classify(var.base_value, value);
                result.status = BreakEvenStatus::Solved;
                result.break_even_value = Some(value);
                result.metric_at_break_even = Some(metric);
                result.percent_change = percent_change;
                result.difficulty = difficulty;
                result.iterations = iterations;
            }
            Ok(Crossing::NotAchievable) => {}
            Err(e) if e.is_computational() => {
                log::warn!("excluding '{}' from break-even: {e}", var.name);
                warnings.push(format!("Variable '{}' excluded: {e}", var.name));
                excluded.push(ExcludedVariable {
                    variable_name: var.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        }
        results.push(result);
    }

    let output = BreakEvenOutput {
        metric: request.metric,
        target,
        base_metric,
        results,
        excluded,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Break-even solving by bisection",
        &serde_json::json!({
            "property_type": request.property_type,
            "metric": request.metric,
            "target": target.to_string(),
            "relative_tolerance": config.relative_tolerance.to_string(),
            "max_iterations": config.max_iterations,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::templates::TemplateRegistry;

    #[test]
    fn test_solve_linear() {
        let config = BisectionConfig::default();
        let crossing = solve_threshold(dec!(0), dec!(100), dec!(0), &config, |x| {
            Ok(dec!(3) * x - dec!(90))
        })
        .unwrap();
        match crossing {
            Crossing::Found { value, iterations, .. } => {
                assert!((value - dec!(30)).abs() <= dec!(0.01));
                assert!(iterations > 0 && iterations <= 100);
            }
            Crossing::NotAchievable => panic!("expected a crossing"),
        }
    }

    #[test]
    fn test_same_side_is_not_achievable() {
        let config = BisectionConfig::default();
        let crossing = solve_threshold(dec!(0), dec!(10), dec!(50), &config, |x| Ok(x)).unwrap();
        assert_eq!(crossing, Crossing::NotAchievable);
    }

    #[test]
    fn test_difficulty_bands() {
        assert_eq!(classify(dec!(100), dec!(95)).1, Difficulty::Easy);
        assert_eq!(classify(dec!(100), dec!(85)).1, Difficulty::Moderate);
        assert_eq!(classify(dec!(100), dec!(125)).1, Difficulty::Challenging);
        assert_eq!(classify(dec!(100), dec!(40)).1, Difficulty::Difficult);
        assert_eq!(classify(dec!(100), dec!(90)), (Some(dec!(-10)), Difficulty::Moderate));
        assert_eq!(classify(Decimal::ZERO, dec!(5)), (None, Difficulty::Difficult));
        assert_eq!(classify(Decimal::ZERO, Decimal::ZERO).1, Difficulty::Easy);
    }

    #[test]
    fn test_rent_break_even_for_cash_flow() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let request = BreakEvenRequest {
            property_type: "single_family".into(),
            base_inputs: DealInputs::from_pairs([
                ("purchase_price", dec!(300000)),
                ("monthly_rent", dec!(2500)),
            ]),
            metric: TargetMetric::CashFlow,
            target: None,
            variables: vec![SensitivityVariable::new(
                "monthly_rent",
                dec!(2500),
                dec!(500),
                dec!(5000),
            )],
        };
        let out = break_even_analysis(&engine, &request).unwrap().result;
        let rent = &out.results[0];
        assert_eq!(rent.status, BreakEvenStatus::Solved);
        let metric = rent.metric_at_break_even.unwrap();
        // Year-one cash flow near zero at the solved rent
        assert!(metric.abs() < dec!(5));
    }
}
