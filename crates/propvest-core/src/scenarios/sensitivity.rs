use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

use crate::deal::inputs::DealInputs;
use crate::deal::templates::PropertyTemplate;
use crate::error::PropvestError;
use crate::parallel::par_map;
use crate::projection::{check_metric, check_variable, ProjectionEngine};
use crate::types::*;
use crate::PropvestResult;

const DEFAULT_STEPS: usize = 7;
const MIN_STEPS: usize = 2;
const MAX_STEPS: usize = 100;

fn default_steps() -> usize {
    DEFAULT_STEPS
}

// ---------------------------------------------------------------------------
// One-way (tornado)
// ---------------------------------------------------------------------------

/// Input for one-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoRequest {
    pub property_type: String,
    pub base_inputs: DealInputs,
    pub metric: TargetMetric,
    /// Falls back to the template's default ranges when empty
    #[serde(default)]
    pub variables: Vec<SensitivityVariable>,
}

/// Swing of the target metric across one variable's range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub variable_name: String,
    pub label: String,
    pub low_value: Decimal,
    pub base_value: Decimal,
    pub high_value: Decimal,
    pub low_metric: Decimal,
    pub base_metric: Decimal,
    pub high_metric: Decimal,
    /// (high_metric - low_metric) / base_metric * 100, signed
    pub impact_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedVariable {
    pub variable_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoOutput {
    pub metric: TargetMetric,
    pub base_metric: Decimal,
    /// Sorted by |impact_percent| descending; ties keep declaration order
    pub results: Vec<SensitivityResult>,
    pub excluded: Vec<ExcludedVariable>,
}

/// Resolve the variable list and check each against the template.
pub(crate) fn prepare_variables(
    template: &PropertyTemplate,
    base_inputs: &DealInputs,
    requested: &[SensitivityVariable],
) -> PropvestResult<Vec<SensitivityVariable>> {
    let variables = if requested.is_empty() {
        template.default_variables(base_inputs)?
    } else {
        requested.to_vec()
    };
    if variables.is_empty() {
        return Err(PropvestError::InvalidParameter {
            field: "variables".into(),
            reason: "At least one variable required".into(),
        });
    }

    let mut seen = HashSet::new();
    for variable in &variables {
        check_variable(template, variable)?;
        if !seen.insert(variable.name.as_str()) {
            return Err(PropvestError::InvalidParameter {
                field: format!("variable:{}", variable.name),
                reason: "declared more than once".into(),
            });
        }
    }
    Ok(variables)
}

/// Base inputs with every declared variable at its base value.
pub(crate) fn base_case(base_inputs: &DealInputs, variables: &[SensitivityVariable]) -> DealInputs {
    base_inputs.with_values(variables.iter().map(|v| (v.name.as_str(), v.base_value)))
}

/// One-way sensitivity: swing each variable across its range, holding the rest at base.
pub fn tornado_analysis(
    engine: &ProjectionEngine,
    request: &TornadoRequest,
) -> PropvestResult<ComputationOutput<TornadoOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let template = engine.template(&request.property_type)?;
    check_metric(template, request.metric)?;
    let variables = prepare_variables(template, &request.base_inputs, &request.variables)?;

    let base_inputs = base_case(&request.base_inputs, &variables);
    let base_metric = engine.evaluate(&request.property_type, &base_inputs, request.metric)?;
    if base_metric.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: format!("impact percent ({} is zero in the base case)", request.metric),
        });
    }
    log::debug!(
        "tornado on {} for '{}': {} variables, base {}",
        request.metric,
        request.property_type,
        variables.len(),
        base_metric
    );

    let swings = par_map(&variables, |var| {
        let low = engine.evaluate(
            &request.property_type,
            &base_inputs.with_value(&var.name, var.min),
            request.metric,
        )?;
        let high = engine.evaluate(
            &request.property_type,
            &base_inputs.with_value(&var.name, var.max),
            request.metric,
        )?;
        Ok::<_, PropvestError>((low, high))
    });

    let mut results = Vec::with_capacity(variables.len());
    let mut excluded = Vec::new();
    for (var, swing) in variables.iter().zip(swings) {
        match swing {
            Ok((low_metric, high_metric)) => results.push(SensitivityResult {
                variable_name: var.name.clone(),
                label: var.display_label().to_string(),
                low_value: var.min,
                base_value: var.base_value,
                high_value: var.max,
                low_metric,
                base_metric,
                high_metric,
                impact_percent: (high_metric - low_metric) / base_metric * dec!(100),
            }),
            Err(e) if e.is_computational() => {
                log::warn!("excluding '{}' from tornado: {e}", var.name);
                warnings.push(format!("Variable '{}' excluded: {e}", var.name));
                excluded.push(ExcludedVariable {
                    variable_name: var.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    // Stable: equal impacts keep declaration order
    results.sort_by(|a, b| b.impact_percent.abs().cmp(&a.impact_percent.abs()));

    let output = TornadoOutput {
        metric: request.metric,
        base_metric,
        results,
        excluded,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-way sensitivity (tornado)",
        &serde_json::json!({
            "property_type": request.property_type,
            "metric": request.metric,
            "variables": variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Two-way (heat map)
// ---------------------------------------------------------------------------

/// Input for 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatMapRequest {
    pub property_type: String,
    pub base_inputs: DealInputs,
    pub metric: TargetMetric,
    pub x_variable: SensitivityVariable,
    pub y_variable: SensitivityVariable,
    /// Values per axis, endpoints included
    #[serde(default = "default_steps")]
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapStats {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
    pub range: Decimal,
}

/// Output of 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatMapResult {
    pub metric: TargetMetric,
    pub x_variable: String,
    pub y_variable: String,
    pub x_values: Vec<Decimal>,
    pub y_values: Vec<Decimal>,
    /// cells[i][j] = metric at (x_values[i], y_values[j]); None where evaluation failed
    pub cells: Vec<Vec<Option<Decimal>>>,
    pub stats: HeatMapStats,
    /// Cell closest to both base values (row, col)
    pub base_position: (usize, usize),
    pub failed_cells: usize,
}

/// `steps` evenly spaced values from min to max, endpoints exact.
pub fn sweep_values(var: &SensitivityVariable, steps: usize) -> Vec<Decimal> {
    let intervals = Decimal::from(steps.saturating_sub(1).max(1));
    let step = (var.max - var.min) / intervals;
    let mut values: Vec<Decimal> = (0..steps).map(|i| var.min + step * Decimal::from(i)).collect();
    if let Some(last) = values.last_mut() {
        *last = var.max;
    }
    values
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Two-way sensitivity grid over a pair of variables.
pub fn heat_map(
    engine: &ProjectionEngine,
    request: &HeatMapRequest,
) -> PropvestResult<ComputationOutput<HeatMapResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let template = engine.template(&request.property_type)?;
    check_metric(template, request.metric)?;
    if !(MIN_STEPS..=MAX_STEPS).contains(&request.steps) {
        return Err(PropvestError::InvalidParameter {
            field: "steps".into(),
            reason: format!("must be between {MIN_STEPS} and {MAX_STEPS}"),
        });
    }
    let (x, y) = (&request.x_variable, &request.y_variable);
    check_variable(template, x)?;
    check_variable(template, y)?;
    if x.name == y.name {
        return Err(PropvestError::InvalidParameter {
            field: "y_variable".into(),
            reason: "must differ from x_variable".into(),
        });
    }

    let base_inputs = base_case(&request.base_inputs, &[x.clone(), y.clone()]);
    let x_values = sweep_values(x, request.steps);
    let y_values = sweep_values(y, request.steps);

    let points: Vec<(Decimal, Decimal)> = x_values
        .iter()
        .flat_map(|xv| y_values.iter().map(move |yv| (*xv, *yv)))
        .collect();
    let evaluated = par_map(&points, |(xv, yv)| {
        let inputs = base_inputs.with_values([(x.name.as_str(), *xv), (y.name.as_str(), *yv)]);
        engine.evaluate(&request.property_type, &inputs, request.metric)
    });

    let mut cells = vec![Vec::with_capacity(y_values.len()); x_values.len()];
    let mut computed = Vec::with_capacity(points.len());
    let mut first_error = None;
    let mut failed_cells = 0;
    for (idx, outcome) in evaluated.into_iter().enumerate() {
        let row = idx / y_values.len();
        match outcome {
            Ok(value) => {
                computed.push(value);
                cells[row].push(Some(value));
            }
            Err(e) if e.is_computational() => {
                failed_cells += 1;
                log::warn!("heat map cell {:?} failed: {e}", points[idx]);
                first_error.get_or_insert(e);
                cells[row].push(None);
            }
            Err(e) => return Err(e),
        }
    }

    if computed.is_empty() {
        return Err(first_error.unwrap_or_else(|| PropvestError::InvalidParameter {
            field: "steps".into(),
            reason: "grid is empty".into(),
        }));
    }
    if failed_cells > 0 {
        warnings.push(format!(
            "{failed_cells} of {} cells could not be computed",
            points.len()
        ));
    }

    let min = computed.iter().copied().min().unwrap_or(Decimal::ZERO);
    let max = computed.iter().copied().max().unwrap_or(Decimal::ZERO);
    let mean = computed.iter().sum::<Decimal>() / Decimal::from(computed.len());

    let output = HeatMapResult {
        metric: request.metric,
        x_variable: x.name.clone(),
        y_variable: y.name.clone(),
        base_position: (
            closest_index(&x_values, x.base_value),
            closest_index(&y_values, y.base_value),
        ),
        x_values,
        y_values,
        cells,
        stats: HeatMapStats {
            min,
            max,
            mean,
            range: max - min,
        },
        failed_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Two-way sensitivity grid",
        &serde_json::json!({
            "property_type": request.property_type,
            "metric": request.metric,
            "x_variable": request.x_variable.name,
            "y_variable": request.y_variable.name,
            "steps": request.steps,
        }),
        warnings,
        elapsed,
        output,
    ))
}
