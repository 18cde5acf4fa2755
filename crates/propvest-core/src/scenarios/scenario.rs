use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

use crate::deal::inputs::DealInputs;
use crate::deal::templates::PropertyTemplate;
use crate::error::PropvestError;
use crate::metrics::{self, MetricBundle};
use crate::parallel::par_map;
use crate::projection::{check_metric, ProjectionEngine};
use crate::types::*;
use crate::PropvestResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A change applied to one deal input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Adjustment {
    Override { variable: String, value: Decimal },
    Multiply { variable: String, factor: Decimal },
    Add { variable: String, delta: Decimal },
}

impl Adjustment {
    pub fn set(variable: &str, value: Decimal) -> Self {
        Self::Override {
            variable: variable.to_string(),
            value,
        }
    }

    pub fn multiply(variable: &str, factor: Decimal) -> Self {
        Self::Multiply {
            variable: variable.to_string(),
            factor,
        }
    }

    pub fn add(variable: &str, delta: Decimal) -> Self {
        Self::Add {
            variable: variable.to_string(),
            delta,
        }
    }

    pub fn variable(&self) -> &str {
        match self {
            Self::Override { variable, .. }
            | Self::Multiply { variable, .. }
            | Self::Add { variable, .. } => variable,
        }
    }

    /// New value given the current one. Relative adjustments need a current value.
    pub fn apply(&self, current: Option<Decimal>) -> PropvestResult<Decimal> {
        match (self, current) {
            (Self::Override { value, .. }, _) => Ok(*value),
            (Self::Multiply { factor, .. }, Some(c)) => Ok(c * factor),
            (Self::Add { delta, .. }, Some(c)) => Ok(c + delta),
            (_, None) => Err(PropvestError::InvalidParameter {
                field: self.variable().to_string(),
                reason: "no base value to adjust; use an override".into(),
            }),
        }
    }
}

/// A named set of adjustments to the base deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

impl ScenarioDefinition {
    /// Each variable may be adjusted at most once.
    pub fn check_conflicts(&self) -> PropvestResult<()> {
        let mut seen = HashSet::new();
        for adjustment in &self.adjustments {
            if !seen.insert(adjustment.variable()) {
                return Err(PropvestError::ConflictingAdjustment {
                    variable: adjustment.variable().to_string(),
                    scenario: self.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Base inputs with this scenario's adjustments applied.
    pub fn apply(&self, template: &PropertyTemplate, base: &DealInputs) -> PropvestResult<DealInputs> {
        let resolved = template.resolve(base)?;
        let mut adjusted = base.clone();
        for adjustment in &self.adjustments {
            let name = adjustment.variable();
            let spec = template
                .field(name)
                .ok_or_else(|| PropvestError::InvalidParameter {
                    field: name.to_string(),
                    reason: format!("not an input of '{}'", template.id),
                })?;
            let value = adjustment.apply(resolved.optional(name))?;
            spec.check(value)?;
            adjusted = adjusted.with_value(name, value);
        }
        Ok(adjusted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub property_type: String,
    pub base_inputs: DealInputs,
    pub metric: TargetMetric,
    /// Falls back to the template's default scenarios when empty
    #[serde(default)]
    pub scenarios: Vec<ScenarioDefinition>,
}

/// Change in one metric between the base case and a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: TargetMetric,
    pub base: Decimal,
    pub scenario: Decimal,
    pub absolute: Decimal,
    /// Percent of base; absent when the base is zero
    pub percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    pub target_value: Decimal,
    pub metrics: MetricBundle,
    pub deltas: Vec<MetricDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub property_type: String,
    pub metric: TargetMetric,
    pub base_value: Decimal,
    pub base_metrics: MetricBundle,
    /// In declaration order
    pub scenarios: Vec<ScenarioResult>,
    /// Present when every scenario carries a probability and they sum to 1
    pub probability_weighted_value: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

const PROBABILITY_TOLERANCE: Decimal = dec!(0.001);

/// Compare named scenarios against the unadjusted base deal.
pub fn compare_scenarios(
    engine: &ProjectionEngine,
    request: &ScenarioRequest,
) -> PropvestResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let template = engine.template(&request.property_type)?;
    check_metric(template, request.metric)?;

    let scenarios = if request.scenarios.is_empty() {
        &template.default_scenarios
    } else {
        &request.scenarios
    };
    if scenarios.is_empty() {
        return Err(PropvestError::InvalidParameter {
            field: "scenarios".into(),
            reason: "At least one scenario required".into(),
        });
    }

    // Validate every scenario before computing anything
    for scenario in scenarios {
        scenario.check_conflicts()?;
        if let Some(p) = scenario.probability {
            if p < Decimal::ZERO || p > Decimal::ONE {
                return Err(PropvestError::InvalidParameter {
                    field: format!("scenario:{} probability", scenario.name),
                    reason: "Probability must be between 0 and 1".into(),
                });
            }
        }
    }
    let adjusted: Vec<DealInputs> = scenarios
        .iter()
        .map(|s| s.apply(template, &request.base_inputs))
        .collect::<PropvestResult<_>>()?;

    let base = engine.analyze(&request.property_type, &request.base_inputs)?;
    let base_value = metrics::metric_value(&base.projection, request.metric, engine.irr_config())?;

    let evaluated = par_map(&adjusted, |inputs| {
        let analysis = engine.analyze(&request.property_type, inputs)?;
        let target = metrics::metric_value(&analysis.projection, request.metric, engine.irr_config())?;
        Ok::<_, PropvestError>((analysis.metrics, target))
    });

    let mut results = Vec::with_capacity(scenarios.len());
    for (scenario, outcome) in scenarios.iter().zip(evaluated) {
        let (bundle, target_value) = outcome?;
        results.push(ScenarioResult {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            probability: scenario.probability,
            target_value,
            deltas: metric_deltas(&base.metrics, &bundle),
            metrics: bundle,
        });
    }

    let probability_weighted_value = weighted_value(&results, &mut warnings);

    let output = ScenarioOutput {
        property_type: request.property_type.clone(),
        metric: request.metric,
        base_value,
        base_metrics: base.metrics,
        scenarios: results,
        probability_weighted_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario comparison against the base deal",
        &serde_json::json!({
            "property_type": request.property_type,
            "metric": request.metric,
            "num_scenarios": scenarios.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Absolute and percent change for every metric present in both bundles.
pub fn metric_deltas(base: &MetricBundle, scenario: &MetricBundle) -> Vec<MetricDelta> {
    TargetMetric::ALL
        .iter()
        .filter_map(|&metric| {
            let b = base.get(metric)?;
            let s = scenario.get(metric)?;
            let absolute = s - b;
            Some(MetricDelta {
                metric,
                base: b,
                scenario: s,
                absolute,
                percent: (!b.is_zero()).then(|| absolute / b.abs() * dec!(100)),
            })
        })
        .collect()
}

fn weighted_value(results: &[ScenarioResult], warnings: &mut Vec<String>) -> Option<Decimal> {
    let probabilities: Option<Vec<Decimal>> = results.iter().map(|r| r.probability).collect();
    let probabilities = probabilities?;

    let total: Decimal = probabilities.iter().sum();
    if (total - Decimal::ONE).abs() > PROBABILITY_TOLERANCE {
        warnings.push(format!(
            "Scenario probabilities sum to {total}; no probability-weighted value reported"
        ));
        return None;
    }
    if total != Decimal::ONE {
        warnings.push(format!(
            "Probabilities sum to {total}; treated as approximately 1.0"
        ));
    }

    Some(
        results
            .iter()
            .zip(probabilities)
            .map(|(r, p)| r.target_value * p)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::templates::TemplateRegistry;
    use rust_decimal_macros::dec;

    fn base_inputs() -> DealInputs {
        DealInputs::from_pairs([
            ("purchase_price", dec!(300000)),
            ("monthly_rent", dec!(2500)),
            ("property_taxes", dec!(3600)),
            ("insurance", dec!(1200)),
        ])
    }

    fn request(scenarios: Vec<ScenarioDefinition>) -> ScenarioRequest {
        ScenarioRequest {
            property_type: "single_family".into(),
            base_inputs: base_inputs(),
            metric: TargetMetric::Noi,
            scenarios,
        }
    }

    fn named(name: &str, probability: Option<Decimal>, adjustments: Vec<Adjustment>) -> ScenarioDefinition {
        ScenarioDefinition {
            name: name.into(),
            description: None,
            probability,
            adjustments,
        }
    }

    #[test]
    fn test_conflicting_adjustment_rejected() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let req = request(vec![named(
            "Double rent",
            None,
            vec![
                Adjustment::multiply("monthly_rent", dec!(1.1)),
                Adjustment::add("monthly_rent", dec!(100)),
            ],
        )]);
        match compare_scenarios(&engine, &req) {
            Err(PropvestError::ConflictingAdjustment { variable, scenario }) => {
                assert_eq!(variable, "monthly_rent");
                assert_eq!(scenario, "Double rent");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_declaration_order_and_deltas() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let req = request(vec![
            named("Down", None, vec![Adjustment::multiply("monthly_rent", dec!(0.9))]),
            named("Flat", None, vec![]),
            named("Up", None, vec![Adjustment::set("monthly_rent", dec!(2750))]),
        ]);
        let out = compare_scenarios(&engine, &req).unwrap().result;
        let names: Vec<_> = out.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Down", "Flat", "Up"]);

        let flat = &out.scenarios[1];
        assert_eq!(flat.target_value, out.base_value);
        assert!(flat.deltas.iter().all(|d| d.absolute.is_zero()));

        assert!(out.scenarios[0].target_value < out.base_value);
        assert!(out.scenarios[2].target_value > out.base_value);
        assert!(out.probability_weighted_value.is_none());
    }

    #[test]
    fn test_probability_weighted_value() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let req = request(vec![
            named("Bear", Some(dec!(0.25)), vec![Adjustment::multiply("monthly_rent", dec!(0.9))]),
            named("Base", Some(dec!(0.50)), vec![]),
            named("Bull", Some(dec!(0.25)), vec![Adjustment::multiply("monthly_rent", dec!(1.1))]),
        ]);
        let out = compare_scenarios(&engine, &req).unwrap().result;
        let expected: Decimal = out
            .scenarios
            .iter()
            .map(|s| s.target_value * s.probability.unwrap())
            .sum();
        assert_eq!(out.probability_weighted_value, Some(expected));
    }

    #[test]
    fn test_adjusted_value_must_satisfy_constraint() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let req = request(vec![named(
            "Ghost town",
            None,
            vec![Adjustment::add("vacancy_rate", dec!(1.5))],
        )]);
        assert!(matches!(
            compare_scenarios(&engine, &req),
            Err(PropvestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_template_defaults_used_when_none_given() {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let out = compare_scenarios(&engine, &request(vec![])).unwrap().result;
        assert_eq!(out.scenarios.len(), 4);
        assert!(out.probability_weighted_value.is_some());
    }
}
