use propvest_core::deal::inputs::DealInputs;
use propvest_core::monte_carlo::{run_monte_carlo, DistributionKind, MonteCarloRequest};
use propvest_core::scenarios::break_even::{
    break_even_analysis, BreakEvenRequest, BreakEvenStatus, Difficulty,
};
use propvest_core::scenarios::scenario::{
    compare_scenarios, Adjustment, ScenarioDefinition, ScenarioRequest,
};
use propvest_core::scenarios::sensitivity::{
    heat_map, tornado_analysis, HeatMapRequest, TornadoRequest,
};
use propvest_core::{
    ProjectionEngine, PropvestError, SensitivityVariable, TargetMetric, TemplateRegistry,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn base_inputs() -> DealInputs {
    DealInputs::from_pairs([
        ("purchase_price", dec!(300000)),
        ("monthly_rent", dec!(2500)),
        ("property_taxes", dec!(3600)),
        ("insurance", dec!(1200)),
    ])
}

fn rent(min: Decimal, max: Decimal) -> SensitivityVariable {
    SensitivityVariable::new("monthly_rent", dec!(2500), min, max)
}

// ===========================================================================
// One-way sensitivity
// ===========================================================================

#[test]
fn test_tornado_orders_by_impact_with_stable_ties() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    // Both fixed expenses swing NOI by exactly 2,400
    let request = TornadoRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::Noi,
        variables: vec![
            SensitivityVariable::new("insurance", dec!(1200), dec!(0), dec!(2400)),
            SensitivityVariable::new("property_taxes", dec!(3600), dec!(2400), dec!(4800)),
            rent(dec!(2000), dec!(3000)),
        ],
    };
    let out = tornado_analysis(&engine, &request).unwrap().result;
    let order: Vec<&str> = out.results.iter().map(|r| r.variable_name.as_str()).collect();
    assert_eq!(order, vec!["monthly_rent", "insurance", "property_taxes"]);
    assert_eq!(out.results[1].impact_percent, out.results[2].impact_percent);
    assert!(out.results[1].impact_percent < Decimal::ZERO);

    for pair in out.results.windows(2) {
        assert!(pair[0].impact_percent.abs() >= pair[1].impact_percent.abs());
    }
}

#[test]
fn test_tornado_defaults_to_template_ranges() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = TornadoRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::CapRate,
        variables: vec![],
    };
    let out = tornado_analysis(&engine, &request).unwrap().result;
    assert!(out.results.len() + out.excluded.len() >= 3);
}

#[test]
fn test_tornado_rejects_unsupported_metric() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = TornadoRequest {
        property_type: "fix_and_flip".into(),
        base_inputs: DealInputs::from_pairs([
            ("purchase_price", dec!(200000)),
            ("renovation_costs", dec!(40000)),
            ("after_repair_value", dec!(320000)),
        ]),
        metric: TargetMetric::Dscr,
        variables: vec![],
    };
    assert!(matches!(
        tornado_analysis(&engine, &request),
        Err(PropvestError::InvalidParameter { .. })
    ));
}

// ===========================================================================
// Two-way sensitivity
// ===========================================================================

#[test]
fn test_heat_map_grid_shape_and_extremes() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = HeatMapRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::CapRate,
        x_variable: rent(dec!(2000), dec!(3000)),
        y_variable: SensitivityVariable::new("vacancy_rate", dec!(0.05), dec!(0.02), dec!(0.10)),
        steps: 5,
    };
    let out = heat_map(&engine, &request).unwrap().result;

    assert_eq!(out.x_values, vec![dec!(2000), dec!(2250), dec!(2500), dec!(2750), dec!(3000)]);
    assert_eq!(out.y_values.len(), 5);
    assert_eq!(out.cells.len(), 5);
    assert!(out.cells.iter().all(|row| row.len() == 5));
    assert_eq!(out.failed_cells, 0);

    let values: Vec<Decimal> = out.cells.iter().flatten().flatten().copied().collect();
    let min = values.iter().copied().min().unwrap();
    let max = values.iter().copied().max().unwrap();
    assert_eq!(out.stats.min, min);
    assert_eq!(out.stats.max, max);
    // Highest rent with the lowest vacancy
    assert_eq!(out.cells[4][0], Some(max));
    assert_eq!(out.cells[0][4], Some(min));
    assert_eq!(out.base_position.0, 2);
}

// ===========================================================================
// Monte Carlo
// ===========================================================================

fn mc_request(variables: Vec<SensitivityVariable>, iterations: u32) -> MonteCarloRequest {
    MonteCarloRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::CapRate,
        variables,
        iterations,
        distribution: DistributionKind::Normal,
        seed: Some(2024),
        include_samples: false,
    }
}

#[test]
fn test_monte_carlo_degenerate_single_iteration() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let base_cap = engine
        .evaluate("single_family", &base_inputs(), TargetMetric::CapRate)
        .unwrap()
        .to_f64()
        .unwrap();

    let request = mc_request(vec![rent(dec!(2500), dec!(2500))], 1);
    let out = run_monte_carlo(&engine, &request).unwrap().result;

    assert_eq!(out.successful_iterations, 1);
    assert!((out.mean - base_cap).abs() < 1e-12);
    assert_eq!(out.min, out.max);
    assert_eq!(out.std_dev, 0.0);
    assert_eq!(out.histogram.len(), 1);
}

#[test]
fn test_monte_carlo_mean_converges_as_range_narrows() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let base_cap = engine
        .evaluate("single_family", &base_inputs(), TargetMetric::CapRate)
        .unwrap()
        .to_f64()
        .unwrap();

    let mut previous_std = f64::INFINITY;
    for f in [dec!(0.20), dec!(0.10), dec!(0.05)] {
        let spread = dec!(2500) * f;
        let request = mc_request(vec![rent(dec!(2500) - spread, dec!(2500) + spread)], 2000);
        let out = run_monte_carlo(&engine, &request).unwrap().result;
        let tolerance = 0.02 * f.to_f64().unwrap();
        assert!(
            (out.mean - base_cap).abs() <= tolerance,
            "mean {} vs base {} at f = {}",
            out.mean,
            base_cap,
            f
        );
        assert!(out.std_dev < previous_std);
        previous_std = out.std_dev;
    }
}

#[test]
fn test_monte_carlo_seeded_runs_match() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let mut request = mc_request(vec![], 300);
    request.distribution = DistributionKind::Triangular;
    let a = run_monte_carlo(&engine, &request).unwrap().result;
    let b = run_monte_carlo(&engine, &request).unwrap().result;
    assert_eq!(a.mean, b.mean);
    assert_eq!(a.std_dev, b.std_dev);
    assert_eq!(a.percentiles.p95, b.percentiles.p95);
}

#[test]
fn test_monte_carlo_excludes_unsolvable_iterations() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    // Below roughly -1.6% appreciation the sale no longer covers the loan
    // and IRR has no root; above it the equity flows change sign.
    let mut request = mc_request(
        vec![SensitivityVariable::new(
            "appreciation_rate",
            Decimal::ZERO,
            dec!(-0.10),
            dec!(0.10),
        )],
        400,
    );
    request.base_inputs = DealInputs::from_pairs([
        ("purchase_price", dec!(500000)),
        ("monthly_rent", dec!(2200)),
        ("down_payment_rate", dec!(0.10)),
        ("vacancy_rate", dec!(0.15)),
    ]);
    request.metric = TargetMetric::Irr;
    request.distribution = DistributionKind::Uniform;

    let out = run_monte_carlo(&engine, &request).unwrap();
    let result = out.result;
    assert!(result.successful_iterations > 0);
    assert!(result.excluded_iterations > 0);
    assert_eq!(result.successful_iterations + result.excluded_iterations, 400);
    assert!(out.warnings.iter().any(|w| w.contains("excluded")));
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn test_default_scenarios_in_declaration_order() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = ScenarioRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::CashOnCash,
        scenarios: vec![],
    };
    let out = compare_scenarios(&engine, &request).unwrap().result;
    let names: Vec<&str> = out.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Optimistic", "Base Case", "Conservative", "Stress Test"]);

    let base_case = &out.scenarios[1];
    assert_eq!(base_case.target_value, out.base_value);
    assert!(out.scenarios[0].target_value > out.base_value);
    assert!(out.scenarios[3].target_value < out.scenarios[2].target_value);
    assert!(out.probability_weighted_value.is_some());
}

#[test]
fn test_conflicting_adjustment_rejected() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = ScenarioRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::CapRate,
        scenarios: vec![ScenarioDefinition {
            name: "Double rent".into(),
            description: None,
            probability: None,
            adjustments: vec![
                Adjustment::multiply("monthly_rent", dec!(1.1)),
                Adjustment::add("monthly_rent", dec!(100)),
            ],
        }],
    };
    match compare_scenarios(&engine, &request) {
        Err(PropvestError::ConflictingAdjustment { variable, scenario }) => {
            assert_eq!(variable, "monthly_rent");
            assert_eq!(scenario, "Double rent");
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn test_scenarios_compare_without_solvable_irr() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = ScenarioRequest {
        property_type: "single_family".into(),
        base_inputs: DealInputs::from_pairs([
            ("purchase_price", dec!(500000)),
            ("monthly_rent", dec!(2200)),
            ("down_payment_rate", dec!(0.10)),
            ("vacancy_rate", dec!(0.15)),
            ("appreciation_rate", dec!(-0.10)),
        ]),
        metric: TargetMetric::CapRate,
        scenarios: vec![],
    };
    let out = compare_scenarios(&engine, &request).unwrap().result;
    assert_eq!(out.scenarios.len(), 4);
    assert!(out.base_metrics.irr_error.is_some());
    assert!(out.scenarios.iter().all(|s| s.target_value > Decimal::ZERO));
}

// ===========================================================================
// Break-even
// ===========================================================================

#[test]
fn test_linear_break_even_accuracy() {
    // NOI = rent x 12 x 0.95 x 0.82 - 4,800, so NOI = 15,000 at rent = 19,800 / 9.348
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let (min, max) = (dec!(500), dec!(5000));
    let request = BreakEvenRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::Noi,
        target: Some(dec!(15000)),
        variables: vec![rent(min, max)],
    };
    let out = break_even_analysis(&engine, &request).unwrap().result;
    let result = &out.results[0];
    assert_eq!(result.status, BreakEvenStatus::Solved);

    let analytic = dec!(19800) / dec!(9.348);
    let solved = result.break_even_value.unwrap();
    assert!((solved - analytic).abs() <= dec!(0.0001) * (max - min));
    assert!(result.iterations <= 100);
    assert!(matches!(result.difficulty, Difficulty::Moderate | Difficulty::Challenging));
}

#[test]
fn test_break_even_outside_range_not_achievable() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = BreakEvenRequest {
        property_type: "single_family".into(),
        base_inputs: base_inputs(),
        metric: TargetMetric::Noi,
        target: Some(dec!(1000000)),
        variables: vec![rent(dec!(2000), dec!(3000))],
    };
    let out = break_even_analysis(&engine, &request).unwrap().result;
    let result = &out.results[0];
    assert_eq!(result.status, BreakEvenStatus::NotAchievable);
    assert_eq!(result.difficulty, Difficulty::Impossible);
    assert_eq!(result.break_even_value, None);
}
