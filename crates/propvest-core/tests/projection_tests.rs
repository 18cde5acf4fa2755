use pretty_assertions::assert_eq;
use propvest_core::deal::inputs::DealInputs;
use propvest_core::metrics;
use propvest_core::projection::{project_deal, ProjectionRequest};
use propvest_core::{ProjectionEngine, PropvestError, TargetMetric, TemplateRegistry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn single_family() -> DealInputs {
    DealInputs::from_pairs([
        ("purchase_price", dec!(300000)),
        ("monthly_rent", dec!(2500)),
        ("property_taxes", dec!(3600)),
    ])
}

fn multifamily_3_9m() -> DealInputs {
    DealInputs::from_pairs([
        ("purchase_price", dec!(3900000)),
        ("units", dec!(24)),
        ("monthly_rent_per_unit", dec!(1850)),
        ("property_taxes", dec!(45000)),
        ("insurance", dec!(18000)),
        ("utilities", dec!(24000)),
        ("management_fee_rate", dec!(0.08)),
        ("exit_cap_rate", dec!(0.065)),
    ])
}

// ===========================================================================
// Single family
// ===========================================================================

#[test]
fn test_single_family_year_one_exact() {
    // GPI 30,000; vacancy 5% -> EGI 28,500
    // Opex 3,600 + 28,500 x 18% = 8,730 -> NOI 19,770
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let analysis = engine.analyze("single_family", &single_family()).unwrap();
    let first = analysis.projection.first_period().unwrap();

    assert_eq!(first.gross_potential_income, dec!(30000));
    assert_eq!(first.gross_income, dec!(28500));
    assert_eq!(first.operating_expenses, dec!(8730));
    assert_eq!(first.noi, dec!(19770));
    assert_eq!(analysis.metrics.cap_rate, Some(dec!(0.0659)));
    assert_eq!(analysis.projection.total_cash_invested, dec!(75000));
    assert_eq!(analysis.projection.periods.len(), 10);
}

#[test]
fn test_noi_identity_every_period() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    for (property_type, inputs) in [("single_family", single_family()), ("multifamily", multifamily_3_9m())] {
        let projection = engine.project(property_type, &inputs).unwrap();
        for p in &projection.periods {
            assert_eq!(p.noi, p.gross_income - p.operating_expenses);
            assert_eq!(p.net_cash_flow, p.noi - p.debt_service);
        }
    }
}

#[test]
fn test_projection_is_deterministic() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let a = engine.analyze("multifamily", &multifamily_3_9m()).unwrap();
    let b = engine.analyze("multifamily", &multifamily_3_9m()).unwrap();
    assert_eq!(a, b);
}

// ===========================================================================
// Multifamily
// ===========================================================================

#[test]
fn test_multifamily_3_9m_fixture() {
    // GPI 24 x 1,850 x 12 = 532,800
    // Year-one vacancy 5% + 5% lease-up premium -> EGI 479,520
    // Opex 87,000 + 479,520 x 17% = 168,518.40 -> NOI 311,001.60
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let analysis = engine.analyze("multifamily", &multifamily_3_9m()).unwrap();
    let projection = &analysis.projection;
    let first = projection.first_period().unwrap();

    assert_eq!(first.gross_potential_income, dec!(532800));
    assert_eq!(first.vacancy_loss, dec!(53280));
    assert_eq!(first.noi, dec!(311001.6));
    assert_eq!(
        analysis.metrics.cap_rate.unwrap(),
        dec!(311001.6) / dec!(3900000)
    );

    // Lease-up premium burns off by year three
    let third = &projection.periods[2];
    assert_eq!(third.vacancy_loss, third.gross_potential_income * dec!(0.05));

    // Exit on the year-eleven NOI at a 6.5% cap
    assert!(projection.sale.sale_price > projection.purchase_price);
    assert_eq!(
        projection.sale.net_proceeds,
        projection.sale.sale_price - projection.sale.selling_costs - projection.sale.loan_payoff
    );
    assert!(analysis.metrics.irr.unwrap() > Decimal::ZERO);
    assert!(analysis.metrics.moic.unwrap() > Decimal::ONE);
}

#[test]
fn test_project_deal_envelope_warnings() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = ProjectionRequest {
        property_type: "single_family".into(),
        inputs: single_family()
            .with_value("down_payment_rate", dec!(0.10))
            .with_value("vacancy_rate", dec!(0.20)),
    };
    let out = project_deal(&engine, &request).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("LTV")));
    assert!(out.warnings.iter().any(|w| w.contains("Vacancy")));
    assert!(out.warnings.iter().any(|w| w.contains("DSCR")));
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}

// ===========================================================================
// Fix and flip
// ===========================================================================

#[test]
fn test_fix_and_flip_profit() {
    // Cost 240,000, loan 75% = 180,000, equity 60,000
    // Net sale 320,000 x 92% = 294,400
    // Interest 180,000 x 10% x 0.5 + points 3,600 = 12,600
    // Profit 294,400 - 12,600 - 240,000 = 41,800
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let inputs = DealInputs::from_pairs([
        ("purchase_price", dec!(200000)),
        ("renovation_costs", dec!(40000)),
        ("after_repair_value", dec!(320000)),
    ]);
    let analysis = engine.analyze("fix_and_flip", &inputs).unwrap();

    assert_eq!(analysis.projection.total_cash_invested, dec!(60000));
    assert_eq!(analysis.metrics.net_profit, dec!(41800));
    assert_eq!(analysis.metrics.roi.unwrap(), dec!(41800) / dec!(60000));
    assert_eq!(analysis.metrics.cap_rate, None);
    assert!(engine
        .evaluate("fix_and_flip", &inputs, TargetMetric::CapRate)
        .is_err());
}

// ===========================================================================
// Edge cases
// ===========================================================================

#[test]
fn test_zero_cash_invested_is_division_by_zero() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let inputs = single_family().with_value("down_payment_rate", Decimal::ZERO);
    let err = engine
        .evaluate("single_family", &inputs, TargetMetric::CashOnCash)
        .unwrap_err();
    assert!(matches!(err, PropvestError::DivisionByZero { .. }));
}

#[test]
fn test_missing_required_input() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let inputs = DealInputs::from_pairs([("purchase_price", dec!(300000))]);
    let err = engine.project("single_family", &inputs).unwrap_err();
    assert!(matches!(err, PropvestError::MissingRequiredInput { ref field } if field == "monthly_rent"));
}

#[test]
fn test_unknown_property_type() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    assert!(matches!(
        engine.project("castle", &single_family()),
        Err(PropvestError::InvalidTemplate(_))
    ));
}

#[test]
fn test_all_cash_dscr_flag() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let inputs = single_family().with_value("down_payment_rate", Decimal::ONE);
    let analysis = engine.analyze("single_family", &inputs).unwrap();
    assert!(analysis.metrics.all_cash);
    assert_eq!(analysis.metrics.dscr, None);
    let first = analysis.projection.first_period().unwrap();
    assert!(metrics::dscr(first.noi, first.debt_service).ratio().is_err());
}

fn underwater_single_family() -> DealInputs {
    // Equity flows stay negative through the sale at -10% appreciation
    DealInputs::from_pairs([
        ("purchase_price", dec!(500000)),
        ("monthly_rent", dec!(2200)),
        ("down_payment_rate", dec!(0.10)),
        ("vacancy_rate", dec!(0.15)),
        ("appreciation_rate", dec!(-0.10)),
    ])
}

#[test]
fn test_unsolvable_irr_keeps_other_metrics() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let request = ProjectionRequest {
        property_type: "single_family".into(),
        inputs: underwater_single_family(),
    };
    let out = project_deal(&engine, &request).unwrap();
    let bundle = &out.result.metrics;

    assert_eq!(bundle.irr, None);
    assert!(bundle.irr_error.as_deref().unwrap().contains("never change sign"));
    assert!(bundle.cap_rate.is_some());
    assert!(bundle.dscr.is_some());
    assert!(out.warnings.iter().any(|w| w.starts_with("IRR not reported")));

    // Asking for IRR directly still surfaces the failure
    let err = engine
        .evaluate("single_family", &request.inputs, TargetMetric::Irr)
        .unwrap_err();
    assert!(matches!(err, PropvestError::DidNotConverge { .. }));
}

#[test]
fn test_oversized_loan_is_rejected_not_panicking() {
    let registry = TemplateRegistry::standard();
    let engine = ProjectionEngine::new(&registry);
    let inputs = DealInputs::from_pairs([
        ("purchase_price", Decimal::from(10_000_000_000i64)),
        ("monthly_rent", dec!(2200)),
        ("interest_rate", Decimal::ONE),
        ("loan_term_years", dec!(50)),
    ]);
    let err = engine.project("single_family", &inputs).unwrap_err();
    assert!(matches!(err, PropvestError::InvalidParameter { .. }));
}
