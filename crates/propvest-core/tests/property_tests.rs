use proptest::prelude::*;
use propvest_core::deal::inputs::DealInputs;
use propvest_core::scenarios::sensitivity::{tornado_analysis, TornadoRequest};
use propvest_core::scoring::{DealScorer, QuickScoreRequest};
use propvest_core::{ProjectionEngine, SensitivityVariable, TargetMetric, TemplateRegistry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn deal(price: u32, rent: u32, taxes: u32) -> DealInputs {
    DealInputs::from_pairs([
        ("purchase_price", Decimal::from(price)),
        ("monthly_rent", Decimal::from(rent)),
        ("property_taxes", Decimal::from(taxes)),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn projection_is_deterministic(price in 100_000u32..2_000_000, rent in 500u32..10_000, taxes in 0u32..20_000) {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let inputs = deal(price, rent, taxes);
        let a = engine.project("single_family", &inputs).unwrap();
        let b = engine.project("single_family", &inputs).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn noi_identity_holds(price in 100_000u32..2_000_000, rent in 500u32..10_000, taxes in 0u32..20_000) {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let projection = engine.project("single_family", &deal(price, rent, taxes)).unwrap();
        for p in &projection.periods {
            prop_assert_eq!(p.noi, p.gross_income - p.operating_expenses);
        }
    }

    #[test]
    fn overall_score_is_weighted_sum(
        cap in 0u32..1500,
        coc in 0u32..2500,
        dscr in 50u32..250,
    ) {
        let registry = TemplateRegistry::standard();
        let scorer = DealScorer::new(&registry);
        let score = scorer
            .quick_score(&QuickScoreRequest {
                property_type: "commercial".into(),
                cap_rate: Decimal::new(cap as i64, 2),
                cash_on_cash: Decimal::new(coc as i64, 2),
                dscr: Decimal::new(dscr as i64, 2),
            })
            .unwrap();
        prop_assert_eq!(
            score.overall_score,
            dec!(0.50) * score.financial_score + dec!(0.30) * score.risk_score + dec!(0.20) * score.market_score
        );
        prop_assert!(score.overall_score >= Decimal::ZERO && score.overall_score <= dec!(100));
    }

    #[test]
    fn tornado_sorted_by_magnitude(rent_spread in 1u32..1000, tax_spread in 1u32..3000) {
        let registry = TemplateRegistry::standard();
        let engine = ProjectionEngine::new(&registry);
        let spread_rent = Decimal::from(rent_spread);
        let spread_tax = Decimal::from(tax_spread);
        let request = TornadoRequest {
            property_type: "single_family".into(),
            base_inputs: deal(300_000, 2_500, 3_600),
            metric: TargetMetric::Noi,
            variables: vec![
                SensitivityVariable::new("property_taxes", dec!(3600), dec!(3600) - spread_tax, dec!(3600) + spread_tax),
                SensitivityVariable::new("monthly_rent", dec!(2500), dec!(2500) - spread_rent, dec!(2500) + spread_rent),
            ],
        };
        let out = tornado_analysis(&engine, &request).unwrap().result;
        for pair in out.results.windows(2) {
            prop_assert!(pair[0].impact_percent.abs() >= pair[1].impact_percent.abs());
        }
    }
}
