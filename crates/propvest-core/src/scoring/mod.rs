//! Composite deal scoring.
//!
//! Three 0-100 sub-scores are combined into one weighted score:
//! financial (cap rate, cash-on-cash, DSCR) at 50%, risk (DSCR safety,
//! equity, vacancy, expense ratio) at 30% and market (location, growth)
//! at 20%. Benchmarks come from the property type's template.

pub mod benchmarks;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use self::benchmarks::{
    dscr_safety_tiers, equity_tiers, expense_ratio_tiers, growth_curve, ScoringBenchmarks,
};
use crate::deal::inputs::fields::VACANCY_RATE;
use crate::deal::inputs::DealInputs;
use crate::deal::templates::TemplateRegistry;
use crate::error::PropvestError;
use crate::metrics::{DebtCoverage, MetricBundle};
use crate::projection::ProjectionEngine;
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::PropvestResult;

const FINANCIAL_WEIGHT: Decimal = dec!(0.50);
const RISK_WEIGHT: Decimal = dec!(0.30);
const MARKET_WEIGHT: Decimal = dec!(0.20);
/// Market score when no market context is supplied
const NEUTRAL_SCORE: Decimal = dec!(50);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Below Average")]
    BelowAverage,
    Poor,
}

impl Rating {
    pub fn from_score(score: Decimal) -> Self {
        if score >= dec!(80) {
            Self::Excellent
        } else if score >= dec!(70) {
            Self::Good
        } else if score >= dec!(60) {
            Self::Fair
        } else if score >= dec!(50) {
            Self::BelowAverage
        } else {
            Self::Poor
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Excellent => "Strong Buy - Exceptional investment opportunity with strong fundamentals",
            Self::Good => "Buy - Solid investment with good return potential",
            Self::Fair => "Consider - Acceptable investment, review risks carefully",
            Self::BelowAverage => "Caution - Below average returns, significant risks present",
            Self::Poor => "Pass - Does not meet investment criteria",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::BelowAverage => "Below Average",
            Self::Poor => "Poor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Financial,
    Risk,
    Market,
}

/// One scored input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub category: ScoreCategory,
    pub name: String,
    /// None for an all-cash DSCR
    pub value: Option<Decimal>,
    pub score: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealScore {
    pub overall_score: Decimal,
    pub financial_score: Decimal,
    pub risk_score: Decimal,
    pub market_score: Decimal,
    pub rating: Rating,
    pub recommendation: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub components: Vec<ScoreComponent>,
}

/// Caller-supplied view of the local market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    /// 0 to 10
    #[serde(default = "default_location_quality")]
    pub location_quality: Decimal,
    /// Annual, as a fraction
    #[serde(default = "default_market_growth")]
    pub market_growth_rate: Rate,
}

fn default_location_quality() -> Decimal {
    dec!(5)
}

fn default_market_growth() -> Rate {
    dec!(0.02)
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            location_quality: default_location_quality(),
            market_growth_rate: default_market_growth(),
        }
    }
}

impl MarketContext {
    pub fn validate(&self) -> PropvestResult<()> {
        if self.location_quality < Decimal::ZERO || self.location_quality > dec!(10) {
            return Err(PropvestError::InvalidParameter {
                field: "location_quality".into(),
                reason: "Must be between 0 and 10".into(),
            });
        }
        if self.market_growth_rate.abs() > Decimal::ONE {
            return Err(PropvestError::InvalidParameter {
                field: "market_growth_rate".into(),
                reason: "Must be a fraction between -1 and 1".into(),
            });
        }
        Ok(())
    }
}

/// Risk inputs that are not part of a metric bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    /// Equity as a share of the purchase price
    #[serde(default)]
    pub equity_ratio: Option<Rate>,
    #[serde(default)]
    pub vacancy_rate: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub property_type: String,
    pub inputs: DealInputs,
    #[serde(flatten)]
    pub market: MarketContext,
}

/// Abbreviated scoring from three headline metrics. Rates are percentages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickScoreRequest {
    pub property_type: String,
    /// Percent, e.g. 7.5
    pub cap_rate: Decimal,
    /// Percent, e.g. 12.5
    pub cash_on_cash: Decimal,
    pub dscr: Decimal,
}

/// Everything a score is computed from.
struct Signals {
    cap_rate: Rate,
    cash_on_cash: Rate,
    dscr: DebtCoverage,
    equity_ratio: Option<Rate>,
    vacancy_rate: Option<Rate>,
    expense_ratio: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores deals against the benchmarks in a template registry.
#[derive(Debug, Clone, Copy)]
pub struct DealScorer<'a> {
    engine: ProjectionEngine<'a>,
}

impl<'a> DealScorer<'a> {
    pub fn new(templates: &'a TemplateRegistry) -> Self {
        Self::from_engine(ProjectionEngine::new(templates))
    }

    pub fn from_engine(engine: ProjectionEngine<'a>) -> Self {
        Self { engine }
    }

    pub fn benchmarks(&self, property_type: &str) -> PropvestResult<&'a ScoringBenchmarks> {
        let template = self.engine.template(property_type)?;
        template
            .scoring
            .as_ref()
            .ok_or_else(|| PropvestError::InvalidParameter {
                field: "property_type".into(),
                reason: format!("'{}' has no scoring benchmarks", template.id),
            })
    }

    /// Project the deal, then score its metrics and risk profile.
    pub fn score_deal(
        &self,
        property_type: &str,
        inputs: &DealInputs,
        market: &MarketContext,
    ) -> PropvestResult<DealScore> {
        let benchmarks = self.benchmarks(property_type)?;
        market.validate()?;
        let template = self.engine.template(property_type)?;
        let analysis = self.engine.analyze(property_type, inputs)?;
        let projection = &analysis.projection;

        let equity_ratio = if projection.purchase_price.is_zero() {
            None
        } else {
            Some(Decimal::ONE - projection.loan_amount / projection.purchase_price)
        };
        let risk = RiskContext {
            equity_ratio,
            vacancy_rate: template.resolve(inputs)?.optional(VACANCY_RATE),
        };
        let signals = signals_from_bundle(&analysis.metrics, &risk)?;
        Ok(score_signals(benchmarks, &signals, Some(market)))
    }

    /// Score an existing metric bundle with explicit risk and market context.
    pub fn score_metrics(
        &self,
        property_type: &str,
        metrics: &MetricBundle,
        risk: &RiskContext,
        market: Option<&MarketContext>,
    ) -> PropvestResult<DealScore> {
        let benchmarks = self.benchmarks(property_type)?;
        if let Some(m) = market {
            m.validate()?;
        }
        let signals = signals_from_bundle(metrics, risk)?;
        Ok(score_signals(benchmarks, &signals, market))
    }

    /// Score from cap rate, cash-on-cash and DSCR alone.
    ///
    /// Risk uses only the DSCR safety tier and the market score is neutral.
    pub fn quick_score(&self, request: &QuickScoreRequest) -> PropvestResult<DealScore> {
        let benchmarks = self.benchmarks(&request.property_type)?;
        if request.dscr < Decimal::ZERO {
            return Err(PropvestError::InvalidParameter {
                field: "dscr".into(),
                reason: "Must be non-negative".into(),
            });
        }
        let signals = Signals {
            cap_rate: request.cap_rate / dec!(100),
            cash_on_cash: request.cash_on_cash / dec!(100),
            dscr: DebtCoverage::Ratio(request.dscr),
            equity_ratio: None,
            vacancy_rate: None,
            expense_ratio: None,
        };
        Ok(score_signals(benchmarks, &signals, None))
    }
}

fn signals_from_bundle(metrics: &MetricBundle, risk: &RiskContext) -> PropvestResult<Signals> {
    let required = |value: Option<Decimal>, field: &str| {
        value.ok_or_else(|| PropvestError::MissingRequiredInput {
            field: field.to_string(),
        })
    };
    let dscr = match (metrics.all_cash, metrics.dscr) {
        (true, _) => DebtCoverage::NoDebt,
        (false, Some(r)) => DebtCoverage::Ratio(r),
        (false, None) => return Err(PropvestError::MissingRequiredInput { field: "dscr".into() }),
    };
    Ok(Signals {
        cap_rate: required(metrics.cap_rate, "cap_rate")?,
        cash_on_cash: required(metrics.cash_on_cash, "cash_on_cash")?,
        dscr,
        equity_ratio: risk.equity_ratio,
        vacancy_rate: risk.vacancy_rate,
        expense_ratio: metrics.operating_expense_ratio,
    })
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn pct(rate: Decimal) -> String {
    format!("{:.2}%", rate * dec!(100))
}

fn mean(scores: &[Decimal]) -> Decimal {
    if scores.is_empty() {
        return NEUTRAL_SCORE;
    }
    let total: Decimal = scores.iter().copied().sum();
    (total / Decimal::from(scores.len() as u64)).round_dp(2)
}

fn score_signals(
    b: &ScoringBenchmarks,
    s: &Signals,
    market: Option<&MarketContext>,
) -> DealScore {
    let mut components = Vec::new();
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut push = |category, name: &str, value: Option<Decimal>, score: Decimal| {
        components.push(ScoreComponent {
            category,
            name: name.into(),
            value,
            score,
        });
        score
    };

    // --- Financial ---
    let dscr_value = match s.dscr {
        DebtCoverage::Ratio(r) => Some(r),
        DebtCoverage::NoDebt => None,
    };
    let financial = [
        push(
            ScoreCategory::Financial,
            "cap_rate",
            Some(s.cap_rate),
            b.cap_rate_curve().score(s.cap_rate),
        ),
        push(
            ScoreCategory::Financial,
            "cash_on_cash",
            Some(s.cash_on_cash),
            b.cash_on_cash_curve().score(s.cash_on_cash),
        ),
        push(
            ScoreCategory::Financial,
            "dscr",
            dscr_value,
            dscr_value.map_or(dec!(100), |r| b.dscr_curve().score(r)),
        ),
    ];

    if s.cap_rate >= b.target_cap_rate {
        strengths.push(format!(
            "Cap rate of {} meets the {} target",
            pct(s.cap_rate),
            pct(b.target_cap_rate)
        ));
    } else if s.cap_rate < b.target_cap_rate * dec!(0.8) {
        weaknesses.push(format!(
            "Cap rate of {} is well below the {} target",
            pct(s.cap_rate),
            pct(b.target_cap_rate)
        ));
    }
    if s.cash_on_cash >= b.target_cash_on_cash {
        strengths.push(format!(
            "Cash-on-cash return of {} meets the {} target",
            pct(s.cash_on_cash),
            pct(b.target_cash_on_cash)
        ));
    } else if s.cash_on_cash < b.weak_cash_on_cash {
        weaknesses.push(format!(
            "Cash-on-cash return of {} is below {}",
            pct(s.cash_on_cash),
            pct(b.weak_cash_on_cash)
        ));
    }
    match dscr_value {
        None => strengths.push("No debt service: all-cash purchase".into()),
        Some(r) if r >= b.target_dscr => strengths.push(format!(
            "Debt coverage of {r:.2}x meets the {:.2}x target",
            b.target_dscr
        )),
        Some(r) if r < b.weak_dscr => weaknesses.push(format!(
            "Debt coverage of {r:.2}x is below {:.2}x",
            b.weak_dscr
        )),
        Some(_) => {}
    }

    // --- Risk ---
    let mut risk = vec![push(
        ScoreCategory::Risk,
        "dscr_safety",
        dscr_value,
        dscr_value.map_or(dec!(100), |r| dscr_safety_tiers().score(r)),
    )];
    if let Some(equity) = s.equity_ratio {
        risk.push(push(
            ScoreCategory::Risk,
            "equity_position",
            Some(equity),
            equity_tiers().score(equity),
        ));
        if equity >= dec!(0.25) {
            strengths.push(format!("Strong equity position of {}", pct(equity)));
        } else if equity < dec!(0.20) {
            weaknesses.push(format!("Thin equity position of {}", pct(equity)));
        }
    }
    if let Some(vacancy) = s.vacancy_rate {
        risk.push(push(
            ScoreCategory::Risk,
            "vacancy",
            Some(vacancy),
            b.vacancy_tiers().score(vacancy),
        ));
        if vacancy <= b.strong_vacancy {
            strengths.push(format!("Low vacancy assumption of {}", pct(vacancy)));
        } else if vacancy > b.weak_vacancy {
            weaknesses.push(format!("High vacancy assumption of {}", pct(vacancy)));
        }
    }
    if let Some(ratio) = s.expense_ratio {
        risk.push(push(
            ScoreCategory::Risk,
            "expense_ratio",
            Some(ratio),
            expense_ratio_tiers().score(ratio),
        ));
        if ratio <= dec!(0.35) {
            strengths.push(format!("Lean operating expense ratio of {}", pct(ratio)));
        } else if ratio > dec!(0.55) {
            weaknesses.push(format!("Heavy operating expense ratio of {}", pct(ratio)));
        }
    }

    // --- Market ---
    let market_scores = match market {
        Some(m) => {
            let location = m.location_quality * dec!(10);
            if m.location_quality >= dec!(8) {
                strengths.push(format!("Prime location ({}/10)", m.location_quality));
            } else if m.location_quality <= dec!(4) {
                weaknesses.push(format!("Weak location ({}/10)", m.location_quality));
            }
            if m.market_growth_rate >= dec!(0.04) {
                strengths.push(format!("Strong market growth of {}", pct(m.market_growth_rate)));
            } else if m.market_growth_rate < Decimal::ZERO {
                weaknesses.push(format!("Declining market ({})", pct(m.market_growth_rate)));
            }
            vec![
                push(
                    ScoreCategory::Market,
                    "location_quality",
                    Some(m.location_quality),
                    location,
                ),
                push(
                    ScoreCategory::Market,
                    "market_growth",
                    Some(m.market_growth_rate),
                    growth_curve().score(m.market_growth_rate),
                ),
            ]
        }
        None => Vec::new(),
    };

    let financial_score = mean(&financial);
    let risk_score = mean(&risk);
    let market_score = mean(&market_scores);
    let overall_score =
        FINANCIAL_WEIGHT * financial_score + RISK_WEIGHT * risk_score + MARKET_WEIGHT * market_score;
    let rating = Rating::from_score(overall_score);

    DealScore {
        overall_score,
        financial_score,
        risk_score,
        market_score,
        rating,
        recommendation: rating.recommendation().to_string(),
        strengths,
        weaknesses,
        components,
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Full deal score: projection, metrics, risk profile and market context.
pub fn score_deal(
    engine: &ProjectionEngine,
    request: &ScoreRequest,
) -> PropvestResult<ComputationOutput<DealScore>> {
    let start = Instant::now();
    let scorer = DealScorer::from_engine(*engine);
    let score = scorer.score_deal(&request.property_type, &request.inputs, &request.market)?;

    let mut warnings = Vec::new();
    if score.components.iter().any(|c| c.name == "dscr" && c.value.is_none()) {
        warnings.push("All-cash deal: DSCR components scored at 100".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Weighted deal score (50% financial, 30% risk, 20% market)",
        request,
        warnings,
        elapsed,
        score,
    ))
}

/// Abbreviated score from three headline metrics.
pub fn quick_score(
    engine: &ProjectionEngine,
    request: &QuickScoreRequest,
) -> PropvestResult<ComputationOutput<DealScore>> {
    let start = Instant::now();
    let score = DealScorer::from_engine(*engine).quick_score(request)?;
    let warnings = vec![
        "Risk score uses DSCR safety only; market score is neutral (50)".to_string(),
    ];

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Quick score from cap rate, cash-on-cash and DSCR",
        request,
        warnings,
        elapsed,
        score,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(property_type: &str, cap: Decimal, coc: Decimal, dscr: Decimal) -> DealScore {
        let registry = TemplateRegistry::standard();
        DealScorer::new(&registry)
            .quick_score(&QuickScoreRequest {
                property_type: property_type.into(),
                cap_rate: cap,
                cash_on_cash: coc,
                dscr,
            })
            .unwrap()
    }

    #[test]
    fn test_quick_score_multifamily_fixture() {
        let score = quick("multifamily", dec!(7.5), dec!(12.5), dec!(1.4));
        assert_eq!(score.financial_score, dec!(88.40));
        assert_eq!(score.risk_score, dec!(85));
        assert_eq!(score.market_score, dec!(50));
        assert_eq!(score.overall_score, dec!(79.70));
        assert_eq!(score.rating, Rating::Good);
        assert!(score.recommendation.starts_with("Buy"));
    }

    #[test]
    fn test_weighting_identity() {
        let score = quick("single_family", dec!(4.1), dec!(3.3), dec!(1.07));
        assert_eq!(
            score.overall_score,
            dec!(0.5) * score.financial_score
                + dec!(0.3) * score.risk_score
                + dec!(0.2) * score.market_score
        );
        assert!(!score.weaknesses.is_empty());
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(Rating::from_score(dec!(80)), Rating::Excellent);
        assert_eq!(Rating::from_score(dec!(79.99)), Rating::Good);
        assert_eq!(Rating::from_score(dec!(60)), Rating::Fair);
        assert_eq!(Rating::from_score(dec!(50)), Rating::BelowAverage);
        assert_eq!(Rating::from_score(dec!(49.99)), Rating::Poor);
        assert_eq!(Rating::BelowAverage.to_string(), "Below Average");
    }

    #[test]
    fn test_flip_has_no_benchmarks() {
        let registry = TemplateRegistry::standard();
        let err = DealScorer::new(&registry)
            .quick_score(&QuickScoreRequest {
                property_type: "fix_and_flip".into(),
                cap_rate: dec!(8),
                cash_on_cash: dec!(10),
                dscr: dec!(1.3),
            })
            .unwrap_err();
        assert!(matches!(err, PropvestError::InvalidParameter { .. }));
    }

    #[test]
    fn test_score_deal_all_cash() {
        let registry = TemplateRegistry::standard();
        let scorer = DealScorer::new(&registry);
        let inputs = DealInputs::from_pairs([
            ("purchase_price", dec!(250000)),
            ("monthly_rent", dec!(2200)),
            ("down_payment_rate", Decimal::ONE),
        ]);
        let score = scorer
            .score_deal("single_family", &inputs, &MarketContext::default())
            .unwrap();
        assert!(score
            .strengths
            .iter()
            .any(|s| s.contains("all-cash")));
        let dscr = score.components.iter().find(|c| c.name == "dscr").unwrap();
        assert_eq!(dscr.score, dec!(100));
        assert_eq!(dscr.value, None);
    }

    #[test]
    fn test_market_context_bounds() {
        let ctx = MarketContext {
            location_quality: dec!(11),
            market_growth_rate: dec!(0.02),
        };
        assert!(ctx.validate().is_err());
        assert!(MarketContext::default().validate().is_ok());
    }
}
