//! Per-property-type scoring benchmarks.
//!
//! Scores are read off piecewise-linear curves (financial metrics, market
//! growth) or step tables (risk tiers). Curves anchor on the template's
//! target values so the same shape serves every property type.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Rate;

// ---------------------------------------------------------------------------
// Curves and tiers
// ---------------------------------------------------------------------------

/// Piecewise-linear map from a metric value to a 0-100 score.
///
/// Values beyond the first or last point take that point's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurve(Vec<(Decimal, Decimal)>);

impl ScoreCurve {
    /// Points must be ordered by strictly increasing `x`.
    pub fn new(points: Vec<(Decimal, Decimal)>) -> Self {
        Self(points)
    }

    pub fn score(&self, x: Decimal) -> Decimal {
        let Some(&(first_x, first_score)) = self.0.first() else {
            return Decimal::ZERO;
        };
        if x <= first_x {
            return first_score;
        }
        for pair in self.0.windows(2) {
            let (x0, s0) = pair[0];
            let (x1, s1) = pair[1];
            if x <= x1 {
                return s0 + (x - x0) / (x1 - x0) * (s1 - s0);
            }
        }
        self.0.last().map(|&(_, s)| s).unwrap_or(first_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDirection {
    /// Higher is better: first tier whose bound the value reaches
    AtLeast,
    /// Lower is better: first tier whose bound the value does not exceed
    AtMost,
}

/// Step scoring: tiers are checked in order, `fallback` when none match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub direction: TierDirection,
    pub tiers: Vec<(Decimal, Decimal)>,
    pub fallback: Decimal,
}

impl TierTable {
    pub fn score(&self, value: Decimal) -> Decimal {
        self.tiers
            .iter()
            .find(|(bound, _)| match self.direction {
                TierDirection::AtLeast => value >= *bound,
                TierDirection::AtMost => value <= *bound,
            })
            .map(|(_, score)| *score)
            .unwrap_or(self.fallback)
    }
}

/// Ratio curve anchored on a target: half the target scores 40, the target
/// 75, one and a half times the target 100.
fn target_curve(target: Decimal) -> ScoreCurve {
    ScoreCurve::new(vec![
        (Decimal::ZERO, Decimal::ZERO),
        (target * dec!(0.5), dec!(40)),
        (target, dec!(75)),
        (target * dec!(1.5), dec!(100)),
    ])
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Targets and strength/weakness thresholds for one property type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringBenchmarks {
    pub target_cap_rate: Rate,
    pub target_cash_on_cash: Rate,
    pub target_dscr: Decimal,
    /// DSCR below this is a weakness
    #[serde(default = "default_weak_dscr")]
    pub weak_dscr: Decimal,
    /// Cash-on-cash below this is a weakness
    #[serde(default = "default_weak_cash_on_cash")]
    pub weak_cash_on_cash: Rate,
    /// Vacancy at or below this is a strength
    #[serde(default = "default_strong_vacancy")]
    pub strong_vacancy: Rate,
    /// Vacancy above this is a weakness
    #[serde(default = "default_weak_vacancy")]
    pub weak_vacancy: Rate,
}

fn default_weak_dscr() -> Decimal {
    dec!(1.2)
}

fn default_weak_cash_on_cash() -> Rate {
    dec!(0.08)
}

fn default_strong_vacancy() -> Rate {
    dec!(0.05)
}

fn default_weak_vacancy() -> Rate {
    dec!(0.12)
}

impl ScoringBenchmarks {
    pub fn new(target_cap_rate: Rate, target_cash_on_cash: Rate, target_dscr: Decimal) -> Self {
        Self {
            target_cap_rate,
            target_cash_on_cash,
            target_dscr,
            weak_dscr: default_weak_dscr(),
            weak_cash_on_cash: default_weak_cash_on_cash(),
            strong_vacancy: default_strong_vacancy(),
            weak_vacancy: default_weak_vacancy(),
        }
    }

    pub fn with_weak_dscr(mut self, weak_dscr: Decimal) -> Self {
        self.weak_dscr = weak_dscr;
        self
    }

    pub fn with_vacancy_bands(mut self, strong: Rate, weak: Rate) -> Self {
        self.strong_vacancy = strong;
        self.weak_vacancy = weak;
        self
    }

    pub fn cap_rate_curve(&self) -> ScoreCurve {
        target_curve(self.target_cap_rate)
    }

    pub fn cash_on_cash_curve(&self) -> ScoreCurve {
        target_curve(self.target_cash_on_cash)
    }

    pub fn dscr_curve(&self) -> ScoreCurve {
        ScoreCurve::new(vec![
            (dec!(0.8), Decimal::ZERO),
            (Decimal::ONE, dec!(30)),
            (self.target_dscr, dec!(75)),
            (self.target_dscr + dec!(0.5), dec!(100)),
        ])
    }

    /// Vacancy tiers spread around the strong/weak bands.
    pub fn vacancy_tiers(&self) -> TierTable {
        let spread = self.weak_vacancy - self.strong_vacancy;
        TierTable {
            direction: TierDirection::AtMost,
            tiers: vec![
                (self.strong_vacancy, dec!(100)),
                (self.strong_vacancy + spread / dec!(2), dec!(85)),
                (self.weak_vacancy, dec!(65)),
                (self.weak_vacancy + spread, dec!(40)),
            ],
            fallback: dec!(15),
        }
    }

    /// Sanity checks applied when a template set is loaded.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_cap_rate <= Decimal::ZERO || self.target_cash_on_cash <= Decimal::ZERO {
            return Err("scoring targets must be positive".into());
        }
        if self.target_dscr <= Decimal::ONE {
            return Err("target DSCR must exceed 1.0".into());
        }
        if self.strong_vacancy > self.weak_vacancy {
            return Err("strong vacancy band must not exceed the weak band".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared tables
// ---------------------------------------------------------------------------

/// DSCR safety tiers used by the risk score.
pub fn dscr_safety_tiers() -> TierTable {
    TierTable {
        direction: TierDirection::AtLeast,
        tiers: vec![
            (dec!(1.5), dec!(100)),
            (dec!(1.35), dec!(85)),
            (dec!(1.25), dec!(70)),
            (dec!(1.1), dec!(50)),
            (Decimal::ONE, dec!(30)),
        ],
        fallback: dec!(10),
    }
}

/// Equity share of the purchase price.
pub fn equity_tiers() -> TierTable {
    TierTable {
        direction: TierDirection::AtLeast,
        tiers: vec![
            (dec!(0.30), dec!(100)),
            (dec!(0.25), dec!(85)),
            (dec!(0.20), dec!(70)),
            (dec!(0.10), dec!(50)),
            (Decimal::ZERO, dec!(30)),
        ],
        fallback: dec!(10),
    }
}

/// Operating expenses over effective gross income.
pub fn expense_ratio_tiers() -> TierTable {
    TierTable {
        direction: TierDirection::AtMost,
        tiers: vec![
            (dec!(0.35), dec!(100)),
            (dec!(0.45), dec!(80)),
            (dec!(0.55), dec!(60)),
            (dec!(0.65), dec!(40)),
        ],
        fallback: dec!(20),
    }
}

/// Annual market growth rate.
pub fn growth_curve() -> ScoreCurve {
    ScoreCurve::new(vec![
        (dec!(-0.02), Decimal::ZERO),
        (Decimal::ZERO, dec!(30)),
        (dec!(0.02), dec!(60)),
        (dec!(0.04), dec!(85)),
        (dec!(0.06), dec!(100)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_interpolates_and_clamps() {
        let curve = growth_curve();
        assert_eq!(curve.score(dec!(-0.10)), Decimal::ZERO);
        assert_eq!(curve.score(dec!(0.01)), dec!(45));
        assert_eq!(curve.score(dec!(0.04)), dec!(85));
        assert_eq!(curve.score(dec!(0.20)), dec!(100));
    }

    #[test]
    fn test_target_curve_anchors() {
        let b = ScoringBenchmarks::new(dec!(0.06), dec!(0.08), dec!(1.25));
        let cap = b.cap_rate_curve();
        assert_eq!(cap.score(dec!(0.03)), dec!(40));
        assert_eq!(cap.score(dec!(0.06)), dec!(75));
        assert_eq!(cap.score(dec!(0.09)), dec!(100));
        assert_eq!(b.dscr_curve().score(dec!(1.5)), dec!(87.5));
    }

    #[test]
    fn test_tier_lookup() {
        let dscr = dscr_safety_tiers();
        assert_eq!(dscr.score(dec!(1.4)), dec!(85));
        assert_eq!(dscr.score(dec!(1.25)), dec!(70));
        assert_eq!(dscr.score(dec!(0.9)), dec!(10));

        let equity = equity_tiers();
        assert_eq!(equity.score(dec!(0.25)), dec!(85));
        assert_eq!(equity.score(Decimal::ZERO), dec!(30));
        assert_eq!(equity.score(dec!(-0.05)), dec!(10));

        assert_eq!(expense_ratio_tiers().score(dec!(0.50)), dec!(60));
    }

    #[test]
    fn test_vacancy_bands() {
        let default = ScoringBenchmarks::new(dec!(0.06), dec!(0.08), dec!(1.25));
        let tiers = default.vacancy_tiers();
        assert_eq!(tiers.score(dec!(0.05)), dec!(100));
        assert_eq!(tiers.score(dec!(0.08)), dec!(85));
        assert_eq!(tiers.score(dec!(0.25)), dec!(15));

        let str_bands = default.with_vacancy_bands(dec!(0.30), dec!(0.45));
        assert_eq!(str_bands.vacancy_tiers().score(dec!(0.35)), dec!(85));
    }

    #[test]
    fn test_validate() {
        assert!(ScoringBenchmarks::new(dec!(0.06), dec!(0.08), dec!(1.25))
            .validate()
            .is_ok());
        assert!(ScoringBenchmarks::new(dec!(0.06), dec!(0.08), dec!(0.9))
            .validate()
            .is_err());
    }
}
