use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PropvestError;
use crate::projection::CashFlowProjection;
use crate::time_value::{self, IrrConfig};
use crate::types::{Money, Multiple, Rate, TargetMetric};
use crate::PropvestResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Debt service coverage. An unlevered deal has no ratio to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DebtCoverage {
    Ratio(Decimal),
    NoDebt,
}

impl DebtCoverage {
    /// The ratio as a scalar; fails for all-cash deals.
    pub fn ratio(&self) -> PropvestResult<Decimal> {
        match self {
            Self::Ratio(r) => Ok(*r),
            Self::NoDebt => Err(PropvestError::DivisionByZero {
                context: "DSCR (no debt service)".into(),
            }),
        }
    }
}

/// Standard investment metrics for one projection.
///
/// Optional fields are present only when the property type supports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    pub noi_year1: Money,
    pub cash_flow_year1: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_on_cash: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr: Option<Decimal>,
    /// No debt service: DSCR is not defined
    pub all_cash: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    /// Why IRR is missing when the template supports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moic: Option<Multiple>,
    pub net_profit: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_expense_ratio: Option<Rate>,
    pub total_cash_invested: Money,
}

impl MetricBundle {
    pub fn get(&self, metric: TargetMetric) -> Option<Decimal> {
        match metric {
            TargetMetric::Noi => Some(self.noi_year1),
            TargetMetric::CapRate => self.cap_rate,
            TargetMetric::CashOnCash => self.cash_on_cash,
            TargetMetric::Dscr => self.dscr,
            TargetMetric::Irr => self.irr,
            TargetMetric::Moic => self.moic,
            TargetMetric::NetProfit => Some(self.net_profit),
            TargetMetric::Roi => self.roi,
            TargetMetric::CashFlow => Some(self.cash_flow_year1),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar formulas
// ---------------------------------------------------------------------------

pub fn noi(gross_income: Money, operating_expenses: Money) -> Money {
    gross_income - operating_expenses
}

pub fn cap_rate(noi_year1: Money, purchase_price: Money) -> PropvestResult<Rate> {
    if purchase_price.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: "cap rate (purchase price is zero)".into(),
        });
    }
    Ok(noi_year1 / purchase_price)
}

pub fn cash_on_cash(
    noi_year1: Money,
    debt_service_year1: Money,
    cash_invested: Money,
) -> PropvestResult<Rate> {
    if cash_invested.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: "cash-on-cash (total cash invested is zero)".into(),
        });
    }
    Ok((noi_year1 - debt_service_year1) / cash_invested)
}

pub fn dscr(noi: Money, annual_debt_service: Money) -> DebtCoverage {
    if annual_debt_service.is_zero() {
        DebtCoverage::NoDebt
    } else {
        DebtCoverage::Ratio(noi / annual_debt_service)
    }
}

pub fn moic(total_distributions: Money, total_invested: Money) -> PropvestResult<Multiple> {
    if total_invested.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: "MOIC (total cash invested is zero)".into(),
        });
    }
    Ok(total_distributions / total_invested)
}

pub fn roi(net_profit: Money, total_invested: Money) -> PropvestResult<Rate> {
    if total_invested.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: "ROI (total cash invested is zero)".into(),
        });
    }
    Ok(net_profit / total_invested)
}

/// Annual IRR of a projection's equity cash flows.
pub fn irr(projection: &CashFlowProjection, config: &IrrConfig) -> PropvestResult<Rate> {
    let periodic = time_value::irr(&projection.equity_cash_flows(), config)?;
    time_value::annualize(periodic, projection.period_years)
}

// ---------------------------------------------------------------------------
// Projection-level metrics
// ---------------------------------------------------------------------------

/// Compute a single metric without building the whole bundle.
pub fn metric_value(
    projection: &CashFlowProjection,
    metric: TargetMetric,
    config: &IrrConfig,
) -> PropvestResult<Decimal> {
    let first = projection.first_period()?;
    let invested = projection.total_cash_invested;
    match metric {
        TargetMetric::Noi => Ok(first.noi),
        TargetMetric::CashFlow => Ok(first.net_cash_flow),
        TargetMetric::CapRate => cap_rate(first.noi, projection.purchase_price),
        TargetMetric::CashOnCash => cash_on_cash(first.noi, first.debt_service, invested),
        TargetMetric::Dscr => dscr(first.noi, first.debt_service).ratio(),
        TargetMetric::Irr => irr(projection, config),
        TargetMetric::Moic => moic(projection.total_distributions(), invested),
        TargetMetric::NetProfit => Ok(projection.total_distributions() - invested),
        TargetMetric::Roi => roi(projection.total_distributions() - invested, invested),
    }
}

/// Every metric in `supported`.
///
/// An IRR that cannot be solved (cash flows that never change sign, no
/// convergence) leaves `irr` empty and records the reason in `irr_error`;
/// every other failure propagates.
pub fn bundle(
    projection: &CashFlowProjection,
    supported: &[TargetMetric],
    config: &IrrConfig,
) -> PropvestResult<MetricBundle> {
    let first = projection.first_period()?;
    let wants = |m: TargetMetric| supported.contains(&m);
    let compute = |m: TargetMetric| -> PropvestResult<Option<Decimal>> {
        if wants(m) {
            metric_value(projection, m, config).map(Some)
        } else {
            Ok(None)
        }
    };

    let coverage = dscr(first.noi, first.debt_service);
    let (dscr_value, all_cash) = match coverage {
        DebtCoverage::Ratio(r) => (wants(TargetMetric::Dscr).then_some(r), false),
        DebtCoverage::NoDebt => (None, true),
    };

    let (irr_value, irr_error) = match compute(TargetMetric::Irr) {
        Ok(value) => (value, None),
        Err(e) if e.is_computational() => (None, Some(e.to_string())),
        Err(e) => return Err(e),
    };

    let operating_expense_ratio = if first.gross_income.is_zero() {
        None
    } else {
        Some(first.operating_expenses / first.gross_income)
    };

    Ok(MetricBundle {
        noi_year1: first.noi,
        cash_flow_year1: first.net_cash_flow,
        cap_rate: compute(TargetMetric::CapRate)?,
        cash_on_cash: compute(TargetMetric::CashOnCash)?,
        dscr: dscr_value,
        all_cash,
        irr: irr_value,
        irr_error,
        moic: compute(TargetMetric::Moic)?,
        net_profit: projection.total_distributions() - projection.total_cash_invested,
        roi: compute(TargetMetric::Roi)?,
        operating_expense_ratio,
        total_cash_invested: projection.total_cash_invested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cap_rate_exact() {
        assert_eq!(cap_rate(dec!(19500), dec!(300000)).unwrap(), dec!(0.065));
    }

    #[test]
    fn test_cap_rate_zero_price() {
        assert!(matches!(
            cap_rate(dec!(19500), Decimal::ZERO),
            Err(PropvestError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_cash_on_cash() {
        let coc = cash_on_cash(dec!(24000), dec!(16000), dec!(100000)).unwrap();
        assert_eq!(coc, dec!(0.08));
        assert!(cash_on_cash(dec!(24000), dec!(16000), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_dscr_no_debt_is_a_flag() {
        assert_eq!(dscr(dec!(50000), Decimal::ZERO), DebtCoverage::NoDebt);
        assert_eq!(dscr(dec!(50000), dec!(40000)), DebtCoverage::Ratio(dec!(1.25)));
        assert!(DebtCoverage::NoDebt.ratio().is_err());
    }

    #[test]
    fn test_moic_and_roi() {
        assert_eq!(moic(dec!(180000), dec!(100000)).unwrap(), dec!(1.8));
        assert_eq!(roi(dec!(80000), dec!(100000)).unwrap(), dec!(0.8));
        assert!(moic(dec!(1), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_noi() {
        assert_eq!(noi(dec!(57000), dec!(21000)), dec!(36000));
    }
}
