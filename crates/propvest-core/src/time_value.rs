use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::PropvestError;
use crate::types::{Money, Rate};
use crate::PropvestResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Root-finding parameters for IRR.
#[derive(Debug, Clone, Copy)]
pub struct IrrConfig {
    /// Newton-Raphson starting rate
    pub guess: Rate,
    /// Converged once |NPV| falls below this
    pub tolerance: Decimal,
    /// Iteration cap applied to each of Newton-Raphson and bisection
    pub max_iterations: u32,
    /// Bisection bracket
    pub lower_bound: Rate,
    pub upper_bound: Rate,
}

impl Default for IrrConfig {
    fn default() -> Self {
        Self {
            guess: dec!(0.10),
            tolerance: CONVERGENCE_THRESHOLD,
            max_iterations: MAX_IRR_ITERATIONS,
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10.0),
        }
    }
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
///
/// Returns `None` when a discount factor overflows the decimal range, which
/// happens for rates close to -100% over long horizons.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let step = Decimal::ONE.checked_div(one_plus_r)?;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        npv = npv.checked_add(cf.checked_mul(discount)?)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as i64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_mul(step)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_mul(step)?;
    }

    Some((npv, dnpv))
}

/// Net Present Value of a series of cash flows (index 0 undiscounted).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> PropvestResult<Money> {
    if rate <= dec!(-1) {
        return Err(PropvestError::InvalidParameter {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| PropvestError::InvalidParameter {
            field: "rate".into(),
            reason: format!("Discount factor overflows at rate {rate}"),
        })
}

/// Internal Rate of Return.
///
/// Newton-Raphson from `config.guess`; if that fails to converge the bracket
/// `[lower_bound, upper_bound]` is bisected. Non-convergence is an error, never
/// a default rate.
pub fn irr(cash_flows: &[Money], config: &IrrConfig) -> PropvestResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(PropvestError::InvalidParameter {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    if !has_positive || !has_negative {
        return Err(PropvestError::DidNotConverge {
            function: "IRR (cash flows never change sign)".into(),
            iterations: 0,
            last_delta: cash_flows.iter().copied().sum(),
        });
    }

    match newton_raphson(cash_flows, config) {
        Ok(rate) => Ok(rate),
        Err(e) => {
            log::debug!("IRR Newton-Raphson failed ({e}); falling back to bisection");
            bisection(cash_flows, config)
        }
    }
}

/// Newton-Raphson search for the NPV root.
pub fn newton_raphson(cash_flows: &[Money], config: &IrrConfig) -> PropvestResult<Rate> {
    let mut rate = config.guess;
    let mut last_npv = Decimal::MAX;

    for i in 0..config.max_iterations {
        let (npv_val, dnpv) = match npv_and_derivative(cash_flows, rate) {
            Some(pair) => pair,
            None => {
                return Err(PropvestError::DidNotConverge {
                    function: "IRR Newton-Raphson (discount overflow)".into(),
                    iterations: i,
                    last_delta: last_npv,
                })
            }
        };
        last_npv = npv_val;

        if npv_val.abs() < config.tolerance {
            return Ok(rate);
        }

        let step = match npv_val.checked_div(dnpv) {
            Some(s) if !dnpv.is_zero() => s,
            _ => {
                return Err(PropvestError::DidNotConverge {
                    function: "IRR Newton-Raphson (flat derivative)".into(),
                    iterations: i,
                    last_delta: npv_val,
                })
            }
        };

        rate -= step;

        // Guard against divergence
        if rate < config.lower_bound {
            rate = config.lower_bound;
        } else if rate > config.upper_bound {
            rate = config.upper_bound;
        }
    }

    Err(PropvestError::DidNotConverge {
        function: "IRR Newton-Raphson".into(),
        iterations: config.max_iterations,
        last_delta: last_npv,
    })
}

/// Sign of NPV at `rate`. When the discount factor overflows, the latest
/// non-zero cash flow dominates.
fn npv_sign(cash_flows: &[Money], rate: Rate) -> (Decimal, i8) {
    match npv_and_derivative(cash_flows, rate) {
        Some((v, _)) => (v, signum(v)),
        None => {
            let dominant = cash_flows
                .iter()
                .rev()
                .find(|cf| !cf.is_zero())
                .copied()
                .unwrap_or(Decimal::ZERO);
            (Decimal::MAX, signum(dominant))
        }
    }
}

fn signum(v: Decimal) -> i8 {
    if v.is_zero() {
        0
    } else if v.is_sign_negative() {
        -1
    } else {
        1
    }
}

/// Bisection search for the NPV root over `[lower_bound, upper_bound]`.
pub fn bisection(cash_flows: &[Money], config: &IrrConfig) -> PropvestResult<Rate> {
    let mut lo = config.lower_bound;
    let mut hi = config.upper_bound;

    let (lo_val, lo_sign) = npv_sign(cash_flows, lo);
    let (hi_val, hi_sign) = npv_sign(cash_flows, hi);

    if lo_sign == 0 || lo_val.abs() < config.tolerance {
        return Ok(lo);
    }
    if hi_sign == 0 || hi_val.abs() < config.tolerance {
        return Ok(hi);
    }
    if lo_sign == hi_sign {
        return Err(PropvestError::DidNotConverge {
            function: "IRR bisection (root not bracketed)".into(),
            iterations: 0,
            last_delta: hi_val,
        });
    }

    let mut last_delta = hi_val;
    for i in 0..config.max_iterations {
        let mid = (lo + hi) / dec!(2);
        let (mid_val, mid_sign) = npv_sign(cash_flows, mid);
        last_delta = mid_val;

        if mid_sign == 0 || mid_val.abs() < config.tolerance {
            log::debug!("IRR bisection converged after {} iterations", i + 1);
            return Ok(mid);
        }

        if mid_sign == lo_sign {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Err(PropvestError::DidNotConverge {
        function: "IRR bisection".into(),
        iterations: config.max_iterations,
        last_delta,
    })
}

/// Convert a per-period rate into an annual rate for periods of
/// `period_years` length.
pub fn annualize(periodic_rate: Rate, period_years: Decimal) -> PropvestResult<Rate> {
    if period_years == Decimal::ONE {
        return Ok(periodic_rate);
    }
    if period_years <= Decimal::ZERO {
        return Err(PropvestError::DivisionByZero {
            context: "IRR annualisation (zero-length holding period)".into(),
        });
    }
    let exponent = Decimal::ONE / period_years;
    (Decimal::ONE + periodic_rate)
        .checked_powd(exponent)
        .map(|growth| growth - Decimal::ONE)
        .ok_or_else(|| PropvestError::InvalidParameter {
            field: "irr".into(),
            reason: format!("Cannot annualise periodic rate {periodic_rate}"),
        })
}

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1)
pub fn monthly_payment(principal: Money, annual_rate: Rate, total_months: u32) -> PropvestResult<Money> {
    if principal.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if total_months == 0 {
        return Err(PropvestError::DivisionByZero {
            context: "monthly payment with zero amortisation months".into(),
        });
    }

    let monthly_rate = annual_rate / dec!(12);
    if monthly_rate.is_zero() {
        // Interest-free: straight-line amortisation
        return Ok(principal / Decimal::from(total_months));
    }

    let compound = (Decimal::ONE + monthly_rate)
        .checked_powi(total_months as i64)
        .ok_or_else(|| amortisation_overflow(annual_rate, total_months))?;
    let denominator = compound - Decimal::ONE;

    if denominator.is_zero() {
        return Err(PropvestError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    principal
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(compound))
        .and_then(|v| v.checked_div(denominator))
        .ok_or_else(|| amortisation_overflow(annual_rate, total_months))
}

/// Outstanding balance after `payments_made` monthly payments.
pub fn loan_balance(
    principal: Money,
    annual_rate: Rate,
    total_months: u32,
    payments_made: u32,
) -> PropvestResult<Money> {
    if principal.is_zero() || payments_made >= total_months {
        return Ok(Decimal::ZERO);
    }

    let monthly_rate = annual_rate / dec!(12);
    if monthly_rate.is_zero() {
        let paid = principal * Decimal::from(payments_made) / Decimal::from(total_months);
        return Ok(principal - paid);
    }

    let payment = monthly_payment(principal, annual_rate, total_months)?;
    let balance = (Decimal::ONE + monthly_rate)
        .checked_powi(payments_made as i64)
        .and_then(|growth| {
            let accrued = principal.checked_mul(growth)?;
            let repaid = payment
                .checked_mul(growth - Decimal::ONE)?
                .checked_div(monthly_rate)?;
            accrued.checked_sub(repaid)
        })
        .ok_or_else(|| amortisation_overflow(annual_rate, total_months))?;

    Ok(balance.max(Decimal::ZERO))
}

fn amortisation_overflow(annual_rate: Rate, total_months: u32) -> PropvestError {
    PropvestError::InvalidParameter {
        field: "loan".into(),
        reason: format!(
            "Amortisation at {annual_rate} over {total_months} months overflows the decimal range"
        ),
    }
}
