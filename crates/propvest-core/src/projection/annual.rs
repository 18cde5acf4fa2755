use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use super::{CashFlowProjection, PeriodResult, SaleSummary};
use crate::deal::inputs::fields::*;
use crate::deal::inputs::{horizon_periods, ResolvedInputs};
use crate::deal::templates::{PropertyTemplate, Stabilization};
use crate::error::PropvestError;
use crate::time_value::{loan_balance, monthly_payment};
use crate::PropvestResult;

/// Multi-period rental projection with a reversion at the end of the hold.
pub(crate) fn project(
    template: &PropertyTemplate,
    inputs: &ResolvedInputs,
) -> PropvestResult<CashFlowProjection> {
    let income = template
        .income
        .as_ref()
        .ok_or_else(|| PropvestError::InvalidParameter {
            field: format!("template:{}", template.id),
            reason: "annual income templates need an income formula".into(),
        })?;

    let purchase_price = inputs.get(PURCHASE_PRICE)?;
    let closing_costs = inputs.get(CLOSING_COSTS)?;
    let renovation_costs = inputs.get(RENOVATION_COSTS)?;
    let down_payment_rate = inputs.get(DOWN_PAYMENT_RATE)?;
    let interest_rate = inputs.get(INTEREST_RATE)?;
    let vacancy_rate = inputs.get(VACANCY_RATE)?;
    let rent_growth = inputs.get(RENT_GROWTH_RATE)?;
    let expense_growth = inputs.get(EXPENSE_GROWTH_RATE)?;
    let appreciation = inputs.get(APPRECIATION_RATE)?;
    let selling_costs_rate = inputs.get(SELLING_COSTS_RATE)?;
    let hold = horizon_periods(inputs.get(HOLDING_PERIOD_YEARS)?);
    let term = horizon_periods(inputs.get(LOAN_TERM_YEARS)?);

    // --- Financing ---
    let loan_amount = purchase_price * (Decimal::ONE - down_payment_rate);
    let term_months = term * 12;
    let annual_debt_service = monthly_payment(loan_amount, interest_rate, term_months)?
        .checked_mul(Decimal::from(12))
        .ok_or_else(|| overflow("annual debt service"))?;
    let total_cash_invested = purchase_price * down_payment_rate + closing_costs + renovation_costs;

    // --- Year-one operating figures ---
    let mut gross_potential = inputs.product(&income.factors)? * income.annualization;
    let mut other_income = inputs.get(OTHER_INCOME)?;
    let mut fixed_expenses = inputs.sum(&template.fixed_expenses)?;
    let egi_expense_rate = inputs.sum(&template.egi_expenses)?;
    let ramp = template.stabilization.clone().unwrap_or(Stabilization {
        periods: 0,
        vacancy_premium: Decimal::ZERO,
    });

    let mut periods = Vec::with_capacity(hold as usize);
    let mut cumulative = Decimal::ZERO;
    let mut exit_noi = Decimal::ZERO;

    // One period past the hold is projected for the exit NOI.
    for period in 1..=hold + 1 {
        if period > 1 {
            let growth = rent_growth * ramp.growth_ramp(period);
            gross_potential *= Decimal::ONE + growth;
            other_income *= Decimal::ONE + growth;
            fixed_expenses *= Decimal::ONE + expense_growth;
        }

        let vacancy = (vacancy_rate + ramp.vacancy_premium_for(period)).min(Decimal::ONE);
        let vacancy_loss = gross_potential * vacancy;
        let gross_income = gross_potential - vacancy_loss + other_income;
        let operating_expenses = fixed_expenses + gross_income * egi_expense_rate;
        let noi = gross_income - operating_expenses;

        if period > hold {
            exit_noi = noi;
            break;
        }

        let debt_service = if period <= term {
            annual_debt_service
        } else {
            Decimal::ZERO
        };
        let net_cash_flow = noi - debt_service;
        cumulative += net_cash_flow;

        periods.push(PeriodResult {
            period,
            gross_potential_income: gross_potential,
            vacancy_loss,
            gross_income,
            operating_expenses,
            noi,
            debt_service,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
        });
    }

    // --- Reversion ---
    let sale_price = match inputs.optional(EXIT_CAP_RATE) {
        Some(exit_cap) => exit_noi / exit_cap,
        None => (Decimal::ONE + appreciation)
            .checked_powi(hold as i64)
            .and_then(|growth| purchase_price.checked_mul(growth))
            .ok_or_else(|| overflow("appreciated sale price"))?,
    };
    let selling_costs = sale_price * selling_costs_rate;
    let loan_payoff = loan_balance(loan_amount, interest_rate, term_months, (hold * 12).min(term_months))?;

    Ok(CashFlowProjection {
        property_type: template.id.clone(),
        model: template.model,
        periods,
        purchase_price,
        loan_amount,
        total_cash_invested,
        annual_debt_service,
        period_years: Decimal::ONE,
        sale: SaleSummary {
            sale_price,
            selling_costs,
            loan_payoff,
            net_proceeds: sale_price - selling_costs - loan_payoff,
        },
    })
}

fn overflow(what: &str) -> PropvestError {
    PropvestError::InvalidParameter {
        field: "inputs".into(),
        reason: format!("{what} overflows the decimal range"),
    }
}
