use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{CashFlowProjection, PeriodResult, SaleSummary};
use crate::deal::inputs::fields::*;
use crate::deal::inputs::ResolvedInputs;
use crate::deal::templates::PropertyTemplate;
use crate::PropvestResult;

/// Buy, renovate and resell: a single period ending at the sale.
pub(crate) fn project(
    template: &PropertyTemplate,
    inputs: &ResolvedInputs,
) -> PropvestResult<CashFlowProjection> {
    let purchase_price = inputs.get(PURCHASE_PRICE)?;
    let renovation_costs = inputs.get(RENOVATION_COSTS)?;
    let after_repair_value = inputs.get(AFTER_REPAIR_VALUE)?;
    let closing_costs = inputs.get(CLOSING_COSTS)?;
    let months = inputs.get(HOLDING_MONTHS)?;
    let monthly_holding = inputs.get(MONTHLY_HOLDING_COSTS)?;
    let loan_to_cost = inputs.get(LOAN_TO_COST_RATE)?;
    let interest_rate = inputs.get(INTEREST_RATE)?;
    let points_rate = inputs.get(LOAN_POINTS_RATE)?;
    let selling_costs_rate = inputs.get(SELLING_COSTS_RATE)?;

    let hold_years = months / dec!(12);
    let project_cost = purchase_price + renovation_costs + closing_costs;
    let loan_amount = loan_to_cost * (purchase_price + renovation_costs);
    let total_cash_invested = project_cost - loan_amount;

    // --- Exit ---
    let selling_costs = after_repair_value * selling_costs_rate;
    let gross_income = after_repair_value - selling_costs;

    // --- Carry ---
    let operating_expenses =
        inputs.sum(&template.fixed_expenses)? * hold_years + monthly_holding * months;
    let noi = gross_income - operating_expenses;
    let debt_service = loan_amount * interest_rate * hold_years + loan_amount * points_rate;

    let net_profit = noi - debt_service - project_cost;

    Ok(CashFlowProjection {
        property_type: template.id.clone(),
        model: template.model,
        periods: vec![PeriodResult {
            period: 1,
            gross_potential_income: gross_income,
            vacancy_loss: Decimal::ZERO,
            gross_income,
            operating_expenses,
            noi,
            debt_service,
            net_cash_flow: net_profit,
            cumulative_cash_flow: net_profit,
        }],
        purchase_price,
        loan_amount,
        total_cash_invested,
        annual_debt_service: loan_amount * interest_rate,
        period_years: hold_years,
        sale: SaleSummary {
            sale_price: after_repair_value,
            selling_costs,
            loan_payoff: loan_amount,
            net_proceeds: gross_income - loan_amount,
        },
    })
}
