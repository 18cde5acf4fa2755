mod annual;
mod single_hold;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::deal::inputs::fields::VACANCY_RATE;
use crate::deal::inputs::DealInputs;
use crate::deal::templates::{ProjectionModel, PropertyTemplate, TemplateRegistry};
use crate::error::PropvestError;
use crate::metrics::{self, DebtCoverage, MetricBundle};
use crate::time_value::IrrConfig;
use crate::types::{with_metadata, ComputationOutput, Money, SensitivityVariable, TargetMetric, Years};
use crate::PropvestResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One projected period (a year, or the whole hold for single-hold deals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    /// 1-based
    pub period: u32,
    pub gross_potential_income: Money,
    pub vacancy_loss: Money,
    /// Effective gross income
    pub gross_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
}

/// Exit at the end of the hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub sale_price: Money,
    pub selling_costs: Money,
    pub loan_payoff: Money,
    pub net_proceeds: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowProjection {
    pub property_type: String,
    pub model: ProjectionModel,
    pub periods: Vec<PeriodResult>,
    pub purchase_price: Money,
    pub loan_amount: Money,
    pub total_cash_invested: Money,
    pub annual_debt_service: Money,
    /// Length of one period in years
    pub period_years: Years,
    pub sale: SaleSummary,
}

impl CashFlowProjection {
    pub fn first_period(&self) -> PropvestResult<&PeriodResult> {
        self.periods
            .first()
            .ok_or_else(|| PropvestError::InvalidParameter {
                field: "holding_period_years".into(),
                reason: "projection produced no periods".into(),
            })
    }

    /// Equity cash flows: the initial investment, then every period's
    /// distribution with the exit folded into the last one.
    pub fn equity_cash_flows(&self) -> Vec<Money> {
        let mut flows = Vec::with_capacity(self.periods.len() + 1);
        flows.push(-self.total_cash_invested);
        match self.model {
            ProjectionModel::AnnualIncome => {
                flows.extend(self.periods.iter().map(|p| p.net_cash_flow));
                if let Some(last) = flows.last_mut() {
                    *last += self.sale.net_proceeds;
                }
            }
            ProjectionModel::SingleHold => {
                let profit: Money = self.periods.iter().map(|p| p.net_cash_flow).sum();
                flows.push(self.total_cash_invested + profit);
            }
        }
        flows
    }

    pub fn total_distributions(&self) -> Money {
        self.equity_cash_flows().iter().skip(1).copied().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealAnalysis {
    pub projection: CashFlowProjection,
    pub metrics: MetricBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionRequest {
    pub property_type: String,
    pub inputs: DealInputs,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Projects deals against an immutable template registry.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a> {
    templates: &'a TemplateRegistry,
    irr: IrrConfig,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(templates: &'a TemplateRegistry) -> Self {
        Self {
            templates,
            irr: IrrConfig::default(),
        }
    }

    pub fn with_irr_config(mut self, irr: IrrConfig) -> Self {
        self.irr = irr;
        self
    }

    pub fn irr_config(&self) -> &IrrConfig {
        &self.irr
    }

    pub fn templates(&self) -> &'a TemplateRegistry {
        self.templates
    }

    pub fn template(&self, property_type: &str) -> PropvestResult<&'a PropertyTemplate> {
        self.templates.get(property_type)
    }

    pub fn project(&self, property_type: &str, inputs: &DealInputs) -> PropvestResult<CashFlowProjection> {
        self.project_with(self.template(property_type)?, inputs)
    }

    pub fn project_with(
        &self,
        template: &PropertyTemplate,
        inputs: &DealInputs,
    ) -> PropvestResult<CashFlowProjection> {
        let resolved = template.resolve(inputs)?;
        match template.model {
            ProjectionModel::AnnualIncome => annual::project(template, &resolved),
            ProjectionModel::SingleHold => single_hold::project(template, &resolved),
        }
    }

    /// Projection plus every metric the template supports.
    pub fn analyze(&self, property_type: &str, inputs: &DealInputs) -> PropvestResult<DealAnalysis> {
        let template = self.template(property_type)?;
        let projection = self.project_with(template, inputs)?;
        let metrics = metrics::bundle(&projection, &template.metrics, &self.irr)?;
        Ok(DealAnalysis { projection, metrics })
    }

    /// One metric for one assumption set.
    pub fn evaluate(
        &self,
        property_type: &str,
        inputs: &DealInputs,
        metric: TargetMetric,
    ) -> PropvestResult<Decimal> {
        let template = self.template(property_type)?;
        check_metric(template, metric)?;
        let projection = self.project_with(template, inputs)?;
        metrics::metric_value(&projection, metric, &self.irr)
    }
}

/// Reject metrics the template does not produce.
pub fn check_metric(template: &PropertyTemplate, metric: TargetMetric) -> PropvestResult<()> {
    if template.supports(metric) {
        Ok(())
    } else {
        Err(PropvestError::InvalidParameter {
            field: "metric".into(),
            reason: format!("'{metric}' is not supported for '{}'", template.id),
        })
    }
}

/// A sweep variable must name a template field and stay inside its domain.
pub fn check_variable(template: &PropertyTemplate, variable: &SensitivityVariable) -> PropvestResult<()> {
    let field = format!("variable:{}", variable.name);
    let spec = template
        .field(&variable.name)
        .ok_or_else(|| PropvestError::InvalidParameter {
            field: field.clone(),
            reason: format!("not an input of '{}'", template.id),
        })?;
    variable.validate()?;
    for bound in [variable.min, variable.max] {
        spec.constraint
            .check(bound)
            .map_err(|reason| PropvestError::InvalidParameter {
                field: field.clone(),
                reason,
            })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Project a deal and compute its metric bundle.
pub fn project_deal(
    engine: &ProjectionEngine,
    request: &ProjectionRequest,
) -> PropvestResult<ComputationOutput<DealAnalysis>> {
    let start = Instant::now();
    let template = engine.template(&request.property_type)?;
    let analysis = engine.analyze(&request.property_type, &request.inputs)?;
    let warnings = deal_warnings(template, &request.inputs, &analysis)?;

    let methodology = match template.model {
        ProjectionModel::AnnualIncome => "Annual cash-flow projection with reversion at exit",
        ProjectionModel::SingleHold => "Single-hold acquisition, renovation and resale",
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, request, warnings, elapsed, analysis))
}

fn deal_warnings(
    template: &PropertyTemplate,
    inputs: &DealInputs,
    analysis: &DealAnalysis,
) -> PropvestResult<Vec<String>> {
    let mut warnings = Vec::new();
    let projection = &analysis.projection;

    if template.model == ProjectionModel::AnnualIncome {
        let first = projection.first_period()?;
        if let DebtCoverage::Ratio(dscr) = metrics::dscr(first.noi, first.debt_service) {
            if dscr < dec!(1.2) {
                warnings.push(format!("DSCR of {dscr:.2} is below 1.20x: lender covenant risk"));
            }
        }
        if first.net_cash_flow < Decimal::ZERO {
            warnings.push(format!(
                "Year-one cash flow is negative ({:.2})",
                first.net_cash_flow
            ));
        }
        let vacancy = template.resolve(inputs)?.get(VACANCY_RATE)?;
        let norm = template
            .field(VACANCY_RATE)
            .and_then(|f| f.default)
            .unwrap_or(Decimal::ZERO)
            .max(dec!(0.15));
        if vacancy > norm {
            warnings.push(format!(
                "Vacancy rate {:.1}% exceeds {:.0}%: above typical market norms",
                vacancy * dec!(100),
                norm * dec!(100)
            ));
        }
    }

    if let Some(reason) = &analysis.metrics.irr_error {
        warnings.push(format!("IRR not reported: {reason}"));
    }

    if !projection.purchase_price.is_zero() {
        let ltv = projection.loan_amount / projection.purchase_price;
        if ltv > dec!(0.80) {
            warnings.push(format!("LTV of {:.1}% exceeds 80%: high leverage", ltv * dec!(100)));
        }
    }

    Ok(warnings)
}
