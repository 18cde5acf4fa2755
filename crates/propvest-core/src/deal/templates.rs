use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::inputs::fields::*;
use super::inputs::FieldConstraint::{Horizon, NonNegative, Positive, UnitInterval};
use super::inputs::{resolve, DealInputs, FieldConstraint, FieldSpec, ResolvedInputs};
use crate::error::PropvestError;
use crate::scenarios::scenario::{Adjustment, ScenarioDefinition};
use crate::scoring::benchmarks::ScoringBenchmarks;
use crate::types::{Rate, SensitivityVariable, TargetMetric};
use crate::PropvestResult;

// ---------------------------------------------------------------------------
// Template data
// ---------------------------------------------------------------------------

/// Formula family a template projects with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionModel {
    /// Multi-period rental income with an exit at the end of the hold
    AnnualIncome,
    /// Buy, renovate, sell: one end-of-hold period
    SingleHold,
}

impl ProjectionModel {
    /// Metrics this formula family can produce at all.
    pub fn capable_metrics(&self) -> &'static [TargetMetric] {
        match self {
            Self::AnnualIncome => &TargetMetric::ALL,
            Self::SingleHold => &[
                TargetMetric::NetProfit,
                TargetMetric::Roi,
                TargetMetric::Irr,
                TargetMetric::Moic,
            ],
        }
    }

    /// Fields the projection formulas read directly.
    fn core_fields(&self) -> &'static [&'static str] {
        match self {
            Self::AnnualIncome => &[
                PURCHASE_PRICE,
                CLOSING_COSTS,
                RENOVATION_COSTS,
                DOWN_PAYMENT_RATE,
                INTEREST_RATE,
                LOAN_TERM_YEARS,
                VACANCY_RATE,
                OTHER_INCOME,
                RENT_GROWTH_RATE,
                EXPENSE_GROWTH_RATE,
                APPRECIATION_RATE,
                SELLING_COSTS_RATE,
                HOLDING_PERIOD_YEARS,
            ],
            Self::SingleHold => &[
                PURCHASE_PRICE,
                RENOVATION_COSTS,
                AFTER_REPAIR_VALUE,
                CLOSING_COSTS,
                HOLDING_MONTHS,
                MONTHLY_HOLDING_COSTS,
                LOAN_TO_COST_RATE,
                INTEREST_RATE,
                LOAN_POINTS_RATE,
                SELLING_COSTS_RATE,
            ],
        }
    }
}

/// Year-one gross potential income: product of the factor fields times
/// `annualization` (12 for monthly rent, 365 for nightly rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeFormula {
    pub factors: Vec<String>,
    pub annualization: Decimal,
}

/// Lease-up ramp for newly acquired properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stabilization {
    /// Periods until rent growth reaches its full rate and the premium is gone
    pub periods: u32,
    /// Extra vacancy in period one, decaying linearly to zero
    pub vacancy_premium: Rate,
}

impl Stabilization {
    /// Share of the full rent growth rate applied in `period` (1-based).
    pub fn growth_ramp(&self, period: u32) -> Decimal {
        if self.periods == 0 {
            return Decimal::ONE;
        }
        Decimal::from(period.saturating_sub(1).min(self.periods)) / Decimal::from(self.periods)
    }

    /// Vacancy premium applied in `period` (1-based).
    pub fn vacancy_premium_for(&self, period: u32) -> Rate {
        if self.periods == 0 || period > self.periods {
            return Decimal::ZERO;
        }
        self.vacancy_premium * Decimal::from(self.periods - period + 1) / Decimal::from(self.periods)
    }
}

/// How a default sweep range is derived from the deal's own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RangeSpec {
    /// base × (1 + down) ..= base × (1 + up)
    Relative { down: Decimal, up: Decimal },
    /// base + down ..= base + up
    Delta { down: Decimal, up: Decimal },
    Absolute { min: Decimal, max: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRange {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub spec: RangeSpec,
}

impl DefaultRange {
    fn new(name: &str, label: &str, spec: RangeSpec) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            spec,
        }
    }

    /// Concrete variable around `base`, clamped into the field's domain.
    pub fn materialize(&self, base: Decimal, constraint: FieldConstraint) -> SensitivityVariable {
        let (a, b) = match &self.spec {
            RangeSpec::Relative { down, up } => {
                (base * (Decimal::ONE + down), base * (Decimal::ONE + up))
            }
            RangeSpec::Delta { down, up } => (base + down, base + up),
            RangeSpec::Absolute { min, max } => (*min, *max),
        };
        let min = constraint.clamp(a.min(b).min(base));
        let max = constraint.clamp(a.max(b).max(base));
        SensitivityVariable {
            name: self.name.clone(),
            label: self.label.clone(),
            base_value: base,
            min,
            max,
        }
    }
}

/// Data-driven description of one property type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTemplate {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub model: ProjectionModel,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<IncomeFormula>,
    /// Annual dollar expenses, grown by the expense growth rate
    #[serde(default)]
    pub fixed_expenses: Vec<String>,
    /// Expenses charged as a fraction of effective gross income
    #[serde(default)]
    pub egi_expenses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stabilization: Option<Stabilization>,
    pub metrics: Vec<TargetMetric>,
    #[serde(default)]
    pub default_ranges: Vec<DefaultRange>,
    #[serde(default)]
    pub default_scenarios: Vec<ScenarioDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringBenchmarks>,
}

impl PropertyTemplate {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn supports(&self, metric: TargetMetric) -> bool {
        self.metrics.contains(&metric)
    }

    pub fn resolve(&self, inputs: &DealInputs) -> PropvestResult<ResolvedInputs> {
        resolve(&self.fields, inputs)
    }

    /// Default sweep ranges materialised around this deal's values.
    pub fn default_variables(&self, inputs: &DealInputs) -> PropvestResult<Vec<SensitivityVariable>> {
        let resolved = self.resolve(inputs)?;
        self.default_ranges
            .iter()
            .map(|range| {
                let spec = self.field(&range.name).ok_or_else(|| self.invalid(&range.name))?;
                let base = resolved.get(&range.name)?;
                Ok(range.materialize(base, spec.constraint))
            })
            .collect()
    }

    fn invalid(&self, field: &str) -> PropvestError {
        PropvestError::InvalidParameter {
            field: format!("template:{}", self.id),
            reason: format!("'{field}' is not a declared field"),
        }
    }

    /// Structural checks run once when a registry is built.
    pub fn validate(&self) -> PropvestResult<()> {
        let fail = |reason: String| PropvestError::InvalidParameter {
            field: format!("template:{}", self.id),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(fail("template id must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(fail(format!("field '{}' declared twice", spec.name)));
            }
            if let Some(default) = spec.default {
                spec.check(default)?;
            }
        }

        let usable = |name: &str| {
            self.field(name)
                .map(|f| f.required || f.default.is_some())
                .unwrap_or(false)
        };

        for name in self.model.core_fields() {
            if !usable(name) {
                return Err(fail(format!(
                    "'{name}' must be declared as required or with a default"
                )));
            }
        }

        if self.model == ProjectionModel::AnnualIncome {
            let income = self
                .income
                .as_ref()
                .ok_or_else(|| fail("annual income templates need an income formula".into()))?;
            if income.factors.is_empty() {
                return Err(fail("income formula has no factors".into()));
            }
            for factor in &income.factors {
                if !usable(factor) {
                    return Err(fail(format!("income factor '{factor}' has no value source")));
                }
            }
            if self.field(EXIT_CAP_RATE).is_none() {
                return Err(fail(format!("'{EXIT_CAP_RATE}' must be declared")));
            }
        }

        for name in self.fixed_expenses.iter().chain(&self.egi_expenses) {
            if !usable(name) {
                return Err(fail(format!("expense '{name}' has no value source")));
            }
        }

        for range in &self.default_ranges {
            if !usable(&range.name) {
                return Err(fail(format!("default range '{}' has no value source", range.name)));
            }
        }

        for scenario in &self.default_scenarios {
            for adjustment in &scenario.adjustments {
                if self.field(adjustment.variable()).is_none() {
                    return Err(self.invalid(adjustment.variable()));
                }
            }
        }

        if self.metrics.is_empty() {
            return Err(fail("at least one metric must be supported".into()));
        }
        if let Some(m) = self
            .metrics
            .iter()
            .find(|m| !self.model.capable_metrics().contains(m))
        {
            return Err(fail(format!("metric '{m}' is not available for this model")));
        }

        if let Some(scoring) = &self.scoring {
            scoring.validate().map_err(fail)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable set of property templates keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PropertyTemplate>,
}

impl TemplateRegistry {
    /// Built-in property types.
    pub fn standard() -> Self {
        let templates = [
            single_family(),
            multifamily(),
            commercial(),
            short_term_rental(),
            fix_and_flip(),
        ];
        Self {
            templates: templates.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn from_templates(templates: Vec<PropertyTemplate>) -> PropvestResult<Self> {
        Self::default().merged_with(templates)
    }

    /// Copy of this registry with `overrides` added, replacing same-id entries.
    pub fn merged_with(&self, overrides: Vec<PropertyTemplate>) -> PropvestResult<Self> {
        let mut templates = self.templates.clone();
        for template in overrides {
            template.validate()?;
            log::debug!("registering template '{}'", template.id);
            templates.insert(template.id.clone(), template);
        }
        Ok(Self { templates })
    }

    pub fn get(&self, id: &str) -> PropvestResult<&PropertyTemplate> {
        self.templates
            .get(id)
            .ok_or_else(|| PropvestError::InvalidTemplate(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Built-in templates
// ---------------------------------------------------------------------------

fn growth() -> FieldConstraint {
    FieldConstraint::Range {
        min: dec!(-0.5),
        max: dec!(0.5),
    }
}

fn interest() -> FieldConstraint {
    FieldConstraint::Range {
        min: Decimal::ZERO,
        max: Decimal::ONE,
    }
}

fn opt(name: &str, label: &str, default: Decimal, constraint: FieldConstraint) -> FieldSpec {
    FieldSpec::optional(name, label, Some(default), constraint)
}

/// Field list shared by the rental templates, in declaration order:
/// price, income, financing, operations, expenses, growth and exit.
fn rental_fields(
    income: Vec<FieldSpec>,
    expenses: Vec<FieldSpec>,
    vacancy: Decimal,
    holding_years: Decimal,
) -> Vec<FieldSpec> {
    let mut fields = vec![FieldSpec::required(PURCHASE_PRICE, "Purchase price", NonNegative)];
    fields.extend(income);
    fields.extend([
        opt(CLOSING_COSTS, "Closing costs", Decimal::ZERO, NonNegative),
        opt(RENOVATION_COSTS, "Renovation costs", Decimal::ZERO, NonNegative),
        opt(DOWN_PAYMENT_RATE, "Down payment", dec!(0.25), UnitInterval),
        opt(INTEREST_RATE, "Interest rate", dec!(0.07), interest()),
        opt(LOAN_TERM_YEARS, "Loan term (years)", dec!(30), Horizon),
        opt(VACANCY_RATE, "Vacancy rate", vacancy, UnitInterval),
        opt(OTHER_INCOME, "Other income (annual)", Decimal::ZERO, NonNegative),
    ]);
    fields.extend(expenses);
    fields.extend([
        opt(RENT_GROWTH_RATE, "Rent growth", dec!(0.03), growth()),
        opt(EXPENSE_GROWTH_RATE, "Expense growth", dec!(0.02), growth()),
        opt(APPRECIATION_RATE, "Appreciation", dec!(0.03), growth()),
        FieldSpec::optional(EXIT_CAP_RATE, "Exit cap rate", None, Positive),
        opt(SELLING_COSTS_RATE, "Selling costs", dec!(0.06), UnitInterval),
        opt(HOLDING_PERIOD_YEARS, "Holding period (years)", holding_years, Horizon),
    ]);
    fields
}

fn rental_ranges(rent_field: &str, rent_label: &str) -> Vec<DefaultRange> {
    vec![
        DefaultRange::new(
            rent_field,
            rent_label,
            RangeSpec::Relative { down: dec!(-0.10), up: dec!(0.10) },
        ),
        DefaultRange::new(
            VACANCY_RATE,
            "Vacancy rate",
            RangeSpec::Delta { down: dec!(-0.03), up: dec!(0.07) },
        ),
        DefaultRange::new(
            INTEREST_RATE,
            "Interest rate",
            RangeSpec::Delta { down: dec!(-0.01), up: dec!(0.015) },
        ),
        DefaultRange::new(
            PURCHASE_PRICE,
            "Purchase price",
            RangeSpec::Relative { down: dec!(-0.10), up: dec!(0.10) },
        ),
        DefaultRange::new(
            EXPENSE_GROWTH_RATE,
            "Expense growth",
            RangeSpec::Delta { down: dec!(-0.01), up: dec!(0.02) },
        ),
        DefaultRange::new(
            APPRECIATION_RATE,
            "Appreciation",
            RangeSpec::Delta { down: dec!(-0.03), up: dec!(0.02) },
        ),
    ]
}

fn scenario(
    name: &str,
    description: &str,
    probability: Option<Decimal>,
    adjustments: Vec<Adjustment>,
) -> ScenarioDefinition {
    ScenarioDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        probability,
        adjustments,
    }
}

fn rental_scenarios(rent_field: &str) -> Vec<ScenarioDefinition> {
    vec![
        scenario(
            "Optimistic",
            "Stronger rents, tighter vacancy and faster rent growth",
            Some(dec!(0.20)),
            vec![
                Adjustment::multiply(rent_field, dec!(1.05)),
                Adjustment::multiply(VACANCY_RATE, dec!(0.8)),
                Adjustment::add(RENT_GROWTH_RATE, dec!(0.01)),
            ],
        ),
        scenario("Base Case", "Assumptions as entered", Some(dec!(0.50)), vec![]),
        scenario(
            "Conservative",
            "Softer rents, looser vacancy and higher costs",
            Some(dec!(0.20)),
            vec![
                Adjustment::multiply(rent_field, dec!(0.95)),
                Adjustment::multiply(VACANCY_RATE, dec!(1.25)),
                Adjustment::add(EXPENSE_GROWTH_RATE, dec!(0.01)),
                Adjustment::add(INTEREST_RATE, dec!(0.005)),
            ],
        ),
        scenario(
            "Stress Test",
            "Rent shock with a vacancy spike and a rate hike",
            Some(dec!(0.10)),
            vec![
                Adjustment::multiply(rent_field, dec!(0.85)),
                Adjustment::add(VACANCY_RATE, dec!(0.10)),
                Adjustment::add(INTEREST_RATE, dec!(0.02)),
                Adjustment::add(EXPENSE_GROWTH_RATE, dec!(0.02)),
            ],
        ),
    ]
}

fn rental_metrics() -> Vec<TargetMetric> {
    TargetMetric::ALL.to_vec()
}

fn single_family() -> PropertyTemplate {
    PropertyTemplate {
        id: "single_family".into(),
        label: "Single-family rental".into(),
        model: ProjectionModel::AnnualIncome,
        fields: rental_fields(
            vec![FieldSpec::required(MONTHLY_RENT, "Monthly rent", NonNegative)],
            vec![
                opt(PROPERTY_TAXES, "Property taxes (annual)", Decimal::ZERO, NonNegative),
                opt(INSURANCE, "Insurance (annual)", Decimal::ZERO, NonNegative),
                opt(HOA_FEES, "HOA fees (annual)", Decimal::ZERO, NonNegative),
                opt(MAINTENANCE_RATE, "Maintenance", dec!(0.05), UnitInterval),
                opt(MANAGEMENT_FEE_RATE, "Management fee", dec!(0.08), UnitInterval),
                opt(CAPEX_RESERVE_RATE, "CapEx reserve", dec!(0.05), UnitInterval),
            ],
            dec!(0.05),
            dec!(10),
        ),
        income: Some(IncomeFormula {
            factors: vec![MONTHLY_RENT.into()],
            annualization: dec!(12),
        }),
        fixed_expenses: vec![PROPERTY_TAXES.into(), INSURANCE.into(), HOA_FEES.into()],
        egi_expenses: vec![
            MAINTENANCE_RATE.into(),
            MANAGEMENT_FEE_RATE.into(),
            CAPEX_RESERVE_RATE.into(),
        ],
        stabilization: None,
        metrics: rental_metrics(),
        default_ranges: rental_ranges(MONTHLY_RENT, "Monthly rent"),
        default_scenarios: rental_scenarios(MONTHLY_RENT),
        scoring: Some(ScoringBenchmarks::new(dec!(0.06), dec!(0.08), dec!(1.25))),
    }
}

fn multifamily() -> PropertyTemplate {
    PropertyTemplate {
        id: "multifamily".into(),
        label: "Multifamily".into(),
        model: ProjectionModel::AnnualIncome,
        fields: rental_fields(
            vec![
                FieldSpec::required(UNITS, "Units", NonNegative),
                FieldSpec::required(MONTHLY_RENT_PER_UNIT, "Monthly rent per unit", NonNegative),
            ],
            vec![
                opt(PROPERTY_TAXES, "Property taxes (annual)", Decimal::ZERO, NonNegative),
                opt(INSURANCE, "Insurance (annual)", Decimal::ZERO, NonNegative),
                opt(UTILITIES, "Utilities (annual)", Decimal::ZERO, NonNegative),
                opt(MAINTENANCE_RATE, "Maintenance", dec!(0.05), UnitInterval),
                opt(MANAGEMENT_FEE_RATE, "Management fee", dec!(0.06), UnitInterval),
                opt(CAPEX_RESERVE_RATE, "CapEx reserve", dec!(0.04), UnitInterval),
            ],
            dec!(0.05),
            dec!(10),
        ),
        income: Some(IncomeFormula {
            factors: vec![UNITS.into(), MONTHLY_RENT_PER_UNIT.into()],
            annualization: dec!(12),
        }),
        fixed_expenses: vec![PROPERTY_TAXES.into(), INSURANCE.into(), UTILITIES.into()],
        egi_expenses: vec![
            MAINTENANCE_RATE.into(),
            MANAGEMENT_FEE_RATE.into(),
            CAPEX_RESERVE_RATE.into(),
        ],
        stabilization: Some(Stabilization {
            periods: 2,
            vacancy_premium: dec!(0.05),
        }),
        metrics: rental_metrics(),
        default_ranges: rental_ranges(MONTHLY_RENT_PER_UNIT, "Rent per unit"),
        default_scenarios: rental_scenarios(MONTHLY_RENT_PER_UNIT),
        scoring: Some(ScoringBenchmarks::new(dec!(0.065), dec!(0.08), dec!(1.25))),
    }
}

fn commercial() -> PropertyTemplate {
    PropertyTemplate {
        id: "commercial".into(),
        label: "Commercial".into(),
        model: ProjectionModel::AnnualIncome,
        fields: rental_fields(
            vec![
                FieldSpec::required(RENTABLE_SQFT, "Rentable square feet", NonNegative),
                FieldSpec::required(ANNUAL_RENT_PER_SQFT, "Annual rent per sq ft", NonNegative),
            ],
            vec![
                opt(PROPERTY_TAXES, "Property taxes (annual)", Decimal::ZERO, NonNegative),
                opt(INSURANCE, "Insurance (annual)", Decimal::ZERO, NonNegative),
                opt(UTILITIES, "Utilities (annual)", Decimal::ZERO, NonNegative),
                opt(MAINTENANCE_RATE, "Maintenance", dec!(0.03), UnitInterval),
                opt(MANAGEMENT_FEE_RATE, "Management fee", dec!(0.04), UnitInterval),
                opt(CAPEX_RESERVE_RATE, "CapEx reserve", dec!(0.03), UnitInterval),
            ],
            dec!(0.08),
            dec!(10),
        ),
        income: Some(IncomeFormula {
            factors: vec![RENTABLE_SQFT.into(), ANNUAL_RENT_PER_SQFT.into()],
            annualization: Decimal::ONE,
        }),
        fixed_expenses: vec![PROPERTY_TAXES.into(), INSURANCE.into(), UTILITIES.into()],
        egi_expenses: vec![
            MAINTENANCE_RATE.into(),
            MANAGEMENT_FEE_RATE.into(),
            CAPEX_RESERVE_RATE.into(),
        ],
        stabilization: None,
        metrics: rental_metrics(),
        default_ranges: rental_ranges(ANNUAL_RENT_PER_SQFT, "Rent per sq ft"),
        default_scenarios: rental_scenarios(ANNUAL_RENT_PER_SQFT),
        scoring: Some(
            ScoringBenchmarks::new(dec!(0.075), dec!(0.09), dec!(1.35)).with_weak_dscr(dec!(1.25)),
        ),
    }
}

fn short_term_rental() -> PropertyTemplate {
    PropertyTemplate {
        id: "short_term_rental".into(),
        label: "Short-term rental".into(),
        model: ProjectionModel::AnnualIncome,
        fields: rental_fields(
            vec![FieldSpec::required(NIGHTLY_RATE, "Average nightly rate", NonNegative)],
            vec![
                opt(PROPERTY_TAXES, "Property taxes (annual)", Decimal::ZERO, NonNegative),
                opt(INSURANCE, "Insurance (annual)", Decimal::ZERO, NonNegative),
                opt(UTILITIES, "Utilities (annual)", Decimal::ZERO, NonNegative),
                opt(MAINTENANCE_RATE, "Maintenance", dec!(0.05), UnitInterval),
                opt(MANAGEMENT_FEE_RATE, "Management fee", dec!(0.20), UnitInterval),
                opt(PLATFORM_FEE_RATE, "Platform fee", dec!(0.03), UnitInterval),
                opt(CAPEX_RESERVE_RATE, "CapEx reserve", dec!(0.05), UnitInterval),
            ],
            dec!(0.35),
            dec!(10),
        ),
        income: Some(IncomeFormula {
            factors: vec![NIGHTLY_RATE.into()],
            annualization: dec!(365),
        }),
        fixed_expenses: vec![PROPERTY_TAXES.into(), INSURANCE.into(), UTILITIES.into()],
        egi_expenses: vec![
            MAINTENANCE_RATE.into(),
            MANAGEMENT_FEE_RATE.into(),
            PLATFORM_FEE_RATE.into(),
            CAPEX_RESERVE_RATE.into(),
        ],
        stabilization: None,
        metrics: rental_metrics(),
        default_ranges: rental_ranges(NIGHTLY_RATE, "Nightly rate"),
        default_scenarios: rental_scenarios(NIGHTLY_RATE),
        scoring: Some(
            ScoringBenchmarks::new(dec!(0.08), dec!(0.12), dec!(1.30))
                .with_vacancy_bands(dec!(0.30), dec!(0.45)),
        ),
    }
}

fn fix_and_flip() -> PropertyTemplate {
    PropertyTemplate {
        id: "fix_and_flip".into(),
        label: "Fix and flip".into(),
        model: ProjectionModel::SingleHold,
        fields: vec![
            FieldSpec::required(PURCHASE_PRICE, "Purchase price", NonNegative),
            FieldSpec::required(RENOVATION_COSTS, "Renovation budget", NonNegative),
            FieldSpec::required(AFTER_REPAIR_VALUE, "After-repair value", NonNegative),
            opt(CLOSING_COSTS, "Closing costs", Decimal::ZERO, NonNegative),
            opt(HOLDING_MONTHS, "Holding period (months)", dec!(6), Positive),
            opt(MONTHLY_HOLDING_COSTS, "Monthly holding costs", Decimal::ZERO, NonNegative),
            opt(PROPERTY_TAXES, "Property taxes (annual)", Decimal::ZERO, NonNegative),
            opt(INSURANCE, "Insurance (annual)", Decimal::ZERO, NonNegative),
            opt(LOAN_TO_COST_RATE, "Loan to cost", dec!(0.75), UnitInterval),
            opt(INTEREST_RATE, "Interest rate", dec!(0.10), interest()),
            opt(LOAN_POINTS_RATE, "Loan points", dec!(0.02), UnitInterval),
            opt(SELLING_COSTS_RATE, "Selling costs", dec!(0.08), UnitInterval),
        ],
        income: None,
        fixed_expenses: vec![PROPERTY_TAXES.into(), INSURANCE.into()],
        egi_expenses: vec![],
        stabilization: None,
        metrics: ProjectionModel::SingleHold.capable_metrics().to_vec(),
        default_ranges: vec![
            DefaultRange::new(
                AFTER_REPAIR_VALUE,
                "After-repair value",
                RangeSpec::Relative { down: dec!(-0.10), up: dec!(0.10) },
            ),
            DefaultRange::new(
                RENOVATION_COSTS,
                "Renovation budget",
                RangeSpec::Relative { down: dec!(-0.10), up: dec!(0.30) },
            ),
            DefaultRange::new(
                PURCHASE_PRICE,
                "Purchase price",
                RangeSpec::Relative { down: dec!(-0.05), up: dec!(0.05) },
            ),
            DefaultRange::new(
                HOLDING_MONTHS,
                "Holding period (months)",
                RangeSpec::Delta { down: dec!(-2), up: dec!(4) },
            ),
        ],
        default_scenarios: vec![
            scenario("Base Case", "Assumptions as entered", None, vec![]),
            scenario(
                "Over Budget",
                "Renovation runs 20% over",
                None,
                vec![Adjustment::multiply(RENOVATION_COSTS, dec!(1.2))],
            ),
            scenario(
                "Slow Sale",
                "Three extra months on market",
                None,
                vec![Adjustment::add(HOLDING_MONTHS, dec!(3))],
            ),
            scenario(
                "Soft Market",
                "Resale comes in 7% under plan",
                None,
                vec![Adjustment::multiply(AFTER_REPAIR_VALUE, dec!(0.93))],
            ),
        ],
        scoring: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_templates_validate() {
        let registry = TemplateRegistry::standard();
        assert_eq!(registry.len(), 5);
        for template in registry.iter() {
            template.validate().unwrap();
        }
    }

    #[test]
    fn test_unknown_template() {
        let registry = TemplateRegistry::standard();
        match registry.get("castle") {
            Err(PropvestError::InvalidTemplate(id)) => assert_eq!(id, "castle"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_stabilization_ramp() {
        let s = Stabilization {
            periods: 2,
            vacancy_premium: dec!(0.05),
        };
        assert_eq!(s.growth_ramp(1), Decimal::ZERO);
        assert_eq!(s.growth_ramp(2), dec!(0.5));
        assert_eq!(s.growth_ramp(3), Decimal::ONE);
        assert_eq!(s.vacancy_premium_for(1), dec!(0.05));
        assert_eq!(s.vacancy_premium_for(2), dec!(0.025));
        assert_eq!(s.vacancy_premium_for(3), Decimal::ZERO);
    }

    #[test]
    fn test_relative_range_clamped_into_unit_interval() {
        let range = DefaultRange::new(
            VACANCY_RATE,
            "Vacancy",
            RangeSpec::Delta { down: dec!(-0.03), up: dec!(0.07) },
        );
        let var = range.materialize(dec!(0.02), UnitInterval);
        assert_eq!(var.min, Decimal::ZERO);
        assert_eq!(var.max, dec!(0.09));
        assert!(var.validate().is_ok());
    }

    #[test]
    fn test_merge_replaces_same_id() {
        let standard = TemplateRegistry::standard();
        let mut custom = standard.get("single_family").unwrap().clone();
        custom.label = "Austin SFR".into();
        let merged = standard.merged_with(vec![custom]).unwrap();
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.get("single_family").unwrap().label, "Austin SFR");
        assert_eq!(standard.get("single_family").unwrap().label, "Single-family rental");
    }

    #[test]
    fn test_template_with_undeclared_income_factor_rejected() {
        let mut broken = TemplateRegistry::standard()
            .get("single_family")
            .unwrap()
            .clone();
        broken.id = "broken".into();
        broken.income = Some(IncomeFormula {
            factors: vec!["weekly_rent".into()],
            annualization: dec!(52),
        });
        assert!(TemplateRegistry::from_templates(vec![broken]).is_err());
    }

    #[test]
    fn test_templates_survive_json() {
        let registry = TemplateRegistry::standard();
        let json = serde_json::to_string(&registry).unwrap();
        let back: TemplateRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
    }
}
