use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PropvestError;
use crate::PropvestResult;

/// Longest projection horizon (and loan term) accepted, in years.
pub const MAX_HORIZON_YEARS: u32 = 50;

/// Field names shared by the projection formulas.
pub mod fields {
    pub const PURCHASE_PRICE: &str = "purchase_price";
    pub const CLOSING_COSTS: &str = "closing_costs";
    pub const RENOVATION_COSTS: &str = "renovation_costs";
    pub const DOWN_PAYMENT_RATE: &str = "down_payment_rate";
    pub const INTEREST_RATE: &str = "interest_rate";
    pub const LOAN_TERM_YEARS: &str = "loan_term_years";
    pub const VACANCY_RATE: &str = "vacancy_rate";
    pub const OTHER_INCOME: &str = "other_income";
    pub const RENT_GROWTH_RATE: &str = "rent_growth_rate";
    pub const EXPENSE_GROWTH_RATE: &str = "expense_growth_rate";
    pub const APPRECIATION_RATE: &str = "appreciation_rate";
    pub const EXIT_CAP_RATE: &str = "exit_cap_rate";
    pub const SELLING_COSTS_RATE: &str = "selling_costs_rate";
    pub const HOLDING_PERIOD_YEARS: &str = "holding_period_years";

    pub const MONTHLY_RENT: &str = "monthly_rent";
    pub const UNITS: &str = "units";
    pub const MONTHLY_RENT_PER_UNIT: &str = "monthly_rent_per_unit";
    pub const RENTABLE_SQFT: &str = "rentable_sqft";
    pub const ANNUAL_RENT_PER_SQFT: &str = "annual_rent_per_sqft";
    pub const NIGHTLY_RATE: &str = "nightly_rate";

    pub const PROPERTY_TAXES: &str = "property_taxes";
    pub const INSURANCE: &str = "insurance";
    pub const UTILITIES: &str = "utilities";
    pub const HOA_FEES: &str = "hoa_fees";
    pub const MAINTENANCE_RATE: &str = "maintenance_rate";
    pub const MANAGEMENT_FEE_RATE: &str = "management_fee_rate";
    pub const CAPEX_RESERVE_RATE: &str = "capex_reserve_rate";
    pub const PLATFORM_FEE_RATE: &str = "platform_fee_rate";

    pub const AFTER_REPAIR_VALUE: &str = "after_repair_value";
    pub const HOLDING_MONTHS: &str = "holding_months";
    pub const MONTHLY_HOLDING_COSTS: &str = "monthly_holding_costs";
    pub const LOAN_TO_COST_RATE: &str = "loan_to_cost_rate";
    pub const LOAN_POINTS_RATE: &str = "loan_points_rate";
}

/// One fully specified assumption set: field name to value.
///
/// Never mutated in place; analyses derive modified copies with
/// [`DealInputs::with_value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealInputs(BTreeMap<String, Decimal>);

impl DealInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Copy of these inputs with `name` set to `value`.
    pub fn with_value(&self, name: &str, value: Decimal) -> Self {
        let mut next = self.0.clone();
        next.insert(name.to_string(), value);
        Self(next)
    }

    pub fn with_values<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        let mut next = self.0.clone();
        for (k, v) in overrides {
            next.insert(k.to_string(), v);
        }
        Self(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Decimal)> for DealInputs {
    fn from_iter<T: IntoIterator<Item = (String, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Legal domain of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldConstraint {
    #[default]
    Any,
    NonNegative,
    Positive,
    /// [0, 1]
    UnitInterval,
    /// Inclusive range
    Range { min: Decimal, max: Decimal },
    /// (0, MAX_HORIZON_YEARS], rounded up to whole periods
    Horizon,
}

impl FieldConstraint {
    pub fn check(&self, value: Decimal) -> Result<(), String> {
        let ok = match self {
            Self::Any => true,
            Self::NonNegative => value >= Decimal::ZERO,
            Self::Positive => value > Decimal::ZERO,
            Self::UnitInterval => value >= Decimal::ZERO && value <= Decimal::ONE,
            Self::Range { min, max } => value >= *min && value <= *max,
            Self::Horizon => value > Decimal::ZERO && value <= Decimal::from(MAX_HORIZON_YEARS),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{value} is outside the allowed domain ({})", self.describe()))
        }
    }

    /// Clamp into the domain where it has closed bounds.
    pub fn clamp(&self, value: Decimal) -> Decimal {
        match self {
            Self::NonNegative => value.max(Decimal::ZERO),
            Self::UnitInterval => value.max(Decimal::ZERO).min(Decimal::ONE),
            Self::Range { min, max } => value.max(*min).min(*max),
            Self::Horizon => value.min(Decimal::from(MAX_HORIZON_YEARS)),
            Self::Any | Self::Positive => value,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Any => "any value".into(),
            Self::NonNegative => ">= 0".into(),
            Self::Positive => "> 0".into(),
            Self::UnitInterval => "between 0 and 1".into(),
            Self::Range { min, max } => format!("between {min} and {max}"),
            Self::Horizon => format!("> 0 and <= {MAX_HORIZON_YEARS} years"),
        }
    }
}

/// Declaration of one template input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Decimal>,
    #[serde(default)]
    pub constraint: FieldConstraint,
}

impl FieldSpec {
    pub fn required(name: &str, label: &str, constraint: FieldConstraint) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: true,
            default: None,
            constraint,
        }
    }

    pub fn optional(
        name: &str,
        label: &str,
        default: Option<Decimal>,
        constraint: FieldConstraint,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: false,
            default,
            constraint,
        }
    }

    pub fn check(&self, value: Decimal) -> PropvestResult<()> {
        self.constraint
            .check(value)
            .map_err(|reason| PropvestError::InvalidParameter {
                field: self.name.clone(),
                reason,
            })
    }
}

/// Inputs checked against a template's field list, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    values: BTreeMap<String, Decimal>,
}

impl ResolvedInputs {
    pub fn get(&self, field: &str) -> PropvestResult<Decimal> {
        self.values
            .get(field)
            .copied()
            .ok_or_else(|| PropvestError::MissingRequiredInput {
                field: field.to_string(),
            })
    }

    pub fn optional(&self, field: &str) -> Option<Decimal> {
        self.values.get(field).copied()
    }

    pub fn sum(&self, fields: &[String]) -> PropvestResult<Decimal> {
        fields.iter().try_fold(Decimal::ZERO, |acc, f| Ok(acc + self.get(f)?))
    }

    pub fn product(&self, fields: &[String]) -> PropvestResult<Decimal> {
        fields.iter().try_fold(Decimal::ONE, |acc, f| Ok(acc * self.get(f)?))
    }
}

/// Validate `inputs` against `specs`, filling defaults.
///
/// Fields are checked in declaration order so the first missing required
/// field is the one reported. Names the template does not declare are rejected.
pub fn resolve(specs: &[FieldSpec], inputs: &DealInputs) -> PropvestResult<ResolvedInputs> {
    let mut values = BTreeMap::new();

    for spec in specs {
        let value = match inputs.get(&spec.name).or(spec.default) {
            Some(v) => v,
            None if spec.required => {
                return Err(PropvestError::MissingRequiredInput {
                    field: spec.name.clone(),
                })
            }
            None => continue,
        };
        spec.check(value)?;
        values.insert(spec.name.clone(), value);
    }

    if let Some((unknown, _)) = inputs
        .iter()
        .find(|(name, _)| !specs.iter().any(|s| s.name == *name))
    {
        return Err(PropvestError::InvalidParameter {
            field: unknown.to_string(),
            reason: "not an input of this property type".into(),
        });
    }

    Ok(ResolvedInputs { values })
}

/// Whole periods covered by a horizon value, capped at [`MAX_HORIZON_YEARS`].
pub fn horizon_periods(years: Decimal) -> u32 {
    years
        .ceil()
        .to_u32()
        .unwrap_or(1)
        .clamp(1, MAX_HORIZON_YEARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("purchase_price", "Purchase price", FieldConstraint::NonNegative),
            FieldSpec::required("monthly_rent", "Monthly rent", FieldConstraint::NonNegative),
            FieldSpec::optional(
                "vacancy_rate",
                "Vacancy",
                Some(dec!(0.05)),
                FieldConstraint::UnitInterval,
            ),
            FieldSpec::optional("exit_cap_rate", "Exit cap", None, FieldConstraint::Positive),
        ]
    }

    #[test]
    fn test_defaults_are_filled() {
        let inputs = DealInputs::from_pairs([
            ("purchase_price", dec!(250000)),
            ("monthly_rent", dec!(2000)),
        ]);
        let resolved = resolve(&specs(), &inputs).unwrap();
        assert_eq!(resolved.get("vacancy_rate").unwrap(), dec!(0.05));
        assert_eq!(resolved.optional("exit_cap_rate"), None);
    }

    #[test]
    fn test_first_missing_field_is_reported() {
        let err = resolve(&specs(), &DealInputs::new()).unwrap_err();
        match err {
            PropvestError::MissingRequiredInput { field } => assert_eq!(field, "purchase_price"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constraint_violation() {
        let inputs = DealInputs::from_pairs([
            ("purchase_price", dec!(-1)),
            ("monthly_rent", dec!(2000)),
        ]);
        assert!(matches!(
            resolve(&specs(), &inputs),
            Err(PropvestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let inputs = DealInputs::from_pairs([
            ("purchase_price", dec!(250000)),
            ("monthly_rent", dec!(2000)),
            ("monthly_rnt", dec!(2000)),
        ]);
        let err = resolve(&specs(), &inputs).unwrap_err();
        assert!(err.to_string().contains("monthly_rnt"));
    }

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let inputs = DealInputs::from_pairs([("purchase_price", dec!(250000))]);
        let bumped = inputs.with_value("purchase_price", dec!(300000));
        assert_eq!(inputs.get("purchase_price"), Some(dec!(250000)));
        assert_eq!(bumped.get("purchase_price"), Some(dec!(300000)));
    }

    #[test]
    fn test_horizon_rounds_up() {
        assert_eq!(horizon_periods(dec!(4.2)), 5);
        assert_eq!(horizon_periods(dec!(10)), 10);
        assert_eq!(horizon_periods(dec!(0.5)), 1);
    }
}
