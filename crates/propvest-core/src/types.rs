use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PropvestError;
use crate::PropvestResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 1.8x equity multiple)
pub type Multiple = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// An investment metric that analyses can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    /// Year-1 net operating income
    Noi,
    CapRate,
    CashOnCash,
    Dscr,
    Irr,
    Moic,
    /// Total distributions less total cash invested over the hold
    NetProfit,
    /// Net profit over total cash invested
    Roi,
    /// Year-1 net cash flow after debt service
    CashFlow,
}

impl TargetMetric {
    pub const ALL: [TargetMetric; 9] = [
        TargetMetric::Noi,
        TargetMetric::CapRate,
        TargetMetric::CashOnCash,
        TargetMetric::Dscr,
        TargetMetric::Irr,
        TargetMetric::Moic,
        TargetMetric::NetProfit,
        TargetMetric::Roi,
        TargetMetric::CashFlow,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Noi => "noi",
            Self::CapRate => "cap_rate",
            Self::CashOnCash => "cash_on_cash",
            Self::Dscr => "dscr",
            Self::Irr => "irr",
            Self::Moic => "moic",
            Self::NetProfit => "net_profit",
            Self::Roi => "roi",
            Self::CashFlow => "cash_flow",
        }
    }

    /// Break-even threshold used when the caller does not supply one.
    pub fn default_threshold(&self) -> Decimal {
        match self {
            Self::Dscr | Self::Moic => Decimal::ONE,
            Self::CapRate => dec!(0.05),
            _ => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Sensitivity variable specification.
///
/// Also used as the distribution declaration for Monte Carlo runs and as the
/// search bracket for break-even solving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityVariable {
    /// Deal input field this variable drives
    pub name: String,
    /// Display label; falls back to `name`
    #[serde(default)]
    pub label: String,
    pub base_value: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl SensitivityVariable {
    pub fn new(name: &str, base_value: Decimal, min: Decimal, max: Decimal) -> Self {
        Self {
            name: name.to_string(),
            label: String::new(),
            base_value,
            min,
            max,
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    /// Enforce `min <= base_value <= max`.
    pub fn validate(&self) -> PropvestResult<()> {
        if self.min > self.max {
            return Err(PropvestError::InvalidParameter {
                field: format!("variable:{}", self.name),
                reason: format!("min ({}) must be <= max ({})", self.min, self.max),
            });
        }
        if self.base_value < self.min || self.base_value > self.max {
            return Err(PropvestError::InvalidParameter {
                field: format!("variable:{}", self.name),
                reason: format!(
                    "base value {} must lie within [{}, {}]",
                    self.base_value, self.min, self.max
                ),
            });
        }
        Ok(())
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, result, "rust_decimal_128bit")
}

/// Same envelope for results aggregated in floating point.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, result, "ieee754_f64")
}

fn wrap<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
    precision: &str,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_bounds_enforced() {
        let ok = SensitivityVariable::new("vacancy_rate", dec!(0.05), dec!(0.02), dec!(0.15));
        assert!(ok.validate().is_ok());

        let inverted = SensitivityVariable::new("vacancy_rate", dec!(0.05), dec!(0.15), dec!(0.02));
        assert!(matches!(
            inverted.validate(),
            Err(PropvestError::InvalidParameter { .. })
        ));

        let outside = SensitivityVariable::new("vacancy_rate", dec!(0.20), dec!(0.02), dec!(0.15));
        assert!(outside.validate().is_err());
    }

    #[test]
    fn test_metric_keys_round_trip_through_serde() {
        for metric in TargetMetric::ALL {
            let json = serde_json::to_value(metric).unwrap();
            assert_eq!(json, serde_json::Value::String(metric.key().to_string()));
        }
    }
}
