use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropvestError {
    #[error("Invalid template: unknown property type '{0}'")]
    InvalidTemplate(String),

    #[error("Missing required input: {field}")]
    MissingRequiredInput { field: String },

    #[error("Invalid parameter: {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Did not converge: {function} gave up after {iterations} iterations (last NPV: {last_delta})")]
    DidNotConverge {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Conflicting adjustment: '{variable}' is adjusted more than once in scenario '{scenario}'")]
    ConflictingAdjustment { variable: String, scenario: String },

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PropvestError {
    /// Errors raised by a single evaluation point rather than by request validation.
    ///
    /// Sweeps and simulations exclude these from aggregation instead of aborting.
    pub fn is_computational(&self) -> bool {
        matches!(
            self,
            PropvestError::DivisionByZero { .. } | PropvestError::DidNotConverge { .. }
        )
    }
}

impl From<serde_json::Error> for PropvestError {
    fn from(e: serde_json::Error) -> Self {
        PropvestError::SerializationError(e.to_string())
    }
}
