pub mod deal;
pub mod error;
pub mod metrics;
pub mod projection;
pub mod scenarios;
pub mod scoring;
pub mod time_value;
pub mod types;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

mod parallel;

pub use deal::inputs::{DealInputs, FieldConstraint, FieldSpec};
pub use deal::templates::{PropertyTemplate, TemplateRegistry};
pub use error::PropvestError;
pub use projection::ProjectionEngine;
pub use scoring::DealScorer;
pub use types::*;

/// Standard result type for all propvest computations
pub type PropvestResult<T> = Result<T, PropvestError>;
