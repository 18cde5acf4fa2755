pub mod simulation;

pub use simulation::{run_monte_carlo, DistributionKind, MonteCarloRequest, MonteCarloResult};
