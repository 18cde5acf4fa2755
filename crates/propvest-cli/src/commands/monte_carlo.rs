use clap::Args;
use serde_json::Value;

use propvest_core::monte_carlo::simulation::{self, MonteCarloRequest};
use propvest_core::ProjectionEngine;

use super::{read_request, InputArgs};

/// Arguments for Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Override the request's iteration count
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Override the request's seed
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_monte_carlo(
    engine: &ProjectionEngine,
    args: MonteCarloArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: MonteCarloRequest = read_request(&args.input, "Monte Carlo simulation")?;
    if let Some(n) = args.iterations {
        request.iterations = n;
    }
    if args.seed.is_some() {
        request.seed = args.seed;
    }
    let result = simulation::run_monte_carlo(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}
