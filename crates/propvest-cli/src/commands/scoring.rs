use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use propvest_core::scoring::{self, QuickScoreRequest, ScoreRequest};
use propvest_core::ProjectionEngine;

use super::{read_request, InputArgs};

/// Arguments for a quick score from headline metrics
#[derive(Args)]
pub struct QuickScoreArgs {
    /// Property type (e.g. multifamily)
    #[arg(long)]
    pub property_type: String,

    /// Cap rate in percent (e.g. 7.5)
    #[arg(long)]
    pub cap_rate: Decimal,

    /// Cash-on-cash return in percent (e.g. 12.5)
    #[arg(long)]
    pub cash_on_cash: Decimal,

    /// Debt service coverage ratio (e.g. 1.4)
    #[arg(long)]
    pub dscr: Decimal,
}

pub fn run_score(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ScoreRequest = read_request(&args, "deal scoring")?;
    let result = scoring::score_deal(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_quick_score(
    engine: &ProjectionEngine,
    args: QuickScoreArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request = QuickScoreRequest {
        property_type: args.property_type,
        cap_rate: args.cap_rate,
        cash_on_cash: args.cash_on_cash,
        dscr: args.dscr,
    };
    let result = scoring::quick_score(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}
