use serde_json::Value;

use propvest_core::projection::{self, ProjectionRequest};
use propvest_core::scenarios::break_even::{self, BreakEvenRequest};
use propvest_core::scenarios::scenario::{self, ScenarioRequest};
use propvest_core::scenarios::sensitivity::{self, HeatMapRequest, TornadoRequest};
use propvest_core::ProjectionEngine;

use super::{read_request, InputArgs};

pub fn run_project(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ProjectionRequest = read_request(&args, "deal projection")?;
    let result = projection::project_deal(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: TornadoRequest = read_request(&args, "sensitivity analysis")?;
    let result = sensitivity::tornado_analysis(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_heat_map(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: HeatMapRequest = read_request(&args, "heat map")?;
    let result = sensitivity::heat_map(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_scenarios(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ScenarioRequest = read_request(&args, "scenario comparison")?;
    let result = scenario::compare_scenarios(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_break_even(
    engine: &ProjectionEngine,
    args: InputArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: BreakEvenRequest = read_request(&args, "break-even analysis")?;
    let result = break_even::break_even_analysis(engine, &request)?;
    Ok(serde_json::to_value(result)?)
}
