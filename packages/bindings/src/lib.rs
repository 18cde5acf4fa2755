use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use propvest_core::deal::TemplateRequest;
use propvest_core::{PropertyTemplate, ProjectionEngine, PropvestResult, TemplateRegistry};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Built-in templates, with any JSON-supplied templates merged over them.
fn registry(templates_json: Option<String>) -> NapiResult<TemplateRegistry> {
    let standard = TemplateRegistry::standard();
    match templates_json {
        Some(json) => {
            let overrides: Vec<PropertyTemplate> =
                serde_json::from_str(&json).map_err(to_napi_error)?;
            standard.merged_with(overrides).map_err(to_napi_error)
        }
        None => Ok(standard),
    }
}

/// Parse the request, run `op` against a fresh engine and serialise the envelope.
fn run<Req, Out, F>(input_json: &str, templates_json: Option<String>, op: F) -> NapiResult<String>
where
    Req: DeserializeOwned,
    Out: Serialize,
    F: FnOnce(&ProjectionEngine, &Req) -> PropvestResult<Out>,
{
    let request: Req = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let templates = registry(templates_json)?;
    let engine = ProjectionEngine::new(&templates);
    let output = op(&engine, &request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[napi]
pub fn project_deal(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(&input_json, templates_json, propvest_core::projection::project_deal)
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

#[napi]
pub fn tornado_analysis(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(
        &input_json,
        templates_json,
        propvest_core::scenarios::sensitivity::tornado_analysis,
    )
}

#[napi]
pub fn heat_map(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(&input_json, templates_json, propvest_core::scenarios::sensitivity::heat_map)
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

#[napi]
pub fn run_monte_carlo(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(
        &input_json,
        templates_json,
        propvest_core::monte_carlo::simulation::run_monte_carlo,
    )
}

// ---------------------------------------------------------------------------
// Scenarios and break-even
// ---------------------------------------------------------------------------

#[napi]
pub fn compare_scenarios(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(
        &input_json,
        templates_json,
        propvest_core::scenarios::scenario::compare_scenarios,
    )
}

#[napi]
pub fn break_even_analysis(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(
        &input_json,
        templates_json,
        propvest_core::scenarios::break_even::break_even_analysis,
    )
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[napi]
pub fn score_deal(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(&input_json, templates_json, propvest_core::scoring::score_deal)
}

#[napi]
pub fn quick_score(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(&input_json, templates_json, propvest_core::scoring::quick_score)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[napi]
pub fn describe_template(input_json: String, templates_json: Option<String>) -> NapiResult<String> {
    run(&input_json, templates_json, |engine, request: &TemplateRequest| {
        propvest_core::deal::describe_template(engine.templates(), request)
    })
}

#[napi]
pub fn list_templates(templates_json: Option<String>) -> NapiResult<String> {
    let templates = registry(templates_json)?;
    let ids: Vec<&str> = templates.ids().collect();
    serde_json::to_string(&ids).map_err(to_napi_error)
}
