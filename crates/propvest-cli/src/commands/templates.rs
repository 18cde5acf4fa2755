use clap::Args;
use serde_json::{json, Value};

use propvest_core::deal::{self, TemplateRequest};
use propvest_core::TemplateRegistry;

use crate::input;

/// Arguments for template lookup
#[derive(Args)]
pub struct TemplatesArgs {
    /// Property type to describe; lists every template when omitted
    #[arg(long)]
    pub property_type: Option<String>,

    /// JSON file of deal inputs to materialise default ranges around
    #[arg(long)]
    pub inputs: Option<String>,
}

pub fn run_templates(
    registry: &TemplateRegistry,
    args: TemplatesArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let Some(property_type) = args.property_type else {
        let listing: Vec<Value> = registry
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "label": t.label,
                    "model": t.model,
                    "scoring": t.scoring.is_some(),
                })
            })
            .collect();
        return Ok(Value::Array(listing));
    };

    let inputs = match args.inputs {
        Some(ref path) => Some(input::file::read_json(path)?),
        None => None,
    };
    let request = TemplateRequest {
        property_type,
        inputs,
    };
    let result = deal::describe_template(registry, &request)?;
    Ok(serde_json::to_value(result)?)
}
