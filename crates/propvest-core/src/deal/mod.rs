pub mod inputs;
pub mod templates;

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, SensitivityVariable};
use crate::PropvestResult;
use inputs::DealInputs;
use templates::{PropertyTemplate, TemplateRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub property_type: String,
    /// When given, default ranges are materialised around these inputs
    #[serde(default)]
    pub inputs: Option<DealInputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDescription {
    pub template: PropertyTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_variables: Option<Vec<SensitivityVariable>>,
}

/// Look up a property type's field list, default ranges, scenarios and benchmarks.
pub fn describe_template(
    registry: &TemplateRegistry,
    request: &TemplateRequest,
) -> PropvestResult<ComputationOutput<TemplateDescription>> {
    let start = Instant::now();
    let template = registry.get(&request.property_type)?;

    let default_variables = request
        .inputs
        .as_ref()
        .map(|inputs| template.default_variables(inputs))
        .transpose()?;

    let mut warnings = Vec::new();
    if template.scoring.is_none() {
        warnings.push(format!(
            "'{}' has no scoring benchmarks; deal scoring is unavailable",
            template.id
        ));
    }

    let output = TemplateDescription {
        template: template.clone(),
        default_variables,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Property-type template lookup",
        request,
        warnings,
        elapsed,
        output,
    ))
}
