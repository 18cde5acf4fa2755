//! Renderers for `--output`.
//!
//! `json` prints the whole envelope; `table` and `csv` lay out the result
//! with row arrays (tornado bars, scenarios, projection periods, histogram
//! bins, score components) as their own tables; `minimal` prints the single
//! headline number of each analysis.

pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

pub fn format_output(format: &OutputFormat, value: &Value) {
    log::debug!("rendering output as {format:?}");
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}
