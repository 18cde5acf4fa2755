use serde_json::Value;

/// Print the full computation envelope (result, warnings, metadata) as
/// indented JSON, the form the Node bindings also return.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(body) => println!("{body}"),
        Err(e) => {
            log::error!("could not render output as JSON: {e}");
            eprintln!("JSON serialization error: {e}");
        }
    }
}
