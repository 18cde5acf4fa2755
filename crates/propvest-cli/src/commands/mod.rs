pub mod analysis;
pub mod monte_carlo;
pub mod scoring;
pub mod templates;

use clap::Args;
use serde::de::DeserializeOwned;

use crate::input;

/// Shared `--input` flag for commands that take a JSON request body.
#[derive(Args)]
pub struct InputArgs {
    /// Path to JSON request file (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

/// Read a typed request from `--input` or piped stdin.
pub fn read_request<T: DeserializeOwned>(
    args: &InputArgs,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        input::file::read_json(path)
    } else if let Some(request) = input::stdin::read_stdin_request()? {
        Ok(request)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}
