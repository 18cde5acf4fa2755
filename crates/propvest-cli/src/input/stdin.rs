use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialize a request body piped on stdin.
///
/// `None` when stdin is an interactive terminal or the pipe is empty, so the
/// caller can report which flag is missing.
pub fn read_stdin_request<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;
    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }

    log::debug!("read {} bytes of request JSON from stdin", body.len());
    let request = serde_json::from_str(body)
        .map_err(|e| format!("stdin is not a valid request: {e}"))?;
    Ok(Some(request))
}
