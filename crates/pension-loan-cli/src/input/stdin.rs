use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialize a piped JSON request. Returns `None` for an interactive
/// terminal or empty input, so the caller can fall back to flags.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: T = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse request from stdin: {e}"))?;
    Ok(Some(value))
}
