//! Payload parsing

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse a payload held in memory
///
/// A single JSON document is parsed with simd-json. With `ndjson`, each
/// non-empty line is a record and the records are gathered into a list.
pub fn parse_payload(content: &mut [u8], ndjson: bool) -> Result<Value> {
    if ndjson {
        let text = std::str::from_utf8(content).context("Payload is not valid UTF-8")?;
        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).with_context(|| format!("Failed to parse JSON on line {}", number + 1))
            })
            .collect::<Result<Vec<Value>>>()?;
        return Ok(Value::Array(records));
    }

    simd_json::serde::from_slice(content).context("Failed to parse JSON payload")
}
