//! NDJSON Decoding
//!
//! Splits newline-delimited JSON bodies, whole or chunked, into values.

use crate::error::{ApiError, Result};
use serde_json::Value;

/// Parse one NDJSON line; blank lines yield `None`
pub fn parse_ndjson_line(line: &str) -> Result<Option<Value>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(line).map(Some).map_err(|e| {
        ApiError::Response(format!(
            "Failed to parse NDJSON line: {}. Line: {}",
            e,
            line.chars().take(200).collect::<String>()
        ))
    })
}

/// Parse a complete NDJSON body
pub fn parse_ndjson(body: &str) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for line in body.lines() {
        if let Some(value) = parse_ndjson_line(line)? {
            values.push(value);
        }
    }
    Ok(values)
}

/// Incremental decoder for NDJSON arriving in arbitrary byte chunks
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a chunk of the body
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next value from a complete buffered line
    ///
    /// `Ok(None)` means no complete line is buffered yet. A bad line is
    /// consumed, so values after it can still be read.
    pub fn next_value(&mut self) -> Result<Option<Value>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(value) = parse_line_bytes(&line)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Parse whatever is left once the body has ended
    pub fn finish(self) -> Result<Option<Value>> {
        parse_line_bytes(&self.buffer)
    }
}

fn parse_line_bytes(bytes: &[u8]) -> Result<Option<Value>> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| ApiError::Response(format!("NDJSON line is not UTF-8: {}", e)))?;
    parse_ndjson_line(line)
}
