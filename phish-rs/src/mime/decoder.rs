use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::debug;

use super::types::Payload;
use crate::error::{Result, ScanError};

/// Nesting depth beyond which parts are ignored
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// URL-safe alphabet, accepting input with or without `=` padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode base64url text to UTF-8, dropping invalid byte sequences
pub fn decode_base64url(data: &str) -> Result<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = URL_SAFE_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| ScanError::Decode(e.to_string()))?;

    let text = String::from_utf8_lossy(&bytes);
    Ok(text.chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect())
}

/// Extracts the readable body and top-level headers from a payload tree
#[derive(Debug, Clone, Copy)]
pub struct PayloadDecoder {
    max_depth: usize,
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl PayloadDecoder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// First non-empty decoded body in depth-first order, or `""`
    pub fn decode(&self, payload: &Payload) -> String {
        self.walk(payload, 0).unwrap_or_default()
    }

    fn walk(&self, node: &Payload, depth: usize) -> Option<String> {
        if depth > self.max_depth {
            debug!("Ignoring payload part nested deeper than {}", self.max_depth);
            return None;
        }

        match node {
            Payload::Leaf { data: Some(data), .. } => match decode_base64url(data) {
                Ok(text) if !text.is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping undecodable part: {}", e);
                    None
                }
            },
            Payload::Leaf { data: None, .. } => None,
            Payload::Container { parts, .. } => {
                parts.iter().find_map(|part| self.walk(part, depth + 1))
            }
        }
    }

    /// Value of a top-level header, matched case-insensitively
    pub fn header<'a>(&self, payload: &'a Payload, name: &str) -> &'a str {
        payload
            .headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }
}
