//! TFLite header inspection.
//!
//! The check is a heuristic: it looks for the `TFL3` magic (or its `TFL`
//! prefix) in the hex dump of the first eight bytes. Some container variants
//! legitimately lack these bytes, so an invalid verdict is advisory and
//! callers must not treat it as fatal on its own.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

/// Hex of `b"TFL3"`.
pub const TFL3_MAGIC_HEX: &str = "54464c33";
/// Hex of `b"TFL"`.
pub const TFL_PREFIX_HEX: &str = "54464c";
/// Number of leading bytes inspected.
pub const HEADER_LEN: usize = 8;
/// Below this many bytes a file is rejected outright.
pub const MIN_HEADER_LEN: usize = 4;

pub const ADVISORY_NOTE: &str = "file may still be valid despite this check failing";

/// Which signature the header matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMatch {
    /// `TFL3` found.
    Full,
    /// Only `TFL` found.
    Partial,
    None,
}

/// Result of inspecting a model header. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub looks_valid: bool,
    pub matched_signature: SignatureMatch,
    pub raw_header_hex: String,
    pub bytes_read: usize,
}

impl ValidationVerdict {
    /// Whether the file was too short to carry a header at all.
    pub fn too_small(&self) -> bool {
        self.bytes_read < MIN_HEADER_LEN
    }

    /// Advisory note attached to a failed signature match.
    pub fn advisory(&self) -> Option<&'static str> {
        (!self.looks_valid && !self.too_small()).then_some(ADVISORY_NOTE)
    }

    /// Short human-readable verdict.
    pub fn describe(&self) -> String {
        match self.matched_signature {
            SignatureMatch::Full => "valid TFLite model (TFL3)".to_string(),
            SignatureMatch::Partial => "valid TFLite model (TFL)".to_string(),
            SignatureMatch::None if self.too_small() => {
                format!("file too small for a TFLite header ({} bytes)", self.bytes_read)
            }
            SignatureMatch::None => format!("no TFLite signature; {ADVISORY_NOTE}"),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Classify a header. Only the first [`HEADER_LEN`] bytes are considered.
///
/// Matching is a substring search over the hex dump, so a signature is found
/// wherever it sits inside the window.
pub fn inspect_header(bytes: &[u8]) -> ValidationVerdict {
    let header = &bytes[..bytes.len().min(HEADER_LEN)];
    let raw_header_hex = to_hex(header);

    if header.len() < MIN_HEADER_LEN {
        return ValidationVerdict {
            looks_valid: false,
            matched_signature: SignatureMatch::None,
            raw_header_hex,
            bytes_read: header.len(),
        };
    }

    let haystack = raw_header_hex.to_ascii_lowercase();
    let matched_signature = if haystack.contains(TFL3_MAGIC_HEX) {
        SignatureMatch::Full
    } else if haystack.contains(TFL_PREFIX_HEX) {
        SignatureMatch::Partial
    } else {
        SignatureMatch::None
    };

    ValidationVerdict {
        looks_valid: matched_signature != SignatureMatch::None,
        matched_signature,
        raw_header_hex,
        bytes_read: header.len(),
    }
}

/// Read the header of `path` and classify it.
///
/// Fails only when the file cannot be opened or read.
pub fn validate_artifact(path: &Path) -> Result<ValidationVerdict, PipelineError> {
    let file = std::fs::File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;

    let verdict = inspect_header(&header);
    tracing::info!(
        path = %path.display(),
        header = %verdict.raw_header_hex,
        signature = ?verdict.matched_signature,
        "Inspected model header"
    );
    Ok(verdict)
}
