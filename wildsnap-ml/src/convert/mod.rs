//! TFLite conversion capability.
//!
//! The orchestrator only sees [`ConversionBackend`]; the production
//! implementation shells out to Python exporters, tests plug in doubles that
//! return fixed blobs.

pub mod python;

pub use python::PythonConverter;

use crate::artifact::ModelFamily;
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSource {
    /// Detector weights file (`.pt`).
    Checkpoint { path: PathBuf },
    /// Single-file Keras model (`.h5` / `.keras`).
    KerasFile { path: PathBuf },
    /// Directory holding a SavedModel bundle.
    SavedModel { path: PathBuf },
    /// Canonical architecture instantiated with pretrained weights.
    Pretrained { architecture: String, weights: String },
}

impl ModelSource {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Checkpoint { .. } => ModelFamily::Detector,
            _ => ModelFamily::Classifier,
        }
    }
}

/// Exporter flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Square input resolution; detector only.
    pub image_size: Option<u32>,
    pub int8: bool,
    pub simplify: bool,
    /// Apply the converter's default optimization set.
    pub optimize_default: bool,
    pub float32_only: bool,
}

/// What the backend produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutput {
    /// The model bytes.
    Blob(Vec<u8>),
    /// A file the backend deposited on disk, at the location it reports.
    File(PathBuf),
}

/// Converts a source model into a TFLite flatbuffer.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Single attempt; any failure surfaces as [`PipelineError::Conversion`].
    async fn convert(
        &self,
        source: &ModelSource,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, PipelineError>;
}
