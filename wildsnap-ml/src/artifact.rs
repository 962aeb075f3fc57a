//! Model artifacts and conversion outcomes.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The two model families the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Detector,
    Classifier,
}

impl ModelFamily {
    /// Model the family is built from, for human-facing output.
    pub fn model_name(self) -> &'static str {
        match self {
            Self::Detector => "YOLOv8",
            Self::Classifier => "EfficientNetB0",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detector => write!(f, "detector"),
            Self::Classifier => write!(f, "classifier"),
        }
    }
}

/// A model file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub family: ModelFamily,
}

impl ModelArtifact {
    /// Stat `path`; `None` when it does not exist or is not a file.
    pub fn inspect(path: &Path, family: ModelFamily) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        meta.is_file().then(|| Self {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            family,
        })
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Outcome of one conversion sub-pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub family: ModelFamily,
    pub success: bool,
    pub output_path: PathBuf,
    /// Diagnostic for failed runs.
    pub message: Option<String>,
    /// Last stage entered before the run terminated.
    pub stage: String,
    /// `PipelineError::kind` of the failure.
    pub error_kind: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(family: ModelFamily, output_path: PathBuf) -> Self {
        Self {
            family,
            success: true,
            output_path,
            message: None,
            stage: "done".into(),
            error_kind: None,
        }
    }

    pub fn failed(
        family: ModelFamily,
        output_path: PathBuf,
        stage: impl Into<String>,
        error: &PipelineError,
    ) -> Self {
        Self {
            family,
            success: false,
            output_path,
            message: Some(error.to_string()),
            stage: stage.into(),
            error_kind: Some(error.kind().to_string()),
        }
    }

    /// One summary line, e.g. `[OK] detector (YOLOv8): assets/deteccion.tflite`.
    pub fn summary_line(&self) -> String {
        if self.success {
            format!(
                "[OK] {} ({}): {}",
                self.family,
                self.family.model_name(),
                self.output_path.display()
            )
        } else {
            format!(
                "[FAILED] {} ({}) during {}: {} - {}",
                self.family,
                self.family.model_name(),
                self.stage,
                self.error_kind.as_deref().unwrap_or("Error"),
                self.message.as_deref().unwrap_or("no diagnostic")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_missing_file() {
        assert!(ModelArtifact::inspect(Path::new("/nonexistent/m.tflite"), ModelFamily::Detector).is_none());
    }

    #[test]
    fn test_inspect_directory_is_not_artifact() {
        let dir = TempDir::new().unwrap();
        assert!(ModelArtifact::inspect(dir.path(), ModelFamily::Classifier).is_none());
    }

    #[test]
    fn test_size_mb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.tflite");
        std::fs::write(&path, vec![0u8; 3 * 1024 * 1024 / 2]).unwrap();
        let artifact = ModelArtifact::inspect(&path, ModelFamily::Classifier).unwrap();
        assert_eq!(artifact.size_bytes, 1_572_864);
        assert_eq!(format!("{:.2}", artifact.size_mb()), "1.50");
    }

    #[test]
    fn test_failed_result_carries_kind() {
        let err = PipelineError::relocation("missing export");
        let result = ConversionResult::failed(
            ModelFamily::Detector,
            PathBuf::from("assets/deteccion.tflite"),
            "relocating",
            &err,
        );
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("RelocationError"));
        assert_eq!(
            result.summary_line(),
            "[FAILED] detector (YOLOv8) during relocating: RelocationError - Relocation error: missing export"
        );
    }
}
