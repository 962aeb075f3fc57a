//! Classifier sub-pipeline: load source, convert, save.

use crate::artifact::{ConversionResult, ModelFamily};
use crate::config::{ClassifierConfig, PipelineConfig};
use crate::convert::{ConversionBackend, ConversionOptions, ConversionOutput, ModelSource};
use crate::error::PipelineError;
use crate::persistence::{atomic_write, move_file};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Files marking a directory as a SavedModel bundle.
const SAVED_MODEL_MARKERS: [&str; 2] = ["saved_model.pb", "saved_model.pbtxt"];

/// `NotStarted → Loading → Converting → Saving → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStage {
    NotStarted,
    Loading,
    Converting,
    Saving,
    Done,
    Failed,
}

impl fmt::Display for ClassifierStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Loading => "loading",
            Self::Converting => "converting",
            Self::Saving => "saving",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Decide how the classifier source should be loaded.
pub fn resolve_source(config: &ClassifierConfig) -> Result<ModelSource, PipelineError> {
    let Some(path) = &config.model else {
        return Ok(ModelSource::Pretrained {
            architecture: config.architecture.clone(),
            weights: config.weights.clone(),
        });
    };

    if !path.exists() {
        return Err(PipelineError::acquisition(format!(
            "classifier model not found: {}",
            path.display()
        )));
    }

    if path.is_dir() {
        return if SAVED_MODEL_MARKERS.iter().any(|m| path.join(m).is_file()) {
            Ok(ModelSource::SavedModel { path: path.clone() })
        } else {
            Err(PipelineError::unsupported_format(format!(
                "{} is a directory without a saved_model.pb",
                path.display()
            )))
        };
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("h5" | "keras") => Ok(ModelSource::KerasFile { path: path.clone() }),
        _ => Err(PipelineError::unsupported_format(format!(
            "{} is not a .h5/.keras file or SavedModel directory",
            path.display()
        ))),
    }
}

pub struct ClassifierPipeline<'a> {
    config: &'a PipelineConfig,
    converter: &'a dyn ConversionBackend,
    stage: ClassifierStage,
}

impl<'a> ClassifierPipeline<'a> {
    pub fn new(config: &'a PipelineConfig, converter: &'a dyn ConversionBackend) -> Self {
        Self {
            config,
            converter,
            stage: ClassifierStage::NotStarted,
        }
    }

    pub fn stage(&self) -> ClassifierStage {
        self.stage
    }

    fn enter(&mut self, stage: ClassifierStage) {
        debug!(from = %self.stage, to = %stage, "Classifier stage");
        self.stage = stage;
    }

    /// Run to a terminal stage. Errors are folded into the result.
    pub async fn run(&mut self) -> ConversionResult {
        let output = self.config.classifier_output();
        match self.execute(&output).await {
            Ok(()) => {
                self.enter(ClassifierStage::Done);
                info!(path = %output.display(), "Classifier model ready");
                ConversionResult::succeeded(ModelFamily::Classifier, output)
            }
            Err(e) => {
                let failed_at = self.stage;
                self.enter(ClassifierStage::Failed);
                warn!(stage = %failed_at, error = %e, "Classifier conversion failed");
                ConversionResult::failed(ModelFamily::Classifier, output, failed_at.to_string(), &e)
            }
        }
    }

    async fn execute(&mut self, output: &Path) -> Result<(), PipelineError> {
        self.enter(ClassifierStage::Loading);
        let source = resolve_source(&self.config.classifier)?;
        debug!(?source, "Classifier source resolved");

        self.enter(ClassifierStage::Converting);
        let classifier = &self.config.classifier;
        let options = ConversionOptions {
            image_size: None,
            int8: false,
            simplify: false,
            optimize_default: classifier.optimize_default,
            float32_only: classifier.float32_only,
        };
        let produced = self
            .converter
            .convert(&source, &options)
            .await
            .map_err(PipelineError::into_conversion)?;

        self.enter(ClassifierStage::Saving);
        match produced {
            ConversionOutput::Blob(bytes) => atomic_write(output, &bytes)?,
            ConversionOutput::File(path) => move_file(&path, output)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn with_model(path: PathBuf) -> ClassifierConfig {
        ClassifierConfig {
            model: Some(path),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_model_means_pretrained() {
        let source = resolve_source(&ClassifierConfig::default()).unwrap();
        assert_eq!(
            source,
            ModelSource::Pretrained {
                architecture: "EfficientNetB0".into(),
                weights: "imagenet".into(),
            }
        );
    }

    #[test]
    fn test_keras_and_h5_files() {
        let dir = TempDir::new().unwrap();
        for name in ["m.h5", "m.keras"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"weights").unwrap();
            let source = resolve_source(&with_model(path.clone())).unwrap();
            assert_eq!(source, ModelSource::KerasFile { path });
        }
    }

    #[test]
    fn test_saved_model_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("saved_model.pb"), b"graph").unwrap();
        let source = resolve_source(&with_model(dir.path().to_path_buf())).unwrap();
        assert_eq!(
            source,
            ModelSource::SavedModel {
                path: dir.path().to_path_buf()
            }
        );
    }

    #[test]
    fn test_plain_directory_is_unsupported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("weights.bin"), b"x").unwrap();
        let err = resolve_source(&with_model(dir.path().to_path_buf())).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormatError");
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"x").unwrap();
        let err = resolve_source(&with_model(path)).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormatError");
    }

    #[test]
    fn test_missing_path_is_acquisition_error() {
        let err = resolve_source(&with_model(PathBuf::from("/nonexistent/effnet.keras"))).unwrap_err();
        assert_eq!(err.kind(), "AcquisitionError");
    }
}
