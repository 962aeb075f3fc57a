//! Detector sub-pipeline: acquire checkpoint, export, relocate.

use crate::artifact::{ConversionResult, ModelFamily};
use crate::config::PipelineConfig;
use crate::convert::{ConversionBackend, ConversionOptions, ConversionOutput, ModelSource};
use crate::error::PipelineError;
use crate::fetch::{FetchOrigin, RemoteSource, download_cached};
use crate::persistence::{atomic_write, move_file};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `NotStarted → Acquiring → Converting → Relocating → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorStage {
    NotStarted,
    Acquiring,
    Converting,
    Relocating,
    Done,
    Failed,
}

impl fmt::Display for DetectorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Acquiring => "acquiring",
            Self::Converting => "converting",
            Self::Relocating => "relocating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct DetectorPipeline<'a> {
    config: &'a PipelineConfig,
    converter: &'a dyn ConversionBackend,
    remote: &'a dyn RemoteSource,
    stage: DetectorStage,
}

impl<'a> DetectorPipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        converter: &'a dyn ConversionBackend,
        remote: &'a dyn RemoteSource,
    ) -> Self {
        Self {
            config,
            converter,
            remote,
            stage: DetectorStage::NotStarted,
        }
    }

    pub fn stage(&self) -> DetectorStage {
        self.stage
    }

    fn enter(&mut self, stage: DetectorStage) {
        debug!(from = %self.stage, to = %stage, "Detector stage");
        self.stage = stage;
    }

    /// Run to a terminal stage. Errors are folded into the result.
    pub async fn run(&mut self) -> ConversionResult {
        let output = self.config.detector_output();
        match self.execute(&output).await {
            Ok(()) => {
                self.enter(DetectorStage::Done);
                info!(path = %output.display(), "Detector model ready");
                ConversionResult::succeeded(ModelFamily::Detector, output)
            }
            Err(e) => {
                let failed_at = self.stage;
                self.enter(DetectorStage::Failed);
                warn!(stage = %failed_at, error = %e, "Detector conversion failed");
                ConversionResult::failed(ModelFamily::Detector, output, failed_at.to_string(), &e)
            }
        }
    }

    async fn execute(&mut self, output: &Path) -> Result<(), PipelineError> {
        self.enter(DetectorStage::Acquiring);
        let checkpoint = self.acquire().await?;

        self.enter(DetectorStage::Converting);
        let options = self.options();
        let produced = self
            .converter
            .convert(
                &ModelSource::Checkpoint {
                    path: checkpoint.clone(),
                },
                &options,
            )
            .await
            .map_err(PipelineError::into_conversion)?;

        self.enter(DetectorStage::Relocating);
        match produced {
            ConversionOutput::Blob(bytes) => atomic_write(output, &bytes)?,
            ConversionOutput::File(reported) => {
                let expected = self.config.detector.intermediate_output(&checkpoint);
                if reported != expected.file {
                    debug!(
                        reported = %reported.display(),
                        expected = %expected.file.display(),
                        "Exporter reported a different path; relocating from the configured one"
                    );
                }
                relocate(&expected.file, expected.cleanup_root.as_deref(), output)?;
            }
        }
        Ok(())
    }

    fn options(&self) -> ConversionOptions {
        let detector = &self.config.detector;
        ConversionOptions {
            image_size: Some(detector.image_size),
            int8: detector.int8,
            simplify: detector.simplify,
            optimize_default: false,
            float32_only: !detector.int8,
        }
    }

    /// User checkpoint if configured, else the canonical one from the cache
    /// (downloaded on first use).
    async fn acquire(&self) -> Result<PathBuf, PipelineError> {
        let detector = &self.config.detector;
        if let Some(path) = &detector.checkpoint {
            if !path.is_file() {
                return Err(PipelineError::acquisition(format!(
                    "checkpoint not found: {}",
                    path.display()
                )));
            }
            info!(path = %path.display(), "Using local detector checkpoint");
            return Ok(path.clone());
        }

        let target = self
            .config
            .cache_dir
            .join("checkpoints")
            .join(&detector.checkpoint_name);
        let (path, origin) = download_cached(self.remote, &detector.checkpoint_url, &target)
            .await
            .map_err(|e| {
                PipelineError::acquisition(format!(
                    "could not download {}: {e}",
                    detector.checkpoint_name
                ))
            })?;
        if origin == FetchOrigin::Cache {
            info!(path = %path.display(), "Reusing cached detector checkpoint");
        }
        Ok(path)
    }
}

/// Move the exporter's file to `output` and delete its intermediate tree.
pub fn relocate(
    expected: &Path,
    cleanup_root: Option<&Path>,
    output: &Path,
) -> Result<(), PipelineError> {
    if !expected.is_file() {
        return Err(PipelineError::relocation(format!(
            "expected exporter output at {} does not exist; the exporter's naming convention may have changed (see detector.intermediate_path)",
            expected.display()
        )));
    }

    move_file(expected, output)?;
    info!(from = %expected.display(), to = %output.display(), "Relocated detector model");

    // The model is already in place; a leftover export tree is only noise.
    if let Some(root) = cleanup_root.filter(|r| r.exists()) {
        match std::fs::remove_dir_all(root) {
            Ok(()) => debug!(path = %root.display(), "Removed intermediate export directory"),
            Err(e) => {
                warn!(error = %e, path = %root.display(), "Could not remove intermediate export directory")
            }
        }
    }
    Ok(())
}
