//! Conversion orchestration and the end-to-end pipeline run.
//!
//! The two sub-pipelines are independent: a failure in one is recorded in its
//! [`ConversionResult`] and never stops the other. Labels and verification
//! run regardless of conversion outcomes.

pub mod classifier;
pub mod detector;

pub use classifier::{ClassifierPipeline, ClassifierStage};
pub use detector::{DetectorPipeline, DetectorStage};

use crate::artifact::ConversionResult;
use crate::config::PipelineConfig;
use crate::convert::ConversionBackend;
use crate::error::PipelineError;
use crate::fetch::RemoteSource;
use crate::labels::{LabelProvisioner, ProvisionedLabels};
use crate::report::VerificationReport;

/// Drives the detector and classifier sub-pipelines in sequence.
pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    converter: &'a dyn ConversionBackend,
    remote: &'a dyn RemoteSource,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        converter: &'a dyn ConversionBackend,
        remote: &'a dyn RemoteSource,
    ) -> Self {
        Self {
            config,
            converter,
            remote,
        }
    }

    pub async fn convert_detector(&self) -> ConversionResult {
        DetectorPipeline::new(self.config, self.converter, self.remote)
            .run()
            .await
    }

    pub async fn convert_classifier(&self) -> ConversionResult {
        ClassifierPipeline::new(self.config, self.converter).run().await
    }

    /// Detector then classifier; both results are always returned.
    pub async fn convert_all(&self) -> Vec<ConversionResult> {
        vec![self.convert_detector().await, self.convert_classifier().await]
    }
}

/// Everything one `run` produced.
#[derive(Debug)]
pub struct PipelineSummary {
    pub conversions: Vec<ConversionResult>,
    pub labels: Result<ProvisionedLabels, PipelineError>,
    pub verification: VerificationReport,
}

impl PipelineSummary {
    /// True only when every conversion and the label step succeeded.
    pub fn is_success(&self) -> bool {
        self.conversions.iter().all(|c| c.success) && self.labels.is_ok()
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["=== Conversion ===".to_string()];
        lines.extend(self.conversions.iter().map(ConversionResult::summary_line));

        lines.push(String::new());
        lines.push("=== Labels ===".to_string());
        match &self.labels {
            Ok(labels) => lines.extend(labels.summary_lines()),
            Err(e) => lines.push(format!("[FAILED] labels: {} - {e}", e.kind())),
        }

        lines.push(String::new());
        lines.push(self.verification.render());

        lines.push(String::new());
        if self.is_success() {
            lines.push("All artifacts are ready for the mobile app.".to_string());
        } else {
            lines.push("Some artifacts could not be produced; see the failures above.".to_string());
        }
        lines.join("\n")
    }
}

/// Full pipeline: conversions, labels, then verification of the output directory.
pub async fn run_pipeline(
    config: &PipelineConfig,
    converter: &dyn ConversionBackend,
    remote: &dyn RemoteSource,
) -> PipelineSummary {
    let conversions = Orchestrator::new(config, converter, remote).convert_all().await;
    let labels = LabelProvisioner::new(config, remote).provision().await;
    if let Err(e) = &labels {
        tracing::warn!(error = %e, "Label provisioning failed");
    }
    let verification = VerificationReport::collect(config);

    PipelineSummary {
        conversions,
        labels,
        verification,
    }
}
