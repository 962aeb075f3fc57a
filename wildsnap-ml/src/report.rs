//! Read-only verification of the output directory.
//!
//! Collecting and rendering a report never touches the files it inspects,
//! so two reports over an unchanged directory render identically.

use crate::artifact::{ModelArtifact, ModelFamily};
use crate::config::PipelineConfig;
use crate::labels::LabelSetName;
use crate::validate::{ValidationVerdict, validate_artifact};
use std::path::{Path, PathBuf};

/// Model file check.
#[derive(Debug, Clone)]
pub struct ArtifactCheck {
    pub family: ModelFamily,
    pub path: PathBuf,
    pub artifact: Option<ModelArtifact>,
    pub verdict: Option<ValidationVerdict>,
    /// Set when the file exists but its header could not be read.
    pub read_error: Option<String>,
}

impl ArtifactCheck {
    pub fn inspect(path: &Path, family: ModelFamily) -> Self {
        let artifact = ModelArtifact::inspect(path, family);
        let (verdict, read_error) = match &artifact {
            None => (None, None),
            Some(_) => match validate_artifact(path) {
                Ok(v) => (Some(v), None),
                Err(e) => (None, Some(e.to_string())),
            },
        };
        Self {
            family,
            path: path.to_path_buf(),
            artifact,
            verdict,
            read_error,
        }
    }

    /// Present and readable. A header without a signature still passes.
    pub fn passed(&self) -> bool {
        self.artifact.is_some() && self.read_error.is_none()
    }

    pub fn render(&self) -> String {
        let label = format!("{} ({})", self.family.model_name(), self.path.display());
        match (&self.artifact, &self.verdict, &self.read_error) {
            (None, _, _) => format!("[MISSING] {label}: not found"),
            (Some(a), _, Some(err)) => {
                format!("[ERROR] {label}: {:.2} MB, unreadable: {err}", a.size_mb())
            }
            (Some(a), Some(v), None) => {
                let tag = if v.looks_valid { "[OK]" } else { "[WARN]" };
                format!(
                    "{tag} {label}: {:.2} MB, header {}, {}",
                    a.size_mb(),
                    v.raw_header_hex,
                    v.describe()
                )
            }
            (Some(a), None, None) => format!("[OK] {label}: {:.2} MB", a.size_mb()),
        }
    }
}

/// Label file check.
#[derive(Debug, Clone)]
pub struct LabelCheck {
    pub name: LabelSetName,
    pub path: PathBuf,
    pub line_count: Option<usize>,
}

impl LabelCheck {
    pub fn inspect(path: &Path, name: LabelSetName) -> Self {
        let line_count = std::fs::read(path)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).lines().count());
        Self {
            name,
            path: path.to_path_buf(),
            line_count,
        }
    }

    pub fn passed(&self) -> bool {
        self.line_count.is_some()
    }

    pub fn render(&self) -> String {
        match self.line_count {
            Some(n) => format!("[OK] {} labels ({}): {n} classes", self.name, self.path.display()),
            None => format!("[MISSING] {} labels ({}): not found", self.name, self.path.display()),
        }
    }
}

/// Snapshot of every expected output file.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub artifacts: Vec<ArtifactCheck>,
    pub labels: Vec<LabelCheck>,
}

impl VerificationReport {
    pub fn collect(config: &PipelineConfig) -> Self {
        Self {
            artifacts: vec![
                ArtifactCheck::inspect(&config.detector_output(), ModelFamily::Detector),
                ArtifactCheck::inspect(&config.classifier_output(), ModelFamily::Classifier),
            ],
            labels: vec![
                LabelCheck::inspect(&config.coco_labels_path(), LabelSetName::Coco),
                LabelCheck::inspect(&config.imagenet_labels_path(), LabelSetName::Imagenet),
            ],
        }
    }

    pub fn all_passed(&self) -> bool {
        self.artifacts.iter().all(ArtifactCheck::passed) && self.labels.iter().all(LabelCheck::passed)
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["=== Verification ===".to_string()];
        lines.extend(self.artifacts.iter().map(ArtifactCheck::render));
        lines.extend(self.labels.iter().map(LabelCheck::render));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> PipelineConfig {
        PipelineConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_directory_reports_missing() {
        let dir = TempDir::new().unwrap();
        let report = VerificationReport::collect(&config_in(&dir));
        assert!(!report.all_passed());
        let text = report.render();
        assert_eq!(text.matches("[MISSING]").count(), 4);
    }

    #[test]
    fn test_artifact_line_format() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let mut body = vec![0x1c, 0, 0, 0];
        body.extend_from_slice(b"TFL3");
        body.resize(2 * 1024 * 1024, 0);
        std::fs::write(config.detector_output(), &body).unwrap();

        let check = ArtifactCheck::inspect(&config.detector_output(), ModelFamily::Detector);
        assert!(check.passed());
        assert_eq!(
            check.render(),
            format!(
                "[OK] YOLOv8 ({}): 2.00 MB, header 1c00000054464c33, valid TFLite model (TFL3)",
                config.detector_output().display()
            )
        );
    }

    #[test]
    fn test_unsigned_model_is_warning_not_failure() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(config.classifier_output(), b"\x00\x01\x02\x03\x04\x05\x06\x07").unwrap();

        let check = ArtifactCheck::inspect(&config.classifier_output(), ModelFamily::Classifier);
        assert!(check.passed());
        assert!(check.render().starts_with("[WARN]"));
    }

    #[test]
    fn test_label_line_count() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(config.coco_labels_path(), "person\nbicycle\ncar").unwrap();

        let check = LabelCheck::inspect(&config.coco_labels_path(), LabelSetName::Coco);
        assert_eq!(check.line_count, Some(3));
        assert!(check.render().ends_with(": 3 classes"));
    }

    #[test]
    fn test_render_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(config.detector_output(), b"\0\0\0\0TFL3rest").unwrap();
        std::fs::write(config.imagenet_labels_path(), "tench\ngoldfish").unwrap();

        let first = VerificationReport::collect(&config).render();
        let second = VerificationReport::collect(&config).render();
        assert_eq!(first, second);
    }
}
