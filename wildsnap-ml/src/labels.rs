//! Label files consumed by the mobile app at inference time.
//!
//! Two sets are written: the fixed 80 COCO categories used by the detector,
//! and the ImageNet list used by the classifier. The ImageNet list is fetched
//! remotely (with caching) and falls back to a synthetic `class_<i>` list so
//! the file always has a known cardinality.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::{FetchOrigin, RemoteSource, fetch_lines_cached};
use crate::persistence::atomic_write;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The 80 COCO detection categories, in class-index order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake",
    "chair", "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop",
    "mouse", "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Size of the synthetic ImageNet fallback.
pub const SYNTHETIC_LABEL_COUNT: usize = 1000;

/// Leading sentinel some ImageNet lists carry at index 0.
pub const BACKGROUND_LABEL: &str = "background";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSetName {
    Coco,
    Imagenet,
}

impl fmt::Display for LabelSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coco => write!(f, "COCO"),
            Self::Imagenet => write!(f, "ImageNet"),
        }
    }
}

/// Where a label set's entries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrigin {
    Builtin,
    Remote,
    Cache,
    Synthetic,
}

impl From<FetchOrigin> for LabelOrigin {
    fn from(origin: FetchOrigin) -> Self {
        match origin {
            FetchOrigin::Remote => Self::Remote,
            FetchOrigin::Cache => Self::Cache,
        }
    }
}

/// An ordered label list; position is the class index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    pub name: LabelSetName,
    pub labels: Vec<String>,
    pub origin: LabelOrigin,
}

impl LabelSet {
    pub fn count(&self) -> usize {
        self.labels.len()
    }

    /// Newline-joined file body (no trailing newline).
    pub fn to_file_contents(&self) -> String {
        self.labels.join("\n")
    }

    pub fn write_to(&self, path: &Path) -> Result<(), PipelineError> {
        atomic_write(path, self.to_file_contents().as_bytes())?;
        tracing::debug!(set = %self.name, count = self.count(), path = %path.display(), "Wrote labels");
        Ok(())
    }
}

/// Label sets as written by [`LabelProvisioner::provision`].
#[derive(Debug, Clone)]
pub struct ProvisionedLabels {
    pub coco: LabelSet,
    pub coco_path: PathBuf,
    pub imagenet: LabelSet,
    pub imagenet_path: PathBuf,
}

impl ProvisionedLabels {
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "[OK] {} labels: {} classes -> {}",
                self.coco.name,
                self.coco.count(),
                self.coco_path.display()
            ),
            format!(
                "[OK] {} labels: {} classes ({:?}) -> {}",
                self.imagenet.name,
                self.imagenet.count(),
                self.imagenet.origin,
                self.imagenet_path.display()
            ),
        ]
    }
}

pub fn coco_label_set() -> LabelSet {
    LabelSet {
        name: LabelSetName::Coco,
        labels: COCO_LABELS.iter().map(|s| s.to_string()).collect(),
        origin: LabelOrigin::Builtin,
    }
}

/// `class_0` .. `class_{n-1}`.
pub fn synthetic_labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("class_{i}")).collect()
}

/// Drop a leading [`BACKGROUND_LABEL`] so indices cover real classes only.
pub fn strip_background(mut labels: Vec<String>) -> Vec<String> {
    if labels.first().is_some_and(|l| l == BACKGROUND_LABEL) {
        labels.remove(0);
    }
    labels
}

/// Writes the COCO and ImageNet label files.
pub struct LabelProvisioner<'a> {
    config: &'a PipelineConfig,
    remote: &'a dyn RemoteSource,
}

impl<'a> LabelProvisioner<'a> {
    pub fn new(config: &'a PipelineConfig, remote: &'a dyn RemoteSource) -> Self {
        Self { config, remote }
    }

    /// Resolve the ImageNet set. Network failures never escape: they select
    /// the synthetic fallback instead.
    pub async fn imagenet_label_set(&self) -> LabelSet {
        let labels_cfg = &self.config.labels;
        let cache_path = self.config.cache_dir.join(&labels_cfg.imagenet_cache_file);

        let (labels, origin) =
            match fetch_lines_cached(
                self.remote,
                &labels_cfg.imagenet_url,
                &cache_path,
                strip_background,
            )
            .await
            {
                Ok((lines, origin)) => (lines, origin.into()),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        url = %labels_cfg.imagenet_url,
                        "ImageNet labels unavailable, using synthetic list"
                    );
                    (synthetic_labels(SYNTHETIC_LABEL_COUNT), LabelOrigin::Synthetic)
                }
            };

        LabelSet {
            name: LabelSetName::Imagenet,
            labels,
            origin,
        }
    }

    /// Write both label files into the output directory.
    pub async fn provision(&self) -> Result<ProvisionedLabels, PipelineError> {
        let coco = coco_label_set();
        let coco_path = self.config.coco_labels_path();
        coco.write_to(&coco_path)?;

        let imagenet = self.imagenet_label_set().await;
        let imagenet_path = self.config.imagenet_labels_path();
        imagenet.write_to(&imagenet_path)?;

        tracing::info!(
            coco = coco.count(),
            imagenet = imagenet.count(),
            origin = ?imagenet.origin,
            "Label files written"
        );

        Ok(ProvisionedLabels {
            coco,
            coco_path,
            imagenet,
            imagenet_path,
        })
    }
}
