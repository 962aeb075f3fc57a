//! Pipeline configuration.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment. The resulting
//! [`PipelineConfig`] is built once at the CLI boundary and passed by
//! reference to every pipeline component.

use crate::error::PipelineError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Placeholder replaced by the checkpoint file stem in
/// [`DetectorConfig::intermediate_path`].
pub const STEM_PLACEHOLDER: &str = "{stem}";

/// Top-level configuration for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory receiving the final model and label files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Working directory for the external conversion tools.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Cache for downloaded checkpoints and label lists.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            work_dir: default_work_dir(),
            cache_dir: default_cache_dir(),
            detector: DetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            labels: LabelsConfig::default(),
            python: PythonConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Make every relative path absolute with respect to `workspace`.
    pub fn resolve_paths(mut self, workspace: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { workspace.join(p) };
        self.output_dir = anchor(self.output_dir);
        self.work_dir = anchor(self.work_dir);
        self.cache_dir = anchor(self.cache_dir);
        self.detector.checkpoint = self.detector.checkpoint.map(anchor);
        self.classifier.model = self.classifier.model.map(anchor);
        self.python.python_path = self.python.python_path.map(|p| {
            // Bare executable names are looked up on PATH.
            if p.components().count() > 1 {
                anchor(p)
            } else {
                p
            }
        });
        self.python.venv_path = self.python.venv_path.map(anchor);
        self
    }

    pub fn detector_output(&self) -> PathBuf {
        self.output_dir.join(&self.detector.output_file)
    }

    pub fn classifier_output(&self) -> PathBuf {
        self.output_dir.join(&self.classifier.output_file)
    }

    pub fn coco_labels_path(&self) -> PathBuf {
        self.output_dir.join(&self.labels.coco_file)
    }

    pub fn imagenet_labels_path(&self) -> PathBuf {
        self.output_dir.join(&self.labels.imagenet_file)
    }

    /// Reject values the exporters or the output layout cannot work with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let detector = &self.detector;
        if detector.image_size == 0 || detector.image_size % 32 != 0 {
            return Err(PipelineError::Config(format!(
                "detector.image_size must be a positive multiple of 32, got {}",
                detector.image_size
            )));
        }
        if detector.intermediate_path.trim().is_empty() {
            return Err(PipelineError::Config(
                "detector.intermediate_path must not be empty".into(),
            ));
        }

        let files = [
            ("detector.output_file", &detector.output_file),
            ("classifier.output_file", &self.classifier.output_file),
            ("labels.coco_file", &self.labels.coco_file),
            ("labels.imagenet_file", &self.labels.imagenet_file),
        ];
        for (key, name) in files {
            if name.trim().is_empty() {
                return Err(PipelineError::Config(format!("{key} must not be empty")));
            }
        }
        for (i, (key, name)) in files.iter().enumerate() {
            if let Some((other, _)) = files[..i].iter().find(|(_, n)| n == name) {
                return Err(PipelineError::Config(format!(
                    "{key} and {other} both point at {name}"
                )));
            }
        }

        if self.python.timeout_secs == 0 || self.network.timeout_secs == 0 {
            return Err(PipelineError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

/// Detector (YOLO) sub-pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Local checkpoint to convert. When unset the canonical checkpoint is downloaded.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    /// File name of the canonical pretrained checkpoint.
    #[serde(default = "default_checkpoint_name")]
    pub checkpoint_name: String,
    /// Download URL of the canonical checkpoint.
    #[serde(default = "default_checkpoint_url")]
    pub checkpoint_url: String,
    /// Square input resolution passed to the exporter.
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// Request int8 quantization. Off: the mobile runtime needs float32.
    #[serde(default)]
    pub int8: bool,
    /// Request graph simplification.
    #[serde(default = "default_true")]
    pub simplify: bool,
    /// Where the exporter deposits its output, relative to the checkpoint's
    /// directory. `{stem}` is replaced by the checkpoint file stem. The leading
    /// directory is removed after relocation only when it contains `{stem}`.
    #[serde(default = "default_intermediate_path")]
    pub intermediate_path: String,
    #[serde(default = "default_detector_output")]
    pub output_file: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            checkpoint: None,
            checkpoint_name: default_checkpoint_name(),
            checkpoint_url: default_checkpoint_url(),
            image_size: default_image_size(),
            int8: false,
            simplify: true,
            intermediate_path: default_intermediate_path(),
            output_file: default_detector_output(),
        }
    }
}

/// Resolved location of the exporter's intermediate output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateOutput {
    /// The file the exporter is expected to have written.
    pub file: PathBuf,
    /// Top-level directory created by the exporter, removed after relocation.
    pub cleanup_root: Option<PathBuf>,
}

impl DetectorConfig {
    /// Resolve [`Self::intermediate_path`] for the given checkpoint.
    pub fn intermediate_output(&self, checkpoint: &Path) -> IntermediateOutput {
        let stem = checkpoint
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = PathBuf::from(self.intermediate_path.replace(STEM_PLACEHOLDER, &stem));
        let base = match checkpoint.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if relative.is_absolute() {
            return IntermediateOutput {
                file: relative,
                cleanup_root: None,
            };
        }

        // Only a leading directory named after the checkpoint was created by
        // the exporter; anything else may be a user directory.
        let template = Path::new(&self.intermediate_path);
        let exporter_owned = match template.components().next() {
            Some(Component::Normal(first)) => first.to_string_lossy().contains(STEM_PLACEHOLDER),
            _ => false,
        };
        let cleanup_root = match relative.components().next() {
            Some(Component::Normal(first))
                if exporter_owned && relative.components().count() > 1 =>
            {
                Some(base.join(first))
            }
            _ => None,
        };

        IntermediateOutput {
            file: base.join(relative),
            cleanup_root,
        }
    }
}

/// Classifier (EfficientNet) sub-pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// `.h5`/`.keras` file or SavedModel directory. When unset the pretrained
    /// architecture below is instantiated by the converter.
    #[serde(default)]
    pub model: Option<PathBuf>,
    /// `tf.keras.applications` architecture name.
    #[serde(default = "default_architecture")]
    pub architecture: String,
    #[serde(default = "default_weights")]
    pub weights: String,
    /// Apply the converter's default optimization set.
    #[serde(default = "default_true")]
    pub optimize_default: bool,
    /// Restrict supported types to float32.
    #[serde(default = "default_true")]
    pub float32_only: bool,
    #[serde(default = "default_classifier_output")]
    pub output_file: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: None,
            architecture: default_architecture(),
            weights: default_weights(),
            optimize_default: true,
            float32_only: true,
            output_file: default_classifier_output(),
        }
    }
}

/// Label file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Newline-delimited ImageNet label list.
    #[serde(default = "default_imagenet_url")]
    pub imagenet_url: String,
    /// Name of the cached copy inside the cache directory.
    #[serde(default = "default_imagenet_cache_file")]
    pub imagenet_cache_file: String,
    #[serde(default = "default_coco_file")]
    pub coco_file: String,
    #[serde(default = "default_imagenet_file")]
    pub imagenet_file: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            imagenet_url: default_imagenet_url(),
            imagenet_cache_file: default_imagenet_cache_file(),
            coco_file: default_coco_file(),
            imagenet_file: default_imagenet_file(),
        }
    }
}

/// Python runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Path to Python executable (`python3` on PATH if not set).
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    /// Virtual environment to run from.
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Upper bound for a single conversion call (seconds).
    #[serde(default = "default_python_timeout")]
    pub timeout_secs: u64,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            venv_path: None,
            timeout_secs: default_python_timeout(),
        }
    }
}

/// HTTP configuration for checkpoint and label downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_timeout")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_network_timeout(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "wildsnap", "wildsnap")
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".wildsnap").join("cache"))
}

fn default_checkpoint_name() -> String {
    "yolov8n.pt".to_string()
}

fn default_checkpoint_url() -> String {
    "https://github.com/ultralytics/assets/releases/download/v8.1.0/yolov8n.pt".to_string()
}

fn default_image_size() -> u32 {
    640
}

fn default_intermediate_path() -> String {
    "{stem}_saved_model/{stem}_float32.tflite".to_string()
}

fn default_detector_output() -> String {
    "deteccion.tflite".to_string()
}

fn default_architecture() -> String {
    "EfficientNetB0".to_string()
}

fn default_weights() -> String {
    "imagenet".to_string()
}

fn default_classifier_output() -> String {
    "clasificacion.tflite".to_string()
}

fn default_imagenet_url() -> String {
    "https://storage.googleapis.com/download.tensorflow.org/data/ImageNetLabels.txt".to_string()
}

fn default_imagenet_cache_file() -> String {
    "ImageNetLabels.txt".to_string()
}

fn default_coco_file() -> String {
    "coco_labels.txt".to_string()
}

fn default_imagenet_file() -> String {
    "imagenet_labels.txt".to_string()
}

fn default_python_timeout() -> u64 {
    1800
}

fn default_network_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Workspace-level config file location.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".wildsnap").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `WILDSNAP_`, `__` for nesting)
/// 2. Explicit config file (`--config`)
/// 3. Workspace-local config (`.wildsnap/config.toml`)
/// 4. User config (`~/.config/wildsnap/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "wildsnap", "wildsnap") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    // WILDSNAP_DETECTOR__IMAGE_SIZE, WILDSNAP_OUTPUT_DIR, ...
    figment = figment.merge(Env::prefixed("WILDSNAP_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("assets"));
        assert_eq!(config.detector.image_size, 640);
        assert!(!config.detector.int8);
        assert!(config.detector.simplify);
        assert!(config.classifier.optimize_default);
        assert!(config.classifier.float32_only);
        assert_eq!(config.detector_output(), PathBuf::from("assets/deteccion.tflite"));
        assert_eq!(
            config.classifier_output(),
            PathBuf::from("assets/clasificacion.tflite")
        );
        assert_eq!(config.coco_labels_path(), PathBuf::from("assets/coco_labels.txt"));
        assert_eq!(
            config.imagenet_labels_path(),
            PathBuf::from("assets/imagenet_labels.txt")
        );
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_ok());

        let mut config = PipelineConfig::default();
        config.detector.image_size = 600;
        assert_eq!(config.validate().unwrap_err().kind(), "ConfigError");

        let mut config = PipelineConfig::default();
        config.classifier.output_file = "deteccion.tflite".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detector.output_file"));

        let mut config = PipelineConfig::default();
        config.python.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_intermediate_output_default_template() {
        let detector = DetectorConfig::default();
        let resolved = detector.intermediate_output(Path::new("/models/yolov8n.pt"));
        assert_eq!(
            resolved.file,
            PathBuf::from("/models/yolov8n_saved_model/yolov8n_float32.tflite")
        );
        assert_eq!(
            resolved.cleanup_root,
            Some(PathBuf::from("/models/yolov8n_saved_model"))
        );
    }

    #[test]
    fn test_intermediate_output_bare_checkpoint_name() {
        let detector = DetectorConfig::default();
        let resolved = detector.intermediate_output(Path::new("yolov8s.pt"));
        assert_eq!(
            resolved.file,
            PathBuf::from("./yolov8s_saved_model/yolov8s_float32.tflite")
        );
    }

    #[test]
    fn test_intermediate_output_flat_template_has_no_cleanup() {
        let detector = DetectorConfig {
            intermediate_path: "{stem}.tflite".into(),
            ..Default::default()
        };
        let resolved = detector.intermediate_output(Path::new("/m/best.pt"));
        assert_eq!(resolved.file, PathBuf::from("/m/best.tflite"));
        assert_eq!(resolved.cleanup_root, None);
    }

    #[test]
    fn test_intermediate_output_fixed_directory_is_never_cleaned() {
        let detector = DetectorConfig {
            intermediate_path: "exports/{stem}.tflite".into(),
            ..Default::default()
        };
        let resolved = detector.intermediate_output(Path::new("/m/best.pt"));
        assert_eq!(resolved.file, PathBuf::from("/m/exports/best.tflite"));
        assert_eq!(resolved.cleanup_root, None);
    }

    #[test]
    fn test_resolve_paths_anchors_relative_entries() {
        let mut config = PipelineConfig::default();
        config.cache_dir = PathBuf::from("cache");
        config.classifier.model = Some(PathBuf::from("models/effnet.keras"));
        config.detector.checkpoint = Some(PathBuf::from("/abs/yolo.pt"));

        let config = config.resolve_paths(Path::new("/ws"));
        assert_eq!(config.output_dir, PathBuf::from("/ws/assets"));
        assert_eq!(config.cache_dir, PathBuf::from("/ws/cache"));
        assert_eq!(
            config.classifier.model,
            Some(PathBuf::from("/ws/models/effnet.keras"))
        );
        assert_eq!(config.detector.checkpoint, Some(PathBuf::from("/abs/yolo.pt")));
    }

    #[test]
    fn test_resolve_paths_keeps_bare_python_name() {
        let mut config = PipelineConfig::default();
        config.python.python_path = Some(PathBuf::from("python3.11"));
        let config = config.resolve_paths(Path::new("/ws"));
        assert_eq!(config.python.python_path, Some(PathBuf::from("python3.11")));
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = TempDir::new().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "output_dir = \"flutter/assets\"\n\n[detector]\nimage_size = 320\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("flutter/assets"));
        assert_eq!(config.detector.image_size, 320);
        assert_eq!(config.detector.checkpoint_name, "yolov8n.pt");
    }

    #[test]
    fn test_explicit_file_overrides_workspace() {
        let dir = TempDir::new().unwrap();
        let ws_path = workspace_config_path(dir.path());
        std::fs::create_dir_all(ws_path.parent().unwrap()).unwrap();
        std::fs::write(&ws_path, "[classifier]\narchitecture = \"EfficientNetB1\"\n").unwrap();

        let explicit = dir.path().join("ci.toml");
        std::fs::write(&explicit, "[classifier]\narchitecture = \"MobileNetV2\"\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.classifier.architecture, "MobileNetV2");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = PipelineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.detector.intermediate_path, config.detector.intermediate_path);
        assert_eq!(parsed.labels.imagenet_url, config.labels.imagenet_url);
    }
}
