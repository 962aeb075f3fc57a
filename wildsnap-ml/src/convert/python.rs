//! Python-backed conversion: ultralytics for the detector, the TFLite
//! converter for the classifier.

use super::{ConversionBackend, ConversionOptions, ConversionOutput, ModelSource};
use crate::error::PipelineError;
use crate::runtime::PythonRuntime;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

const DETECTOR_SCRIPT: &str = r#"
import json, sys
params = json.load(sys.stdin)
try:
    from ultralytics import YOLO
except ImportError:
    sys.stderr.write("ultralytics is not installed\n")
    sys.exit(2)
model = YOLO(params["checkpoint"])
out = model.export(
    format="tflite",
    imgsz=params["imgsz"],
    int8=params["int8"],
    simplify=params["simplify"],
)
print(json.dumps({"output": str(out)}))
"#;

const CLASSIFIER_SCRIPT: &str = r#"
import json, sys
params = json.load(sys.stdin)
try:
    import tensorflow as tf
except ImportError:
    sys.stderr.write("tensorflow is not installed\n")
    sys.exit(2)
src = params["source"]
kind = src["type"]
if kind == "keras_file":
    converter = tf.lite.TFLiteConverter.from_keras_model(tf.keras.models.load_model(src["path"]))
elif kind == "saved_model":
    converter = tf.lite.TFLiteConverter.from_saved_model(src["path"])
elif kind == "pretrained":
    arch = getattr(tf.keras.applications, src["architecture"])
    converter = tf.lite.TFLiteConverter.from_keras_model(arch(weights=src["weights"], include_top=True))
else:
    sys.stderr.write("unsupported source type: %s\n" % kind)
    sys.exit(3)
if params["optimize_default"]:
    converter.optimizations = [tf.lite.Optimize.DEFAULT]
if params["float32_only"]:
    converter.target_spec.supported_types = [tf.float32]
blob = converter.convert()
with open(params["output"], "wb") as f:
    f.write(blob)
print(json.dumps({"output": params["output"], "bytes": len(blob)}))
"#;

/// [`ConversionBackend`] running the exporters through [`PythonRuntime`].
pub struct PythonConverter {
    runtime: PythonRuntime,
}

impl PythonConverter {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self { runtime }
    }

    async fn export_detector(
        &self,
        checkpoint: &Path,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, PipelineError> {
        let result = self
            .runtime
            .run_script(DETECTOR_SCRIPT, detector_params(checkpoint, options), None)
            .await
            .map_err(PipelineError::into_conversion)?;
        let reported = reported_output(&result)?;
        // Relative paths are relative to the script's working directory.
        Ok(ConversionOutput::File(self.runtime.work_dir().join(reported)))
    }

    async fn convert_classifier(
        &self,
        source: &ModelSource,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, PipelineError> {
        let scratch = tempfile::Builder::new().prefix("wildsnap-").tempdir()?;
        let output = scratch.path().join("model.tflite");

        self.runtime
            .run_script(
                CLASSIFIER_SCRIPT,
                classifier_params(source, options, &output)?,
                None,
            )
            .await
            .map_err(PipelineError::into_conversion)?;

        let blob = tokio::fs::read(&output).await.map_err(|e| {
            PipelineError::conversion(format!("converter wrote no output at {}: {e}", output.display()))
        })?;
        Ok(ConversionOutput::Blob(blob))
    }
}

#[async_trait]
impl ConversionBackend for PythonConverter {
    async fn convert(
        &self,
        source: &ModelSource,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, PipelineError> {
        tracing::info!(family = %source.family(), ?options, "Starting TFLite export");
        match source {
            ModelSource::Checkpoint { path } => self.export_detector(path, options).await,
            _ => self.convert_classifier(source, options).await,
        }
    }
}

fn detector_params(checkpoint: &Path, options: &ConversionOptions) -> Value {
    json!({
        "checkpoint": checkpoint,
        "imgsz": options.image_size.unwrap_or(640),
        "int8": options.int8,
        "simplify": options.simplify,
    })
}

fn classifier_params(
    source: &ModelSource,
    options: &ConversionOptions,
    output: &Path,
) -> Result<Value, PipelineError> {
    Ok(json!({
        "source": serde_json::to_value(source)?,
        "output": output,
        "optimize_default": options.optimize_default,
        "float32_only": options.float32_only,
    }))
}

fn reported_output(result: &Value) -> Result<PathBuf, PipelineError> {
    result
        .get("output")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| PipelineError::conversion(format!("exporter reported no output path: {result}")))
}
