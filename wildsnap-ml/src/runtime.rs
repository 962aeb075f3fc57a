//! Python runtime manager for the external conversion tools.
//!
//! The exporters (ultralytics, TensorFlow Lite) only exist as Python
//! libraries, so conversions run as managed subprocesses: parameters go in as
//! JSON on stdin, the result comes back as JSON on the last stdout line, and
//! every call is bounded by a timeout.

use crate::config::PythonConfig;
use crate::error::PipelineError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Managed Python subprocess runner.
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl PythonRuntime {
    /// Create a runtime using `python3` from PATH.
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            python_path: PathBuf::from("python3"),
            venv_path: None,
            work_dir,
            timeout: Duration::from_secs(1800),
        }
    }

    pub fn from_config(config: &PythonConfig, work_dir: PathBuf) -> Self {
        Self {
            python_path: config
                .python_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("python3")),
            venv_path: config.venv_path.clone(),
            work_dir,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn work_dir(&self) -> &std::path::Path {
        &self.work_dir
    }

    /// Get the Python command to use (venv python if available).
    fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Run an inline Python script with JSON input/output.
    ///
    /// The script receives `input` as JSON on stdin and must print its result
    /// as JSON on the last non-empty stdout line; exporters are chatty, so
    /// earlier lines are ignored.
    pub async fn run_script(
        &self,
        script: &str,
        input: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, PipelineError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let input_json = serde_json::to_string(&input)?;

        debug!(script_len = script.len(), python = %self.python_cmd().display(), "Running Python script");

        let result = tokio::time::timeout(timeout, async {
            let mut child = Command::new(self.python_cmd())
                .args(["-c", script])
                .current_dir(&self.work_dir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| PipelineError::Python(format!("Failed to spawn Python: {e}")))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input_json.as_bytes())
                    .await
                    .map_err(|e| PipelineError::Python(format!("Failed to write stdin: {e}")))?;
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| PipelineError::Python(format!("Failed to wait for Python: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(PipelineError::Python(format!(
                    "Python script failed ({}): {}",
                    output.status,
                    last_lines(&stderr, 5)
                )));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            parse_last_json_line(&stdout)
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(PipelineError::Timeout(format!(
                "Python script timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Parse the last non-empty line of `stdout` as JSON (`Null` when empty).
pub(crate) fn parse_last_json_line(stdout: &str) -> Result<serde_json::Value, PipelineError> {
    match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
        None => Ok(serde_json::Value::Null),
        Some(line) => serde_json::from_str(line.trim())
            .map_err(|e| PipelineError::Python(format!("Invalid JSON output: {e}"))),
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_json_line_skips_progress_output() {
        let stdout = "Ultralytics 8.1.0\nexport: starting...\n{\"output\": \"a/b.tflite\"}\n\n";
        let value = parse_last_json_line(stdout).unwrap();
        assert_eq!(value["output"], "a/b.tflite");
    }

    #[test]
    fn test_parse_last_json_line_empty() {
        assert_eq!(parse_last_json_line("\n  \n").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_parse_last_json_line_garbage() {
        let err = parse_last_json_line("done").unwrap_err();
        assert!(matches!(err, PipelineError::Python(_)));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\n\nc\n", 2), "b\nc");
        assert_eq!(last_lines("only", 5), "only");
    }

    #[test]
    fn test_venv_python_cmd() {
        let config = PythonConfig {
            python_path: None,
            venv_path: Some(PathBuf::from("/opt/venv")),
            timeout_secs: 10,
        };
        let runtime = PythonRuntime::from_config(&config, PathBuf::from("."));
        let expected = if cfg!(windows) {
            PathBuf::from("/opt/venv/Scripts/python")
        } else {
            PathBuf::from("/opt/venv/bin/python")
        };
        assert_eq!(runtime.python_cmd(), expected);
    }

    #[tokio::test]
    async fn test_run_script_roundtrip() {
        // Python may or may not be available in CI.
        let runtime = PythonRuntime::new(std::env::temp_dir());
        let script = "import json, sys\nd = json.load(sys.stdin)\nprint('noise')\nprint(json.dumps({'echo': d['x']}))";
        let result = runtime
            .run_script(script, serde_json::json!({ "x": 3 }), None)
            .await;
        if let Ok(value) = result {
            assert_eq!(value["echo"], 3);
        }
    }

    #[tokio::test]
    async fn test_run_script_timeout() {
        let runtime = PythonRuntime::new(std::env::temp_dir());
        let result = runtime
            .run_script(
                "import time\ntime.sleep(10)",
                serde_json::Value::Null,
                Some(Duration::from_millis(200)),
            )
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Timeout(_)) | Err(PipelineError::Python(_))
        ));
    }
}
