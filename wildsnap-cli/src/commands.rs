//! CLI subcommand handlers.
//!
//! Every handler returns `Ok(false)` when the work ran but something it
//! produced or inspected is missing or failed; `main` turns that into a
//! non-zero exit status.

use crate::Commands;
use crate::ConfigAction;
use dialoguer::Input;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wildsnap_ml::config::workspace_config_path;
use wildsnap_ml::{
    HttpSource, LabelProvisioner, ModelArtifact, ModelFamily, Orchestrator, PipelineConfig,
    PythonConverter, PythonRuntime, VerificationReport, run_pipeline, validate_artifact,
};

/// Invocation-wide settings gathered from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub config_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Context {
    /// Layered config with CLI overrides applied and paths anchored at the workspace.
    pub fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config =
            wildsnap_ml::load_config(Some(&self.workspace), self.config_file.as_deref())
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        config.validate()?;
        Ok(config.resolve_paths(&self.workspace))
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<bool> {
    match command {
        Commands::Run => handle_run(ctx).await,
        Commands::Convert {
            detector,
            classifier,
        } => handle_convert(ctx, detector, classifier).await,
        Commands::Labels => handle_labels(ctx).await,
        Commands::Check => handle_check(ctx),
        Commands::Verify => handle_verify(ctx),
        Commands::Config { action } => handle_config(action, ctx).await,
    }
}

fn http_source(config: &PipelineConfig) -> anyhow::Result<HttpSource> {
    Ok(HttpSource::new(Duration::from_secs(
        config.network.timeout_secs,
    ))?)
}

fn python_converter(config: &PipelineConfig) -> PythonConverter {
    PythonConverter::new(PythonRuntime::from_config(
        &config.python,
        config.work_dir.clone(),
    ))
}

async fn handle_run(ctx: &Context) -> anyhow::Result<bool> {
    let config = ctx.load_config()?;
    let remote = http_source(&config)?;
    let converter = python_converter(&config);

    tracing::info!(output_dir = %config.output_dir.display(), "Starting pipeline");
    let summary = run_pipeline(&config, &converter, &remote).await;
    println!("{}", summary.render());
    Ok(summary.is_success())
}

async fn handle_convert(
    ctx: &Context,
    detector: Option<PathBuf>,
    classifier: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let mut config = ctx.load_config()?;
    let interactive = std::io::stdin().is_terminal();

    let detector = match detector {
        Some(path) => Some(path),
        None if interactive => prompt_path("YOLOv8 checkpoint (.pt, empty to download)")?,
        None => None,
    };
    let classifier = match classifier {
        Some(path) => Some(path),
        None if interactive => {
            prompt_path("Classifier (.h5/.keras or SavedModel dir, empty for pretrained)")?
        }
        None => None,
    };

    if let Some(path) = detector {
        config.detector.checkpoint = Some(std::path::absolute(path)?);
    }
    if let Some(path) = classifier {
        config.classifier.model = Some(std::path::absolute(path)?);
    }

    let remote = http_source(&config)?;
    let converter = python_converter(&config);
    let results = Orchestrator::new(&config, &converter, &remote)
        .convert_all()
        .await;

    for result in &results {
        println!("{}", result.summary_line());
    }
    Ok(results.iter().all(|r| r.success))
}

/// Ask for an optional path. Empty input means "use the default source".
fn prompt_path(prompt: &str) -> anyhow::Result<Option<PathBuf>> {
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let trimmed = answer.trim();
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}

async fn handle_labels(ctx: &Context) -> anyhow::Result<bool> {
    let config = ctx.load_config()?;
    let remote = http_source(&config)?;

    match LabelProvisioner::new(&config, &remote).provision().await {
        Ok(labels) => {
            for line in labels.summary_lines() {
                println!("{line}");
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("[FAILED] labels: {} - {e}", e.kind());
            Ok(false)
        }
    }
}

fn handle_check(ctx: &Context) -> anyhow::Result<bool> {
    let config = ctx.load_config()?;
    let mut all_present = true;

    for (family, path) in [
        (ModelFamily::Detector, config.detector_output()),
        (ModelFamily::Classifier, config.classifier_output()),
    ] {
        all_present &= check_model(family, &path);
    }
    Ok(all_present)
}

/// Print the header check for one model. False when the file is absent or unreadable.
fn check_model(family: ModelFamily, path: &Path) -> bool {
    println!("{} ({})", family.model_name(), path.display());

    let Some(artifact) = ModelArtifact::inspect(path, family) else {
        println!("  [MISSING] file not found");
        return false;
    };
    println!(
        "  Size: {} bytes ({:.2} MB)",
        artifact.size_bytes,
        artifact.size_mb()
    );

    match validate_artifact(path) {
        Ok(verdict) => {
            println!("  Header hex: {}", verdict.raw_header_hex);
            println!("  Verdict: {}", verdict.describe());
            if let Some(note) = verdict.advisory() {
                println!("  Note: {note}");
            }
            true
        }
        Err(e) => {
            println!("  [ERROR] could not read header: {e}");
            false
        }
    }
}

fn handle_verify(ctx: &Context) -> anyhow::Result<bool> {
    let config = ctx.load_config()?;
    let report = VerificationReport::collect(&config);
    println!("{}", report.render());
    Ok(report.all_passed())
}

async fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<bool> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(&ctx.workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(true);
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&PipelineConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(true)
        }
        ConfigAction::Show => {
            let config = ctx.load_config()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(true)
        }
    }
}
