//! # wildsnap-ml: TFLite asset preparation for the WildSnap mobile app
//!
//! Acquires a pretrained detector (YOLOv8) and classifier (EfficientNetB0),
//! converts both to TFLite, writes the COCO and ImageNet label files, and
//! verifies the resulting output directory.
//!
//! ## Pipeline
//!
//! 1. **Conversion** ([`pipeline::Orchestrator`]): two independent
//!    sub-pipelines; one failing never stops the other.
//! 2. **Labels** ([`labels::LabelProvisioner`]): fixed COCO set plus a
//!    fetched (cached) ImageNet set with a synthetic fallback.
//! 3. **Verification** ([`report::VerificationReport`]): read-only sizes,
//!    header checks ([`validate`]) and label counts.
//!
//! External tools sit behind two traits, [`convert::ConversionBackend`] and
//! [`fetch::RemoteSource`], so runs can be driven without Python or network.

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod labels;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod runtime;
pub mod validate;

// Re-exports
pub use artifact::{ConversionResult, ModelArtifact, ModelFamily};
pub use config::{PipelineConfig, load_config};
pub use convert::{ConversionBackend, ConversionOptions, ConversionOutput, ModelSource, PythonConverter};
pub use error::PipelineError;
pub use fetch::{HttpSource, RemoteSource};
pub use labels::{LabelProvisioner, LabelSet, ProvisionedLabels};
pub use pipeline::{Orchestrator, PipelineSummary, run_pipeline};
pub use report::VerificationReport;
pub use runtime::PythonRuntime;
pub use validate::{SignatureMatch, ValidationVerdict, validate_artifact};
