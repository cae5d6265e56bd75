// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reportrix Pipeline - Staged document builds and exporters
//!
//! A build moves a [`BuildState`] through an ordered chain of stages:
//! - PreProcess: normalize the tree (toggle wrapping, text runs, cardinality)
//! - StructuralRewrite: pages into tabbed groups, compute registrations
//! - ConvertToMarkup: markup, assets and validation
//! - Export: a single HTML file, a served directory, a string, or an upload bundle
//!
//! Named pipelines can also be declared in TOML and run by [`PipelineExecutor`].

pub mod api;
pub mod config;
pub mod executor;
pub mod export;
pub mod pipeline;
pub mod stages;
pub mod state;

use reportrix_core::BuildError;
use std::path::PathBuf;
use thiserror::Error;

pub use api::{build_report, introspect, prepare_upload, save_report, stringify_report};
pub use config::{
    CardinalityPolicy, CollapsePolicy, ExportConfig, Formatting, PreprocessConfig, ReportConfig,
    TextAlignment, Width,
};
pub use executor::{PipelineDefinition, PipelineExecutor, PipelineStep};
pub use export::{
    extract_report_data, Artifact, ExportDirectory, ExportInlineFile, ExportString, Exported,
    PageTemplate, ReportData,
};
pub use pipeline::{Pipeline, Stage};
pub use stages::{ConvertToMarkup, PreProcess, PreUpload, StructuralRewrite, UploadBundle};
pub use state::{BuildPhase, BuildState};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Stage {stage} cannot run on a document in phase {found:?}")]
    StageOrder { stage: &'static str, found: BuildPhase },

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Output already exists: {0}")]
    AppExists(PathBuf),

    #[error("No report data found in HTML")]
    MissingReportData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
