// SPDX-License-Identifier: AGPL-3.0-or-later
//! Named pipelines declared in configuration
//!
//! ```toml
//! [[pipelines]]
//! name = "site"
//! store = "temp_file_gzip"
//! steps = [
//!     { type = "pre_process" },
//!     { type = "structural_rewrite" },
//!     { type = "convert", render = "served" },
//!     { type = "export_directory", path = "public/report" },
//! ]
//! ```

use crate::config::{CardinalityPolicy, ReportConfig};
use crate::export::{ExportDirectory, ExportInlineFile, ExportString, Exported, PageTemplate};
use crate::pipeline::Pipeline;
use crate::stages::{ConvertToMarkup, PreProcess, StructuralRewrite};
use crate::state::BuildState;
use crate::{PipelineError, Result};
use reportrix_core::{AssetStore, Document, EncoderRegistry, RenderMode, StoreVariant};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub store: StoreVariant,
    pub steps: Vec<PipelineStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineStep {
    /// Normalize the tree; `draft` only logs cardinality violations
    PreProcess {
        #[serde(default)]
        draft: bool,
    },
    /// Expand pages and collect compute blocks
    StructuralRewrite,
    /// Build and validate markup
    Convert {
        #[serde(default)]
        render: RenderMode,
        #[serde(default)]
        fragment: bool,
    },
    /// Self-contained HTML file
    ExportFile { path: PathBuf },
    /// `index.html` plus an assets directory
    ExportDirectory { path: PathBuf },
    /// Self-contained HTML returned as a string
    ExportString,
}

impl PipelineStep {
    fn is_export(&self) -> bool {
        matches!(
            self,
            PipelineStep::ExportFile { .. }
                | PipelineStep::ExportDirectory { .. }
                | PipelineStep::ExportString
        )
    }
}

impl PipelineDefinition {
    /// Steps must end in exactly one export, preceded by a conversion, over
    /// a store that keeps asset bodies
    fn check(&self) -> Result<()> {
        let invalid = |reason: &str| {
            PipelineError::InvalidConfig(format!("pipeline '{}' {reason}", self.name))
        };
        let (last, body) = self
            .steps
            .split_last()
            .ok_or_else(|| invalid("has no steps"))?;
        if !last.is_export() {
            return Err(invalid("must end with an export step"));
        }
        if self.store == StoreVariant::Discard {
            return Err(invalid("cannot export from a discard store"));
        }
        if body.iter().any(PipelineStep::is_export) {
            return Err(invalid("has an export step before the end"));
        }
        if !body
            .iter()
            .any(|step| matches!(step, PipelineStep::Convert { .. }))
        {
            return Err(invalid("has no convert step"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    pipelines: Vec<PipelineDefinition>,
}

/// Pipeline executor
pub struct PipelineExecutor {
    pipelines: HashMap<String, PipelineDefinition>,
    config: ReportConfig,
    encoders: Arc<EncoderRegistry>,
}

impl PipelineExecutor {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            config: ReportConfig::default(),
            encoders: Arc::new(EncoderRegistry::with_defaults()),
        }
    }

    /// Executor with every pipeline declared in `config`
    pub fn from_config(config: ReportConfig) -> Result<Self> {
        let mut executor = Self::new();
        for definition in config.pipelines.clone() {
            executor.register(definition)?;
        }
        executor.config = config;
        Ok(executor)
    }

    pub fn with_encoders(mut self, encoders: Arc<EncoderRegistry>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn register(&mut self, definition: PipelineDefinition) -> Result<()> {
        definition.check()?;
        tracing::debug!(pipeline = %definition.name, steps = definition.steps.len(), "registered pipeline");
        self.pipelines.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Load pipeline definitions from a TOML file
    pub fn load_pipelines(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let file: PipelineFile = toml::from_str(&content)?;
        let count = file.pipelines.len();
        for definition in file.pipelines {
            self.register(definition)?;
        }
        Ok(count)
    }

    pub fn pipeline_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute a pipeline on a document
    pub fn execute(&self, name: &str, document: Document) -> Result<Exported> {
        let definition = self
            .pipelines
            .get(name)
            .ok_or_else(|| PipelineError::PipelineNotFound(name.to_string()))?;
        let (last, body) = definition
            .steps
            .split_last()
            .ok_or_else(|| PipelineError::InvalidConfig(format!("pipeline '{name}' has no steps")))?;
        tracing::info!(pipeline = name, store = ?definition.store, "executing pipeline");

        let mut pipeline = Pipeline::new(BuildState::new(document, AssetStore::new(definition.store)));
        let mut markup = None;
        for step in body {
            pipeline = match step {
                PipelineStep::PreProcess { draft } => {
                    let mut stage = PreProcess::new(&self.config.preprocess);
                    if *draft {
                        stage.cardinality = CardinalityPolicy::Draft;
                    }
                    pipeline.pipe(stage)?
                }
                PipelineStep::StructuralRewrite => pipeline.pipe(StructuralRewrite)?,
                PipelineStep::Convert { render, fragment } => {
                    let stage = ConvertToMarkup::new(*render)
                        .with_encoders(Arc::clone(&self.encoders))
                        .fragment(*fragment)
                        .pretty(self.config.export.pretty_print);
                    let (state, root) = pipeline.pipe(stage)?.into_parts();
                    markup = Some(root);
                    Pipeline::new(state)
                }
                export => {
                    return Err(PipelineError::InvalidConfig(format!(
                        "pipeline '{name}' has {export:?} before the end"
                    )))
                }
            };
        }

        let root = markup.ok_or_else(|| {
            PipelineError::InvalidConfig(format!("pipeline '{name}' has no convert step"))
        })?;
        let (state, ()) = pipeline.into_parts();
        let converted = Pipeline::from_parts(state, root);
        let page = PageTemplate::from_config(&self.config);
        let exported = match last {
            PipelineStep::ExportFile { path } => converted.pipe(ExportInlineFile::new(path, page))?,
            PipelineStep::ExportDirectory { path } => converted
                .pipe(ExportDirectory::new(path, page).with_options(&self.config.export))?,
            PipelineStep::ExportString => converted.pipe(ExportString::new(page))?,
            other => {
                return Err(PipelineError::InvalidConfig(format!(
                    "pipeline '{name}' ends with {other:?} instead of an export"
                )))
            }
        };
        Ok(exported.finish())
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{extract_report_data, Artifact};
    use pretty_assertions::assert_eq;
    use reportrix_core::Block;
    use tempfile::tempdir;

    fn steps(export: PipelineStep) -> Vec<PipelineStep> {
        vec![
            PipelineStep::PreProcess { draft: false },
            PipelineStep::StructuralRewrite,
            PipelineStep::Convert {
                render: RenderMode::Embedded,
                fragment: false,
            },
            export,
        ]
    }

    fn document() -> Document {
        Document::new(vec![
            Block::page("One", vec![Block::text("first")]),
            Block::page("Two", vec![Block::text("second")]),
        ])
    }

    #[test]
    fn test_execute_string_pipeline() {
        let mut executor = PipelineExecutor::new();
        executor
            .register(PipelineDefinition {
                name: "preview".to_string(),
                store: StoreVariant::InMemoryBase64,
                steps: steps(PipelineStep::ExportString),
            })
            .unwrap();
        let exported = executor.execute("preview", document()).unwrap();
        let Artifact::Html(html) = exported.artifact else {
            panic!("expected an HTML artifact");
        };
        let data = extract_report_data(&html).unwrap();
        assert!(data.view_xml.contains("<Select type=\"tabs\">"));
    }

    #[test]
    fn test_execute_directory_pipeline_from_toml() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("site");
        let config = ReportConfig::from_toml_str(&format!(
            r#"
            name = "Site"

            [[pipelines]]
            name = "site"
            store = "temp_file_gzip"
            steps = [
                {{ type = "pre_process" }},
                {{ type = "structural_rewrite" }},
                {{ type = "convert", render = "served" }},
                {{ type = "export_directory", path = "{}" }},
            ]
            "#,
            out.display()
        ))
        .unwrap();
        let executor = PipelineExecutor::from_config(config).unwrap();
        assert_eq!(executor.pipeline_names(), vec!["site"]);
        let exported = executor.execute("site", document()).unwrap();
        assert_eq!(exported.artifact, Artifact::Directory(out.clone()));
        let html = std::fs::read_to_string(out.join("index.html")).unwrap();
        assert!(html.contains("<title>Site</title>"));
    }

    #[test]
    fn test_load_pipelines_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipelines.toml");
        std::fs::write(
            &path,
            r#"
            [[pipelines]]
            name = "a"
            steps = [{ type = "convert" }, { type = "export_string" }]

            [[pipelines]]
            name = "b"
            steps = [{ type = "convert", render = "upload" }, { type = "export_string" }]
            "#,
        )
        .unwrap();
        let mut executor = PipelineExecutor::new();
        assert_eq!(executor.load_pipelines(&path).unwrap(), 2);
        assert_eq!(executor.pipeline_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_stage_order_enforced_at_execution() {
        let mut executor = PipelineExecutor::new();
        executor
            .register(PipelineDefinition {
                name: "skip".to_string(),
                store: StoreVariant::InMemoryBase64,
                steps: vec![
                    PipelineStep::Convert {
                        render: RenderMode::Embedded,
                        fragment: false,
                    },
                    PipelineStep::ExportString,
                ],
            })
            .unwrap();
        let err = executor.execute("skip", document()).unwrap_err();
        assert!(matches!(err, PipelineError::StageOrder { stage: "ConvertToMarkup", .. }));
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let mut executor = PipelineExecutor::new();
        let no_export = PipelineDefinition {
            name: "bad".to_string(),
            store: StoreVariant::default(),
            steps: vec![PipelineStep::StructuralRewrite],
        };
        assert!(matches!(
            executor.register(no_export),
            Err(PipelineError::InvalidConfig(_))
        ));
        let no_convert = PipelineDefinition {
            name: "bad".to_string(),
            store: StoreVariant::default(),
            steps: vec![PipelineStep::ExportString],
        };
        assert!(executor.register(no_convert).is_err());
    }

    #[test]
    fn test_pipeline_not_found() {
        let executor = PipelineExecutor::new();
        assert!(matches!(
            executor.execute("missing", document()),
            Err(PipelineError::PipelineNotFound(_))
        ));
    }

    #[test]
    fn test_draft_pipeline_exports_short_containers() {
        let mut draft_steps = steps(PipelineStep::ExportString);
        draft_steps[0] = PipelineStep::PreProcess { draft: true };
        let mut executor = PipelineExecutor::new();
        executor
            .register(PipelineDefinition {
                name: "draft".to_string(),
                store: StoreVariant::InMemoryBase64,
                steps: draft_steps,
            })
            .unwrap();
        executor
            .register(PipelineDefinition {
                name: "final".to_string(),
                store: StoreVariant::InMemoryBase64,
                steps: steps(PipelineStep::ExportString),
            })
            .unwrap();

        let document = || Document::new(vec![Block::select(vec![Block::text("only")])]);
        assert!(executor.execute("draft", document()).is_ok());
        assert!(matches!(
            executor.execute("final", document()),
            Err(PipelineError::Build(_))
        ));
    }

    #[test]
    fn test_discard_store_rejected_for_every_export() {
        let dir = tempdir().unwrap();
        let exports = vec![
            PipelineStep::ExportFile {
                path: dir.path().join("report.html"),
            },
            PipelineStep::ExportDirectory {
                path: dir.path().join("site"),
            },
            PipelineStep::ExportString,
        ];
        let mut executor = PipelineExecutor::new();
        for export in exports {
            let definition = PipelineDefinition {
                name: "dry".to_string(),
                store: StoreVariant::Discard,
                steps: steps(export),
            };
            assert!(matches!(
                executor.register(definition),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
        assert!(executor.pipeline_names().is_empty());
        assert!(!dir.path().join("report.html").exists());
        assert!(!dir.path().join("site").exists());
    }

    #[test]
    fn test_discard_store_rejected_from_toml() {
        let config = ReportConfig::from_toml_str(
            r#"
            [[pipelines]]
            name = "dry"
            store = "discard"
            steps = [{ type = "convert" }, { type = "export_string" }]
            "#,
        )
        .unwrap();
        assert!(matches!(
            PipelineExecutor::from_config(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
