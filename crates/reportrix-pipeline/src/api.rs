// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entry points for the common builds

use crate::config::{CardinalityPolicy, ReportConfig};
use crate::export::{Artifact, ExportDirectory, ExportInlineFile, ExportString, Exported, PageTemplate};
use crate::pipeline::Pipeline;
use crate::stages::{ConvertToMarkup, PreProcess, PreUpload, StructuralRewrite, UploadBundle};
use crate::state::BuildState;
use crate::{PipelineError, Result};
use reportrix_core::{AssetStore, Document, Element, RenderMode};
use std::path::Path;

/// Normalized, rewritten and converted build ready for an exporter
fn converted(
    document: Document,
    store: AssetStore,
    config: &ReportConfig,
    preprocess: PreProcess,
    render: RenderMode,
    fragment: bool,
) -> Result<Pipeline<Element>> {
    Pipeline::new(BuildState::new(document, store))
        .pipe(preprocess)?
        .pipe(StructuralRewrite)?
        .pipe(
            ConvertToMarkup::new(render)
                .fragment(fragment)
                .pretty(config.export.pretty_print),
        )
}

/// Save a self-contained HTML file with every asset inlined
pub fn save_report(document: Document, path: impl AsRef<Path>, config: &ReportConfig) -> Result<Exported> {
    let exported = converted(
        document,
        AssetStore::in_memory(),
        config,
        PreProcess::new(&config.preprocess),
        RenderMode::Embedded,
        false,
    )?
        .pipe(ExportInlineFile::new(path, PageTemplate::from_config(config)))?;
    Ok(exported.finish())
}

/// Build a static site: `index.html` plus an `assets/` directory
pub fn build_report(document: Document, dir: impl AsRef<Path>, config: &ReportConfig) -> Result<Exported> {
    let export = ExportDirectory::new(dir, PageTemplate::from_config(config)).with_options(&config.export);
    let exported = converted(
        document,
        AssetStore::temp_gzip(),
        config,
        PreProcess::new(&config.preprocess),
        RenderMode::Served,
        false,
    )?
        .pipe(export)?;
    Ok(exported.finish())
}

/// Render the report as an HTML fragment for embedding in another page
///
/// Previews are drafts: containers with too few children are logged, not
/// rejected.
pub fn stringify_report(document: Document, config: &ReportConfig) -> Result<String> {
    let preprocess = PreProcess {
        cardinality: CardinalityPolicy::Draft,
        ..PreProcess::new(&config.preprocess)
    };
    let exported = converted(document, AssetStore::in_memory(), config, preprocess, RenderMode::Embedded, true)?
        .pipe(ExportString::new(PageTemplate::from_config(config)))?
        .finish();
    match exported.artifact {
        Artifact::Html(html) => Ok(html),
        other => Err(PipelineError::InvalidConfig(format!(
            "string export produced {other:?}"
        ))),
    }
}

/// Markup and attachments for upload to a hosting service
pub fn prepare_upload(document: Document, config: &ReportConfig) -> Result<UploadBundle> {
    let bundle = converted(
        document,
        AssetStore::temp_gzip(),
        config,
        PreProcess::new(&config.preprocess),
        RenderMode::Upload,
        false,
    )?
        .pipe(PreUpload {
            pretty: config.export.pretty_print,
        })?;
    Ok(bundle.finish())
}

/// Markup for inspection, skipping normalization and export
///
/// Assets are hashed but not kept, and validation failures are only logged.
pub fn introspect(document: Document) -> Result<Element> {
    let converted = Pipeline::new(BuildState::introspection(document))
        .pipe(ConvertToMarkup::new(RenderMode::Upload).pretty(true))?;
    Ok(converted.finish())
}
