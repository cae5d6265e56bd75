// SPDX-License-Identifier: AGPL-3.0-or-later
//! Exporters: self-contained HTML file, served directory, HTML string
//!
//! Every export embeds the same application data, a JSON object holding the
//! markup and the asset manifest, inside
//! `<script type="application/json" id="reportrix-data">`. Only the asset
//! references differ: data URIs for inline exports, relative paths for
//! directory builds.

use crate::config::{ExportConfig, Formatting, ReportConfig};
use crate::pipeline::Stage;
use crate::state::{BuildPhase, BuildState};
use crate::{PipelineError, Result};
use chrono::{SecondsFormat, Utc};
use reportrix_core::store::ASSETS_DIR;
use reportrix_core::{Element, Manifest};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Element id of the embedded application data
pub const DATA_SCRIPT_ID: &str = "reportrix-data";

const GZIP_SUFFIX: &str = ".gz";

/// Application data read by the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub view_xml: String,
    pub assets: Manifest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    File(PathBuf),
    Directory(PathBuf),
    Html(String),
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq)]
pub struct Exported {
    /// Random identifier stamped into the page
    pub report_id: String,
    pub artifact: Artifact,
}

/// Page title and styling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    pub name: String,
    pub formatting: Formatting,
}

impl PageTemplate {
    pub fn new(name: impl Into<String>, formatting: Formatting) -> Self {
        Self {
            name: name.into(),
            formatting,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.name.clone(), config.formatting.clone())
    }

    /// Full HTML page embedding `data`
    pub fn render(&self, data: &ReportData, report_id: &str) -> Result<String> {
        let json = serde_json::to_string(data)?;
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut output = String::new();

        output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        output.push_str("<meta charset=\"utf-8\">\n");
        output.push_str(&format!(
            "<title>{}</title>\n",
            html_escape::encode_text(&self.name)
        ));
        output.push_str("<meta name=\"generator\" content=\"reportrix\">\n");
        output.push_str(&format!(
            "<meta name=\"report-id\" content=\"{report_id}\">\n"
        ));
        output.push_str(&format!("<meta name=\"created\" content=\"{created}\">\n"));
        output.push_str("<style>\n");
        output.push_str(&self.formatting.to_css()?);
        output.push_str("\n</style>\n</head>\n");

        output.push_str(&format!(
            "<body class=\"{}\">\n",
            html_escape::encode_double_quoted_attribute(&self.formatting.body_classes())
        ));
        output.push_str("<div id=\"report\"></div>\n");
        output.push_str(&format!(
            "<script type=\"application/json\" id=\"{DATA_SCRIPT_ID}\">"
        ));
        output.push_str(&escape_json_for_html(&json));
        output.push_str("</script>\n</body>\n</html>\n");

        Ok(output)
    }
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

/// Escape characters that could end the script element early
///
/// The escapes are valid JSON, so the payload parses back unchanged.
fn escape_json_for_html(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\'' => escaped.push_str("\\u0027"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Read the application data back out of an exported page
pub fn extract_report_data(html: &str) -> Result<ReportData> {
    let marker = format!("id=\"{DATA_SCRIPT_ID}\">");
    let start = html
        .find(&marker)
        .map(|idx| idx + marker.len())
        .ok_or(PipelineError::MissingReportData)?;
    let len = html[start..]
        .find("</script>")
        .ok_or(PipelineError::MissingReportData)?;
    Ok(serde_json::from_str(&html[start..start + len])?)
}

fn new_report_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn view_xml(state: &BuildState, root: &Element) -> String {
    state
        .view_xml
        .clone()
        .unwrap_or_else(|| root.to_xml(false))
}

/// Page with every asset inlined as a data URI
fn render_inline(state: &BuildState, root: &Element, page: &PageTemplate) -> Result<(String, String)> {
    let data = ReportData {
        view_xml: view_xml(state, root),
        assets: state.store.manifest_with(|entry| entry.data_uri())?,
    };
    let report_id = new_report_id();
    let html = page.render(&data, &report_id)?;
    Ok((report_id, html))
}

/// Writes a single self-contained HTML file
#[derive(Debug, Clone)]
pub struct ExportInlineFile {
    path: PathBuf,
    page: PageTemplate,
}

impl ExportInlineFile {
    pub fn new(path: impl AsRef<Path>, page: PageTemplate) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            page,
        }
    }

    /// Write next to the target and rename over it once complete
    fn write_atomic(&self, html: &str) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(html.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl Stage<Element> for ExportInlineFile {
    type Output = Exported;

    fn name(&self) -> &'static str {
        "ExportInlineFile"
    }

    fn run(&self, mut state: BuildState, root: Element) -> Result<(BuildState, Exported)> {
        state.require_exportable(self.name())?;
        let (report_id, html) = render_inline(&state, &root, &self.page)?;
        self.write_atomic(&html)?;
        info!(path = %self.path.display(), assets = state.store.len(), "exported report");
        state.enter(BuildPhase::Exported);
        Ok((
            state,
            Exported {
                report_id,
                artifact: Artifact::File(self.path.clone()),
            },
        ))
    }
}

/// Returns the self-contained page as a string
#[derive(Debug, Clone, Default)]
pub struct ExportString {
    page: PageTemplate,
}

impl ExportString {
    pub fn new(page: PageTemplate) -> Self {
        Self { page }
    }
}

impl Stage<Element> for ExportString {
    type Output = Exported;

    fn name(&self) -> &'static str {
        "ExportString"
    }

    fn run(&self, mut state: BuildState, root: Element) -> Result<(BuildState, Exported)> {
        state.require_exportable(self.name())?;
        let (report_id, html) = render_inline(&state, &root, &self.page)?;
        debug!(bytes = html.len(), "rendered report string");
        state.enter(BuildPhase::Exported);
        Ok((
            state,
            Exported {
                report_id,
                artifact: Artifact::Html(html),
            },
        ))
    }
}

/// Writes `index.html` plus one file per asset under `assets/`
#[derive(Debug, Clone)]
pub struct ExportDirectory {
    dir: PathBuf,
    page: PageTemplate,
    compress_assets: bool,
    overwrite: bool,
}

impl ExportDirectory {
    pub fn new(dir: impl AsRef<Path>, page: PageTemplate) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            page,
            compress_assets: false,
            overwrite: false,
        }
    }

    pub fn with_options(mut self, options: &ExportConfig) -> Self {
        self.compress_assets = options.compress_assets;
        self.overwrite = options.overwrite;
        self
    }

    fn asset_suffix(&self) -> &'static str {
        if self.compress_assets {
            GZIP_SUFFIX
        } else {
            ""
        }
    }

    fn prepare_dir(&self) -> Result<()> {
        if self.dir.exists() {
            if !self.overwrite {
                return Err(PipelineError::AppExists(self.dir.clone()));
            }
            debug!(dir = %self.dir.display(), "replacing existing output");
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(self.dir.join(ASSETS_DIR))?;
        Ok(())
    }

    fn write_build(&self, state: &BuildState, root: &Element) -> Result<String> {
        let suffix = self.asset_suffix();
        for entry in state.store.entries() {
            let path = self
                .dir
                .join(ASSETS_DIR)
                .join(format!("{}{suffix}", entry.file_name()));
            let mut file = BufWriter::new(File::create(&path)?);
            entry.write_to(&mut file, self.compress_assets)?;
            file.flush()?;
        }

        let data = ReportData {
            view_xml: view_xml(state, root),
            assets: state
                .store
                .manifest_with(|entry| Ok(format!("{ASSETS_DIR}/{}{suffix}", entry.file_name())))?,
        };
        let report_id = new_report_id();
        fs::write(self.dir.join("index.html"), self.page.render(&data, &report_id)?)?;
        Ok(report_id)
    }
}

impl Stage<Element> for ExportDirectory {
    type Output = Exported;

    fn name(&self) -> &'static str {
        "ExportDirectory"
    }

    fn run(&self, mut state: BuildState, root: Element) -> Result<(BuildState, Exported)> {
        state.require_exportable(self.name())?;
        self.prepare_dir()?;
        let report_id = match self.write_build(&state, &root) {
            Ok(report_id) => report_id,
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&self.dir) {
                    warn!(dir = %self.dir.display(), error = %cleanup, "failed to remove partial build");
                }
                return Err(err);
            }
        };
        info!(
            dir = %self.dir.display(),
            assets = state.store.len(),
            compressed = self.compress_assets,
            "exported report directory"
        );
        state.enter(BuildPhase::Exported);
        Ok((
            state,
            Exported {
                report_id,
                artifact: Artifact::Directory(self.dir.clone()),
            },
        ))
    }
}
