// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report configuration, loadable from TOML
//!
//! ```toml
//! name = "Quarterly results"
//!
//! [formatting]
//! accent_color = "#0F766E"
//! width = "full"
//!
//! [preprocess]
//! collapse = "single_column"
//! cardinality = "finalized"
//!
//! [export]
//! compress_assets = true
//! ```

use crate::executor::PipelineDefinition;
use crate::{PipelineError, Result};
use once_cell::sync::Lazy;
use reportrix_core::{Container, ContainerTag};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Colors, font stacks and similar plain CSS values
static CSS_VALUE_PATTERN: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r#"^[\w\s#%(),.'"+-]+$"#).unwrap());

/// Maximum page width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Width {
    Narrow,
    #[default]
    Medium,
    Full,
}

impl Width {
    pub const fn css_class(&self) -> &'static str {
        match self {
            Width::Narrow => "max-w-3xl",
            Width::Medium => "max-w-screen-xl",
            Width::Full => "max-w-full",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    #[default]
    Justify,
    Left,
    Right,
    Center,
}

impl TextAlignment {
    pub const fn label(&self) -> &'static str {
        match self {
            TextAlignment::Justify => "justify",
            TextAlignment::Left => "left",
            TextAlignment::Right => "right",
            TextAlignment::Center => "center",
        }
    }
}

/// Page styling embedded in exported HTML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formatting {
    pub bg_color: String,
    pub accent_color: String,
    pub font: String,
    pub text_alignment: TextAlignment,
    pub width: Width,
    /// Light text on a dark background
    pub light_prose: bool,
}

impl Default for Formatting {
    fn default() -> Self {
        Self {
            bg_color: "#FFF".to_string(),
            accent_color: "#4E46E5".to_string(),
            font: "Inter var, ui-sans-serif, system-ui".to_string(),
            text_alignment: TextAlignment::default(),
            width: Width::default(),
            light_prose: false,
        }
    }
}

impl Formatting {
    /// Reject values that could escape their CSS declaration
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("bg_color", &self.bg_color),
            ("accent_color", &self.accent_color),
            ("font", &self.font),
        ] {
            if !CSS_VALUE_PATTERN.is_match(value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "formatting.{field} is not a plain CSS value: {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// CSS custom properties for the viewer
    pub fn to_css(&self) -> Result<String> {
        self.validate()?;
        Ok(format!(
            ":root {{\n    --rx-accent-color: {};\n    --rx-bg-color: {};\n    --rx-text-align: {};\n    --rx-font-family: {};\n}}",
            self.accent_color,
            self.bg_color,
            self.text_alignment.label(),
            self.font
        ))
    }

    /// Classes applied to the page body
    pub fn body_classes(&self) -> String {
        let mut classes = self.width.css_class().to_string();
        if self.light_prose {
            classes.push_str(" prose-light");
        }
        classes
    }
}

/// Which containers flow their text children into one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapsePolicy {
    /// The root, pages, and groups with a single column
    #[default]
    SingleColumn,
    /// Keep every text leaf separate
    Never,
}

impl CollapsePolicy {
    pub fn collapses(&self, container: &Container, is_root: bool) -> bool {
        match self {
            CollapsePolicy::Never => false,
            CollapsePolicy::SingleColumn => {
                is_root
                    || match container.tag() {
                        ContainerTag::View | ContainerTag::Page => true,
                        ContainerTag::Group => matches!(container.columns(), None | Some(1)),
                        ContainerTag::Select | ContainerTag::Toggle => false,
                    }
            }
        }
    }
}

/// Whether container minimum-children violations fail the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityPolicy {
    /// Document under construction: violations are logged
    Draft,
    /// Document about to be exported: violations are errors
    #[default]
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub collapse: CollapsePolicy,
    pub cardinality: CardinalityPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Gzip asset files in directory builds
    pub compress_assets: bool,
    /// Replace an existing output directory
    pub overwrite: bool,
    /// Indent the embedded markup
    pub pretty_print: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub name: String,
    pub formatting: Formatting,
    pub preprocess: PreprocessConfig,
    pub export: ExportConfig,
    pub pipelines: Vec<PipelineDefinition>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: "Report".to_string(),
            formatting: Formatting::default(),
            preprocess: PreprocessConfig::default(),
            export: ExportConfig::default(),
            pipelines: Vec::new(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.formatting.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&input)?;
        tracing::debug!(path = %path.display(), pipelines = config.pipelines.len(), "loaded report config");
        Ok(config)
    }
}
