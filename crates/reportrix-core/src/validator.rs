// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markup validation
//!
//! Structural checks against [`REPORT_SCHEMA`] (known tags, attribute
//! rules, child cardinality, document-wide name uniqueness) followed by
//! business checks for the target render mode.

use crate::block::is_valid_name;
use crate::markup::{Content, Element};
use crate::schema::{ChildRule, Schema, REPORT_SCHEMA};
use crate::traits::{BuildError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How validation failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Return the first violation as an error
    Strict,
    /// Log the violation and return `false`
    Quiet,
}

/// Output the document is being prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Self-contained HTML file or string
    #[default]
    Embedded,
    /// Static directory build
    Served,
    /// Upload to a hosting service
    Upload,
}

impl RenderMode {
    pub const fn label(&self) -> &'static str {
        match self {
            RenderMode::Embedded => "embedded",
            RenderMode::Served => "served",
            RenderMode::Upload => "upload",
        }
    }

    /// Tags that need a live backend this mode cannot provide
    const fn unsupported_tags(&self) -> &'static [&'static str] {
        match self {
            RenderMode::Embedded | RenderMode::Served => &["Compute"],
            RenderMode::Upload => &[],
        }
    }
}

/// Schema validator for report markup
pub struct Validator {
    schema: &'static Schema,
    lenient_cardinality: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            schema: &REPORT_SCHEMA,
            lenient_cardinality: false,
        }
    }

    /// Log containers below their minimum child count instead of failing,
    /// for documents still being drafted
    pub fn lenient_cardinality(mut self, lenient: bool) -> Self {
        self.lenient_cardinality = lenient;
        self
    }

    /// Validate `root` structurally
    pub fn validate(&self, root: &Element, mode: ValidationMode) -> Result<bool> {
        match (self.check(root), mode) {
            (Ok(()), _) => Ok(true),
            (Err(err), ValidationMode::Quiet) => {
                tracing::debug!(error = %err, "markup failed validation");
                Ok(false)
            }
            (Err(err), ValidationMode::Strict) => Err(err),
        }
    }

    /// First structural violation, if any
    pub fn check(&self, root: &Element) -> Result<()> {
        if root.tag != self.schema.root() {
            return Err(BuildError::structural(
                format!("/{}", root.tag),
                format!("document root must be <{}>", self.schema.root()),
            ));
        }
        let mut names: HashMap<String, String> = HashMap::new();
        let mut first_error = None;
        root.walk_with_path(&mut |element, path| {
            if first_error.is_none() {
                if let Err(err) = self.check_element(element, path, &mut names) {
                    first_error = Some(err);
                }
            }
        });
        first_error.map_or(Ok(()), Err)
    }

    fn check_element(
        &self,
        element: &Element,
        path: &str,
        names: &mut HashMap<String, String>,
    ) -> Result<()> {
        let tag = element.tag.as_str();
        let rule = self
            .schema
            .rule(tag)
            .ok_or_else(|| BuildError::structural(path, format!("unknown element <{tag}>")))?;
        if tag == self.schema.root() && path != format!("/{tag}") {
            return Err(BuildError::structural(
                path,
                format!("<{tag}> may only appear as the document root"),
            ));
        }

        for key in rule.required {
            if element.attr(key).is_none() {
                return Err(BuildError::structural(
                    path,
                    format!("<{tag}> is missing required attribute '{key}'"),
                ));
            }
        }
        for (key, value) in &element.attributes {
            if !rule.allows_attribute(key) {
                return Err(BuildError::structural(
                    path,
                    format!("<{tag}> does not allow attribute '{key}'"),
                ));
            }
            if let Some((_, allowed)) = rule.choices.iter().find(|(name, _)| *name == key.as_str()) {
                if !allowed.contains(&value.as_str()) {
                    return Err(BuildError::structural(
                        path,
                        format!("attribute '{key}' must be one of {}", allowed.join(", ")),
                    ));
                }
            }
            if rule.numeric.contains(&key.as_str()) && value.parse::<u64>().is_err() {
                return Err(BuildError::structural(
                    path,
                    format!("attribute '{key}' must be a non-negative integer, got '{value}'"),
                ));
            }
        }

        match (rule.children, &element.content) {
            (ChildRule::Empty, Content::Children(children)) if children.is_empty() => {}
            (ChildRule::Empty, _) => {
                return Err(BuildError::structural(path, format!("<{tag}> must be empty")));
            }
            (ChildRule::Text, Content::Text(_)) => {}
            (ChildRule::Text, _) => {
                return Err(BuildError::structural(path, format!("<{tag}> requires text content")));
            }
            (ChildRule::Blocks { min }, Content::Children(children)) => {
                if children.len() < min && self.lenient_cardinality {
                    tracing::warn!(
                        location = path,
                        found = children.len(),
                        "<{tag}> requires at least {min} children"
                    );
                } else if children.len() < min {
                    return Err(BuildError::structural(
                        path,
                        format!(
                            "<{tag}> requires at least {min} children, found {}",
                            children.len()
                        ),
                    ));
                }
            }
            (ChildRule::Blocks { .. }, Content::Text(_)) => {
                return Err(BuildError::structural(
                    path,
                    format!("<{tag}> must contain blocks, not text"),
                ));
            }
        }

        if let Some(name) = element.attr("name") {
            if !is_valid_name(name) {
                return Err(BuildError::structural(path, format!("invalid name '{name}'")));
            }
            if let Some(first) = names.get(name) {
                return Err(BuildError::structural(
                    path,
                    format!("duplicate name '{name}', first used at {first}"),
                ));
            }
            names.insert(name.to_string(), path.to_string());
        }
        Ok(())
    }

    /// Checks on a structurally valid document for a specific output
    pub fn check_business(&self, root: &Element, render: RenderMode) -> Result<()> {
        if root.descendant_count() == 0 {
            return Err(BuildError::EmptyDocumentError);
        }
        let unsupported = render.unsupported_tags();
        let mut first_error = None;
        root.walk_with_path(&mut |element, path| {
            if first_error.is_none() && unsupported.contains(&element.tag.as_str()) {
                first_error = Some(BuildError::UnsupportedFeatureError {
                    kind: element.tag.clone(),
                    node: element.attr("name").unwrap_or(path).to_string(),
                    mode: render.label().to_string(),
                });
            }
        });
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
