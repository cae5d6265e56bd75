// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixed schema for report markup

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// What an element may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRule {
    /// No text and no children
    Empty,
    /// Text content only
    Text,
    /// Block elements, at least `min` of them
    Blocks { min: usize },
}

/// Rules for one element tag
#[derive(Debug, Clone, Copy)]
pub struct ElementRule {
    pub children: ChildRule,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// Attributes restricted to a fixed set of values
    pub choices: &'static [(&'static str, &'static [&'static str])],
    /// Attributes that must be non-negative integers
    pub numeric: &'static [&'static str],
}

impl ElementRule {
    const fn new(children: ChildRule) -> Self {
        Self {
            children,
            required: &[],
            optional: &["name", "label"],
            choices: &[],
            numeric: &[],
        }
    }

    const fn required(mut self, required: &'static [&'static str]) -> Self {
        self.required = required;
        self
    }

    const fn optional(mut self, optional: &'static [&'static str]) -> Self {
        self.optional = optional;
        self
    }

    const fn choices(mut self, choices: &'static [(&'static str, &'static [&'static str])]) -> Self {
        self.choices = choices;
        self
    }

    const fn numeric(mut self, numeric: &'static [&'static str]) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn allows_attribute(&self, key: &str) -> bool {
        self.required.contains(&key) || self.optional.contains(&key)
    }
}

const BOOL: &[&str] = &["true", "false"];
const ASSET: &[&str] = &["src", "type"];

/// Tag to rule table
#[derive(Debug)]
pub struct Schema {
    root: &'static str,
    rules: HashMap<&'static str, ElementRule>,
}

/// The report markup schema
pub static REPORT_SCHEMA: Lazy<Schema> = Lazy::new(Schema::report);

impl Schema {
    fn report() -> Self {
        let rules = [
            (
                "View",
                ElementRule::new(ChildRule::Blocks { min: 0 })
                    .required(&["version"])
                    .optional(&["fragment"])
                    .choices(&[("fragment", BOOL)]),
            ),
            (
                "Group",
                ElementRule::new(ChildRule::Blocks { min: 1 })
                    .optional(&["name", "label", "columns", "valign"])
                    .choices(&[("valign", &["top", "center", "bottom"])])
                    .numeric(&["columns"]),
            ),
            (
                "Select",
                ElementRule::new(ChildRule::Blocks { min: 2 })
                    .optional(&["name", "label", "type"])
                    .choices(&[("type", &["tabs", "dropdown"])]),
            ),
            ("Toggle", ElementRule::new(ChildRule::Blocks { min: 1 })),
            ("Text", ElementRule::new(ChildRule::Text)),
            (
                "Code",
                ElementRule::new(ChildRule::Text).optional(&["name", "label", "language", "caption"]),
            ),
            ("HTML", ElementRule::new(ChildRule::Text)),
            (
                "Formula",
                ElementRule::new(ChildRule::Text).optional(&["name", "label", "caption"]),
            ),
            (
                "Embed",
                ElementRule::new(ChildRule::Text)
                    .optional(&["name", "label", "width", "height"])
                    .numeric(&["width", "height"]),
            ),
            (
                "BigNumber",
                ElementRule::new(ChildRule::Empty)
                    .required(&["heading", "value"])
                    .optional(&[
                        "name",
                        "label",
                        "change",
                        "prev_value",
                        "is_positive_intent",
                        "is_upward_change",
                    ])
                    .choices(&[("is_positive_intent", BOOL), ("is_upward_change", BOOL)]),
            ),
            (
                "Empty",
                ElementRule::new(ChildRule::Empty)
                    .required(&["name"])
                    .optional(&["label"]),
            ),
            ("Media", asset_rule(&["name", "label", "caption"])),
            ("Attachment", asset_rule(&["name", "label", "caption", "filename"])),
            ("Plot", asset_rule(&["name", "label", "caption", "scale", "responsive"])),
            ("Table", asset_rule(&["name", "label", "caption"])),
            (
                "DataTable",
                asset_rule(&["name", "label", "caption", "rows", "columns"])
                    .numeric(&["rows", "columns"]),
            ),
            (
                "Compute",
                ElementRule::new(ChildRule::Empty)
                    .required(&["function_id", "target"])
                    .optional(&["name", "label", "swap", "trigger", "timer", "submit_label"])
                    .choices(&[
                        ("swap", &["replace", "inner", "append", "prepend"]),
                        ("trigger", &["submit", "change", "schedule", "mount"]),
                    ])
                    .numeric(&["timer"]),
            ),
        ];
        Self {
            root: "View",
            rules: rules.into_iter().collect(),
        }
    }

    /// Tag of the document root
    pub fn root(&self) -> &'static str {
        self.root
    }

    pub fn rule(&self, tag: &str) -> Option<&ElementRule> {
        self.rules.get(tag)
    }

    /// Whether `tag` may appear below the root
    pub fn is_block(&self, tag: &str) -> bool {
        tag != self.root && self.rules.contains_key(tag)
    }
}

const fn asset_rule(optional: &'static [&'static str]) -> ElementRule {
    ElementRule::new(ChildRule::Empty)
        .required(ASSET)
        .optional(optional)
}
