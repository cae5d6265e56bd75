// SPDX-License-Identifier: AGPL-3.0-or-later
//! Auxiliary tree visitors

use crate::block::{Container, Document, Leaf, LeafTag, Visitor};
use crate::traits::Result;
use indexmap::IndexMap;

/// A compute block registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub function_id: String,
    pub name: Option<String>,
    pub target: String,
    pub swap: Option<String>,
    pub trigger: Option<String>,
}

/// Collects every `Compute` block keyed by its function identifier
///
/// A repeated identifier replaces the earlier registration in place.
#[derive(Debug, Default)]
pub struct CollectFunctions {
    functions: IndexMap<String, FunctionRef>,
}

impl CollectFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_functions(self) -> IndexMap<String, FunctionRef> {
        self.functions
    }
}

impl Visitor for CollectFunctions {
    fn visit_leaf(&mut self, leaf: &mut Leaf) -> Result<()> {
        if leaf.tag() != LeafTag::Compute {
            return Ok(());
        }
        let attrs = leaf.attributes();
        let function_id = attrs.get("function_id").cloned().unwrap_or_default();
        if self.functions.contains_key(&function_id) {
            tracing::debug!(function_id = %function_id, "replacing compute registration");
        }
        let function = FunctionRef {
            function_id: function_id.clone(),
            name: leaf.name().map(str::to_string),
            target: attrs.get("target").cloned().unwrap_or_default(),
            swap: attrs.get("swap").cloned(),
            trigger: attrs.get("trigger").cloned(),
        };
        self.functions.insert(function_id, function);
        Ok(())
    }
}

/// Indented outline of a block tree, for debugging
#[derive(Debug, Default)]
pub struct TreePrinter {
    output: String,
    depth: usize,
}

impl TreePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `document` as an outline
    pub fn print(document: &mut Document) -> Result<String> {
        let mut printer = Self::new();
        document.accept(&mut printer)?;
        Ok(printer.output)
    }

    fn line(&mut self, tag: &str, name: Option<&str>, label: Option<&str>) {
        self.output.push_str(&"  ".repeat(self.depth));
        self.output.push_str(tag);
        match (name, label) {
            (Some(name), Some(label)) => self.output.push_str(&format!(" #{name} \"{label}\"")),
            (Some(name), None) => self.output.push_str(&format!(" #{name}")),
            (None, Some(label)) => self.output.push_str(&format!(" \"{label}\"")),
            (None, None) => {}
        }
        self.output.push('\n');
    }
}

impl Visitor for TreePrinter {
    fn visit_leaf(&mut self, leaf: &mut Leaf) -> Result<()> {
        self.line(leaf.tag().tag(), leaf.name(), leaf.label());
        Ok(())
    }

    fn enter_container(&mut self, container: &mut Container) -> Result<()> {
        self.line(container.tag().tag(), container.name(), container.label());
        self.depth += 1;
        Ok(())
    }

    fn leave_container(&mut self, _container: &mut Container) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, LeafBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collects_compute_blocks() {
        let mut doc = Document::new(vec![
            Block::text("intro"),
            Block::group(vec![Block::compute("app.1", "results").unwrap()]),
            Block::compute("app.2", "results").unwrap(),
        ]);
        let mut collector = CollectFunctions::new();
        doc.accept(&mut collector).unwrap();
        let functions = collector.into_functions();
        let ids: Vec<_> = functions.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["app.1", "app.2"]);
        assert_eq!(functions["app.1"].trigger.as_deref(), Some("submit"));
    }

    #[test]
    fn test_repeated_function_id_keeps_last_registration() {
        let mut doc = Document::new(vec![
            Block::compute("app.1", "a").unwrap(),
            Block::compute("app.2", "c").unwrap(),
            Block::compute("app.1", "b").unwrap(),
        ]);
        let mut collector = CollectFunctions::new();
        doc.accept(&mut collector).unwrap();
        let functions = collector.into_functions();
        let ids: Vec<_> = functions.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["app.1", "app.2"]);
        assert_eq!(functions["app.1"].target, "b");
    }

    #[test]
    fn test_tree_printer_outline() {
        let named = LeafBuilder::new(crate::block::LeafTag::Text)
            .name("intro")
            .content("hi")
            .build()
            .unwrap();
        let mut doc = Document::new(vec![Block::page("Overview", vec![named, Block::divider()])]);
        let outline = TreePrinter::print(&mut doc).unwrap();
        assert_eq!(outline, "View\n  _Page \"Overview\"\n    Text #intro\n    Text\n");
    }
}
