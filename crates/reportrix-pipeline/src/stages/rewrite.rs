// SPDX-License-Identifier: AGPL-3.0-or-later
//! Page expansion and compute registration

use super::child_path;
use crate::pipeline::Stage;
use crate::state::{BuildPhase, BuildState};
use crate::Result;
use reportrix_core::{
    Block, BuildError, CollectFunctions, Container, ContainerBuilder, ContainerTag, Document,
};
use std::collections::HashMap;
use tracing::debug;

/// Replaces top-level pages with a tabbed selection of groups and collects
/// compute registrations
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralRewrite;

impl Stage<()> for StructuralRewrite {
    type Output = ();

    fn name(&self) -> &'static str {
        "StructuralRewrite"
    }

    fn run(&self, mut state: BuildState, _input: ()) -> Result<(BuildState, ())> {
        state.require(self.name(), &[BuildPhase::PreProcessed])?;
        expand_pages(&mut state.document)?;

        let mut collector = CollectFunctions::new();
        state.document.accept(&mut collector)?;
        state.functions = collector.into_functions();
        debug!(functions = state.functions.len(), "collected compute blocks");

        state.enter(BuildPhase::StructurallyRewritten);
        Ok((state, ()))
    }
}

fn expand_pages(document: &mut Document) -> Result<()> {
    let root = format!("/{}", ContainerTag::View.tag());
    reject_nested_pages(document.root(), &root)?;

    let blocks = document.blocks();
    let pages = blocks
        .iter()
        .filter(|b| b.is_container_of(ContainerTag::Page))
        .count();
    if pages == 0 {
        return Ok(());
    }
    if pages != blocks.len() {
        return Err(BuildError::structural(
            root,
            "pages cannot be mixed with other top-level blocks",
        )
        .into());
    }

    let groups = std::mem::take(document.blocks_mut())
        .into_iter()
        .map(page_to_group)
        .collect::<Result<Vec<_>>>()?;
    debug!(pages, "expanded pages");
    *document.blocks_mut() = if groups.len() == 1 {
        groups
    } else {
        vec![Block::select(groups)]
    };
    Ok(())
}

/// Pages are only valid as direct children of the root
fn reject_nested_pages(container: &Container, path: &str) -> Result<()> {
    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    for child in container.children() {
        if let Block::Container(inner) = child {
            let tag = inner.tag().tag();
            let index = seen.entry(tag).or_insert(0);
            *index += 1;
            let inner_path = child_path(path, tag, *index);
            if inner.tag() == ContainerTag::Page && container.tag() != ContainerTag::View {
                return Err(BuildError::structural(
                    inner_path,
                    "pages can only be used at the top level",
                )
                .into());
            }
            reject_nested_pages(inner, &inner_path)?;
        }
    }
    Ok(())
}

fn page_to_group(page: Block) -> Result<Block> {
    let page = match page {
        Block::Container(container) => container,
        Block::Leaf(leaf) => {
            return Err(BuildError::structural(
                format!("/View/{}", leaf.tag().tag()),
                "expected a page",
            )
            .into())
        }
    };
    let mut builder = ContainerBuilder::new(ContainerTag::Group);
    if let Some(name) = page.name() {
        builder = builder.name(name);
    }
    if let Some(label) = page.label() {
        builder = builder.label(label);
    }
    Ok(builder.children(page.into_children()).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;
    use pretty_assertions::assert_eq;
    use reportrix_core::AssetStore;

    fn rewrite(blocks: Vec<Block>) -> Result<BuildState> {
        let mut state = BuildState::new(Document::new(blocks), AssetStore::in_memory());
        state.enter(BuildPhase::PreProcessed);
        StructuralRewrite.run(state, ()).map(|(state, ())| state)
    }

    fn structural_location(err: PipelineError) -> String {
        match err {
            PipelineError::Build(BuildError::StructuralError { location, .. }) => location,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pages_become_tabs() {
        let state = rewrite(vec![
            Block::page("Summary", vec![Block::text("a")]),
            Block::page("Detail", vec![Block::text("b"), Block::text("c")]),
        ])
        .unwrap();
        let blocks = state.document.blocks();
        assert_eq!(blocks.len(), 1);
        let select = blocks[0].as_container().unwrap();
        assert_eq!(select.tag(), ContainerTag::Select);
        assert_eq!(select.attributes().get("type").map(String::as_str), Some("tabs"));
        let labels: Vec<_> = select
            .children()
            .iter()
            .map(|b| b.as_container().unwrap().label().unwrap().to_string())
            .collect();
        assert_eq!(labels, vec!["Summary", "Detail"]);
        assert_eq!(select.children()[1].as_container().unwrap().children().len(), 2);
        assert_eq!(state.phase(), BuildPhase::StructurallyRewritten);
    }

    #[test]
    fn test_single_page_unwraps_to_group() {
        let state = rewrite(vec![Block::page("Only", vec![Block::text("a")])]).unwrap();
        let group = state.document.blocks()[0].as_container().unwrap();
        assert_eq!(group.tag(), ContainerTag::Group);
        assert_eq!(group.label(), Some("Only"));
    }

    #[test]
    fn test_document_without_pages_unchanged() {
        let state = rewrite(vec![Block::text("a"), Block::group(vec![Block::text("b")])]).unwrap();
        assert_eq!(state.document.blocks().len(), 2);
    }

    #[test]
    fn test_mixed_pages_rejected() {
        let err = rewrite(vec![Block::page("P", vec![Block::text("a")]), Block::text("b")])
            .unwrap_err();
        assert_eq!(structural_location(err), "/View");
    }

    #[test]
    fn test_nested_page_rejected() {
        let err = rewrite(vec![Block::group(vec![Block::page("P", vec![Block::text("a")])])])
            .unwrap_err();
        assert_eq!(structural_location(err), "/View/Group[1]/_Page[1]");
    }

    #[test]
    fn test_collects_functions() {
        let state = rewrite(vec![
            Block::compute("app.submit", "results").unwrap(),
            Block::group(vec![Block::compute("app.refresh", "chart").unwrap()]),
        ])
        .unwrap();
        let ids: Vec<_> = state.functions.keys().cloned().collect();
        assert_eq!(ids, vec!["app.submit", "app.refresh"]);
    }
}
