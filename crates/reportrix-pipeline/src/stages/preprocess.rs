// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tree normalization before any structural rewrite

use super::child_path;
use crate::config::{CardinalityPolicy, CollapsePolicy, PreprocessConfig};
use crate::pipeline::Stage;
use crate::state::{BuildPhase, BuildState};
use crate::Result;
use reportrix_core::{Block, BuildError, Container, ContainerTag};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Wraps multi-child toggles, merges text runs and enforces container
/// cardinality
#[derive(Debug, Clone, Copy, Default)]
pub struct PreProcess {
    pub collapse: CollapsePolicy,
    pub cardinality: CardinalityPolicy,
}

impl PreProcess {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            collapse: config.collapse,
            cardinality: config.cardinality,
        }
    }

    pub fn finalized() -> Self {
        Self::default()
    }

    /// Log cardinality violations instead of failing
    pub fn draft() -> Self {
        Self {
            cardinality: CardinalityPolicy::Draft,
            ..Self::default()
        }
    }

    fn normalize(
        &self,
        container: &mut Container,
        path: &str,
        is_root: bool,
        merged: &mut usize,
    ) -> Result<()> {
        if container.tag() == ContainerTag::Toggle && container.children().len() > 1 {
            let children = std::mem::take(container.children_mut());
            container.children_mut().push(Block::group(children));
        }

        let mut seen: HashMap<&'static str, usize> = HashMap::new();
        for child in container.children_mut().iter_mut() {
            if let Block::Container(inner) = child {
                let tag = inner.tag().tag();
                let index = seen.entry(tag).or_insert(0);
                *index += 1;
                self.normalize(inner, &child_path(path, tag, *index), false, merged)?;
            }
        }

        if self.collapse.collapses(container, is_root) {
            *merged += container.merge_text_runs();
        }

        let min = container.tag().min_children();
        let found = container.children().len();
        if !is_root && found < min {
            let message = format!(
                "{} requires at least {min} children, found {found}",
                container.tag().tag()
            );
            match self.cardinality {
                CardinalityPolicy::Finalized => {
                    return Err(BuildError::structural(path, message).into());
                }
                CardinalityPolicy::Draft => warn!(location = path, "{message}"),
            }
        }
        Ok(())
    }
}

impl Stage<()> for PreProcess {
    type Output = ();

    fn name(&self) -> &'static str {
        "PreProcess"
    }

    fn run(&self, mut state: BuildState, _input: ()) -> Result<(BuildState, ())> {
        state.require(self.name(), &[BuildPhase::Raw])?;
        if state.document.is_empty() {
            match self.cardinality {
                CardinalityPolicy::Finalized => return Err(BuildError::EmptyDocumentError.into()),
                CardinalityPolicy::Draft => warn!("document has no blocks"),
            }
        }

        let mut merged = 0;
        let root_path = format!("/{}", ContainerTag::View.tag());
        self.normalize(state.document.root_mut(), &root_path, true, &mut merged)?;
        debug!(merged, "normalized document");

        state.set_cardinality(self.cardinality);
        state.enter(BuildPhase::PreProcessed);
        Ok((state, ()))
    }
}
