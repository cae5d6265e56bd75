// SPDX-License-Identifier: AGPL-3.0-or-later
//! State carried through a build

use crate::config::CardinalityPolicy;
use crate::{PipelineError, Result};
use indexmap::IndexMap;
use reportrix_core::{AssetStore, Document, Element, FunctionRef, StoreVariant};

/// How far a build has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Raw,
    PreProcessed,
    StructurallyRewritten,
    Converted,
    Exported,
}

/// Document, asset store and intermediate products of one build
///
/// The state is owned by exactly one stage at a time. A failing stage drops
/// it, which releases every spooled asset file.
#[derive(Debug)]
pub struct BuildState {
    pub document: Document,
    pub store: AssetStore,
    /// Compute registrations keyed by function identifier
    pub functions: IndexMap<String, FunctionRef>,
    pub markup: Option<Element>,
    pub view_xml: Option<String>,
    phase: BuildPhase,
    cardinality: CardinalityPolicy,
    introspection: bool,
}

impl BuildState {
    pub fn new(document: Document, store: AssetStore) -> Self {
        Self {
            document,
            store,
            functions: IndexMap::new(),
            markup: None,
            view_xml: None,
            phase: BuildPhase::Raw,
            cardinality: CardinalityPolicy::Finalized,
            introspection: false,
        }
    }

    /// State for inspecting markup only: assets are discarded and the
    /// result can never be exported
    pub fn introspection(document: Document) -> Self {
        Self {
            introspection: true,
            ..Self::new(document, AssetStore::discard())
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn is_introspection(&self) -> bool {
        self.introspection
    }

    /// Policy the build was normalized under; later validation follows it
    pub fn cardinality(&self) -> CardinalityPolicy {
        self.cardinality
    }

    pub(crate) fn set_cardinality(&mut self, cardinality: CardinalityPolicy) {
        self.cardinality = cardinality;
    }

    /// Fail unless the build is in one of `expected`
    pub(crate) fn require(&self, stage: &'static str, expected: &[BuildPhase]) -> Result<()> {
        if expected.contains(&self.phase) {
            Ok(())
        } else {
            Err(PipelineError::StageOrder {
                stage,
                found: self.phase,
            })
        }
    }

    /// Exporters additionally refuse introspection builds and any build
    /// whose store discarded its asset bodies
    pub(crate) fn require_exportable(&self, stage: &'static str) -> Result<()> {
        if self.introspection {
            return Err(PipelineError::InvalidConfig(format!(
                "{stage} cannot export an introspection build"
            )));
        }
        if self.store.variant() == StoreVariant::Discard {
            return Err(PipelineError::InvalidConfig(format!(
                "{stage} cannot export from a discard store"
            )));
        }
        self.require(stage, &[BuildPhase::Converted])
    }

    pub(crate) fn enter(&mut self, next: BuildPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "build phase transition");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportrix_core::Block;

    #[test]
    fn test_new_state_is_raw() {
        let state = BuildState::new(Document::new(vec![Block::text("a")]), AssetStore::in_memory());
        assert_eq!(state.phase(), BuildPhase::Raw);
        assert!(!state.is_introspection());
        assert!(state.functions.is_empty());
        assert_eq!(state.cardinality(), CardinalityPolicy::Finalized);
    }

    #[test]
    fn test_introspection_uses_discard_store() {
        let state = BuildState::introspection(Document::new(Vec::new()));
        assert_eq!(state.store.variant(), StoreVariant::Discard);
        assert!(state.is_introspection());
    }

    #[test]
    fn test_require_reports_found_phase() {
        let state = BuildState::new(Document::new(Vec::new()), AssetStore::in_memory());
        let err = state.require("Export", &[BuildPhase::Converted]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageOrder {
                stage: "Export",
                found: BuildPhase::Raw
            }
        ));
    }

    #[test]
    fn test_introspection_never_exportable() {
        let mut state = BuildState::introspection(Document::new(Vec::new()));
        state.enter(BuildPhase::Converted);
        assert!(matches!(
            state.require_exportable("ExportString"),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_discard_store_never_exportable() {
        let mut state = BuildState::new(Document::new(vec![Block::text("a")]), AssetStore::discard());
        state.enter(BuildPhase::Converted);
        assert!(!state.is_introspection());
        assert!(matches!(
            state.require_exportable("ExportString"),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_converted_in_memory_build_is_exportable() {
        let mut state = BuildState::new(Document::new(vec![Block::text("a")]), AssetStore::in_memory());
        state.enter(BuildPhase::Converted);
        assert!(state.require_exportable("ExportString").is_ok());
    }
}
