// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block tree to validated markup

use crate::config::CardinalityPolicy;
use crate::pipeline::Stage;
use crate::state::{BuildPhase, BuildState};
use crate::Result;
use reportrix_core::{Element, EncoderRegistry, RenderMode, ValidationMode, Validator, XmlBuilder};
use std::sync::Arc;
use tracing::debug;

/// Runs the markup visitor, then validates the result for `render`
///
/// Introspection builds may convert from any phase before conversion and
/// only log validation failures. Draft builds only log containers with too
/// few children.
#[derive(Clone)]
pub struct ConvertToMarkup {
    encoders: Arc<EncoderRegistry>,
    render: RenderMode,
    fragment: bool,
    pretty: bool,
}

impl ConvertToMarkup {
    pub fn new(render: RenderMode) -> Self {
        Self {
            encoders: Arc::new(EncoderRegistry::with_defaults()),
            render,
            fragment: false,
            pretty: false,
        }
    }

    pub fn with_encoders(mut self, encoders: Arc<EncoderRegistry>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Stage<()> for ConvertToMarkup {
    type Output = Element;

    fn name(&self) -> &'static str {
        "ConvertToMarkup"
    }

    fn run(&self, mut state: BuildState, _input: ()) -> Result<(BuildState, Element)> {
        let allowed: &[BuildPhase] = if state.is_introspection() {
            &[
                BuildPhase::Raw,
                BuildPhase::PreProcessed,
                BuildPhase::StructurallyRewritten,
            ]
        } else {
            &[BuildPhase::StructurallyRewritten]
        };
        state.require(self.name(), allowed)?;

        let root = XmlBuilder::new(&mut state.store, &self.encoders)
            .fragment(self.fragment)
            .build(&mut state.document)?;

        let validator = Validator::new()
            .lenient_cardinality(state.cardinality() == CardinalityPolicy::Draft);
        if state.is_introspection() {
            validator.validate(&root, ValidationMode::Quiet)?;
        } else {
            validator.validate(&root, ValidationMode::Strict)?;
            validator.check_business(&root, self.render)?;
        }

        let view_xml = root.to_xml(self.pretty);
        debug!(
            assets = state.store.len(),
            bytes = view_xml.len(),
            render = self.render.label(),
            "converted document to markup"
        );
        state.view_xml = Some(view_xml);
        state.markup = Some(root.clone());
        state.enter(BuildPhase::Converted);
        Ok((state, root))
    }
}
