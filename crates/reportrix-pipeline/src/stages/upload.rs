// SPDX-License-Identifier: AGPL-3.0-or-later
//! Upload preparation

use crate::pipeline::Stage;
use crate::state::{BuildPhase, BuildState};
use crate::Result;
use reportrix_core::store::REF_SCHEME;
use reportrix_core::{BuildError, Element, FrozenEntry, FunctionRef};
use tracing::debug;

/// Scheme for positional attachment references in uploaded markup
pub const ATTACHMENT_SCHEME: &str = "attachment://";

/// Markup and files ready to send to a hosting service
///
/// Attachment `i` is referenced as `attachment://i`. The entries keep their
/// spooled files alive until the bundle is dropped.
#[derive(Debug, Clone)]
pub struct UploadBundle {
    pub view_xml: String,
    pub attachments: Vec<FrozenEntry>,
    pub functions: Vec<FunctionRef>,
}

/// Rewrites asset references to attachment indices in document order
#[derive(Debug, Clone, Copy, Default)]
pub struct PreUpload {
    pub pretty: bool,
}

impl Stage<Element> for PreUpload {
    type Output = UploadBundle;

    fn name(&self) -> &'static str {
        "PreUpload"
    }

    fn run(&self, mut state: BuildState, mut root: Element) -> Result<(BuildState, UploadBundle)> {
        state.require_exportable(self.name())?;

        let entries = state.store.entries();
        let mut index = 0;
        let mut mismatch = None;
        root.walk_mut(&mut |element| {
            if mismatch.is_some() {
                return;
            }
            let Some(hash) = element.attr("src").and_then(|src| src.strip_prefix(REF_SCHEME))
            else {
                return;
            };
            match entries.get(index) {
                Some(entry) if entry.hash() == hash => {
                    element.set_attr("src", format!("{ATTACHMENT_SCHEME}{index}"));
                    index += 1;
                }
                _ => {
                    mismatch = Some(BuildError::structural(
                        element.tag.clone(),
                        format!("asset {REF_SCHEME}{hash} is not store entry {index}"),
                    ));
                }
            }
        });
        if let Some(err) = mismatch {
            return Err(err.into());
        }
        if index != entries.len() {
            return Err(BuildError::structural(
                "/View",
                format!("{} assets stored but {index} referenced", entries.len()),
            )
            .into());
        }
        let attachments = entries.to_vec();

        let view_xml = root.to_xml(self.pretty);
        debug!(attachments = attachments.len(), "prepared upload");
        let bundle = UploadBundle {
            view_xml: view_xml.clone(),
            attachments,
            functions: state.functions.values().cloned().collect(),
        };
        state.view_xml = Some(view_xml);
        state.markup = Some(root);
        state.enter(BuildPhase::Exported);
        Ok((state, bundle))
    }
}
