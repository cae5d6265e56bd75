// SPDX-License-Identifier: AGPL-3.0-or-later
//! Build stages, in the order they run

mod convert;
mod preprocess;
mod rewrite;
mod upload;

pub use convert::ConvertToMarkup;
pub use preprocess::PreProcess;
pub use rewrite::StructuralRewrite;
pub use upload::{PreUpload, UploadBundle, ATTACHMENT_SCHEME};

/// `parent/Tag[n]`, counting siblings that share the tag
pub(crate) fn child_path(parent: &str, tag: &str, index: usize) -> String {
    format!("{parent}/{tag}[{index}]")
}
