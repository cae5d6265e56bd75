// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stage chaining
//!
//! Each stage takes ownership of the [`BuildState`] plus the previous stage's
//! output and hands both on:
//!
//! ```rust,ignore
//! let exported = Pipeline::new(BuildState::new(document, AssetStore::in_memory()))
//!     .pipe(PreProcess::finalized())?
//!     .pipe(StructuralRewrite)?
//!     .pipe(ConvertToMarkup::new(RenderMode::Embedded))?
//!     .pipe(ExportString::new(PageTemplate::default()))?
//!     .finish();
//! ```
//!
//! Output types must line up at every step: an exporter only accepts the
//! markup produced by conversion.

use crate::state::BuildState;
use crate::Result;
use tracing::{debug, warn};

/// One step of a build
pub trait Stage<I> {
    type Output;

    fn name(&self) -> &'static str;

    /// Run on `state`; on error the state is dropped along with its assets
    fn run(&self, state: BuildState, input: I) -> Result<(BuildState, Self::Output)>;
}

/// A build in progress, holding the last stage's output
#[derive(Debug)]
pub struct Pipeline<T> {
    state: BuildState,
    value: T,
}

impl Pipeline<()> {
    pub fn new(state: BuildState) -> Self {
        Self { state, value: () }
    }
}

impl<T> Pipeline<T> {
    /// Resume from a state and a previously produced value
    pub fn from_parts(state: BuildState, value: T) -> Self {
        Self { state, value }
    }

    /// Run `stage` on the current state and value
    pub fn pipe<S: Stage<T>>(self, stage: S) -> Result<Pipeline<S::Output>> {
        let name = stage.name();
        debug!(stage = name, phase = ?self.state.phase(), "running stage");
        match stage.run(self.state, self.value) {
            Ok((state, value)) => Ok(Pipeline { state, value }),
            Err(err) => {
                warn!(stage = name, error = %err, "stage failed, build discarded");
                Err(err)
            }
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_parts(self) -> (BuildState, T) {
        (self.state, self.value)
    }

    /// Drop the build state and keep the output
    pub fn finish(self) -> T {
        self.value
    }
}
