// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in asset encoders for each payload family

pub mod attachment;
pub mod plot;
pub mod table;

pub use attachment::{JsonEncoder, ObjectEncoder};
pub use plot::{FigureEncoder, VegaLiteEncoder};
pub use table::{DataTableEncoder, HtmlTableEncoder};

use crate::traits::EncoderRegistry;

/// Register every built-in encoder, with the object encoder as fallback
pub fn register_defaults(registry: &mut EncoderRegistry) {
    registry.register(Box::new(JsonEncoder::new()));
    registry.register(Box::new(DataTableEncoder::new()));
    registry.register(Box::new(HtmlTableEncoder::new()));
    registry.register(Box::new(VegaLiteEncoder::new()));
    registry.register(Box::new(FigureEncoder::new()));
    registry.set_fallback(Box::new(ObjectEncoder::new()));
}
