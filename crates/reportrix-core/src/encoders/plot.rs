// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chart and figure encoders

use crate::block::LeafTag;
use crate::payload::{AssetMeta, Payload};
use crate::traits::AssetEncoder;
use std::io::{self, Write};

/// Vega-Lite v5 chart specifications
pub struct VegaLiteEncoder;

impl VegaLiteEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VegaLiteEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetEncoder for VegaLiteEncoder {
    fn name(&self) -> &'static str {
        "vega-lite"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        matches!(tag, LeafTag::Plot | LeafTag::Attachment) && matches!(payload, Payload::Chart(_))
    }

    fn meta(&self, _payload: &Payload) -> AssetMeta {
        AssetMeta::new(".vl.json", "application/vnd.vegalite.v5+json")
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        match payload {
            Payload::Chart(spec) => serde_json::to_writer(sink, spec.as_ref()).map_err(io::Error::from),
            other => Err(unexpected(other)),
        }
    }
}

/// Pre-rendered SVG or PNG figures
pub struct FigureEncoder;

impl FigureEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FigureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetEncoder for FigureEncoder {
    fn name(&self) -> &'static str {
        "figure"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        matches!(tag, LeafTag::Plot | LeafTag::Media | LeafTag::Attachment)
            && matches!(payload, Payload::Figure(_))
    }

    fn meta(&self, payload: &Payload) -> AssetMeta {
        match payload {
            Payload::Figure(figure) => AssetMeta::new(figure.format.extension(), figure.format.mime()),
            _ => AssetMeta::new(".bin", "application/octet-stream"),
        }
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        match payload {
            Payload::Figure(figure) => sink.write_all(&figure.bytes),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(payload: &Payload) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unexpected {} payload", payload.type_name()),
    )
}
