// SPDX-License-Identifier: AGPL-3.0-or-later
//! Attachment encoders: JSON values and the opaque-object fallback

use crate::block::LeafTag;
use crate::payload::{AssetMeta, Payload};
use crate::traits::AssetEncoder;
use std::io::{self, Write};

/// JSON objects and arrays
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetEncoder for JsonEncoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        tag == LeafTag::Attachment && matches!(payload, Payload::Json(_))
    }

    fn meta(&self, _payload: &Payload) -> AssetMeta {
        AssetMeta::new(".json", "application/json")
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        match payload {
            Payload::Json(value) => serde_json::to_writer(sink, value.as_ref()).map_err(io::Error::from),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unexpected {} payload", other.type_name()),
            )),
        }
    }
}

/// Last-resort encoder for host objects attached as-is
///
/// Only attachments accept it; a plot of an arbitrary object is a dispatch
/// error rather than an opaque blob.
pub struct ObjectEncoder;

impl ObjectEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ObjectEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetEncoder for ObjectEncoder {
    fn name(&self) -> &'static str {
        "object"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        tag == LeafTag::Attachment && matches!(payload, Payload::Object(_))
    }

    fn meta(&self, _payload: &Payload) -> AssetMeta {
        AssetMeta::new(".bin", "application/octet-stream")
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        match payload {
            Payload::Object(obj) => obj.write_serialized(sink),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unexpected {} payload", other.type_name()),
            )),
        }
    }
}
