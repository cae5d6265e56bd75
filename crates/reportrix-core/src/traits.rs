// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type and the encoder/conversion capabilities supplied by the host

use crate::block::{Block, LeafTag};
use crate::convert::Value;
use crate::payload::{AssetMeta, Payload};
use std::io::Write;

/// Error type for building, converting and validating documents
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid block name '{0}', names must match ^[A-Za-z_][\\w.-]*$")]
    InvalidName(String),

    #[error("Block name '{0}' is already used in this document")]
    NameConflict(String),

    #[error("{tag} block requires {expected}")]
    MissingPayload { tag: String, expected: &'static str },

    #[error("{type_name} not supported directly, wrap it in an explicit block")]
    UnsupportedValue { type_name: String },

    #[error("{type_name} payload not supported for {tag} blocks")]
    UnsupportedPayloadType { tag: String, type_name: String },

    #[error("Failed to encode asset for {tag} block '{name}': {message}")]
    AssetEncodingError {
        tag: String,
        name: String,
        message: String,
    },

    #[error("Asset entry is frozen and cannot be written to")]
    FrozenEntryWriteError,

    #[error("Structural error at {location}: {message}")]
    StructuralError { location: String, message: String },

    #[error("Empty document, it must contain at least one block")]
    EmptyDocumentError,

    #[error("{kind} block '{node}' is not supported in {mode} output")]
    UnsupportedFeatureError {
        kind: String,
        node: String,
        mode: String,
    },

    #[error("Asset store cannot be reused after a failed write")]
    StoreFailed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BuildError {
    pub fn structural(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StructuralError {
            location: location.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Encoder capability: serializes one family of payloads into asset bytes
pub trait AssetEncoder: Send + Sync {
    /// Short name used in log events
    fn name(&self) -> &'static str;

    /// Whether this encoder handles `payload` on a block tagged `tag`
    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool;

    /// Extension and MIME type of the encoded bytes
    fn meta(&self, payload: &Payload) -> AssetMeta;

    /// Write the serialized payload to `sink`
    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> std::io::Result<()>;
}

/// Conversion capability: turns a primitive value into the block that best represents it
pub trait Blockify {
    fn blockify(&self, value: Value) -> Result<Block>;
}

/// Ordered encoder dispatch table
///
/// Encoders are tried newest first, so host registrations shadow the
/// defaults. The fallback, when set, is consulted last.
pub struct EncoderRegistry {
    encoders: Vec<Box<dyn AssetEncoder>>,
    fallback: Option<Box<dyn AssetEncoder>>,
}

impl EncoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            encoders: Vec::new(),
            fallback: None,
        }
    }

    /// Registry with every built-in encoder and the object fallback
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::encoders::register_defaults(&mut registry);
        registry
    }

    /// Register an encoder ahead of those already present
    pub fn register(&mut self, encoder: Box<dyn AssetEncoder>) {
        self.encoders.push(encoder);
    }

    /// Set the last-resort encoder
    pub fn set_fallback(&mut self, encoder: Box<dyn AssetEncoder>) {
        self.fallback = Some(encoder);
    }

    /// Find the encoder for a payload on a block tagged `tag`
    pub fn find(&self, tag: LeafTag, payload: &Payload) -> Result<&dyn AssetEncoder> {
        self.encoders
            .iter()
            .rev()
            .chain(self.fallback.iter())
            .find(|encoder| encoder.accepts(tag, payload))
            .map(|encoder| encoder.as_ref())
            .ok_or_else(|| BuildError::UnsupportedPayloadType {
                tag: tag.tag().to_string(),
                type_name: payload.type_name().to_string(),
            })
    }

    /// Names of the registered encoders in lookup order
    pub fn names(&self) -> Vec<&'static str> {
        self.encoders
            .iter()
            .rev()
            .chain(self.fallback.iter())
            .map(|encoder| encoder.name())
            .collect()
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
