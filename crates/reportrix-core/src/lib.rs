// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reportrix Core - Block model, asset store and markup conversion
//!
//! This crate provides:
//! - The block tree that reports are assembled from
//! - A content-hashed asset store with in-memory, gzip temp-file and discard variants
//! - Encoder and conversion capabilities, with built-in encoders
//! - A depth-first visitor producing report markup
//! - Schema validation of that markup

pub mod block;
pub mod convert;
pub mod encoders;
pub mod markup;
pub mod payload;
pub mod schema;
pub mod store;
pub mod traits;
pub mod validator;
pub mod visitors;
pub mod xml;

pub use block::{
    Block, Container, ContainerBuilder, ContainerTag, Document, Leaf, LeafBuilder, LeafTag,
    NameScope, Visitor,
};
pub use convert::{DefaultConverter, Value};
pub use markup::{Content, Element};
pub use payload::{AssetMeta, Cell, Figure, OpaqueObject, Payload, TableData};
pub use store::{AssetStore, EntryRef, FrozenEntry, Manifest, ManifestEntry, StoreVariant};
pub use traits::{AssetEncoder, Blockify, BuildError, EncoderRegistry, Result};
pub use validator::{RenderMode, ValidationMode, Validator};
pub use visitors::{CollectFunctions, FunctionRef, TreePrinter};
pub use xml::XmlBuilder;
