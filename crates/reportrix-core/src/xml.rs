// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block tree to markup conversion
//!
//! [`XmlBuilder`] walks a document depth first. Leaves with inline content
//! become text elements; leaves with payloads are encoded into the asset
//! store and referenced as `ref://<hash>`. Containers collect their
//! children's elements first and wrap them on leave, so document order is
//! preserved both in the markup and in the store.

use crate::block::{Attributes, BodyKind, Container, Document, Leaf, Visitor};
use crate::markup::{Content, Element};
use crate::payload::Payload;
use crate::store::{AssetStore, EntryRef};
use crate::traits::{BuildError, EncoderRegistry, Result};

/// Markup format version written on the root element
pub const VIEW_VERSION: &str = "1";

/// Visitor producing the markup tree and populating the store
pub struct XmlBuilder<'a> {
    store: &'a mut AssetStore,
    encoders: &'a EncoderRegistry,
    frames: Vec<Vec<Element>>,
    fragment: bool,
}

impl<'a> XmlBuilder<'a> {
    pub fn new(store: &'a mut AssetStore, encoders: &'a EncoderRegistry) -> Self {
        Self {
            store,
            encoders,
            frames: vec![Vec::new()],
            fragment: false,
        }
    }

    /// Mark the output as a fragment embedded in a larger page
    pub fn fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }

    /// Convert `document`, returning the root `View` element
    pub fn build(mut self, document: &mut Document) -> Result<Element> {
        document.accept(&mut self)?;
        let mut top = self.frames.pop().unwrap_or_default();
        let mut root = match (top.pop(), top.is_empty()) {
            (Some(root), true) if root.tag == "View" => root,
            _ => {
                return Err(BuildError::structural(
                    "/",
                    "conversion must produce exactly one View root",
                ))
            }
        };
        root.set_attr("version", VIEW_VERSION);
        root.set_attr("fragment", if self.fragment { "true" } else { "false" });
        Ok(root)
    }

    fn emit(&mut self, element: Element) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(element);
        }
    }

    /// Register the leaf's payload, reusing its previous entry when possible
    fn register_asset(&mut self, leaf: &mut Leaf) -> Result<EntryRef> {
        if let Some(previous) = leaf.registered_entry().cloned() {
            if let Some(entry) = self.store.reuse(&previous)? {
                tracing::debug!(hash = %entry.hash, tag = leaf.tag().tag(), "reusing registered asset");
                return Ok(entry);
            }
        }
        let entry = self.encode_payload(leaf)?;
        leaf.set_registered(Some(entry.clone()));
        Ok(entry)
    }

    fn encode_payload(&mut self, leaf: &Leaf) -> Result<EntryRef> {
        let payload = leaf.payload().ok_or_else(|| BuildError::MissingPayload {
            tag: leaf.tag().tag().to_string(),
            expected: "a payload",
        })?;

        if let Payload::File(path) = payload {
            return self
                .store
                .load_from_path(path)
                .map_err(|err| encoding_error(leaf, &err));
        }

        let encoders = self.encoders;
        let encoder = encoders.find(leaf.tag(), payload)?;
        let meta = encoder.meta(payload);
        let mut writer = self.store.get_writer(&meta.ext, &meta.mime)?;
        if let Err(err) = encoder.encode(payload, &mut writer) {
            self.store.mark_failed();
            return Err(encoding_error(leaf, &BuildError::IoError(err)));
        }
        let entry = writer.freeze()?;
        tracing::debug!(
            encoder = encoder.name(),
            tag = leaf.tag().tag(),
            name = leaf.display_name(),
            hash = entry.hash(),
            "encoded asset"
        );
        self.store.add(entry)
    }
}

fn encoding_error(leaf: &Leaf, err: &BuildError) -> BuildError {
    BuildError::AssetEncodingError {
        tag: leaf.tag().tag().to_string(),
        name: leaf.display_name().to_string(),
        message: err.to_string(),
    }
}

fn base_element(
    tag: &str,
    name: Option<&str>,
    label: Option<&str>,
    attributes: &Attributes,
) -> Element {
    let mut element = Element::new(tag);
    element.attributes = attributes.clone();
    if let Some(name) = name {
        element.set_attr("name", name);
    }
    if let Some(label) = label {
        element.set_attr("label", label);
    }
    element
}

impl Visitor for XmlBuilder<'_> {
    fn visit_leaf(&mut self, leaf: &mut Leaf) -> Result<()> {
        let mut element = base_element(
            leaf.tag().tag(),
            leaf.name(),
            leaf.label(),
            leaf.attributes(),
        );
        match leaf.tag().body_kind() {
            BodyKind::Inline => {
                let text = leaf.content().unwrap_or_default().to_string();
                element.content = Content::Text(text);
            }
            BodyKind::Asset => {
                let entry = self.register_asset(leaf)?;
                element.set_attr("type", entry.mime.as_str());
                element.set_attr("src", entry.reference());
            }
            BodyKind::Attributes => {}
        }
        self.emit(element);
        Ok(())
    }

    fn enter_container(&mut self, _container: &mut Container) -> Result<()> {
        self.frames.push(Vec::new());
        Ok(())
    }

    fn leave_container(&mut self, container: &mut Container) -> Result<()> {
        let children = self.frames.pop().unwrap_or_default();
        let mut element = base_element(
            container.tag().tag(),
            container.name(),
            container.label(),
            container.attributes(),
        );
        element.content = Content::Children(children);
        self.emit(element);
        Ok(())
    }
}
