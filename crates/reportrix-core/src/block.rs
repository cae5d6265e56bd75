// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document block tree
//!
//! A document is a `View` container holding an ordered list of blocks. Each
//! block is either a leaf (inline text, an asset payload, or attributes only)
//! or a container owning its children. Names are optional identifiers that
//! must match `^[A-Za-z_][\w.-]*$`; document-wide uniqueness is enforced by
//! the validator, or earlier when blocks are built inside a [`NameScope`].

use crate::convert::{DefaultConverter, Value};
use crate::payload::{Payload, TableData};
use crate::store::EntryRef;
use crate::traits::{Blockify, BuildError, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use unicode_segmentation::UnicodeSegmentation;

static NAME_PATTERN: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[A-Za-z_][\w.-]*$").unwrap());

/// Maximum caption length in grapheme clusters
pub const MAX_CAPTION_LEN: usize = 512;
/// Maximum label length in grapheme clusters
pub const MAX_LABEL_LEN: usize = 256;

/// Attribute map, values already stringified for markup
pub type Attributes = BTreeMap<String, String>;

/// Check a name against the identifier grammar
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

fn check_name(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) if !is_valid_name(name) => Err(BuildError::InvalidName(name.to_string())),
        _ => Ok(()),
    }
}

fn generate_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("id-{}", &id[..12])
}

fn truncate(field: &str, value: String, max: usize) -> String {
    let graphemes: Vec<&str> = value.graphemes(true).collect();
    if graphemes.len() <= max {
        return value;
    }
    tracing::warn!(field, max, "truncating {field} to {max} characters");
    format!("{}...", graphemes[..max].concat())
}

/// Conversion of typed values into attribute strings
///
/// Absent and empty values produce `None` and are dropped from the map.
pub trait AttrValue {
    fn into_attr(self) -> Option<String>;
}

impl AttrValue for &str {
    fn into_attr(self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl AttrValue for String {
    fn into_attr(self) -> Option<String> {
        (!self.is_empty()).then_some(self)
    }
}

impl AttrValue for bool {
    fn into_attr(self) -> Option<String> {
        Some(if self { "true" } else { "false" }.to_string())
    }
}

impl AttrValue for f64 {
    fn into_attr(self) -> Option<String> {
        Some(if self.is_nan() {
            "NAN".to_string()
        } else if self.is_infinite() {
            "INF".to_string()
        } else {
            self.to_string()
        })
    }
}

macro_rules! int_attr {
    ($($t:ty),*) => {
        $(impl AttrValue for $t {
            fn into_attr(self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

int_attr!(i32, i64, u32, u64, usize);

impl<T: AttrValue> AttrValue for Option<T> {
    fn into_attr(self) -> Option<String> {
        self.and_then(AttrValue::into_attr)
    }
}

fn set_attr(attributes: &mut Attributes, key: &str, value: impl AttrValue) {
    match value.into_attr() {
        Some(value) => attributes.insert(key.to_string(), value),
        None => attributes.remove(key),
    };
}

/// What a leaf carries besides its attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Escaped inline text
    Inline,
    /// Payload stored as an asset and referenced by hash
    Asset,
    /// Attributes only
    Attributes,
}

/// Leaf block kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafTag {
    Text,
    Code,
    Html,
    Formula,
    Embed,
    BigNumber,
    Empty,
    Media,
    Attachment,
    Plot,
    Table,
    DataTable,
    Compute,
}

impl LeafTag {
    pub const ALL: [LeafTag; 13] = [
        LeafTag::Text,
        LeafTag::Code,
        LeafTag::Html,
        LeafTag::Formula,
        LeafTag::Embed,
        LeafTag::BigNumber,
        LeafTag::Empty,
        LeafTag::Media,
        LeafTag::Attachment,
        LeafTag::Plot,
        LeafTag::Table,
        LeafTag::DataTable,
        LeafTag::Compute,
    ];

    /// Markup tag name
    pub const fn tag(&self) -> &'static str {
        match self {
            LeafTag::Text => "Text",
            LeafTag::Code => "Code",
            LeafTag::Html => "HTML",
            LeafTag::Formula => "Formula",
            LeafTag::Embed => "Embed",
            LeafTag::BigNumber => "BigNumber",
            LeafTag::Empty => "Empty",
            LeafTag::Media => "Media",
            LeafTag::Attachment => "Attachment",
            LeafTag::Plot => "Plot",
            LeafTag::Table => "Table",
            LeafTag::DataTable => "DataTable",
            LeafTag::Compute => "Compute",
        }
    }

    pub const fn body_kind(&self) -> BodyKind {
        match self {
            LeafTag::Text | LeafTag::Code | LeafTag::Html | LeafTag::Formula | LeafTag::Embed => {
                BodyKind::Inline
            }
            LeafTag::Media
            | LeafTag::Attachment
            | LeafTag::Plot
            | LeafTag::Table
            | LeafTag::DataTable => BodyKind::Asset,
            LeafTag::BigNumber | LeafTag::Empty | LeafTag::Compute => BodyKind::Attributes,
        }
    }

    /// Attributes that must be present on an attributes-only leaf
    const fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            LeafTag::BigNumber => &["heading", "value"],
            LeafTag::Compute => &["function_id", "target"],
            _ => &[],
        }
    }
}

/// Container block kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerTag {
    /// Document root
    View,
    Group,
    Select,
    Toggle,
    /// Legacy page, rewritten away before conversion
    Page,
}

impl ContainerTag {
    pub const ALL: [ContainerTag; 5] = [
        ContainerTag::View,
        ContainerTag::Group,
        ContainerTag::Select,
        ContainerTag::Toggle,
        ContainerTag::Page,
    ];

    pub const fn tag(&self) -> &'static str {
        match self {
            ContainerTag::View => "View",
            ContainerTag::Group => "Group",
            ContainerTag::Select => "Select",
            ContainerTag::Toggle => "Toggle",
            ContainerTag::Page => "_Page",
        }
    }

    pub const fn min_children(&self) -> usize {
        match self {
            ContainerTag::Select => 2,
            _ => 1,
        }
    }

    /// Kinds that may only appear directly under the document root
    pub const fn is_root_only(&self) -> bool {
        matches!(self, ContainerTag::Page)
    }
}

/// Leaf content
#[derive(Debug, Clone)]
pub enum LeafBody {
    Inline(String),
    Payload(Payload),
    Attributes,
}

/// A leaf block
#[derive(Debug, Clone)]
pub struct Leaf {
    tag: LeafTag,
    name: Option<String>,
    label: Option<String>,
    attributes: Attributes,
    body: LeafBody,
    registered: Option<EntryRef>,
}

impl Leaf {
    fn unnamed(tag: LeafTag, attributes: Attributes, body: LeafBody) -> Self {
        Self {
            tag,
            name: None,
            label: None,
            attributes,
            body,
            registered: None,
        }
    }

    pub fn tag(&self) -> LeafTag {
        self.tag
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for error messages
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn body(&self) -> &LeafBody {
        &self.body
    }

    pub fn content(&self) -> Option<&str> {
        match &self.body {
            LeafBody::Inline(text) => Some(text),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.body {
            LeafBody::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    /// Store entry this leaf's payload was registered under, if any
    pub fn registered_entry(&self) -> Option<&EntryRef> {
        self.registered.as_ref()
    }

    pub(crate) fn set_registered(&mut self, entry: Option<EntryRef>) {
        self.registered = entry;
    }

    /// Unnamed, unlabelled text with no extra attributes
    pub fn is_plain_text(&self) -> bool {
        self.tag == LeafTag::Text
            && self.name.is_none()
            && self.label.is_none()
            && self.attributes.is_empty()
            && matches!(self.body, LeafBody::Inline(_))
    }
}

/// Builder for leaf blocks with names, labels or custom attributes
#[derive(Debug, Clone)]
pub struct LeafBuilder {
    tag: LeafTag,
    name: Option<String>,
    label: Option<String>,
    attributes: Attributes,
    body: Option<LeafBody>,
}

impl LeafBuilder {
    pub fn new(tag: LeafTag) -> Self {
        Self {
            tag,
            name: None,
            label: None,
            attributes: Attributes::new(),
            body: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(truncate("label", label.into(), MAX_LABEL_LEN));
        self
    }

    pub fn caption(self, caption: impl Into<String>) -> Self {
        let caption = truncate("caption", caption.into(), MAX_CAPTION_LEN);
        self.attr("caption", caption)
    }

    pub fn attr(mut self, key: &str, value: impl AttrValue) -> Self {
        set_attr(&mut self.attributes, key, value);
        self
    }

    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.body = Some(LeafBody::Inline(text.into()));
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.body = Some(LeafBody::Payload(payload));
        self
    }

    /// Build the leaf; name uniqueness is left to the validator
    pub fn build(self) -> Result<Block> {
        self.finish().map(Block::Leaf)
    }

    /// Build the leaf and claim its name in `scope`
    pub fn build_in(self, scope: &mut NameScope) -> Result<Block> {
        let leaf = self.finish()?;
        if let Some(name) = leaf.name() {
            scope.claim(name)?;
        }
        Ok(Block::Leaf(leaf))
    }

    fn finish(self) -> Result<Leaf> {
        let tag = self.tag;
        check_name(self.name.as_deref())?;

        let body = match (tag.body_kind(), self.body) {
            (BodyKind::Inline, Some(LeafBody::Inline(text))) => LeafBody::Inline(text),
            (BodyKind::Asset, Some(LeafBody::Payload(payload))) => LeafBody::Payload(payload),
            (BodyKind::Attributes, None | Some(LeafBody::Attributes)) => LeafBody::Attributes,
            (BodyKind::Inline, _) => return Err(missing(tag, "inline content")),
            (BodyKind::Asset, _) => return Err(missing(tag, "a payload")),
            (BodyKind::Attributes, Some(body)) => {
                let type_name = match &body {
                    LeafBody::Payload(payload) => payload.type_name().to_string(),
                    _ => "inline content".to_string(),
                };
                return Err(BuildError::UnsupportedPayloadType {
                    tag: tag.tag().to_string(),
                    type_name,
                });
            }
        };

        for key in tag.required_attributes() {
            if !self.attributes.contains_key(*key) {
                return Err(BuildError::MissingPayload {
                    tag: tag.tag().to_string(),
                    expected: "heading/value or function_id/target attributes",
                });
            }
        }
        if tag == LeafTag::BigNumber
            && self.attributes.contains_key("change")
            && !self.attributes.contains_key("is_upward_change")
        {
            return Err(missing(tag, "is_upward_change when change is set"));
        }

        let name = match (tag, self.name) {
            (LeafTag::Empty, None) => Some(generate_name()),
            (_, name) => name,
        };

        Ok(Leaf {
            tag,
            name,
            label: self.label,
            attributes: self.attributes,
            body,
            registered: None,
        })
    }
}

fn missing(tag: LeafTag, expected: &'static str) -> BuildError {
    BuildError::MissingPayload {
        tag: tag.tag().to_string(),
        expected,
    }
}

/// A container block
#[derive(Debug, Clone)]
pub struct Container {
    tag: ContainerTag,
    name: Option<String>,
    label: Option<String>,
    attributes: Attributes,
    children: Vec<Block>,
}

impl Container {
    /// Unnamed container with no attributes
    pub fn new(tag: ContainerTag, children: Vec<Block>) -> Self {
        Self {
            tag,
            name: None,
            label: None,
            attributes: Attributes::new(),
            children,
        }
    }

    pub fn tag(&self) -> ContainerTag {
        self.tag
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn set_attr(&mut self, key: &str, value: impl AttrValue) {
        set_attr(&mut self.attributes, key, value);
    }

    pub fn children(&self) -> &[Block] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Block> {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<Block> {
        self.children
    }

    /// Declared column count, when set and numeric
    pub fn columns(&self) -> Option<usize> {
        self.attributes.get("columns").and_then(|c| c.parse().ok())
    }

    /// Merge runs of consecutive plain text leaves, separated by a blank line
    ///
    /// Returns the number of leaves folded into a predecessor.
    pub fn merge_text_runs(&mut self) -> usize {
        let mut merged = 0;
        let mut out: Vec<Block> = Vec::with_capacity(self.children.len());
        for child in self.children.drain(..) {
            if let (Some(Block::Leaf(prev)), Block::Leaf(next)) = (out.last_mut(), &child) {
                if prev.is_plain_text() && next.is_plain_text() {
                    if let (LeafBody::Inline(acc), LeafBody::Inline(text)) =
                        (&mut prev.body, &next.body)
                    {
                        acc.push_str("\n\n");
                        acc.push_str(text);
                        merged += 1;
                        continue;
                    }
                }
            }
            out.push(child);
        }
        self.children = out;
        merged
    }

    /// Depth-first traversal: enter, children in order, then leave
    pub fn accept<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        visitor.enter_container(self)?;
        for child in &mut self.children {
            child.accept(visitor)?;
        }
        visitor.leave_container(self)
    }
}

/// Builder for containers
///
/// Children may be blocks or any [`Value`]; values are blockified when the
/// container is built.
pub struct ContainerBuilder {
    tag: ContainerTag,
    name: Option<String>,
    label: Option<String>,
    attributes: Attributes,
    children: Vec<Value>,
}

impl ContainerBuilder {
    pub fn new(tag: ContainerTag) -> Self {
        let mut attributes = Attributes::new();
        if tag == ContainerTag::Group {
            attributes.insert("columns".to_string(), "1".to_string());
        }
        Self {
            tag,
            name: None,
            label: None,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(truncate("label", label.into(), MAX_LABEL_LEN));
        self
    }

    pub fn attr(mut self, key: &str, value: impl AttrValue) -> Self {
        set_attr(&mut self.attributes, key, value);
        self
    }

    pub fn columns(self, columns: usize) -> Self {
        self.attr("columns", columns)
    }

    pub fn child(mut self, child: impl Into<Value>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, V>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Block> {
        self.build_with(&DefaultConverter)
    }

    /// Build, blockifying non-block children through `converter`
    pub fn build_with(self, converter: &dyn Blockify) -> Result<Block> {
        check_name(self.name.as_deref())?;
        let children = self
            .children
            .into_iter()
            .map(|value| converter.blockify(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Block::Container(Container {
            tag: self.tag,
            name: self.name,
            label: self.label,
            attributes: self.attributes,
            children,
        }))
    }

    pub fn build_in(self, scope: &mut NameScope) -> Result<Block> {
        let block = self.build()?;
        if let Some(name) = block.name() {
            scope.claim(name)?;
        }
        Ok(block)
    }
}

/// A node in the document tree
#[derive(Debug, Clone)]
pub enum Block {
    Leaf(Leaf),
    Container(Container),
}

impl Block {
    pub fn tag_name(&self) -> &'static str {
        match self {
            Block::Leaf(leaf) => leaf.tag.tag(),
            Block::Container(container) => container.tag.tag(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Block::Leaf(leaf) => leaf.name(),
            Block::Container(container) => container.name(),
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Block::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Block::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Block::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn is_container_of(&self, tag: ContainerTag) -> bool {
        matches!(self, Block::Container(c) if c.tag == tag)
    }

    /// Depth-first traversal with `visitor`
    pub fn accept<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        match self {
            Block::Leaf(leaf) => visitor.visit_leaf(leaf),
            Block::Container(container) => container.accept(visitor),
        }
    }

    /// Read-only pre-order walk
    pub fn walk<F: FnMut(&Block)>(&self, f: &mut F) {
        f(self);
        if let Block::Container(container) = self {
            for child in &container.children {
                child.walk(f);
            }
        }
    }

    /// Text leaf, trimmed
    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::inline(LeafTag::Text, Attributes::new(), text.trim().to_string())
    }

    /// Horizontal rule, rendered as a markdown divider
    pub fn divider() -> Self {
        Self::text("---")
    }

    pub fn code(code: impl Into<String>, language: &str) -> Self {
        let mut attributes = Attributes::new();
        set_attr(&mut attributes, "language", language);
        Self::inline(LeafTag::Code, attributes, code.into())
    }

    pub fn html(html: impl Into<String>) -> Self {
        Self::inline(LeafTag::Html, Attributes::new(), html.into())
    }

    /// TeX formula
    pub fn formula(formula: impl Into<String>) -> Self {
        Self::inline(LeafTag::Formula, Attributes::new(), formula.into())
    }

    /// Embedded third-party HTML snippet
    pub fn embed(html: impl Into<String>, width: u32, height: u32) -> Self {
        let mut attributes = Attributes::new();
        set_attr(&mut attributes, "width", width);
        set_attr(&mut attributes, "height", height);
        Self::inline(LeafTag::Embed, attributes, html.into())
    }

    /// Headline figure; fails when `heading` or `value` is empty
    pub fn big_number(heading: impl Into<String>, value: impl AttrValue) -> Result<Self> {
        LeafBuilder::new(LeafTag::BigNumber)
            .attr("heading", heading.into())
            .attr("value", value)
            .build()
    }

    /// Placeholder block, addressable by name
    pub fn empty(name: Option<&str>) -> Result<Self> {
        let builder = LeafBuilder::new(LeafTag::Empty);
        match name {
            Some(name) => builder.name(name).build(),
            None => builder.build(),
        }
    }

    pub fn table(table: TableData) -> Self {
        Self::asset(LeafTag::Table, Attributes::new(), Payload::Table(table.into()))
    }

    /// Large table, stored as data rather than rendered HTML
    pub fn data_table(table: TableData) -> Self {
        let mut attributes = Attributes::new();
        let (rows, columns) = table.shape();
        set_attr(&mut attributes, "rows", rows);
        set_attr(&mut attributes, "columns", columns);
        Self::asset(LeafTag::DataTable, attributes, Payload::Table(table.into()))
    }

    pub fn plot(payload: Payload) -> Self {
        Self::asset(LeafTag::Plot, Attributes::new(), payload)
    }

    pub fn media(path: impl Into<PathBuf>) -> Self {
        Self::asset(LeafTag::Media, Attributes::new(), Payload::File(path.into()))
    }

    pub fn attachment(payload: Payload) -> Self {
        let mut attributes = Attributes::new();
        if let Payload::File(path) = &payload {
            let filename = path.file_name().map(|f| f.to_string_lossy().into_owned());
            set_attr(&mut attributes, "filename", filename);
        }
        Self::asset(LeafTag::Attachment, attributes, payload)
    }

    /// Interactive block bound to a host function; fails when
    /// `function_id` or `target` is empty
    pub fn compute(function_id: impl Into<String>, target: impl Into<String>) -> Result<Self> {
        LeafBuilder::new(LeafTag::Compute)
            .attr("function_id", function_id.into())
            .attr("target", target.into())
            .attr("swap", "replace")
            .attr("trigger", "submit")
            .build()
    }

    /// Single-column group
    pub fn group(children: Vec<Block>) -> Self {
        let mut container = Container::new(ContainerTag::Group, children);
        container.set_attr("columns", 1usize);
        Block::Container(container)
    }

    /// Tabbed selection
    pub fn select(children: Vec<Block>) -> Self {
        let mut container = Container::new(ContainerTag::Select, children);
        container.set_attr("type", "tabs");
        Block::Container(container)
    }

    pub fn toggle(children: Vec<Block>) -> Self {
        Block::Container(Container::new(ContainerTag::Toggle, children))
    }

    pub fn page(title: impl Into<String>, children: Vec<Block>) -> Self {
        let mut container = Container::new(ContainerTag::Page, children);
        container.label = Some(truncate("label", title.into(), MAX_LABEL_LEN));
        Block::Container(container)
    }

    fn inline(tag: LeafTag, attributes: Attributes, text: String) -> Self {
        Block::Leaf(Leaf::unnamed(tag, attributes, LeafBody::Inline(text)))
    }

    fn asset(tag: LeafTag, attributes: Attributes, payload: Payload) -> Self {
        Block::Leaf(Leaf::unnamed(tag, attributes, LeafBody::Payload(payload)))
    }
}

impl From<Leaf> for Block {
    fn from(leaf: Leaf) -> Self {
        Block::Leaf(leaf)
    }
}

impl From<Container> for Block {
    fn from(container: Container) -> Self {
        Block::Container(container)
    }
}

/// Names claimed during one build
#[derive(Debug, Default)]
pub struct NameScope {
    used: HashSet<String>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, failing if it is already taken
    pub fn claim(&mut self, name: &str) -> Result<()> {
        if !self.used.insert(name.to_string()) {
            return Err(BuildError::NameConflict(name.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

/// Depth-first tree visitor
///
/// Containers are entered before and left after their children, so a
/// visitor can build child output first and wrap it on leave.
pub trait Visitor {
    fn visit_leaf(&mut self, leaf: &mut Leaf) -> Result<()>;

    fn enter_container(&mut self, _container: &mut Container) -> Result<()> {
        Ok(())
    }

    fn leave_container(&mut self, _container: &mut Container) -> Result<()> {
        Ok(())
    }
}

/// A document: the root `View` and its top-level blocks
///
/// Cloning yields a structural copy: attribute maps are owned by the copy,
/// payloads and store registrations are shared.
#[derive(Debug, Clone)]
pub struct Document {
    root: Container,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            root: Container::new(ContainerTag::View, blocks),
        }
    }

    /// Build a document from values, blockifying each with the default converter
    pub fn from_values<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_values_with(values, &DefaultConverter)
    }

    pub fn from_values_with<I, V>(values: I, converter: &dyn Blockify) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let blocks = values
            .into_iter()
            .map(|value| converter.blockify(value.into()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(blocks))
    }

    pub fn root(&self) -> &Container {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Container {
        &mut self.root
    }

    pub fn blocks(&self) -> &[Block] {
        &self.root.children
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Traverse the whole tree, root included
    pub fn accept<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        self.root.accept(visitor)
    }

    /// Pre-order walk over every block below the root
    pub fn walk<F: FnMut(&Block)>(&self, mut f: F) {
        for block in &self.root.children {
            block.walk(&mut f);
        }
    }

    /// All block names in document order
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk(|block| {
            if let Some(name) = block.name() {
                names.push(name.to_string());
            }
        });
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn table_2x2() -> TableData {
        TableData::new(vec!["a".into(), "b".into()])
            .with_row(vec![1i64.into(), 2i64.into()])
            .with_row(vec![3i64.into(), 4i64.into()])
    }

    #[test]
    fn test_name_grammar() {
        assert!(is_valid_name("chart_1"));
        assert!(is_valid_name("_private.v2-final"));
        assert!(!is_valid_name("1chart"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_leaf_invalid_name() {
        let err = LeafBuilder::new(LeafTag::Text)
            .name("9lives")
            .content("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidName(n) if n == "9lives"));
    }

    #[test]
    fn test_leaf_missing_payload() {
        let err = LeafBuilder::new(LeafTag::Plot).build().unwrap_err();
        assert!(matches!(err, BuildError::MissingPayload { ref tag, .. } if tag == "Plot"));

        let err = LeafBuilder::new(LeafTag::Text)
            .payload(Payload::Table(Arc::new(table_2x2())))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingPayload { .. }));
    }

    #[test]
    fn test_name_conflict_in_scope() {
        let mut scope = NameScope::new();
        LeafBuilder::new(LeafTag::Text)
            .name("intro")
            .content("a")
            .build_in(&mut scope)
            .unwrap();
        let err = LeafBuilder::new(LeafTag::Code)
            .name("intro")
            .content("b")
            .build_in(&mut scope)
            .unwrap_err();
        assert!(matches!(err, BuildError::NameConflict(n) if n == "intro"));
    }

    #[test]
    fn test_duplicates_allowed_without_scope() {
        let a = LeafBuilder::new(LeafTag::Text).name("dup").content("a").build();
        let b = LeafBuilder::new(LeafTag::Text).name("dup").content("b").build();
        assert!(a.is_ok() && b.is_ok());
    }

    #[test]
    fn test_big_number_change_needs_direction() {
        let err = LeafBuilder::new(LeafTag::BigNumber)
            .attr("heading", "Revenue")
            .attr("value", 10i64)
            .attr("change", 2i64)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingPayload { .. }));

        let ok = LeafBuilder::new(LeafTag::BigNumber)
            .attr("heading", "Revenue")
            .attr("value", 10i64)
            .attr("change", 2i64)
            .attr("is_upward_change", true)
            .build()
            .unwrap();
        let leaf = ok.as_leaf().unwrap();
        assert_eq!(leaf.attributes()["is_upward_change"], "true");
    }

    #[test]
    fn test_shorthand_constructors_check_required_attributes() {
        assert!(matches!(
            Block::big_number("", "1.2M"),
            Err(BuildError::MissingPayload { .. })
        ));
        assert!(matches!(
            Block::compute("app.1", ""),
            Err(BuildError::MissingPayload { .. })
        ));

        let compute = Block::compute("app.1", "results").unwrap();
        let attrs = compute.as_leaf().unwrap().attributes();
        assert_eq!(attrs["target"], "results");
        assert_eq!(attrs["trigger"], "submit");
        assert!(Block::big_number("Revenue", 10i64).is_ok());
    }

    #[test]
    fn test_empty_gets_generated_name() {
        let block = Block::empty(None).unwrap();
        let name = block.name().unwrap();
        assert!(name.starts_with("id-"));
        assert!(is_valid_name(name));
    }

    #[test]
    fn test_caption_truncated() {
        let long = "é".repeat(MAX_CAPTION_LEN + 10);
        let block = LeafBuilder::new(LeafTag::Table)
            .caption(long)
            .payload(Payload::Table(Arc::new(table_2x2())))
            .build()
            .unwrap();
        let caption = &block.as_leaf().unwrap().attributes()["caption"];
        assert!(caption.ends_with("..."));
        assert_eq!(caption.chars().count(), MAX_CAPTION_LEN + 3);
    }

    #[test]
    fn test_attr_values_stringified() {
        let block = LeafBuilder::new(LeafTag::Embed)
            .content("<iframe/>")
            .attr("ratio", f64::INFINITY)
            .attr("skip", None::<&str>)
            .attr("blank", "")
            .build()
            .unwrap();
        let attrs = block.as_leaf().unwrap().attributes();
        assert_eq!(attrs.get("ratio").map(String::as_str), Some("INF"));
        assert!(!attrs.contains_key("skip"));
        assert!(!attrs.contains_key("blank"));
    }

    #[test]
    fn test_container_blockifies_values() {
        let block = ContainerBuilder::new(ContainerTag::Group)
            .columns(2)
            .child("hello")
            .child(table_2x2())
            .build()
            .unwrap();
        let group = block.as_container().unwrap();
        let tags: Vec<_> = group.children().iter().map(Block::tag_name).collect();
        assert_eq!(tags, vec!["Text", "Table"]);
        assert_eq!(group.columns(), Some(2));
    }

    #[test]
    fn test_merge_text_runs() {
        let named = LeafBuilder::new(LeafTag::Text)
            .name("keep")
            .content("named")
            .build()
            .unwrap();
        let mut group = Container::new(
            ContainerTag::Group,
            vec![
                Block::text("a"),
                Block::text("b"),
                named,
                Block::text("c"),
                Block::text("d"),
            ],
        );
        assert_eq!(group.merge_text_runs(), 2);
        let contents: Vec<_> = group
            .children()
            .iter()
            .map(|b| b.as_leaf().unwrap().content().unwrap())
            .collect();
        assert_eq!(contents, vec!["a\n\nb", "named", "c\n\nd"]);
    }

    #[test]
    fn test_clone_shares_payload() {
        let table = Arc::new(table_2x2());
        let block = Block::table(TableData::clone(&table));
        let copy = block.clone();
        match (block.as_leaf().unwrap().payload(), copy.as_leaf().unwrap().payload()) {
            (Some(Payload::Table(a)), Some(Payload::Table(b))) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("unexpected payloads: {other:?}"),
        }
    }

    #[test]
    fn test_document_names_in_order() {
        let doc = Document::new(vec![
            LeafBuilder::new(LeafTag::Text).name("first").content("1").build().unwrap(),
            ContainerBuilder::new(ContainerTag::Group)
                .name("inner")
                .child(Block::empty(Some("second")).unwrap())
                .build()
                .unwrap(),
        ]);
        assert_eq!(doc.names(), vec!["first", "inner", "second"]);
    }

    struct Recorder(Vec<String>);

    impl Visitor for Recorder {
        fn visit_leaf(&mut self, leaf: &mut Leaf) -> Result<()> {
            self.0.push(leaf.tag().tag().to_string());
            Ok(())
        }

        fn enter_container(&mut self, container: &mut Container) -> Result<()> {
            self.0.push(format!("<{}>", container.tag().tag()));
            Ok(())
        }

        fn leave_container(&mut self, container: &mut Container) -> Result<()> {
            self.0.push(format!("</{}>", container.tag().tag()));
            Ok(())
        }
    }

    #[test]
    fn test_traversal_order() {
        let mut doc = Document::new(vec![
            Block::text("a"),
            Block::group(vec![Block::text("b"), Block::divider()]),
        ]);
        let mut recorder = Recorder(Vec::new());
        doc.accept(&mut recorder).unwrap();
        assert_eq!(
            recorder.0,
            vec!["<View>", "Text", "<Group>", "Text", "Text", "</Group>", "</View>"]
        );
    }
}
