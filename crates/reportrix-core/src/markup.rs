// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic markup tree and XML serialization

use std::collections::BTreeMap;

/// Element content: child elements or escaped text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Children(Vec<Element>),
    Text(String),
}

/// A markup element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub content: Content,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            content: Content::Children(Vec::new()),
        }
    }

    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            content: Content::Text(text.into()),
            ..Self::new(tag)
        }
    }

    pub fn with_children(tag: impl Into<String>, children: Vec<Element>) -> Self {
        Self {
            content: Content::Children(children),
            ..Self::new(tag)
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Children(children) => children,
            Content::Text(_) => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Children(_) => None,
        }
    }

    /// Number of elements below this one
    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Pre-order walk, this element included
    pub fn walk<'a, F: FnMut(&'a Element)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Mutable pre-order walk, this element included
    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        if let Content::Children(children) = &mut self.content {
            for child in children {
                child.walk_mut(f);
            }
        }
    }

    /// Pre-order walk passing each element's location, e.g. `/View/Group[1]/Text[2]`
    ///
    /// Indices count same-tag siblings from 1, as in XPath.
    pub fn walk_with_path<F: FnMut(&Element, &str)>(&self, f: &mut F) {
        let root = format!("/{}", self.tag);
        self.walk_path_inner(&root, f);
    }

    fn walk_path_inner<F: FnMut(&Element, &str)>(&self, path: &str, f: &mut F) {
        f(self, path);
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for child in self.children() {
            let index = seen.entry(child.tag.as_str()).or_insert(0);
            *index += 1;
            let child_path = format!("{path}/{}[{index}]", child.tag);
            child.walk_path_inner(&child_path, f);
        }
    }

    /// Serialize as XML, optionally indented two spaces per level
    pub fn to_xml(&self, pretty: bool) -> String {
        let mut output = String::new();
        write_element(&mut output, self, 0, pretty);
        output
    }
}

fn write_element(output: &mut String, element: &Element, depth: usize, pretty: bool) {
    if pretty {
        output.push_str(&"  ".repeat(depth));
    }
    output.push('<');
    output.push_str(&element.tag);
    for (key, value) in &element.attributes {
        output.push(' ');
        output.push_str(key);
        output.push_str("=\"");
        output.push_str(&html_escape::encode_double_quoted_attribute(value));
        output.push('"');
    }

    match &element.content {
        Content::Text(text) => {
            output.push('>');
            output.push_str(&html_escape::encode_text(text));
            close(output, &element.tag);
        }
        Content::Children(children) if children.is_empty() => output.push_str("/>"),
        Content::Children(children) => {
            output.push('>');
            for child in children {
                if pretty {
                    output.push('\n');
                }
                write_element(output, child, depth + 1, pretty);
            }
            if pretty {
                output.push('\n');
                output.push_str(&"  ".repeat(depth));
            }
            close(output, &element.tag);
        }
    }
}

fn close(output: &mut String, tag: &str) {
    output.push_str("</");
    output.push_str(tag);
    output.push('>');
}
