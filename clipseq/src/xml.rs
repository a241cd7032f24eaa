//! A small ordered element tree: enough DOM to read a sequence template,
//! rewrite it in place and hand it to the formatter.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, SeqError};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An element whose only content is `text` (no text node if empty).
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut el = Element::new(name);
        el.set_text(text);
        el
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Builder form of [`Element::set_attr`].
    pub fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Replace the direct text content, leaving child elements alone.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.retain(|n| matches!(n, Node::Element(_)));
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text));
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Follow a `/`-separated path of direct children.
    pub fn path(&self, path: &str) -> Option<&Element> {
        path.split('/').try_fold(self, |el, name| el.child(name))
    }

    pub fn path_mut(&mut self, path: &str) -> Option<&mut Element> {
        path.split('/').try_fold(self, |el, name| el.child_mut(name))
    }

    /// Direct children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn count_children(&self, name: &str) -> usize {
        self.children_named(name).count()
    }

    /// The `n`th (0-based) direct child with the given name.
    pub fn nth_child_mut(&mut self, name: &str, n: usize) -> Option<&mut Element> {
        self.elements_mut().filter(|e| e.name == name).nth(n)
    }

    /// Return the first direct child named `name`, appending an empty one if none exists.
    pub fn upsert_child(&mut self, name: &str) -> &mut Element {
        let idx = match self.child_index(name) {
            Some(idx) => idx,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[idx] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("child_index only returns element positions"),
        }
    }

    /// Upsert a direct child and overwrite its text.
    pub fn set_child_text(&mut self, name: &str, text: impl Into<String>) -> &mut Element {
        let child = self.upsert_child(name);
        child.set_text(text);
        child
    }

    /// Upsert each segment of a `/`-separated path.
    pub fn upsert_path(&mut self, path: &str) -> &mut Element {
        path.split('/').fold(self, |el, name| el.upsert_child(name))
    }

    /// Index into `children` of the first direct element named `name`.
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name))
    }

    pub fn append(&mut self, child: Element) -> &mut Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Insert `child` immediately before the first direct child named `before`,
    /// or append it when there is no such child.
    pub fn insert_before(&mut self, before: &str, child: Element) {
        match self.child_index(before) {
            Some(idx) => self.children.insert(idx, Node::Element(child)),
            None => self.children.push(Node::Element(child)),
        }
    }

    /// Remove all direct children named `name`, returning how many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.name == name));
        before - self.children.len()
    }

    /// First descendant (depth-first, document order) matching `pred`.
    pub fn find_by(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_by(pred) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.find_by(&|e| e.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        for child in self.elements_mut() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_mut(name) {
                return Some(found);
            }
        }
        None
    }
}

/// A parsed XML document. Only the root element is kept: the declaration and
/// doctype are regenerated by the formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Document { root }
    }

    /// Parse XML text. Whitespace-only text is dropped; comments, processing
    /// instructions, the declaration and the doctype are skipped.
    pub fn parse(text: &str) -> Result<Document> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| malformed(&reader, e))?;
            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&reader, &start)?);
                }
                Event::Empty(start) => {
                    let el = element_from_start(&reader, &start)?;
                    attach(&reader, &mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| malformed(&reader, "unexpected closing tag"))?;
                    attach(&reader, &mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| malformed(&reader, e))?;
                    push_text(&mut stack, &text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    push_text(&mut stack, &text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(malformed(&reader, "unclosed element at end of document"));
        }
        root.map(Document::new)
            .ok_or_else(|| malformed(&reader, "document has no root element"))
    }
}

fn malformed(reader: &Reader<&[u8]>, message: impl std::fmt::Display) -> SeqError {
    SeqError::MalformedXml {
        offset: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}

fn element_from_start(reader: &Reader<&[u8]>, start: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(reader, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| malformed(reader, e))?;
        el.attributes.push((key, value.into_owned()));
    }
    Ok(el)
}

fn attach(
    reader: &Reader<&[u8]>,
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(el));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(malformed(reader, "multiple root elements")),
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    // Text outside the root element is ignored.
    if let Some(parent) = stack.last_mut() {
        match parent.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(text),
            _ => parent.children.push(Node::Text(text.to_string())),
        }
    }
}
