use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Document has no root element")]
    Empty,

    #[error("Unclosed element <{0}> at end of document")]
    Unclosed(String),
}

pub type Result<T> = std::result::Result<T, XmlError>;

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Text(String),
    Element(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    name: String,
    parent: Option<usize>,
    content: Vec<Content>,
    /// One past the last descendant; nodes are stored in document order
    subtree_end: usize,
}

/// Parsed XML document.
///
/// Elements are kept in an arena in document (pre-)order, which makes tag
/// searches a linear scan and keeps every result list in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

impl XmlDocument {
    /// Parse a document, rejecting malformed input
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(body);

        let mut doc = XmlDocument::default();
        let mut stack: Vec<usize> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| XmlError::Malformed(e.to_string()))?;

            match event {
                Event::Start(ref e) => {
                    let index = doc.open_element(e, stack.last().copied());
                    stack.push(index);
                }
                Event::Empty(ref e) => {
                    let index = doc.open_element(e, stack.last().copied());
                    doc.nodes[index].subtree_end = index + 1;
                }
                Event::End(_) => {
                    if let Some(index) = stack.pop() {
                        doc.nodes[index].subtree_end = doc.nodes.len();
                    }
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    doc.push_text(stack.last().copied(), &text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    doc.push_text(stack.last().copied(), &text);
                }
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        if let Some(&open) = stack.last() {
            return Err(XmlError::Unclosed(doc.nodes[open].name.clone()));
        }
        if doc.roots.is_empty() {
            return Err(XmlError::Empty);
        }

        Ok(doc)
    }

    /// Parse a document, degrading to the empty document on any error.
    ///
    /// Callers processing a batch use this so that one bad body costs only
    /// its own record.
    pub fn parse_lenient(body: &[u8]) -> Self {
        Self::parse(body).unwrap_or_else(|e| {
            debug!(error = %e, size = body.len(), "Falling back to empty document");
            Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<Element<'_>> {
        self.roots.first().map(|&index| Element { doc: self, index })
    }

    /// All elements with the given local name, in document order
    pub fn elements_by_tag<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        self.range_by_tag(0..self.nodes.len(), name)
    }

    /// Text of the first element with the given name
    pub fn first_text(&self, name: &str) -> Option<String> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|index| Element { doc: self, index }.text())
    }

    /// Path query from the document root; see [`Element::select`]
    pub fn select(&self, path: &str) -> Vec<Element<'_>> {
        self.evaluate(None, path)
    }

    fn open_element(&mut self, start: &BytesStart<'_>, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        self.nodes.push(Node {
            name,
            parent,
            content: Vec::new(),
            subtree_end: index + 1,
        });

        match parent {
            Some(p) => self.nodes[p].content.push(Content::Element(index)),
            None => self.roots.push(index),
        }

        index
    }

    fn push_text(&mut self, parent: Option<usize>, text: &str) {
        // Text outside the root element and whitespace-only runs carry nothing
        if let Some(p) = parent {
            if !text.trim().is_empty() {
                self.nodes[p].content.push(Content::Text(text.to_string()));
            }
        }
    }

    fn range_by_tag<'a>(
        &'a self,
        range: std::ops::Range<usize>,
        name: &'a str,
    ) -> impl Iterator<Item = Element<'a>> + 'a {
        range
            .filter(move |&index| self.nodes[index].name == name)
            .map(move |index| Element { doc: self, index })
    }

    fn children_of(&self, context: Option<usize>) -> Vec<usize> {
        match context {
            None => self.roots.clone(),
            Some(index) => self.nodes[index]
                .content
                .iter()
                .filter_map(|c| match c {
                    Content::Element(child) => Some(*child),
                    Content::Text(_) => None,
                })
                .collect(),
        }
    }

    fn descendants_of(&self, context: Option<usize>) -> std::ops::Range<usize> {
        match context {
            None => 0..self.nodes.len(),
            Some(index) => index + 1..self.nodes[index].subtree_end,
        }
    }

    fn evaluate(&self, context: Option<usize>, path: &str) -> Vec<Element<'_>> {
        let steps = parse_path(path);
        if steps.is_empty() {
            return Vec::new();
        }

        let mut current: Vec<Option<usize>> = vec![context];

        for step in &steps {
            let mut matched = BTreeSet::new();

            for ctx in &current {
                let candidates: Vec<usize> = if step.descendant {
                    self.descendants_of(*ctx).collect()
                } else {
                    self.children_of(*ctx)
                };

                matched.extend(
                    candidates
                        .into_iter()
                        .filter(|&index| step.matches(&self.nodes[index].name)),
                );
            }

            current = matched.into_iter().map(Some).collect();
        }

        current
            .into_iter()
            .flatten()
            .map(|index| Element { doc: self, index })
            .collect()
    }
}

struct Step<'p> {
    name: &'p str,
    descendant: bool,
}

impl Step<'_> {
    fn matches(&self, name: &str) -> bool {
        self.name == "*" || self.name == name
    }
}

/// `a/b` selects children, `//a` and `a//b` select descendants
fn parse_path(path: &str) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    let mut descendant = false;

    for token in path.trim().split('/') {
        if token.is_empty() {
            descendant = true;
            continue;
        }
        steps.push(Step {
            name: token,
            descendant,
        });
        descendant = false;
    }

    steps
}

/// Borrowed handle to one element of an [`XmlDocument`]
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    doc: &'a XmlDocument,
    index: usize,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'a str {
        &self.doc.nodes[self.index].name
    }

    /// Concatenated text of this element and all of its descendants
    pub fn text(&self) -> String {
        let nodes = &self.doc.nodes;
        let mut out = String::new();
        let mut pending = vec![nodes[self.index].content.iter()];

        // Explicit stack, nesting depth is bounded only by the input
        while let Some(contents) = pending.last_mut() {
            match contents.next() {
                Some(Content::Text(text)) => out.push_str(text),
                Some(Content::Element(child)) => pending.push(nodes[*child].content.iter()),
                None => {
                    pending.pop();
                }
            }
        }

        out
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.doc.nodes[self.index].parent.map(|index| Element {
            doc: self.doc,
            index,
        })
    }

    pub fn children(self) -> impl Iterator<Item = Element<'a>> + 'a {
        let doc = self.doc;
        doc.children_of(Some(self.index))
            .into_iter()
            .map(move |index| Element { doc, index })
    }

    pub fn children_by_tag(self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        self.children().filter(move |child| child.name() == name)
    }

    /// Descendants with the given name, in document order
    pub fn descendants_by_tag(self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        self.doc
            .range_by_tag(self.doc.descendants_of(Some(self.index)), name)
    }

    /// Text of the first descendant with the given name
    pub fn first_text(&self, name: &str) -> Option<String> {
        let doc = self.doc;
        doc.descendants_of(Some(self.index))
            .find(|&index| doc.nodes[index].name == name)
            .map(|index| Element { doc, index }.text())
    }

    /// Path query scoped to this element.
    ///
    /// Steps are separated by `/` and select children; a `//` before a step
    /// selects descendants instead. `*` matches any name. Results come back
    /// in document order without duplicates.
    pub fn select(&self, path: &str) -> Vec<Element<'a>> {
        self.doc.evaluate(Some(self.index), path)
    }
}
