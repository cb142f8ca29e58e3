//! Arena-backed element tree built on the `quick-xml` streaming reader.
//!
//! The reader runs in a lenient mode suited to HTML fragments: end names
//! are not checked, void elements never take children, unclosed elements
//! are closed at end of input and stray end tags are dropped. Text,
//! comments and start tags keep their raw bytes so serialization does not
//! rewrite anything that was not replaced.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::error::Error;
use std::fmt::{Display, Formatter};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Markup could not be turned into an element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input contains no element at all.
    NoElement,
    /// The reader rejected the input.
    Malformed { position: usize, message: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoElement => write!(f, "markup contains no element"),
            Self::Malformed { position, message } => {
                write!(f, "malformed markup at byte {position}: {message}")
            }
        }
    }
}

impl Error for ParseError {}

/// Opaque reference to one element inside a `MarkupTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

#[derive(Debug, Clone)]
struct Element {
    /// Tag name as written, used for the closing tag.
    raw_name: String,
    /// Lowercased tag name for matching.
    name: String,
    /// Everything between `<` and `>` (or `/>`), attributes included.
    start: String,
    self_closing: bool,
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
    /// Injected markup written out verbatim.
    Raw(String),
}

/// Parsed markup fragment rooted at its first element.
#[derive(Debug, Clone)]
pub struct MarkupTree {
    nodes: Vec<Node>,
    root: usize,
}

impl MarkupTree {
    /// Parses a fragment and keeps its first root element.
    ///
    /// # Errors
    /// - `ParseError::NoElement` when no element is present.
    /// - `ParseError::Malformed` when the reader rejects the input.
    pub fn parse(markup: &str) -> Result<Self, ParseError> {
        let mut reader = Reader::from_str(markup);
        reader.trim_text(false);
        reader.check_end_names(false);
        reader.expand_empty_elements(false);

        let mut nodes: Vec<Node> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut root: Option<usize> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|err| ParseError::Malformed {
                position,
                message: err.to_string(),
            })?;

            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    let element = element_from_start(&start, false, position)?;
                    let is_void = is_void_element(&element.name);
                    let index = push_node(&mut nodes, &open, &mut root, Node::Element(element));
                    let Some(index) = index else { continue };
                    if is_void {
                        if open.is_empty() {
                            break;
                        }
                    } else {
                        open.push(index);
                    }
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start, true, position)?;
                    if push_node(&mut nodes, &open, &mut root, Node::Element(element)).is_some()
                        && open.is_empty()
                    {
                        break;
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                    let matched = open.iter().rposition(|index| match &nodes[*index] {
                        Node::Element(element) => element.name == name,
                        _ => false,
                    });
                    if let Some(depth) = matched {
                        open.truncate(depth);
                        if open.is_empty() {
                            break;
                        }
                    }
                }
                Event::Text(text) => {
                    if !open.is_empty() {
                        let raw = String::from_utf8_lossy(&text).into_owned();
                        push_node(&mut nodes, &open, &mut root, Node::Text(raw));
                    }
                }
                Event::Comment(comment) => {
                    if !open.is_empty() {
                        let raw = String::from_utf8_lossy(&comment).into_owned();
                        push_node(&mut nodes, &open, &mut root, Node::Comment(raw));
                    }
                }
                Event::CData(data) => {
                    if !open.is_empty() {
                        let raw = String::from_utf8_lossy(&data).into_owned();
                        push_node(&mut nodes, &open, &mut root, Node::CData(raw));
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        let root = root.ok_or(ParseError::NoElement)?;
        Ok(Self { nodes, root })
    }

    /// Returns the root element.
    pub fn root(&self) -> ElementHandle {
        ElementHandle(self.root)
    }

    /// Returns the lowercased tag name of an element.
    pub fn tag_name(&self, handle: ElementHandle) -> &str {
        match &self.nodes[handle.0] {
            Node::Element(element) => element.name.as_str(),
            _ => "",
        }
    }

    /// Returns whether the element is an HTML void element.
    pub fn is_void(&self, handle: ElementHandle) -> bool {
        is_void_element(self.tag_name(handle))
    }

    /// Returns element children, skipping void elements.
    pub fn element_children(&self, handle: ElementHandle) -> Vec<ElementHandle> {
        let Node::Element(element) = &self.nodes[handle.0] else {
            return Vec::new();
        };
        element
            .children
            .iter()
            .copied()
            .filter(|index| match &self.nodes[*index] {
                Node::Element(child) => !is_void_element(&child.name),
                _ => false,
            })
            .map(ElementHandle)
            .collect()
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    ///
    /// `&nbsp;` is folded to a space so it counts as whitespace.
    pub fn text_content(&self, handle: ElementHandle) -> String {
        let mut out = String::new();
        self.collect_text(handle.0, &mut out);
        out.replace("&nbsp;", " ")
    }

    /// Replaces all children of an element with one verbatim markup node.
    pub fn replace_inner(&mut self, handle: ElementHandle, raw: &str) {
        let raw_index = self.nodes.len();
        self.nodes.push(Node::Raw(raw.to_string()));
        if let Node::Element(element) = &mut self.nodes[handle.0] {
            element.children = vec![raw_index];
        }
    }

    /// Serializes the root element to markup.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn collect_text(&self, index: usize, out: &mut String) {
        match &self.nodes[index] {
            Node::Element(element) => {
                for child in &element.children {
                    self.collect_text(*child, out);
                }
            }
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Raw(raw) => out.push_str(raw),
            Node::Comment(_) => {}
        }
    }

    fn write_node(&self, index: usize, out: &mut String) {
        match &self.nodes[index] {
            Node::Element(element) => {
                if element.self_closing && element.children.is_empty() {
                    out.push('<');
                    out.push_str(&element.start);
                    out.push_str("/>");
                    return;
                }
                out.push('<');
                out.push_str(element.start.trim_end());
                out.push('>');
                if is_void_element(&element.name) && element.children.is_empty() {
                    return;
                }
                for child in &element.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.raw_name);
                out.push('>');
            }
            Node::Text(text) => out.push_str(text),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::CData(data) => {
                out.push_str("<![CDATA[");
                out.push_str(data);
                out.push_str("]]>");
            }
            Node::Raw(raw) => out.push_str(raw),
        }
    }
}

/// Builds an element from a start tag.
///
/// A tag name must begin with an ASCII letter. Anything else (`a < b`,
/// `<3`) is a bare `<` in text and makes the fragment malformed.
fn element_from_start(
    start: &quick_xml::events::BytesStart<'_>,
    self_closing: bool,
    position: usize,
) -> Result<Element, ParseError> {
    let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    if !raw_name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(ParseError::Malformed {
            position,
            message: format!("invalid tag name {raw_name:?}"),
        });
    }
    Ok(Element {
        name: raw_name.to_ascii_lowercase(),
        raw_name,
        start: String::from_utf8_lossy(start).into_owned(),
        self_closing,
        children: Vec::new(),
    })
}

/// Appends a node under the innermost open element, or as the root.
///
/// Returns `None` when the node lands outside the root and is dropped.
fn push_node(
    nodes: &mut Vec<Node>,
    open: &[usize],
    root: &mut Option<usize>,
    node: Node,
) -> Option<usize> {
    let index = nodes.len();
    match open.last() {
        Some(parent) => {
            nodes.push(node);
            if let Node::Element(element) = &mut nodes[*parent] {
                element.children.push(index);
            }
            Some(index)
        }
        None if root.is_none() && matches!(node, Node::Element(_)) => {
            nodes.push(node);
            *root = Some(index);
            Some(index)
        }
        None => None,
    }
}

fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}
