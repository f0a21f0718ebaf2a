// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Generic XML document nodes.
//!
//! A __memento__ is an in-memory handle to one element of a hierarchical
//! document. Each memento carries an element name, an ordered listing of
//! attributes, and an ordered listing of child mementos. Text content is not
//! modeled, because nothing stored in a memento ever needs it.
//!
//! Mementos are parsed from and serialized to XML through [`quick_xml`].
//! Unknown elements and attributes are preserved as-is, so a document can be
//! loaded, edited in part, and written back without losing anything the
//! caller did not touch.

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Reader, Writer,
};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    io::Write,
    str::FromStr,
};

/// Single element of a hierarchical document.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Memento {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Memento>,
}

impl Memento {
    /// Construct new memento with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element name of memento.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Lookup attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Set attribute value.
    ///
    /// Overwrites the value in place if the key already exists, otherwise
    /// appends a new attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some((_, current)) => *current = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Iterate through all child mementos.
    pub fn children(&self) -> impl Iterator<Item = &Memento> {
        self.children.iter()
    }

    /// Iterate through child mementos with a given element name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Memento> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Find first child with matching element name and attribute value.
    pub fn find_child(&self, name: &str, key: &str, value: &str) -> Option<&Memento> {
        self.children
            .iter()
            .find(|child| child.is_keyed(name, key, value))
    }

    /// Find first child with matching element name and attribute value for
    /// mutation.
    pub fn find_child_mut(&mut self, name: &str, key: &str, value: &str) -> Option<&mut Memento> {
        self.children
            .iter_mut()
            .find(|child| child.is_keyed(name, key, value))
    }

    /// Find first child with matching element name.
    pub fn find_child_named(&self, name: &str) -> Option<&Memento> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Find first child with matching element name for mutation.
    pub fn find_child_named_mut(&mut self, name: &str) -> Option<&mut Memento> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// Get first child with matching element name, or create it.
    pub fn get_or_create_child_named(&mut self, name: &str) -> &mut Memento {
        match self.children.iter().position(|child| child.name == name) {
            Some(index) => &mut self.children[index],
            None => self.create_child(name),
        }
    }

    /// Append new empty child memento.
    pub fn create_child(&mut self, name: impl Into<String>) -> &mut Memento {
        let index = self.children.len();
        self.children.push(Memento::new(name));
        &mut self.children[index]
    }

    /// Get first child with matching element name and attribute value, or
    /// create it.
    ///
    /// Repeat calls with the same name and value always yield the same child.
    pub fn get_or_create_child(&mut self, name: &str, key: &str, value: &str) -> &mut Memento {
        if let Some(index) = self
            .children
            .iter()
            .position(|child| child.is_keyed(name, key, value))
        {
            return &mut self.children[index];
        }

        let child = self.create_child(name);
        child.set_attribute(key, value);
        child
    }

    /// Remove first child with matching element name and attribute value.
    pub fn remove_child(&mut self, name: &str, key: &str, value: &str) -> Option<Memento> {
        self.children
            .iter()
            .position(|child| child.is_keyed(name, key, value))
            .map(|index| self.children.remove(index))
    }

    /// Serialize memento as an XML document into writer.
    ///
    /// Writes an XML declaration followed by the memento as the root element,
    /// indented by two spaces per level.
    ///
    /// # Errors
    ///
    /// - Return [`MementoError::Io`] if writer fails.
    pub fn write_to(&self, out: impl Write) -> Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_element(&mut writer)?;

        let mut out = writer.into_inner();
        out.write_all(b"\n")?;
        out.flush()?;

        Ok(())
    }

    fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write_element(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;

        Ok(())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut memento = Memento::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            memento.attributes.push((key, value));
        }

        Ok(memento)
    }

    fn is_keyed(&self, name: &str, key: &str, value: &str) -> bool {
        self.name == name && self.attribute(key) == Some(value)
    }
}

impl FromStr for Memento {
    type Err = MementoError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut reader = Reader::from_str(data);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Memento> = Vec::new();
        let mut root: Option<Memento> = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => open.push(Memento::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Memento::from_start(&start)?;
                    attach(&mut open, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = open.pop().ok_or(MementoError::Unbalanced)?;
                    attach(&mut open, &mut root, node)?;
                }
                Event::Eof => break,
                _ => continue,
            }
        }

        if !open.is_empty() {
            return Err(MementoError::Unbalanced);
        }

        root.ok_or(MementoError::MissingRoot)
    }
}

impl Display for Memento {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        fmt.write_str(String::from_utf8_lossy(&buffer).as_ref())
    }
}

// INVARIANT: Closed elements go to their parent, or become the root.
fn attach(open: &mut [Memento], root: &mut Option<Memento>, node: Memento) -> Result<()> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(node);
        return Ok(());
    }

    if root.is_some() {
        return Err(MementoError::MultipleRoots);
    }

    *root = Some(node);
    Ok(())
}

/// Memento parsing and serialization error types.
#[derive(Debug, thiserror::Error)]
pub enum MementoError {
    /// Document is not well-formed XML.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    /// Element attribute is malformed.
    #[error(transparent)]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Document writer fails.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Document contains no root element.
    #[error("document has no root element")]
    MissingRoot,

    /// Document contains more than one top-level element.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// Start and end tags do not pair up.
    #[error("document has unbalanced element tags")]
    Unbalanced,
}

impl From<MementoError> for FmtError {
    fn from(_: MementoError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = MementoError> = std::result::Result<T, E>;
