//! Serialises a [`Document`] as indented XML with a fixed header.

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Result, SeqError};
use crate::xml::{Document, Element, Node};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
pub const DOCTYPE: &str = "<!DOCTYPE xmeml>";

const INDENT: usize = 2;

/// Render `doc` as text: declaration, doctype, then the root element indented
/// by two spaces per level.
pub fn to_xml_string(doc: &Document) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
    write_element(&mut writer, &doc.root)?;
    let body = String::from_utf8(writer.into_inner()).map_err(serialise_failed)?;
    Ok(ensure_header(&body))
}

/// Serialise `doc` to `path`, replacing any existing file.
pub fn write_document(doc: &Document, path: &Path) -> Result<()> {
    let text = to_xml_string(doc)?;
    fs::write(path, text).map_err(|source| SeqError::WriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Strip any leading declarations and doctypes and prepend exactly one of each.
pub fn ensure_header(xml: &str) -> String {
    let mut body = xml.trim_start();
    loop {
        let skip = if body.starts_with("<?xml") {
            body.find("?>").map(|end| end + 2)
        } else if body.starts_with("<!DOCTYPE") {
            body.find('>').map(|end| end + 1)
        } else {
            None
        };
        match skip {
            Some(end) => body = body[end..].trim_start(),
            None => break,
        }
    }

    let mut out = String::with_capacity(XML_DECLARATION.len() + DOCTYPE.len() + body.len() + 3);
    out.push_str(XML_DECLARATION);
    out.push('\n');
    out.push_str(DOCTYPE);
    out.push('\n');
    out.push_str(body.trim_end());
    out.push('\n');
    out
}

fn write_element<W: io::Write>(writer: &mut Writer<W>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(serialise_failed);
    }

    writer.write_event(Event::Start(start)).map_err(serialise_failed)?;
    for child in &el.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(serialise_failed)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(serialise_failed)
}

fn serialise_failed(e: impl std::fmt::Display) -> SeqError {
    SeqError::Io {
        context: "serialising XML".to_string(),
        source: io::Error::other(e.to_string()),
    }
}
