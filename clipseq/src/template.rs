//! Sequence templates: the built-in minimal template or one loaded from disk.

use std::fs;
use std::path::Path;

use crate::assemble::{MediaKind, sequence};
use crate::error::{Result, SeqError};
use crate::xml::Document;

/// A 1080p, two-audio-track `xmeml` sequence with no clips.
pub const MINIMAL_TEMPLATE: &str = include_str!("../templates/minimal.xml");

pub fn builtin() -> Result<Document> {
    Document::parse(MINIMAL_TEMPLATE)
}

/// Load a template from `path`, or the built-in template when `None`.
pub fn load(path: Option<&Path>) -> Result<Document> {
    let doc = match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| SeqError::Io {
                context: format!("reading template {}", path.display()),
                source,
            })?;
            log::debug!("Using template {}", path.display());
            Document::parse(&text)?
        }
        None => builtin()?,
    };
    validate(&doc)?;
    Ok(doc)
}

/// Check that a template has a sequence with video and audio media groups.
pub fn validate(doc: &Document) -> Result<()> {
    let seq = sequence(&doc.root)?;
    for kind in [MediaKind::Video, MediaKind::Audio] {
        let path = format!("media/{}", kind.as_str());
        if seq.path(&path).is_none() {
            return Err(SeqError::missing(format!("sequence/{}", path)));
        }
    }
    Ok(())
}
