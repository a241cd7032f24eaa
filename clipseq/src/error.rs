use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqError {
    #[error("invalid timecode '{value}': expected HH:MM:SS:FF or HH:MM:SS;FF")]
    InvalidTimecode { value: String },

    #[error("unparseable time value '{value}'")]
    UnparseableTime { value: String },

    #[error("clip '{name}' out of range: {start} - {end} (media duration: {duration})")]
    ClipOutOfRange {
        name: String,
        start: String,
        end: String,
        duration: String,
    },

    #[error("source media not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("probe failed for {}: {message}", path.display())]
    ProbeFailed { path: PathBuf, message: String },

    #[error("no video stream in {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("could not determine frame width/height of {}", path.display())]
    MissingDimensions { path: PathBuf },

    #[error("media has no usable duration: {}", path.display())]
    EmptyMedia { path: PathBuf },

    #[error("media duration {duration}s is out of range: {}", path.display())]
    DurationOutOfRange { path: PathBuf, duration: String },

    #[error("template is missing required structure: {element}")]
    MissingTemplateStructure { element: String },

    #[error("malformed XML at byte {offset}: {message}")]
    MalformedXml { offset: u64, message: String },

    #[error("failed to read clip list {}: {message}", path.display())]
    ClipList { path: PathBuf, message: String },

    #[error("failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl SeqError {
    pub(crate) fn missing(element: impl Into<String>) -> Self {
        SeqError::MissingTemplateStructure {
            element: element.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SeqError>;
