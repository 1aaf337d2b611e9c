use thiserror::Error;

/// Every failure a conversion can report.
///
/// Messages name the stage context (part name, node path) but never carry
/// raw bytes of the input.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unreadable file: {0}")]
    MalformedContainer(String),

    #[error("part not found in package: {part}")]
    PartNotFound { part: String },

    #[error("unsupported format: source MIME type '{mime}' is not a supported office document")]
    UnsupportedSourceFormat { mime: String },

    #[error("unsupported format: target format '{format}' (only 'html' is supported)")]
    UnsupportedTargetFormat { format: String },

    #[error("malformed XML in {part}: {source}")]
    MalformedXml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("unsupported structure in {part} at {path}: {reason}")]
    UnsupportedStructure {
        part: String,
        path: String,
        reason: String,
    },

    /// Recovered per image; `convert` never returns it.
    #[error("unresolved media for relationship {rel_id}: {reason}")]
    UnresolvedMedia { rel_id: String, reason: String },

    #[error("input is {size} bytes, larger than the {limit} byte limit")]
    InputTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed_xml(part: &str, source: roxmltree::Error) -> Self {
        Error::MalformedXml {
            part: part.to_string(),
            source,
        }
    }

    pub(crate) fn unsupported(part: &str, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedStructure {
            part: part.to_string(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::MalformedContainer(e.to_string())
    }
}
