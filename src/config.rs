use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::Error;

/// Which model builder a source document goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    WordDocument,
    WordTemplate,
    SpreadsheetTemplate,
    Spreadsheet,
}

impl FormatKind {
    /// Conventional main part name, used when the root relationships don't
    /// point at one.
    pub fn default_main_part(self) -> &'static str {
        match self {
            FormatKind::WordDocument | FormatKind::WordTemplate => "word/document.xml",
            FormatKind::SpreadsheetTemplate | FormatKind::Spreadsheet => "xl/workbook.xml",
        }
    }
}

/// The only output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFormat {
    Html,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Html => "html",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Html => "text/html",
        }
    }
}

impl std::str::FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("html") {
            Ok(TargetFormat::Html)
        } else {
            Err(Error::UnsupportedTargetFormat {
                format: s.to_string(),
            })
        }
    }
}

const DEFAULT_MIME_TYPES: &[(&str, &str, FormatKind)] = &[
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
        FormatKind::WordDocument,
    ),
    (
        "application/vnd.ms-word.document.macroenabled.12",
        "docm",
        FormatKind::WordDocument,
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
        "dotx",
        FormatKind::WordTemplate,
    ),
    (
        "application/vnd.ms-word.template.macroenabled.12",
        "dotm",
        FormatKind::WordTemplate,
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
        "xltx",
        FormatKind::SpreadsheetTemplate,
    ),
    (
        "application/vnd.ms-excel.template.macroenabled.12",
        "xltm",
        FormatKind::SpreadsheetTemplate,
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
        FormatKind::Spreadsheet,
    ),
    (
        "application/vnd.ms-excel.sheet.macroenabled.12",
        "xlsm",
        FormatKind::Spreadsheet,
    ),
];

/// Read-only mapping from source MIME types to format kinds.
///
/// Built once and shared by reference between conversions.
#[derive(Clone, Debug)]
pub struct FormatRegistry {
    by_mime: HashMap<String, FormatKind>,
    by_extension: HashMap<String, String>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut by_mime = HashMap::new();
        let mut by_extension = HashMap::new();
        for &(mime, ext, kind) in DEFAULT_MIME_TYPES {
            by_mime.insert(mime.to_string(), kind);
            by_extension.insert(ext.to_string(), mime.to_string());
        }
        Self {
            by_mime,
            by_extension,
        }
    }
}

static DEFAULT_REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();

impl FormatRegistry {
    /// Process-wide default registry.
    pub fn global() -> &'static FormatRegistry {
        DEFAULT_REGISTRY.get_or_init(FormatRegistry::default)
    }

    /// Registry with no mappings, to be filled with [`FormatRegistry::with_mime`].
    pub fn empty() -> Self {
        Self {
            by_mime: HashMap::new(),
            by_extension: HashMap::new(),
        }
    }

    pub fn with_mime(mut self, mime: &str, extension: &str, kind: FormatKind) -> Self {
        let mime = normalize_mime(mime);
        self.by_extension
            .insert(extension.to_ascii_lowercase(), mime.clone());
        self.by_mime.insert(mime, kind);
        self
    }

    /// Map a declared MIME type to a kind. Parameters (`; charset=...`) and
    /// case are ignored.
    pub fn kind_for_mime(&self, mime: &str) -> Result<FormatKind, Error> {
        self.by_mime
            .get(&normalize_mime(mime))
            .copied()
            .ok_or_else(|| Error::UnsupportedSourceFormat {
                mime: mime.to_string(),
            })
    }

    /// MIME type registered for a file extension (without the dot).
    pub fn mime_for_extension(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
