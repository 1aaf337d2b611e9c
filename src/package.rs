//! OPC package access: the ZIP container every OOXML document ships in.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use crate::config::FormatKind;
use crate::error::Error;

const CT_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

struct Part {
    name: String,
    data: Vec<u8>,
}

/// A relationship from a source part to another part or an external URI.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Package part name for internal targets, the raw URI for external ones.
    pub target: String,
    pub external: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// First relationship whose type URI ends in `/<suffix>`, covering both
    /// the transitional and strict namespaces.
    pub fn by_type(&self, suffix: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| {
            r.rel_type
                .rsplit_once('/')
                .is_some_and(|(_, last)| last == suffix)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All parts of one document, read eagerly from the archive.
pub struct Package {
    // Keyed by the lowercased part name; OPC part names are case-insensitive.
    parts: BTreeMap<String, Part>,
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

fn part_key(name: &str) -> String {
    name.trim_start_matches('/').to_ascii_lowercase()
}

impl Package {
    pub fn open(bytes: &[u8]) -> Result<Package, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::MalformedContainer(format!("not a ZIP archive ({e})")))?;

        let mut parts = BTreeMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::MalformedContainer(format!("cannot read {name}: {e}")))?;
            let key = part_key(&name);
            if parts.contains_key(&key) {
                return Err(Error::MalformedContainer(format!(
                    "duplicate part name {name}"
                )));
            }
            parts.insert(key, Part { name, data });
        }
        if parts.is_empty() {
            return Err(Error::MalformedContainer("archive has no parts".into()));
        }

        let mut package = Package {
            parts,
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
        };
        package.load_content_types()?;
        log::debug!("Opened package with {} parts", package.parts.len());
        Ok(package)
    }

    fn load_content_types(&mut self) -> Result<(), Error> {
        let Some(part) = self.parts.get(&part_key(CONTENT_TYPES_PART)) else {
            log::debug!("Package has no {CONTENT_TYPES_PART}; content types unknown");
            return Ok(());
        };
        let text = xml_str(CONTENT_TYPES_PART, &part.data)?;
        let xml = roxmltree::Document::parse(text)
            .map_err(|e| Error::malformed_xml(CONTENT_TYPES_PART, e))?;
        let mut defaults = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        for node in xml.root_element().children() {
            if node.tag_name().namespace() != Some(CT_NS) {
                continue;
            }
            match node.tag_name().name() {
                "Default" => {
                    if let (Some(ext), Some(ct)) =
                        (node.attribute("Extension"), node.attribute("ContentType"))
                    {
                        defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                }
                "Override" => {
                    if let (Some(name), Some(ct)) =
                        (node.attribute("PartName"), node.attribute("ContentType"))
                    {
                        overrides.insert(part_key(name), ct.to_string());
                    }
                }
                _ => {}
            }
        }
        self.defaults = defaults;
        self.overrides = overrides;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(&part_key(name))
    }

    pub fn part(&self, name: &str) -> Result<&[u8], Error> {
        self.parts
            .get(&part_key(name))
            .map(|p| p.data.as_slice())
            .ok_or_else(|| Error::PartNotFound {
                part: name.trim_start_matches('/').to_string(),
            })
    }

    /// Part contents as XML text (BOM stripped).
    pub fn xml_text(&self, name: &str) -> Result<&str, Error> {
        xml_str(name, self.part(name)?)
    }

    /// Part names starting with `prefix` (case-insensitive), in sorted order.
    pub fn part_names<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = part_key(prefix);
        self.parts
            .iter()
            .filter(move |(key, _)| key.starts_with(&prefix))
            .map(|(_, p)| p.name.as_str())
    }

    /// Declared content type: an `Override` for the part, else the `Default`
    /// for its extension.
    pub fn content_type(&self, name: &str) -> Option<&str> {
        let key = part_key(name);
        if let Some(ct) = self.overrides.get(&key) {
            return Some(ct);
        }
        let ext = key.rsplit_once('.').map(|(_, e)| e)?;
        self.defaults.get(ext).map(String::as_str)
    }

    /// Relationships of `source_part` (the package root for `""`). A missing
    /// `.rels` part means no relationships.
    pub fn relationships(&self, source_part: &str) -> Result<Relationships, Error> {
        let source_part = source_part.trim_start_matches('/');
        let (dir, file) = match source_part.rsplit_once('/') {
            Some((d, f)) => (d, f),
            None => ("", source_part),
        };
        let rels_path = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };
        let Ok(data) = self.part(&rels_path) else {
            return Ok(Relationships::default());
        };
        let text = xml_str(&rels_path, data)?;
        let xml =
            roxmltree::Document::parse(text).map_err(|e| Error::malformed_xml(&rels_path, e))?;

        let mut entries = Vec::new();
        for node in xml.root_element().children() {
            if node.tag_name().name() != "Relationship" {
                continue;
            }
            let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
                continue;
            };
            let external = node.attribute("TargetMode") == Some("External");
            let target = if external {
                target.to_string()
            } else {
                resolve_target(dir, target)
            };
            entries.push(Relationship {
                id: id.to_string(),
                rel_type: node.attribute("Type").unwrap_or("").to_string(),
                target,
                external,
            });
        }
        Ok(Relationships { entries })
    }

    /// Locate the primary content part through the root `officeDocument`
    /// relationship, falling back to the conventional name for `kind`.
    pub fn main_part(&self, kind: FormatKind) -> Result<String, Error> {
        let root = self.relationships("")?;
        if let Some(rel) = root.by_type("officeDocument").filter(|r| !r.external)
            && self.contains(&rel.target)
        {
            return Ok(rel.target.clone());
        }
        let fallback = kind.default_main_part();
        if self.contains(fallback) {
            log::debug!("No officeDocument relationship, using {fallback}");
            return Ok(fallback.to_string());
        }
        log::debug!(
            "Main part not found; package holds: {}",
            self.part_names("").collect::<Vec<_>>().join(", ")
        );
        Err(Error::PartNotFound {
            part: fallback.to_string(),
        })
    }

    /// `dc:title` from the core properties part, if any.
    pub fn title(&self) -> Option<String> {
        let part = self
            .relationships("")
            .ok()
            .and_then(|rels| rels.by_type("core-properties").map(|r| r.target.clone()))
            .unwrap_or_else(|| "docProps/core.xml".to_string());
        let text = self.xml_text(&part).ok()?;
        let xml = roxmltree::Document::parse(text).ok()?;
        xml.root_element()
            .children()
            .find(|n| n.tag_name().name() == "title" && n.tag_name().namespace() == Some(DC_NS))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

fn xml_str<'a>(name: &str, data: &'a [u8]) -> Result<&'a str, Error> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::unsupported(name, "/", "part is not UTF-8 encoded"))?;
    Ok(text.trim_start_matches('\u{feff}'))
}

/// Resolve a relationship target against the source part's directory.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let (mut segments, rest): (Vec<&str>, &str) = match target.strip_prefix('/') {
        Some(abs) => (Vec::new(), abs),
        None => (
            base_dir.split('/').filter(|s| !s.is_empty()).collect(),
            target,
        ),
    };
    for seg in rest.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
