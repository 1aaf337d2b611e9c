use std::collections::HashMap;

use crate::model::{Alignment, RunFormat, VertAlign};
use crate::package::Package;

use super::{WML_NS, wml, wml_attr, wml_bool};

/// Run toggles as written in a style or a run's `w:rPr`; `None` inherits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct RunProps {
    pub(super) bold: Option<bool>,
    pub(super) italic: Option<bool>,
    pub(super) underline: Option<bool>,
    pub(super) strikethrough: Option<bool>,
    pub(super) vertical_align: Option<VertAlign>,
}

impl RunProps {
    /// Fill unset toggles from `fallback`.
    pub(super) fn or(self, fallback: RunProps) -> RunProps {
        RunProps {
            bold: self.bold.or(fallback.bold),
            italic: self.italic.or(fallback.italic),
            underline: self.underline.or(fallback.underline),
            strikethrough: self.strikethrough.or(fallback.strikethrough),
            vertical_align: self.vertical_align.or(fallback.vertical_align),
        }
    }

    pub(super) fn to_format(self) -> RunFormat {
        RunFormat {
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            underline: self.underline.unwrap_or(false),
            strikethrough: self.strikethrough.unwrap_or(false),
            vertical_align: self.vertical_align.unwrap_or_default(),
        }
    }
}

pub(super) struct ParagraphStyleDef {
    pub(super) heading: Option<u8>,
    /// Set by `w:outlineLvl` or a heading name; stops inheritance.
    pub(super) heading_explicit: bool,
    pub(super) alignment: Option<Alignment>,
    pub(super) run: RunProps,
    pub(super) based_on: Option<String>,
}

#[derive(Default)]
pub(super) struct StylesInfo {
    pub(super) defaults: RunProps,
    pub(super) default_paragraph_style: Option<String>,
    pub(super) paragraph_styles: HashMap<String, ParagraphStyleDef>,
    pub(super) character_styles: HashMap<String, RunProps>,
}

impl StylesInfo {
    /// Paragraph style by id, or the document's default paragraph style.
    pub(super) fn paragraph_style(&self, id: Option<&str>) -> Option<&ParagraphStyleDef> {
        match id {
            Some(id) => {
                let style = self.paragraph_styles.get(id);
                if style.is_none() {
                    log::debug!("Unknown paragraph style '{id}', using default formatting");
                }
                style
            }
            None => self
                .default_paragraph_style
                .as_deref()
                .and_then(|d| self.paragraph_styles.get(d)),
        }
    }
}

pub(super) fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

pub(super) fn parse_run_props(rpr: roxmltree::Node) -> RunProps {
    let underline = wml(rpr, "u").map(|u| {
        u.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "none")
    });
    let strikethrough = match (wml_bool(rpr, "strike"), wml_bool(rpr, "dstrike")) {
        (None, None) => None,
        (s, d) => Some(s.unwrap_or(false) || d.unwrap_or(false)),
    };
    let vertical_align = wml_attr(rpr, "vertAlign").map(|v| match v {
        "superscript" => VertAlign::Superscript,
        "subscript" => VertAlign::Subscript,
        _ => VertAlign::Baseline,
    });
    RunProps {
        bold: wml_bool(rpr, "b"),
        italic: wml_bool(rpr, "i"),
        underline,
        strikethrough,
        vertical_align,
    }
}

/// Heading level implied by a style's name or id (`heading 2`, `Heading2`,
/// `Title`).
fn heading_from_name(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let digits = lower.strip_prefix("heading")?.trim_start();
    let level = digits.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

/// `w:outlineLvl` is zero-based; 9 is body text.
pub(super) fn heading_from_outline(ppr: roxmltree::Node) -> Option<Option<u8>> {
    wml_attr(ppr, "outlineLvl")
        .and_then(|v| v.parse::<u8>().ok())
        .map(|lvl| (lvl < 6).then_some(lvl + 1))
}

/// Styles part for `main_part`: through its `styles` relationship, else the
/// conventional `word/styles.xml`. A missing or unreadable part yields
/// defaults; text is never lost to a styles problem.
pub(super) fn parse_styles(package: &Package, main_part: &str) -> StylesInfo {
    let styles_part = package
        .relationships(main_part)
        .ok()
        .and_then(|rels| rels.by_type("styles").map(|r| r.target.clone()))
        .unwrap_or_else(|| "word/styles.xml".to_string());

    let Ok(xml_content) = package.xml_text(&styles_part) else {
        log::debug!("No styles part at {styles_part}, using default formatting");
        return StylesInfo::default();
    };
    let xml = match roxmltree::Document::parse(xml_content) {
        Ok(xml) => xml,
        Err(e) => {
            log::warn!("Ignoring unparsable {styles_part}: {e}");
            return StylesInfo::default();
        }
    };
    parse_styles_xml(&xml)
}

pub(super) fn parse_styles_xml(xml: &roxmltree::Document) -> StylesInfo {
    let root = xml.root_element();
    let mut info = StylesInfo::default();

    if let Some(rpr) = wml(root, "docDefaults")
        .and_then(|n| wml(n, "rPrDefault"))
        .and_then(|n| wml(n, "rPr"))
    {
        info.defaults = parse_run_props(rpr);
    }

    for style_node in root.children() {
        if style_node.tag_name().name() != "style"
            || style_node.tag_name().namespace() != Some(WML_NS)
        {
            continue;
        }
        let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
            continue;
        };
        let run = wml(style_node, "rPr")
            .map(parse_run_props)
            .unwrap_or_default();

        match style_node.attribute((WML_NS, "type")) {
            Some("paragraph") => {
                let ppr = wml(style_node, "pPr");
                let name = wml_attr(style_node, "name").unwrap_or(style_id);
                let outline = ppr.and_then(heading_from_outline);
                let heading = outline
                    .unwrap_or_else(|| heading_from_name(name).or_else(|| heading_from_name(style_id)));
                let heading_explicit = outline.is_some() || heading.is_some();
                let alignment = ppr.and_then(|ppr| wml_attr(ppr, "jc")).map(parse_alignment);
                let based_on = wml_attr(style_node, "basedOn").map(|s| s.to_string());

                let is_default = style_node
                    .attribute((WML_NS, "default"))
                    .is_some_and(|v| v == "1" || v == "true");
                if is_default {
                    info.default_paragraph_style = Some(style_id.to_string());
                }

                info.paragraph_styles.insert(
                    style_id.to_string(),
                    ParagraphStyleDef {
                        heading,
                        heading_explicit,
                        alignment,
                        run,
                        based_on,
                    },
                );
            }
            Some("character") => {
                info.character_styles.insert(style_id.to_string(), run);
            }
            _ => {}
        }
    }

    resolve_based_on(&mut info.paragraph_styles);
    info
}

fn resolve_based_on(styles: &mut HashMap<String, ParagraphStyleDef>) {
    let ids: Vec<String> = styles.keys().cloned().collect();
    for id in ids {
        let mut chain: Vec<String> = Vec::new();
        let mut current = id.clone();
        loop {
            if chain.contains(&current) {
                break;
            }
            chain.push(current.clone());
            match styles.get(&current).and_then(|s| s.based_on.clone()) {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // Closer ancestors override further ones.
        let mut alignment = None;
        let mut heading = None;
        let mut run = RunProps::default();
        for ancestor_id in chain.iter().rev() {
            if let Some(s) = styles.get(ancestor_id) {
                if s.alignment.is_some() {
                    alignment = s.alignment;
                }
                if s.heading_explicit {
                    heading = s.heading;
                }
                run = s.run.or(run);
            }
        }

        if let Some(s) = styles.get_mut(&id) {
            s.alignment = s.alignment.or(alignment);
            s.heading = heading;
            s.run = s.run.or(run);
        }
    }
}
