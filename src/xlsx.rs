//! SpreadsheetML workbooks and templates: every worksheet becomes a table of
//! raw cell text.

use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::model::{Block, Document, Paragraph, ParagraphStyle, Table, TableCell, TableRow};
use crate::package::Package;

const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

// Worksheets larger than this are not padded out to their full extent.
const MAX_COLUMNS: usize = 16_384;

fn sml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(SML_NS))
}

fn sml_children<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'a>> + 'a {
    node.children()
        .filter(move |n| n.tag_name().name() == name && n.tag_name().namespace() == Some(SML_NS))
}

/// Concatenated text of a string item: plain `t` or rich-text `r/t` runs.
/// Phonetic runs (`rPh`) are skipped.
fn string_item_text(si: roxmltree::Node) -> String {
    let mut text = String::new();
    for child in si.children() {
        if child.tag_name().namespace() != Some(SML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "t" => text.push_str(child.text().unwrap_or("")),
            "r" => {
                if let Some(t) = sml(child, "t") {
                    text.push_str(t.text().unwrap_or(""));
                }
            }
            _ => {}
        }
    }
    text
}

/// Split a cell reference like `AB12` into zero-based (row, column).
pub(crate) fn parse_cell_ref(cell_ref: &str) -> Option<(usize, usize)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// Zero-based column index back to letters (`27` → `AB`).
fn column_name(mut col: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

struct SheetRef {
    name: String,
    part: String,
}

pub fn parse(package: &Package, main_part: &str) -> Result<Document, Error> {
    let rels = package.relationships(main_part)?;
    let xml_content = package.xml_text(main_part)?;
    let xml = roxmltree::Document::parse(xml_content)
        .map_err(|e| Error::malformed_xml(main_part, e))?;
    let root = xml.root_element();
    if root.tag_name().name() != "workbook" || root.tag_name().namespace() != Some(SML_NS) {
        return Err(Error::unsupported(
            main_part,
            format!("/{}", root.tag_name().name()),
            "root element is not a SpreadsheetML workbook",
        ));
    }

    let mut sheets = Vec::new();
    if let Some(sheets_node) = sml(root, "sheets") {
        for (i, sheet) in sml_children(sheets_node, "sheet").enumerate() {
            let name = sheet
                .attribute("name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sheet{}", i + 1));
            let path = format!("/workbook/sheets/sheet[{}]", i + 1);
            let rel_id = sheet
                .attribute((REL_NS, "id"))
                .ok_or_else(|| Error::unsupported(main_part, &path, "sheet has no r:id"))?;
            let rel = rels
                .get(rel_id)
                .filter(|r| !r.external)
                .ok_or_else(|| {
                    Error::unsupported(main_part, &path, format!("relationship {rel_id} not found"))
                })?;
            sheets.push(SheetRef {
                name,
                part: rel.target.clone(),
            });
        }
    }

    let shared_strings = match rels.by_type("sharedStrings") {
        Some(rel) => parse_shared_strings(package, &rel.target)?,
        None => Vec::new(),
    };

    let mut blocks = Vec::new();
    for sheet in &sheets {
        if !package.contains(&sheet.part) {
            return Err(Error::PartNotFound {
                part: sheet.part.clone(),
            });
        }
        // Chartsheets and dialog sheets have no cell grid.
        let Some(table) = parse_worksheet(package, sheet, &shared_strings)? else {
            log::debug!("Skipping non-worksheet sheet '{}' ({})", sheet.name, sheet.part);
            continue;
        };
        blocks.push(Block::Paragraph(Paragraph {
            style: ParagraphStyle {
                heading: Some(2),
                ..ParagraphStyle::default()
            },
            ..Paragraph::text(sheet.name.clone())
        }));
        blocks.push(Block::Table(table));
    }
    log::debug!("Parsed {} worksheets from {main_part}", sheets.len());

    Ok(Document {
        title: None,
        main_part: main_part.to_string(),
        blocks,
    })
}

fn parse_shared_strings(package: &Package, part: &str) -> Result<Vec<String>, Error> {
    let Ok(xml_content) = package.xml_text(part) else {
        log::debug!("Shared strings part {part} missing");
        return Ok(Vec::new());
    };
    let xml = roxmltree::Document::parse(xml_content).map_err(|e| Error::malformed_xml(part, e))?;
    Ok(sml_children(xml.root_element(), "si")
        .map(string_item_text)
        .collect())
}

fn parse_worksheet(
    package: &Package,
    sheet: &SheetRef,
    shared_strings: &[String],
) -> Result<Option<Table>, Error> {
    let part = sheet.part.as_str();
    let xml_content = package.xml_text(part)?;
    let xml = roxmltree::Document::parse(xml_content).map_err(|e| Error::malformed_xml(part, e))?;
    let root = xml.root_element();
    if root.tag_name().name() != "worksheet" {
        return Ok(None);
    }

    let mut grid: Vec<Vec<Option<String>>> = Vec::new();
    if let Some(sheet_data) = sml(root, "sheetData") {
        let mut next_row = 0usize;
        for row in sml_children(sheet_data, "row") {
            let row_idx = row
                .attribute("r")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|r| *r > 0)
                .map(|r| r - 1)
                .unwrap_or(next_row);
            next_row = row_idx + 1;

            let mut next_col = 0usize;
            for cell in sml_children(row, "c") {
                let (row_idx, col_idx) = cell
                    .attribute("r")
                    .and_then(parse_cell_ref)
                    .unwrap_or((row_idx, next_col));
                next_col = col_idx + 1;
                if col_idx >= MAX_COLUMNS {
                    continue;
                }
                let cell_path = || {
                    format!("sheet '{}' > cell {}{}", sheet.name, column_name(col_idx), row_idx + 1)
                };
                let Some(text) = cell_text(cell, shared_strings)
                    .map_err(|reason| Error::unsupported(part, cell_path(), reason))?
                else {
                    continue;
                };
                if grid.len() <= row_idx {
                    grid.resize_with(row_idx + 1, Vec::new);
                }
                let grid_row = &mut grid[row_idx];
                if grid_row.len() <= col_idx {
                    grid_row.resize(col_idx + 1, None);
                }
                grid_row[col_idx] = Some(text);
            }
        }
    }

    let merges = sml(root, "mergeCells")
        .map(|mc| {
            sml_children(mc, "mergeCell")
                .filter_map(|m| m.attribute("ref"))
                .filter_map(parse_range)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    // Merges are clipped to the cells that hold data; a whole-row or
    // whole-sheet merge must not pad the table out to the sheet limits.
    let height = grid.len();
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut spans: HashMap<(usize, usize), (u32, u32)> = HashMap::new();
    let mut covered: HashSet<(usize, usize)> = HashSet::new();
    for &((r1, c1), (r2, c2)) in &merges {
        if r1 >= height || c1 >= width {
            continue;
        }
        let r2 = r2.min(height - 1);
        let c2 = c2.min(width - 1);
        if (r1, c1) == (r2, c2) || spans.contains_key(&(r1, c1)) || covered.contains(&(r1, c1)) {
            continue;
        }
        spans.insert((r1, c1), ((c2 - c1 + 1) as u32, (r2 - r1 + 1) as u32));
        for r in r1..=r2 {
            for c in c1..=c2 {
                if (r, c) != (r1, c1) {
                    covered.insert((r, c));
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(height);
    for r in 0..height {
        let mut cells = Vec::with_capacity(width);
        for c in 0..width {
            let text = grid
                .get(r)
                .and_then(|row| row.get(c))
                .cloned()
                .flatten();
            let (col_span, row_span) = spans.get(&(r, c)).copied().unwrap_or((1, 1));
            cells.push(TableCell {
                blocks: text
                    .map(|t| vec![Block::Paragraph(Paragraph::text(t))])
                    .unwrap_or_default(),
                col_span,
                row_span,
                merged: covered.contains(&(r, c)),
            });
        }
        rows.push(TableRow { cells });
    }
    Ok(Some(Table { rows }))
}

/// Cell text without number formatting. `Ok(None)` for cells with no value.
fn cell_text(cell: roxmltree::Node, shared_strings: &[String]) -> Result<Option<String>, String> {
    let cell_type = cell.attribute("t").unwrap_or("n");
    if cell_type == "inlineStr" {
        return Ok(sml(cell, "is").map(string_item_text));
    }
    let Some(value) = sml(cell, "v").map(|v| v.text().unwrap_or("")) else {
        return Ok(None);
    };
    let text = match cell_type {
        "s" => {
            let idx = value
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("shared string index '{value}' is not a number"))?;
            shared_strings
                .get(idx)
                .cloned()
                .ok_or_else(|| {
                    format!(
                        "shared string index {idx} out of range ({} strings)",
                        shared_strings.len()
                    )
                })?
        }
        "b" => match value.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => value.to_string(),
    };
    Ok(Some(text))
}

/// `A1:C3` → ((0,0),(2,2)). A single reference is a 1x1 range.
fn parse_range(range: &str) -> Option<((usize, usize), (usize, usize))> {
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    let (r1, c1) = parse_cell_ref(start.trim_start_matches('$'))?;
    let (r2, c2) = parse_cell_ref(end.trim_start_matches('$'))?;
    Some(((r1.min(r2), c1.min(c2)), (r1.max(r2), c1.max(c2))))
}
