mod styles;

use crate::error::Error;
use crate::model::{
    Alignment, Block, Document, Hyperlink, ImageRef, Inline, Paragraph, ParagraphStyle, Run,
    RunFormat, Table, TableCell, TableRow,
};
use crate::package::{Package, Relationships};

use styles::{RunProps, StylesInfo, heading_from_outline, parse_alignment, parse_run_props, parse_styles};

pub(super) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const VML_NS: &str = "urn:schemas-microsoft-com:vml";
const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
const MATH_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
const STRICT_WML_NS: &str = "http://purl.oclc.org/ooxml/wordprocessingml/main";

const EMU_PER_PX: f64 = 9525.0;

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false" means true.
pub(super) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false" && v != "off")
    })
}

pub(super) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(super) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
/// Custom XML and smart-tag wrappers are transparent as well, and tracked
/// insertions keep their content.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    nodes.extend(collect_block_nodes(content));
                }
            }
            "customXml" | "smartTag" | "ins" | "moveTo" => {
                nodes.extend(collect_block_nodes(child));
            }
            _ => nodes.push(child),
        }
    }
    nodes
}

fn symbol_pua_to_unicode(cp: u32) -> Option<char> {
    let sym = if (0xF000..=0xF0FF).contains(&cp) { cp - 0xF000 } else { cp };
    let mapped = match sym {
        0xB7 => '\u{2022}', // bullet •
        0xA7 => '\u{25A0}', // black square ■ (Wingdings §)
        0xA8 => '\u{25CB}', // white circle ○
        0xD8 => '\u{2666}', // diamond ◆
        0x76 => '\u{221A}', // check mark √
        _ => return char::from_u32(sym).filter(|c| !c.is_control()),
    };
    Some(mapped)
}

/// Build the document model for a word-processing main part.
pub fn parse(package: &Package, main_part: &str) -> Result<Document, Error> {
    let styles = parse_styles(package, main_part);
    let rels = package.relationships(main_part)?;

    let xml_content = package.xml_text(main_part)?;
    let xml = roxmltree::Document::parse(xml_content)
        .map_err(|e| Error::malformed_xml(main_part, e))?;
    let root = xml.root_element();

    if root.tag_name().namespace() == Some(STRICT_WML_NS) {
        return Err(Error::unsupported(
            main_part,
            "/document",
            "Strict Open XML word documents are not supported",
        ));
    }
    if !is_wml(root, "document") {
        return Err(Error::unsupported(
            main_part,
            format!("/{}", root.tag_name().name()),
            "root element is not w:document",
        ));
    }
    let body = wml(root, "body")
        .ok_or_else(|| Error::unsupported(main_part, "/w:document", "missing w:body"))?;

    let builder = ModelBuilder {
        styles: &styles,
        rels: &rels,
    };
    let blocks = builder.parse_blocks(body);
    log::debug!("Parsed {} top-level blocks from {main_part}", blocks.len());

    Ok(Document {
        title: None,
        main_part: main_part.to_string(),
        blocks,
    })
}

struct ModelBuilder<'s> {
    styles: &'s StylesInfo,
    rels: &'s Relationships,
}

/// A complex field being read (`w:fldChar` begin .. separate .. end).
struct OpenField {
    instr: String,
    in_result: bool,
    result: Vec<Inline>,
}

/// Collects inlines in document order, routing content into the innermost
/// open field and merging adjacent runs with equal formatting.
#[derive(Default)]
struct InlineSink {
    inlines: Vec<Inline>,
    fields: Vec<OpenField>,
}

fn push_inline(out: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Run(run) = &inline {
        if run.text.is_empty() {
            return;
        }
        if let Some(Inline::Run(last)) = out.last_mut()
            && last.format == run.format
        {
            last.text.push_str(&run.text);
            return;
        }
    }
    out.push(inline);
}

impl InlineSink {
    fn push(&mut self, inline: Inline) {
        match self.fields.last_mut() {
            Some(field) if field.in_result => push_inline(&mut field.result, inline),
            // Content of a field instruction is never shown.
            Some(_) => {}
            None => push_inline(&mut self.inlines, inline),
        }
    }

    fn push_text(&mut self, text: &str, format: RunFormat) {
        self.push(Inline::Run(Run {
            text: text.to_string(),
            format,
        }));
    }

    fn in_instruction(&self) -> bool {
        self.fields.last().is_some_and(|f| !f.in_result)
    }

    fn begin_field(&mut self) {
        self.fields.push(OpenField {
            instr: String::new(),
            in_result: false,
            result: Vec::new(),
        });
    }

    fn separate_field(&mut self) {
        if let Some(field) = self.fields.last_mut() {
            field.in_result = true;
        }
    }

    fn instr_text(&mut self, text: &str) {
        if let Some(field) = self.fields.last_mut()
            && !field.in_result
        {
            field.instr.push_str(text);
        }
    }

    fn end_field(&mut self) {
        let Some(field) = self.fields.pop() else {
            return;
        };
        match parse_hyperlink_instr(&field.instr) {
            Some(target) if !field.result.is_empty() => self.push(Inline::Hyperlink(Hyperlink {
                target,
                inlines: field.result,
            })),
            _ => {
                for inline in field.result {
                    self.push(inline);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Inline> {
        while !self.fields.is_empty() {
            self.end_field();
        }
        self.inlines
    }
}

/// Target of a `HYPERLINK "url" \l "anchor"` field instruction.
fn parse_hyperlink_instr(instr: &str) -> Option<String> {
    let mut tokens = Vec::new();
    let mut chars = instr.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut tok = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                tok.push(c);
            }
            tokens.push(tok);
        } else {
            let mut tok = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                tok.push(c);
                chars.next();
            }
            tokens.push(tok);
        }
    }

    let mut iter = tokens.into_iter();
    if !iter.next()?.eq_ignore_ascii_case("HYPERLINK") {
        return None;
    }
    let mut url = None;
    let mut anchor = None;
    while let Some(tok) = iter.next() {
        match tok.as_str() {
            "\\l" => anchor = iter.next(),
            "\\o" | "\\t" => {
                iter.next();
            }
            s if s.starts_with('\\') => {}
            _ if url.is_none() => url = Some(tok),
            _ => {}
        }
    }
    match (url, anchor) {
        (Some(u), Some(a)) => Some(format!("{u}#{a}")),
        (Some(u), None) => Some(u),
        (None, Some(a)) => Some(format!("#{a}")),
        (None, None) => None,
    }
}

impl ModelBuilder<'_> {
    fn parse_blocks(&self, parent: roxmltree::Node) -> Vec<Block> {
        let mut blocks = Vec::new();
        for node in collect_block_nodes(parent) {
            match node.tag_name().name() {
                "p" => blocks.push(Block::Paragraph(self.parse_paragraph(node))),
                "tbl" => blocks.push(Block::Table(self.parse_table(node))),
                _ => {}
            }
        }
        blocks
    }

    fn parse_paragraph(&self, para_node: roxmltree::Node) -> Paragraph {
        let ppr = wml(para_node, "pPr");
        let style_def = self
            .styles
            .paragraph_style(ppr.and_then(|ppr| wml_attr(ppr, "pStyle")));

        let heading = ppr
            .and_then(heading_from_outline)
            .unwrap_or_else(|| style_def.and_then(|s| s.heading));
        let alignment = ppr
            .and_then(|ppr| wml_attr(ppr, "jc"))
            .map(parse_alignment)
            .or_else(|| style_def.and_then(|s| s.alignment))
            .unwrap_or(Alignment::Left);
        let para_run = style_def
            .map(|s| s.run)
            .unwrap_or_default()
            .or(self.styles.defaults);

        let mut sink = InlineSink::default();
        self.collect_inlines(para_node, para_run, &mut sink);

        Paragraph {
            style: ParagraphStyle { heading, alignment },
            inlines: sink.finish(),
        }
    }

    fn collect_inlines(&self, parent: roxmltree::Node, para_run: RunProps, sink: &mut InlineSink) {
        for child in parent.children() {
            let ns = child.tag_name().namespace();
            if ns == Some(MATH_NS) {
                // Equations keep their text, without math layout.
                let text: String = child
                    .descendants()
                    .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(MATH_NS))
                    .filter_map(|n| n.text())
                    .collect();
                sink.push_text(&text, para_run.to_format());
                continue;
            }
            if ns != Some(WML_NS) {
                continue;
            }
            match child.tag_name().name() {
                "r" => self.parse_run(child, para_run, sink),
                "hyperlink" => {
                    let mut inner = InlineSink::default();
                    self.collect_inlines(child, para_run, &mut inner);
                    let inlines = inner.finish();
                    match self.hyperlink_target(child) {
                        Some(target) if !inlines.is_empty() => {
                            sink.push(Inline::Hyperlink(Hyperlink { target, inlines }))
                        }
                        _ => inlines.into_iter().for_each(|i| sink.push(i)),
                    }
                }
                "fldSimple" => {
                    let mut inner = InlineSink::default();
                    self.collect_inlines(child, para_run, &mut inner);
                    let inlines = inner.finish();
                    let target = child
                        .attribute((WML_NS, "instr"))
                        .and_then(parse_hyperlink_instr);
                    match target {
                        Some(target) if !inlines.is_empty() => {
                            sink.push(Inline::Hyperlink(Hyperlink { target, inlines }))
                        }
                        _ => inlines.into_iter().for_each(|i| sink.push(i)),
                    }
                }
                "sdt" => {
                    if let Some(content) = wml(child, "sdtContent") {
                        self.collect_inlines(content, para_run, sink);
                    }
                }
                "customXml" | "smartTag" | "ins" | "moveTo" | "dir" | "bdo" => {
                    self.collect_inlines(child, para_run, sink)
                }
                "bookmarkStart" => {
                    if let Some(name) = child.attribute((WML_NS, "name"))
                        && name != "_GoBack"
                    {
                        sink.push(Inline::Anchor(name.to_string()));
                    }
                }
                // Deleted revisions, paragraph properties, comments and
                // proofing marks carry no visible content.
                _ => {}
            }
        }
    }

    fn hyperlink_target(&self, node: roxmltree::Node) -> Option<String> {
        let anchor = node.attribute((WML_NS, "anchor"));
        let base = node.attribute((REL_NS, "id")).and_then(|rid| {
            let rel = self.rels.get(rid);
            if rel.is_none() {
                log::debug!("Hyperlink relationship {rid} not found");
            }
            rel.map(|r| r.target.clone())
        });
        match (base, anchor) {
            (Some(b), Some(a)) => Some(format!("{b}#{a}")),
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(format!("#{a}")),
            (None, None) => None,
        }
    }

    fn parse_run(&self, run_node: roxmltree::Node, para_run: RunProps, sink: &mut InlineSink) {
        let rpr = wml(run_node, "rPr");
        let char_style = rpr
            .and_then(|n| wml_attr(n, "rStyle"))
            .and_then(|id| self.styles.character_styles.get(id).copied())
            .unwrap_or_default();
        let hidden = rpr.and_then(|n| wml_bool(n, "vanish")).unwrap_or(false);
        let props = rpr
            .map(parse_run_props)
            .unwrap_or_default()
            .or(char_style)
            .or(para_run);
        let format = props.to_format();

        self.run_content(run_node, format, hidden, sink);
    }

    /// Iterate run children in document order; text, breaks, drawings and
    /// field characters interleave.
    fn run_content(&self, parent: roxmltree::Node, format: RunFormat, hidden: bool, sink: &mut InlineSink) {
        for child in parent.children() {
            if child.tag_name().namespace() == Some(MC_NS) && child.tag_name().name() == "AlternateContent" {
                let branch = child
                    .children()
                    .find(|n| n.tag_name().name() == "Choice")
                    .or_else(|| child.children().find(|n| n.tag_name().name() == "Fallback"));
                if let Some(branch) = branch {
                    self.run_content(branch, format, hidden, sink);
                }
                continue;
            }
            if child.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match child.tag_name().name() {
                "fldChar" => match child.attribute((WML_NS, "fldCharType")) {
                    Some("begin") => sink.begin_field(),
                    Some("separate") => sink.separate_field(),
                    Some("end") => sink.end_field(),
                    _ => {}
                },
                "instrText" => {
                    if let Some(t) = child.text() {
                        sink.instr_text(t);
                    }
                }
                _ if hidden || sink.in_instruction() => {}
                "t" => {
                    if let Some(t) = child.text() {
                        // Word treats newlines in w:t as whitespace; only w:br creates line breaks
                        sink.push_text(&t.replace('\n', " "), format);
                    }
                }
                "tab" | "ptab" => sink.push_text("\t", format),
                "br" | "cr" => sink.push(Inline::LineBreak),
                "noBreakHyphen" => sink.push_text("-", format),
                "softHyphen" => sink.push_text("\u{00AD}", format),
                "sym" => {
                    if let Some(c) = child
                        .attribute((WML_NS, "char"))
                        .and_then(|v| u32::from_str_radix(v, 16).ok())
                        .and_then(symbol_pua_to_unicode)
                    {
                        sink.push_text(c.encode_utf8(&mut [0; 4]), format);
                    }
                }
                "drawing" => self.parse_drawing(child, format, sink),
                "pict" | "object" => self.parse_vml(child, format, sink),
                _ => {}
            }
        }
    }

    fn parse_drawing(&self, drawing_node: roxmltree::Node, format: RunFormat, sink: &mut InlineSink) {
        for container in drawing_node.children() {
            let name = container.tag_name().name();
            if (name != "inline" && name != "anchor") || container.tag_name().namespace() != Some(WPD_NS) {
                continue;
            }

            let blips: Vec<_> = container
                .descendants()
                .filter(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
                .collect();
            if blips.is_empty() {
                // Shapes and text boxes: keep their text.
                self.text_box_content(container, format, sink);
                continue;
            }

            // A lone picture takes the drawing's own size and description;
            // pictures inside a group or canvas carry their own.
            let extent = container.children().find(|n| {
                n.tag_name().name() == "extent" && n.tag_name().namespace() == Some(WPD_NS)
            });
            let doc_pr = container.children().find(|n| {
                n.tag_name().name() == "docPr" && n.tag_name().namespace() == Some(WPD_NS)
            });
            let single = blips.len() == 1;
            for blip in blips {
                let Some(rel_id) = blip_rel_id(blip) else {
                    continue;
                };
                let pic = blip
                    .ancestors()
                    .find(|n| n.tag_name().name() == "pic" && n.tag_name().namespace() == Some(PIC_NS));
                let pic_pr = pic.and_then(|p| {
                    p.descendants().find(|n| {
                        n.tag_name().name() == "cNvPr" && n.tag_name().namespace() == Some(PIC_NS)
                    })
                });
                let pic_ext = pic.and_then(picture_ext);
                let (props, size) = if single {
                    (doc_pr.or(pic_pr), extent.or(pic_ext))
                } else {
                    (pic_pr, pic_ext)
                };
                sink.push(Inline::Image(ImageRef {
                    rel_id: rel_id.to_string(),
                    alt: props.and_then(description),
                    width_px: size.and_then(|n| emu_attr_to_px(n, "cx")),
                    height_px: size.and_then(|n| emu_attr_to_px(n, "cy")),
                }));
            }
        }
    }

    /// Legacy VML pictures (`v:imagedata r:id`) and VML text boxes.
    fn parse_vml(&self, pict: roxmltree::Node, format: RunFormat, sink: &mut InlineSink) {
        let image_rel = pict
            .descendants()
            .find(|n| n.tag_name().name() == "imagedata" && n.tag_name().namespace() == Some(VML_NS))
            .and_then(|n| n.attribute((REL_NS, "id")));
        if let Some(rel_id) = image_rel {
            sink.push(Inline::Image(ImageRef {
                rel_id: rel_id.to_string(),
                ..ImageRef::default()
            }));
        } else {
            self.text_box_content(pict, format, sink);
        }
    }

    fn text_box_content(&self, container: roxmltree::Node, format: RunFormat, sink: &mut InlineSink) {
        let Some(content) = container
            .descendants()
            .find(|n| is_wml(*n, "txbxContent"))
        else {
            return;
        };
        let run = RunProps {
            bold: Some(format.bold),
            italic: Some(format.italic),
            underline: Some(format.underline),
            strikethrough: Some(format.strikethrough),
            vertical_align: Some(format.vertical_align),
        };
        for (i, para) in collect_block_nodes(content)
            .into_iter()
            .filter(|n| n.tag_name().name() == "p")
            .enumerate()
        {
            if i > 0 {
                sink.push(Inline::LineBreak);
            }
            let mut inner = InlineSink::default();
            self.collect_inlines(para, run, &mut inner);
            for inline in inner.finish() {
                sink.push(inline);
            }
        }
    }

    fn parse_table(&self, node: roxmltree::Node) -> Table {
        struct RawCell<'a> {
            node: roxmltree::Node<'a, 'a>,
            grid_col: usize,
            grid_span: u32,
            v_merge: Option<bool>, // Some(true) = restart, Some(false) = continue
        }

        let tbl_rows: Vec<_> = collect_block_nodes(node)
            .into_iter()
            .filter(|n| n.tag_name().name() == "tr")
            .collect();

        let grid_offset = |tr: roxmltree::Node, name: &str| {
            wml(tr, "trPr")
                .and_then(|pr| wml_attr(pr, name))
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0)
                .min(1000)
        };

        let mut raw_rows: Vec<Vec<RawCell>> = Vec::with_capacity(tbl_rows.len());
        let mut offsets: Vec<(u32, u32)> = Vec::with_capacity(tbl_rows.len());
        for tr in &tbl_rows {
            let (before, after) = (grid_offset(*tr, "gridBefore"), grid_offset(*tr, "gridAfter"));
            offsets.push((before, after));
            let mut grid_col = before as usize;
            let mut cells = Vec::new();
            for tc in collect_block_nodes(*tr)
                .into_iter()
                .filter(|n| n.tag_name().name() == "tc")
            {
                let tc_pr = wml(tc, "tcPr");
                let grid_span = tc_pr
                    .and_then(|pr| wml_attr(pr, "gridSpan"))
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(1)
                    .clamp(1, 1000);
                let v_merge = tc_pr
                    .and_then(|pr| wml(pr, "vMerge"))
                    .map(|n| n.attribute((WML_NS, "val")) == Some("restart"));
                cells.push(RawCell {
                    node: tc,
                    grid_col,
                    grid_span,
                    v_merge,
                });
                grid_col += grid_span as usize;
            }
            raw_rows.push(cells);
        }

        let mut rows: Vec<TableRow> = Vec::with_capacity(raw_rows.len());
        for (ri, raw_row) in raw_rows.iter().enumerate() {
            let (before, after) = offsets[ri];
            let empty = |col_span| TableCell {
                col_span,
                ..TableCell::default()
            };
            let mut cells = Vec::with_capacity(raw_row.len() + 2);
            if before > 0 {
                cells.push(empty(before));
            }
            for raw in raw_row {
                let continues_above = raw.v_merge == Some(false)
                    && ri > 0
                    && raw_rows[ri - 1]
                        .iter()
                        .any(|c| c.grid_col == raw.grid_col && c.v_merge.is_some());
                let mut cell = TableCell {
                    blocks: Vec::new(),
                    col_span: raw.grid_span,
                    row_span: 1,
                    merged: continues_above,
                };
                if !continues_above {
                    cell.blocks = self.parse_blocks(raw.node);
                    if raw.v_merge.is_some() {
                        cell.row_span += raw_rows[ri + 1..]
                            .iter()
                            .take_while(|row| {
                                row.iter().any(|c| {
                                    c.grid_col == raw.grid_col && c.v_merge == Some(false)
                                })
                            })
                            .count() as u32;
                    }
                }
                cells.push(cell);
            }
            if after > 0 {
                cells.push(empty(after));
            }
            rows.push(TableRow { cells });
        }
        Table { rows }
    }
}

fn blip_rel_id<'a>(blip: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    blip.attribute((REL_NS, "embed"))
        .or_else(|| blip.attribute((REL_NS, "link")))
}

/// `a:ext` of a picture's own transform (`pic:spPr/a:xfrm/a:ext`).
fn picture_ext<'a>(pic: roxmltree::Node<'a, 'a>) -> Option<roxmltree::Node<'a, 'a>> {
    pic.descendants()
        .find(|n| n.tag_name().name() == "xfrm" && n.tag_name().namespace() == Some(DML_NS))?
        .children()
        .find(|n| n.tag_name().name() == "ext" && n.tag_name().namespace() == Some(DML_NS))
}

fn emu_attr_to_px(node: roxmltree::Node, attr: &str) -> Option<u32> {
    node.attribute(attr)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .map(|v| (v / EMU_PER_PX).round() as u32)
}

fn description(props: roxmltree::Node) -> Option<String> {
    props
        .attribute("descr")
        .or_else(|| props.attribute("title"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
