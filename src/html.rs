//! HTML emission. Output depends only on the model and the media map, so the
//! same input always renders to the same bytes.

use std::fmt::Write;

use base64::Engine;

use crate::media::MediaAssets;
use crate::model::{
    Alignment, Block, Document, Hyperlink, ImageRef, Inline, Paragraph, Run, Table, VertAlign,
};

pub fn render(doc: &Document, media: &MediaAssets) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"/>");
    if let Some(title) = doc.title.as_deref().filter(|t| !t.trim().is_empty()) {
        out.push_str("<title>");
        escape_text(&mut out, title);
        out.push_str("</title>");
    }
    out.push_str("</head><body>");
    let mut renderer = Renderer {
        out,
        media,
        in_link: false,
    };
    renderer.blocks(&doc.blocks);
    let mut out = renderer.out;
    out.push_str("</body></html>");
    out
}

pub(crate) fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

/// Links that would execute code when followed are not emitted.
fn is_safe_href(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return true;
    };
    let scheme = scheme
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    // A colon after a path, fragment or query is not a scheme separator.
    if scheme.contains(['/', '#', '?']) {
        return true;
    }
    !matches!(scheme.as_str(), "javascript" | "vbscript" | "data")
}

struct Renderer<'m> {
    out: String,
    media: &'m MediaAssets,
    // `<a>` may not nest; anchors inside a link are emitted as `<span id>`.
    in_link: bool,
}

impl Renderer<'_> {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) => self.paragraph(p),
                Block::Table(t) => self.table(t),
            }
        }
    }

    fn paragraph(&mut self, para: &Paragraph) {
        let tag = match para.style.heading {
            Some(level @ 1..=6) => ["h1", "h2", "h3", "h4", "h5", "h6"][level as usize - 1],
            _ => "p",
        };
        let align = match para.style.alignment {
            Alignment::Left => None,
            Alignment::Center => Some("center"),
            Alignment::Right => Some("right"),
            Alignment::Justify => Some("justify"),
        };
        match align {
            Some(a) => {
                let _ = write!(self.out, "<{tag} style=\"text-align:{a}\">");
            }
            None => {
                let _ = write!(self.out, "<{tag}>");
            }
        }
        self.inlines(&para.inlines);
        let _ = write!(self.out, "</{tag}>");
    }

    fn inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            match inline {
                Inline::Run(run) => self.run(run),
                Inline::Image(img) => self.image(img),
                Inline::Hyperlink(link) => self.hyperlink(link),
                Inline::LineBreak => self.out.push_str("<br/>"),
                Inline::Anchor(name) => {
                    let tag = if self.in_link { "span" } else { "a" };
                    let _ = write!(self.out, "<{tag} id=\"");
                    escape_attr(&mut self.out, name);
                    let _ = write!(self.out, "\"></{tag}>");
                }
            }
        }
    }

    fn run(&mut self, run: &Run) {
        let f = &run.format;
        let vert = match f.vertical_align {
            VertAlign::Baseline => None,
            VertAlign::Superscript => Some("sup"),
            VertAlign::Subscript => Some("sub"),
        };
        // Fixed nesting order: bold outermost, then italic, underline,
        // strikethrough, vertical alignment.
        let wrappers: Vec<&str> = [
            f.bold.then_some("strong"),
            f.italic.then_some("em"),
            f.underline.then_some("u"),
            f.strikethrough.then_some("s"),
            vert,
        ]
        .into_iter()
        .flatten()
        .collect();

        for tag in &wrappers {
            let _ = write!(self.out, "<{tag}>");
        }
        escape_text(&mut self.out, &run.text);
        for tag in wrappers.iter().rev() {
            let _ = write!(self.out, "</{tag}>");
        }
    }

    fn image(&mut self, img: &ImageRef) {
        let Some(asset) = self.media.get(&img.rel_id) else {
            self.out.push_str("<img alt=\"\">");
            return;
        };
        self.out.push_str("<img src=\"data:");
        escape_attr(&mut self.out, &asset.content_type);
        self.out.push_str(";base64,");
        base64::engine::general_purpose::STANDARD.encode_string(&asset.data, &mut self.out);
        self.out.push('"');
        if let Some(alt) = &img.alt {
            self.out.push_str(" alt=\"");
            escape_attr(&mut self.out, alt);
            self.out.push('"');
        }
        if let Some(w) = img.width_px {
            let _ = write!(self.out, " width=\"{w}\"");
        }
        if let Some(h) = img.height_px {
            let _ = write!(self.out, " height=\"{h}\"");
        }
        self.out.push('>');
    }

    fn hyperlink(&mut self, link: &Hyperlink) {
        if !is_safe_href(&link.target) {
            log::debug!("Dropping unsafe hyperlink target");
            self.inlines(&link.inlines);
            return;
        }
        self.out.push_str("<a href=\"");
        escape_attr(&mut self.out, &link.target);
        self.out.push_str("\">");
        self.in_link = true;
        self.inlines(&link.inlines);
        self.in_link = false;
        self.out.push_str("</a>");
    }

    fn table(&mut self, table: &Table) {
        self.out.push_str("<table>");
        for row in &table.rows {
            self.out.push_str("<tr>");
            for cell in row.cells.iter().filter(|c| !c.merged) {
                self.out.push_str("<td");
                if cell.col_span > 1 {
                    let _ = write!(self.out, " colspan=\"{}\"", cell.col_span);
                }
                if cell.row_span > 1 {
                    let _ = write!(self.out, " rowspan=\"{}\"", cell.row_span);
                }
                self.out.push('>');
                self.blocks(&cell.blocks);
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>");
        }
        self.out.push_str("</table>");
    }
}
