#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum VertAlign {
    #[default]
    Baseline,
    Superscript,
    Subscript,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParagraphStyle {
    /// 1..=6 when the resolved style is a heading.
    pub heading: Option<u8>,
    pub alignment: Alignment,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub vertical_align: VertAlign,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub text: String,
    pub format: RunFormat,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageRef {
    pub rel_id: String,
    pub alt: Option<String>,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hyperlink {
    pub target: String,
    pub inlines: Vec<Inline>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Run(Run),
    Image(ImageRef),
    Hyperlink(Hyperlink),
    LineBreak,
    /// Bookmark target for internal links.
    Anchor(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub inlines: Vec<Inline>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub blocks: Vec<Block>,
    pub col_span: u32,
    pub row_span: u32,
    /// Covered by a neighbouring cell's span; not emitted.
    pub merged: bool,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            col_span: 1,
            row_span: 1,
            merged: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub title: Option<String>,
    /// Part whose relationships image ids refer to.
    pub main_part: String,
    pub blocks: Vec<Block>,
}

impl Paragraph {
    pub fn text(text: impl Into<String>) -> Self {
        Paragraph {
            style: ParagraphStyle::default(),
            inlines: vec![Inline::Run(Run {
                text: text.into(),
                format: RunFormat::default(),
            })],
        }
    }
}

impl Document {
    /// Every image reference in document order, including those nested in
    /// tables and hyperlinks.
    pub fn images(&self) -> Vec<&ImageRef> {
        fn walk_inlines<'a>(inlines: &'a [Inline], out: &mut Vec<&'a ImageRef>) {
            for inline in inlines {
                match inline {
                    Inline::Image(img) => out.push(img),
                    Inline::Hyperlink(link) => walk_inlines(&link.inlines, out),
                    Inline::Run(_) | Inline::LineBreak | Inline::Anchor(_) => {}
                }
            }
        }
        fn walk_blocks<'a>(blocks: &'a [Block], out: &mut Vec<&'a ImageRef>) {
            for block in blocks {
                match block {
                    Block::Paragraph(p) => walk_inlines(&p.inlines, out),
                    Block::Table(t) => {
                        for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                            walk_blocks(&cell.blocks, out);
                        }
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk_blocks(&self.blocks, &mut out);
        out
    }
}
