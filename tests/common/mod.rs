#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOTX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.template";
pub const XLTX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.template";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

pub fn zip_parts(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A small solid-colour PNG.
pub fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn content_types(main_part: &str, main_type: &str, has_core: bool) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Default Extension="png" ContentType="image/png"/>
"#,
    );
    xml.push_str(&format!(
        r#"<Override PartName="/{main_part}" ContentType="{main_type}"/>"#
    ));
    if has_core {
        xml.push_str(r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#);
    }
    xml.push_str("</Types>");
    xml.into_bytes()
}

fn root_rels(main_part: &str, has_core: bool) -> Vec<u8> {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{PKG_RELS_NS}">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{main_part}"/>
"#
    );
    if has_core {
        xml.push_str(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#);
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

fn core_props(title: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title></cp:coreProperties>"#
    )
    .into_bytes()
}

/// One relationship of `word/document.xml`.
pub enum DocRel {
    /// Embedded image stored at `word/<target>`.
    Image { id: String, target: String, data: Vec<u8> },
    /// Image relationship whose target part is absent from the package.
    MissingImage { id: String, target: String },
    Hyperlink { id: String, url: String },
}

/// Builder for WordprocessingML packages (docx and dotx share the layout).
pub struct WordFixture {
    body: String,
    rels: Vec<DocRel>,
    title: Option<String>,
    template: bool,
}

impl WordFixture {
    pub fn new() -> Self {
        Self {
            body: String::new(),
            rels: Vec::new(),
            title: None,
            template: false,
        }
    }

    pub fn template(mut self) -> Self {
        self.template = true;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Append raw body XML (`w:` and `r:` prefixes are bound).
    pub fn raw(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    pub fn paragraph(self, text: &str) -> Self {
        let xml = format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#);
        self.raw(&xml)
    }

    /// A paragraph holding one inline picture for relationship `rel_id`.
    pub fn picture(self, rel_id: &str, descr: &str) -> Self {
        let xml = format!(
            r#"<w:p><w:r><w:drawing><wp:inline><wp:extent cx="952500" cy="476250"/><wp:docPr id="1" name="Picture" descr="{descr}"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:blipFill><a:blip r:embed="{rel_id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        );
        self.raw(&xml)
    }

    /// A paragraph holding one grouped drawing with a picture per `rel_ids`.
    pub fn picture_group(self, rel_ids: &[&str]) -> Self {
        let pics: String = rel_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                format!(
                    r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{n}" name="part {n}" descr="part {n}"/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{id}"/></pic:blipFill><pic:spPr><a:xfrm><a:ext cx="952500" cy="952500"/></a:xfrm></pic:spPr></pic:pic>"#,
                    n = i + 2
                )
            })
            .collect();
        let xml = format!(
            r#"<w:p><w:r><w:drawing><wp:anchor><wp:extent cx="1905000" cy="952500"/><wp:docPr id="1" name="Group"/><a:graphic><a:graphicData uri="http://schemas.microsoft.com/office/word/2010/wordprocessingGroup"><wpg:wgp>{pics}</wpg:wgp></a:graphicData></a:graphic></wp:anchor></w:drawing></w:r></w:p>"#
        );
        self.raw(&xml)
    }

    pub fn image(mut self, id: &str, target: &str, data: Vec<u8>) -> Self {
        self.rels.push(DocRel::Image {
            id: id.into(),
            target: target.into(),
            data,
        });
        self
    }

    pub fn missing_image(mut self, id: &str, target: &str) -> Self {
        self.rels.push(DocRel::MissingImage {
            id: id.into(),
            target: target.into(),
        });
        self
    }

    pub fn hyperlink(mut self, id: &str, url: &str) -> Self {
        self.rels.push(DocRel::Hyperlink {
            id: id.into(),
            url: url.into(),
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let main_type = if self.template {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml"
        } else {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
        };
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" xmlns:wpg="http://schemas.microsoft.com/office/word/2010/wordprocessingGroup"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            self.body
        );

        let mut rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{PKG_RELS_NS}">"#
        );
        let mut media = Vec::new();
        for rel in self.rels {
            match rel {
                DocRel::Image { id, target, data } => {
                    rels.push_str(&format!(
                        r#"<Relationship Id="{id}" Type="{IMAGE_REL}" Target="{target}"/>"#
                    ));
                    media.push((format!("word/{target}"), data));
                }
                DocRel::MissingImage { id, target } => {
                    rels.push_str(&format!(
                        r#"<Relationship Id="{id}" Type="{IMAGE_REL}" Target="{target}"/>"#
                    ));
                }
                DocRel::Hyperlink { id, url } => {
                    rels.push_str(&format!(
                        r#"<Relationship Id="{id}" Type="{HYPERLINK_REL}" Target="{url}" TargetMode="External"/>"#
                    ));
                }
            }
        }
        rels.push_str("</Relationships>");

        let has_core = self.title.is_some();
        let mut parts: Vec<(String, Vec<u8>)> = vec![
            (
                "[Content_Types].xml".into(),
                content_types("word/document.xml", main_type, has_core),
            ),
            ("_rels/.rels".into(), root_rels("word/document.xml", has_core)),
            ("word/document.xml".into(), document.into_bytes()),
            ("word/_rels/document.xml.rels".into(), rels.into_bytes()),
        ];
        if let Some(title) = &self.title {
            parts.push(("docProps/core.xml".into(), core_props(title)));
        }
        parts.extend(media);
        let refs: Vec<(&str, Vec<u8>)> = parts.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
        zip_parts(&refs)
    }
}

/// A spreadsheet template with one sheet of shared-string and numeric cells.
pub fn spreadsheet_template(sheet_name: &str, rows: &[&[&str]]) -> Vec<u8> {
    let mut strings: Vec<String> = Vec::new();
    let mut sheet_data = String::new();
    for (r, row) in rows.iter().enumerate() {
        sheet_data.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.is_empty() {
                continue;
            }
            if value.parse::<f64>().is_ok() {
                sheet_data.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                let idx = strings.len();
                strings.push(value.to_string());
                sheet_data.push_str(&format!(r#"<c r="{cell_ref}" t="s"><v>{idx}</v></c>"#));
            }
        }
        sheet_data.push_str("</row>");
    }

    let sheet_xml = format!("<sheetData>{sheet_data}</sheetData>");
    let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
    spreadsheet_from_xml(sheet_name, &sheet_xml, &strings)
}

/// A spreadsheet template whose single worksheet holds `worksheet_inner`
/// verbatim, with `shared` as its shared-string table.
pub fn spreadsheet_from_xml(sheet_name: &str, worksheet_inner: &str, shared: &[&str]) -> Vec<u8> {
    const SML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{SML}" xmlns:r="{R_NS}"><sheets><sheet name="{sheet_name}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );
    let workbook_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{PKG_RELS_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
    );
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{SML}">{worksheet_inner}</worksheet>"#
    );
    let sst_items: String = shared.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();
    let sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{SML}" count="{n}" uniqueCount="{n}">{sst_items}</sst>"#,
        n = shared.len()
    );

    zip_parts(&[
        (
            "[Content_Types].xml",
            content_types(
                "xl/workbook.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
                false,
            ),
        ),
        ("_rels/.rels", root_rels("xl/workbook.xml", false)),
        ("xl/workbook.xml", workbook.into_bytes()),
        ("xl/_rels/workbook.xml.rels", workbook_rels.into_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.into_bytes()),
        ("xl/sharedStrings.xml", sst.into_bytes()),
    ])
}

pub fn html_string(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).expect("output is not UTF-8")
}

/// Strip tags and decode the entities the renderer emits.
pub fn text_content(html: &str) -> String {
    let body = html
        .split_once("<body>")
        .map(|(_, b)| b)
        .unwrap_or(html);
    let mut out = String::new();
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
