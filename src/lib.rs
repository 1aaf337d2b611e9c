mod config;
mod docx;
mod error;
mod html;
mod media;
mod model;
mod package;
mod xlsx;

pub use config::{FormatKind, FormatRegistry, TargetFormat};
pub use error::Error;

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use model::Document;
use package::Package;

/// An office document as handed to the converter.
#[derive(Clone, Copy, Debug)]
pub struct SourceDocument<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub mime_type: &'a str,
}

/// A finished conversion: UTF-8 HTML plus the name and type to serve it as.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedDocument {
    pub html: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

/// Convert using the process-wide default format registry.
pub fn convert(source: SourceDocument<'_>, target_format: &str) -> Result<RenderedDocument, Error> {
    convert_with(FormatRegistry::global(), source, target_format)
}

pub fn convert_with(
    registry: &FormatRegistry,
    source: SourceDocument<'_>,
    target_format: &str,
) -> Result<RenderedDocument, Error> {
    let target: TargetFormat = target_format.parse()?;
    let kind = registry.kind_for_mime(source.mime_type)?;
    let t0 = Instant::now();

    let package = Package::open(source.bytes)?;
    let main_part = package.main_part(kind)?;
    let t_open = t0.elapsed();

    let mut doc = build_model(&package, kind, &main_part)?;
    doc.title = package.title();
    let t_parse = t0.elapsed();

    let media = media::resolve(&package, &doc)?;
    let t_media = t0.elapsed();

    let html = html::render(&doc, &media);
    let t_total = t0.elapsed();

    log::info!(
        "Timing: open={:.1}ms, parse={:.1}ms, media={:.1}ms, render={:.1}ms, total={:.1}ms (output {} bytes)",
        t_open.as_secs_f64() * 1000.0,
        (t_parse - t_open).as_secs_f64() * 1000.0,
        (t_media - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_media).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        html.len(),
    );

    Ok(RenderedDocument {
        html: html.into_bytes(),
        filename: target_filename(source.filename, target),
        mime_type: target.mime_type(),
    })
}

fn build_model(package: &Package, kind: FormatKind, main_part: &str) -> Result<Document, Error> {
    match kind {
        FormatKind::WordDocument | FormatKind::WordTemplate => docx::parse(package, main_part),
        FormatKind::SpreadsheetTemplate | FormatKind::Spreadsheet => xlsx::parse(package, main_part),
    }
}

/// `report.DOCX` → `report.html`; directories of either separator style are
/// dropped.
pub fn target_filename(source_filename: &str, target: TargetFormat) -> String {
    let name = source_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_filename);
    let base = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    let base = if base.is_empty() { "document" } else { base };
    format!("{}.{}", base, target.extension())
}

/// Convert a file on disk, writing the HTML to `output` (or `<base>.html`
/// beside the input). Returns the path written.
pub fn convert_file(
    registry: &FormatRegistry,
    input: &Path,
    output: Option<&Path>,
    mime_type: &str,
    max_size: Option<u64>,
) -> Result<std::path::PathBuf, Error> {
    let file = File::open(input)?;
    let size = file.metadata()?.len();
    if let Some(limit) = max_size
        && size > limit
    {
        return Err(Error::InputTooLarge { size, limit });
    }
    let mmap = unsafe { memmap2::Mmap::map(&file)? };

    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rendered = convert_with(
        registry,
        SourceDocument {
            bytes: &mmap,
            filename: &filename,
            mime_type,
        },
        TargetFormat::Html.extension(),
    )?;

    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_file_name(&rendered.filename),
    };
    std::fs::write(&out_path, &rendered.html)?;
    Ok(out_path)
}
