mod common;

use common::{DOCX_MIME, WordFixture, XLTX_MIME};
use docxide_html::{SourceDocument, convert};
use rayon::prelude::*;

#[test]
fn parallel_conversions_match_sequential_output() {
    let _ = env_logger::try_init();
    let inputs: Vec<(String, Vec<u8>, &str)> = (0u32..24)
        .map(|i| {
            if i % 3 == 0 {
                let (n, square) = (i.to_string(), (i * i).to_string());
                let bytes = common::spreadsheet_template(
                    &format!("Sheet {i}"),
                    &[&["n", "square"], &[n.as_str(), square.as_str()]],
                );
                (format!("book{i}.xltx"), bytes, XLTX_MIME)
            } else {
                let bytes = WordFixture::new()
                    .paragraph(&format!("Document {i}"))
                    .picture("rId1", &format!("image {i}"))
                    .image("rId1", "media/image1.png", common::png(1 + i, 1 + i, [i as u8, 0, 0]))
                    .build();
                (format!("doc{i}.docx"), bytes, DOCX_MIME)
            }
        })
        .collect();

    let run = |(name, bytes, mime): &(String, Vec<u8>, &str)| {
        convert(
            SourceDocument {
                bytes,
                filename: name,
                mime_type: mime,
            },
            "html",
        )
        .unwrap()
    };

    let sequential: Vec<_> = inputs.iter().map(run).collect();
    let parallel: Vec<_> = inputs.par_iter().map(run).collect();

    assert_eq!(sequential, parallel);
    for (out, (name, _, _)) in parallel.iter().zip(&inputs) {
        let html = common::html_string(&out.html);
        if name.ends_with(".docx") {
            assert_eq!(html.matches("data:image/png").count(), 1, "{name}");
        } else {
            assert!(html.contains("<table>"), "{name}");
        }
    }
}
