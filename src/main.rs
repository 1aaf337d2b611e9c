use std::path::PathBuf;
use std::process;

use clap::Parser;
use docxide_html::{FormatRegistry, TargetFormat};

#[derive(Parser)]
#[command(version, about = "Convert DOCX, DOTX and XLTX files to self-contained HTML")]
struct Cli {
    /// Office document to convert
    input: PathBuf,

    /// Output path (default: <input base>.html next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target format
    #[arg(long, default_value = "html")]
    format: String,

    /// Source MIME type (default: derived from the input extension)
    #[arg(long)]
    mime: Option<String>,

    /// Refuse inputs larger than this many bytes
    #[arg(long, value_name = "BYTES", default_value_t = 256 * 1024 * 1024)]
    max_size: u64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = cli.format.parse::<TargetFormat>() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let registry = FormatRegistry::global();
    let mime = match cli.mime {
        Some(m) => m,
        None => {
            let ext = cli
                .input
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            match registry.mime_for_extension(&ext) {
                Some(m) => m.to_string(),
                None => {
                    eprintln!(
                        "Error: cannot infer a MIME type for {}; pass --mime",
                        cli.input.display()
                    );
                    process::exit(1);
                }
            }
        }
    };

    match docxide_html::convert_file(
        registry,
        &cli.input,
        cli.output.as_deref(),
        &mime,
        Some(cli.max_size),
    ) {
        Ok(out) => println!("Wrote {}", out.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
