use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use maintab::classify::Variant;
use maintab::config::{load_config, Config};
use maintab::process_document;
use maintab::sink::{write_output, OutputFormat};
use maintab::source::Mode;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Extract the Tasks and SpareParts tables from a maintenance-plan export.",
    arg_required_else_help = true
)]
pub struct Args {
    /// PDF, image, or plain-text export to read
    pub input: PathBuf,

    /// Output path. Defaults to `<input stem>_tasks_spares.<ext>` next to the input.
    #[clap(short, long)]
    pub out: Option<PathBuf>,

    #[clap(short, long, value_enum, default_value_t = OutputFormat::Xlsx)]
    pub format: OutputFormat,

    /// How lines are pulled out of the input
    #[clap(short, long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Force the line predicates (`ocr` for OCR transcripts saved as text)
    #[clap(long, value_enum)]
    pub variant: Option<Variant>,

    /// TOML configuration file
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Extra footer prefix to skip (repeatable)
    #[clap(long = "footer")]
    pub footers: Vec<String>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write a trace-level log file into this directory
    #[clap(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_tasks_spares.{}", format.extension()))
}

fn main() -> Result<()> {
    let args = Args::parse_args();

    // Keep the guard alive so the file writer flushes on exit
    let _guard = match &args.log_dir {
        Some(dir) => Some(
            maintab::logging::init_logging_with_dir(args.verbose, expand(dir))
                .context("Failed to set up log directory")?,
        ),
        None => {
            maintab::logging::init_logging(args.verbose);
            None
        }
    };

    let mut config = match &args.config {
        Some(path) => load_config(&expand(path))?,
        None => Config::default(),
    };
    config.extraction.footer_literals.extend(args.footers.iter().cloned());

    let input = expand(&args.input);
    let out = args
        .out
        .as_deref()
        .map(expand)
        .unwrap_or_else(|| default_output(&input, args.format));

    let extraction = process_document(&input, args.mode, args.variant, &config)?;
    write_output(&out, args.format, &extraction)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!(
        tasks = extraction.tasks.len(),
        spare_parts = extraction.spare_parts.len(),
        out = %out.display(),
        "done"
    );
    println!(
        "Extracted {} tasks and {} spare parts -> {}",
        extraction.tasks.len(),
        extraction.spare_parts.len(),
        out.display()
    );

    Ok(())
}
