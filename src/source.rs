use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::Variant;
use crate::config::OcrConfig;
use crate::error::SourceError;
use crate::logging::SOURCE;
use crate::ocr::OcrEngine;
use crate::parse::{load_pdf, pdf_lines};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// How lines are pulled out of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Embedded PDF text, falling back to OCR for scanned documents.
    #[default]
    Auto,
    /// Embedded PDF text only.
    Text,
    /// Always OCR.
    Ocr,
    /// A plain-text file, one line per text line.
    Plain,
}

/// What kind of file the input is, judged by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
    Text,
}

impl InputKind {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if ext == "pdf" {
            InputKind::Pdf
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            InputKind::Image
        } else {
            InputKind::Text
        }
    }
}

/// Lines ready for extraction, tagged with the front-end that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLines {
    pub lines: Vec<String>,
    pub variant: Variant,
}

impl SourceLines {
    fn text(lines: Vec<String>) -> Self {
        SourceLines {
            lines,
            variant: Variant::Text,
        }
    }

    fn ocr(lines: Vec<String>) -> Self {
        SourceLines {
            lines,
            variant: Variant::Ocr,
        }
    }
}

pub fn plain_text_lines(path: &Path) -> Result<Vec<String>, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
    Ok(text.lines().map(|l| l.trim_end().to_string()).collect())
}

fn text_chars(lines: &[String]) -> usize {
    lines
        .iter()
        .map(|l| l.chars().filter(|c| !c.is_whitespace()).count())
        .sum()
}

/// Read `path` into lines according to `mode`.
///
/// Image inputs always go through OCR and non-PDF, non-image inputs are read
/// as plain text whatever the mode. In `Auto` mode a PDF whose embedded text
/// has fewer than `ocr.min_text_chars` visible characters is treated as a
/// scan.
pub fn load_lines(path: &Path, mode: Mode, ocr: &OcrConfig) -> Result<SourceLines, SourceError> {
    let kind = InputKind::of(path);
    let engine = OcrEngine::new(ocr);

    let source = match (kind, mode) {
        (InputKind::Image, _) => SourceLines::ocr(engine.image_lines(&[PathBuf::from(path)])?),
        (InputKind::Text, _) | (_, Mode::Plain) => SourceLines::text(plain_text_lines(path)?),
        (InputKind::Pdf, Mode::Ocr) => SourceLines::ocr(engine.pdf_lines(path)?),
        (InputKind::Pdf, Mode::Text) => SourceLines::text(pdf_lines(&load_pdf(path)?)),
        (InputKind::Pdf, Mode::Auto) => {
            let lines = pdf_lines(&load_pdf(path)?);
            let chars = text_chars(&lines);
            if chars < ocr.min_text_chars {
                warn!(
                    target: SOURCE,
                    chars,
                    min = ocr.min_text_chars,
                    "little embedded text, falling back to OCR"
                );
                SourceLines::ocr(engine.pdf_lines(path)?)
            } else {
                SourceLines::text(lines)
            }
        }
    };

    info!(
        target: SOURCE,
        path = %path.display(),
        lines = source.lines.len(),
        variant = ?source.variant,
        "lines loaded"
    );
    Ok(source)
}
