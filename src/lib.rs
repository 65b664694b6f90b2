//! Task and spare-part extraction from maintenance-plan exports.
//!
//! A document is reduced to ordered text lines (embedded PDF text, OCR, or a
//! plain-text dump), then read twice: once for task rows, once for spare-part
//! rows that reference those tasks. The result is written as a two-sheet
//! workbook or JSON.

pub mod assemble;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod logging;
pub mod ocr;
pub mod parse;
pub mod sink;
pub mod source;
pub mod spare;
pub mod task;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::classify::Variant;
use crate::config::Config;
use crate::extract::{extract, Extraction};
use crate::source::{load_lines, Mode};

/// Load `input` and run both extraction passes over its lines.
///
/// `variant` overrides the predicate set chosen by the line source, e.g. for a
/// tesseract transcript saved as plain text.
pub fn process_document(
    input: &Path,
    mode: Mode,
    variant: Option<Variant>,
    config: &Config,
) -> Result<Extraction> {
    let source = load_lines(input, mode, &config.ocr)
        .with_context(|| format!("Failed to read lines from {}", input.display()))?;
    Ok(extract(
        &source.lines,
        config,
        variant.unwrap_or(source.variant),
    ))
}
