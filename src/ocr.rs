//! OCR front-end for scanned exports.
//!
//! PDFs are rasterized with `pdftoppm`, each page image is binarized with the
//! `image` crate and read back with the `tesseract` CLI. Both tools run as
//! blocking one-shot child processes; any failure is fatal.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::{GrayImage, Luma};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::config::OcrConfig;
use crate::error::SourceError;
use crate::logging::SOURCE;

const BULLET_GLYPHS: &[char] = &[
    '•', '●', '▪', '■', '□', '◦', '·', '»', '►', '✓', '✔', '☐', '☑', '⚫',
];

const UNICODE_DASHES: &[char] = &[
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}', '\u{FE58}',
    '\u{FE63}', '\u{FF0D}',
];

static GLUED_CODE_TRADE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*?\d{6,8})([A-Z]{2,})\b").unwrap());

/// Clean up one line of tesseract output.
///
/// NFKC, unicode dashes folded to `-`, bullet glyphs removed, whitespace
/// collapsed, and a task code glued to its trade split apart
/// (`9465150ENGR` becomes `9465150 ENGR`).
pub fn normalize_ocr_line(line: &str) -> String {
    let folded: String = line
        .nfkc()
        .filter(|c| !BULLET_GLYPHS.contains(c))
        .map(|c| if UNICODE_DASHES.contains(&c) { '-' } else { c })
        .collect();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    GLUED_CODE_TRADE.replace(&collapsed, "$1 $2").into_owned()
}

/// Normalized, non-blank lines of a tesseract transcript.
pub fn normalize_ocr_text(text: &str) -> Vec<String> {
    text.lines()
        .map(normalize_ocr_line)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Grayscale, then binarize at `threshold`. A threshold of 0 keeps the
/// grayscale image.
pub fn preprocess(image: &image::DynamicImage, threshold: u8) -> GrayImage {
    let mut gray = image.to_luma8();
    if threshold > 0 {
        for Luma([v]) in gray.pixels_mut() {
            *v = if *v >= threshold { 255 } else { 0 };
        }
    }
    gray
}

fn run_tool(tool: &Path, command: &mut Command) -> Result<Vec<u8>, SourceError> {
    let name = tool.display().to_string();
    debug!(target: SOURCE, tool = %name, ?command, "running");
    let output = command
        .output()
        .map_err(|e| SourceError::tool(name.clone(), e))?;
    if !output.status.success() {
        return Err(SourceError::ToolFailed {
            tool: name,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Runs the OCR toolchain with one configuration.
pub struct OcrEngine<'a> {
    config: &'a OcrConfig,
}

impl<'a> OcrEngine<'a> {
    pub fn new(config: &'a OcrConfig) -> Self {
        OcrEngine { config }
    }

    /// Render every page of `pdf` to PNG inside `dir`, in page order.
    pub fn rasterize(&self, pdf: &Path, dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
        let prefix = dir.join("page");
        run_tool(
            &self.config.pdftoppm_path,
            Command::new(&self.config.pdftoppm_path)
                .arg("-r")
                .arg(self.config.dpi.to_string())
                .arg("-png")
                .arg(pdf)
                .arg(&prefix),
        )?;

        // pdftoppm zero-pads page numbers to a common width, so name order is
        // page order.
        let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| SourceError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "png")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("page-"))
            })
            .collect();
        pages.sort();

        if pages.is_empty() {
            return Err(SourceError::NoPages(pdf.to_path_buf()));
        }
        info!(target: SOURCE, pages = pages.len(), dpi = self.config.dpi, "rasterized");
        Ok(pages)
    }

    /// Preprocess one image into `dir` and return tesseract's raw transcript.
    pub fn recognize(&self, image_path: &Path, dir: &Path, index: usize) -> Result<String, SourceError> {
        let img = image::open(image_path).map_err(|source| SourceError::Image {
            path: image_path.to_path_buf(),
            source,
        })?;
        let prepared = dir.join(format!("prepared-{index:04}.png"));
        preprocess(&img, self.config.threshold)
            .save(&prepared)
            .map_err(|source| SourceError::Image {
                path: prepared.clone(),
                source,
            })?;

        let stdout = run_tool(
            &self.config.tesseract_path,
            Command::new(&self.config.tesseract_path)
                .arg(&prepared)
                .arg("stdout")
                .arg("-l")
                .arg(&self.config.language)
                .arg("--psm")
                .arg(self.config.psm.to_string()),
        )?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// OCR a set of page images in order.
    pub fn image_lines(&self, images: &[PathBuf]) -> Result<Vec<String>, SourceError> {
        let dir = TempDir::new().map_err(|e| SourceError::io(std::env::temp_dir(), e))?;
        self.recognize_all(images, dir.path())
    }

    /// Rasterize a PDF and OCR every page.
    pub fn pdf_lines(&self, pdf: &Path) -> Result<Vec<String>, SourceError> {
        let dir = TempDir::new().map_err(|e| SourceError::io(std::env::temp_dir(), e))?;
        let pages = self.rasterize(pdf, dir.path())?;
        self.recognize_all(&pages, dir.path())
    }

    fn recognize_all(&self, images: &[PathBuf], dir: &Path) -> Result<Vec<String>, SourceError> {
        let mut lines = Vec::new();
        for (index, image) in images.iter().enumerate() {
            let text = self.recognize(image, dir, index)?;
            let page = normalize_ocr_text(&text);
            debug!(target: SOURCE, page = index + 1, lines = page.len(), "recognized");
            lines.extend(page);
        }
        Ok(lines)
    }
}
