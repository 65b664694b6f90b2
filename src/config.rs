use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

/// Knobs for the line heuristics.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExtractionConfig {
    /// Extra line prefixes treated as page furniture, on top of
    /// `database:`, `printed by` and `page `.
    #[serde(default)]
    pub footer_literals: Vec<String>,
    /// Enable the lookback document-reference heuristic for task rows.
    #[serde(default)]
    pub doc_ref_lookback: bool,
    /// Reset the spare-part pass context at every repeated spare-parts header.
    #[serde(default)]
    pub segment_spares_on_header: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: PathBuf,
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Tesseract page segmentation mode.
    #[serde(default = "default_psm")]
    pub psm: u8,
    /// Binarization threshold applied to the grayscale page; 0 disables it.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Below this many non-whitespace characters a PDF is considered scanned.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: default_tesseract_path(),
            pdftoppm_path: default_pdftoppm_path(),
            language: default_language(),
            dpi: default_dpi(),
            psm: default_psm(),
            threshold: default_threshold(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

fn default_tesseract_path() -> PathBuf {
    PathBuf::from("tesseract")
}
fn default_pdftoppm_path() -> PathBuf {
    PathBuf::from("pdftoppm")
}
fn default_language() -> String {
    "eng".to_string()
}
fn default_dpi() -> u32 {
    300
}
fn default_psm() -> u8 {
    6
}
fn default_threshold() -> u8 {
    160
}
fn default_min_text_chars() -> usize {
    40
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.ocr.dpi == 0 {
        anyhow::bail!("ocr.dpi must be > 0");
    }
    if config.ocr.psm > 13 {
        anyhow::bail!("ocr.psm must be in [0, 13], got {}", config.ocr.psm);
    }
    if config.ocr.language.trim().is_empty() {
        anyhow::bail!("ocr.language must not be empty");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
