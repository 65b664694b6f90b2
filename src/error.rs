//! Error types for the collaborators around the extraction core.
//!
//! The core itself (classifier, assembler, row parsers, passes) never fails:
//! rows it cannot make sense of are dropped. Everything that talks to the outside
//! world (reading a PDF, running tesseract, writing a workbook) is fatal and
//! reports through these types.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning an input document into text lines.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF could not be decoded: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to launch '{tool}' (is it installed?): {source}")]
    Tool {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("image '{path}' could not be processed: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no pages were produced from '{0}'")]
    NoPages(PathBuf),
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tool(tool: impl Into<String>, source: std::io::Error) -> Self {
        SourceError::Tool {
            tool: tool.into(),
            source,
        }
    }
}

/// Failure while writing the extracted tables.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workbook '{path}': {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("failed to write JSON to '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
