//! Stateless line predicates.
//!
//! Every text line of a maintenance export plays one role: page furniture, a
//! table header, an asset banner, a grey location row, the first line of a task
//! or spare-part row, or a continuation of one of those. [`Classifier::classify`]
//! resolves overlapping predicates with a fixed precedence:
//!
//! metadata > header > asset > spare-part start > context row > task start
//!
//! Spare-part rows routinely carry bracketed component references, so they must
//! win over the context-row test; footers must win over everything.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::logging::CLASSIFY;

static TASK_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*?\d{6,8}$").unwrap());
static COMPONENT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d{6,}-\d{4,}:").unwrap());
static PART_START_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5,}-\d{3,}").unwrap());
static PART_START_OCR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{4,}-\d{3,4}|\d{4,}\s+\d{3,4}|\d{9,})\b").unwrap());

const METADATA_PREFIXES: &[&str] = &["database:", "printed by", "page "];
const TASK_HEADER_PHRASES: &[&str] = &["task code", "task action"];
const SPARE_HEADER_PHRASES: &[&str] = &[
    "part no",
    "part description",
    "task code",
    "task action",
    "qty required",
];

/// Which extraction front-end produced the lines. OCR output splits and glues
/// part numbers, so its spare-part predicate is looser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Variant {
    #[default]
    Text,
    Ocr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Metadata,
    TaskHeader,
    SpareHeader,
    Asset,
    SparePartStart,
    Context,
    TaskStart,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    variant: Variant,
    footers: Vec<String>,
}

impl Classifier {
    pub fn new(variant: Variant) -> Self {
        Classifier {
            variant,
            footers: Vec::new(),
        }
    }

    /// Additional footer prefixes, matched case-insensitively at line start.
    pub fn with_footers<I, S>(mut self, footers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.footers = footers
            .into_iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn classify(&self, line: &str) -> LineRole {
        let role = if self.is_metadata(line) {
            LineRole::Metadata
        } else if is_spare_header(line) {
            LineRole::SpareHeader
        } else if is_task_header(line) {
            LineRole::TaskHeader
        } else if is_asset_row(line) {
            LineRole::Asset
        } else if self.is_spare_start(line) {
            LineRole::SparePartStart
        } else if is_context_row(line) {
            LineRole::Context
        } else if self.is_task_start(line) {
            LineRole::TaskStart
        } else {
            LineRole::Other
        };
        trace!(target: CLASSIFY, ?role, line, "classified");
        role
    }

    pub fn is_metadata(&self, line: &str) -> bool {
        let low = line.trim().to_lowercase();
        METADATA_PREFIXES.iter().any(|p| low.starts_with(p))
            || self.footers.iter().any(|f| low.starts_with(f.as_str()))
    }

    pub fn is_task_start(&self, line: &str) -> bool {
        if self.is_metadata(line) || is_context_row(line) {
            return false;
        }

        let tokens: Vec<&str> = strip_status_prefix(line).split_whitespace().collect();
        if tokens.len() < 3 {
            return false;
        }

        let code = tokens[0];
        if code.contains('/') || !TASK_CODE.is_match(code) {
            return false;
        }

        is_trade_token(tokens[1])
    }

    pub fn is_spare_start(&self, line: &str) -> bool {
        let stripped = strip_bullets(line);
        match self.variant {
            Variant::Text => PART_START_TEXT.is_match(stripped),
            Variant::Ocr => PART_START_OCR.is_match(stripped),
        }
    }
}

/// Whitespace-free lowercase form used for header matching, so that
/// `Task Code` and an OCR'd `TaskCode` compare equal.
fn compact_lower(line: &str) -> String {
    line.split_whitespace()
        .collect::<String>()
        .to_lowercase()
}

fn contains_all(line: &str, phrases: &[&str]) -> bool {
    let compact = compact_lower(line);
    phrases
        .iter()
        .all(|p| compact.contains(&p.replace(' ', "")))
}

pub fn is_task_header(line: &str) -> bool {
    contains_all(line, TASK_HEADER_PHRASES)
}

pub fn is_spare_header(line: &str) -> bool {
    contains_all(line, SPARE_HEADER_PHRASES)
}

pub fn is_asset_row(line: &str) -> bool {
    line.trim().to_lowercase().starts_with("asset:")
}

/// Grey location rows: `1 Pre-Maintenance \ Checks (9000171371)`,
/// `[648575-0400] ...`, `(9000171371-0001: ...`.
pub fn is_context_row(line: &str) -> bool {
    let stripped = line.trim();
    if stripped.is_empty() {
        return false;
    }
    if PART_START_TEXT.is_match(strip_bullets(stripped)) {
        return false;
    }
    stripped.contains('\\')
        || stripped.contains('[')
        || stripped.starts_with('(')
        || COMPONENT_KEY.is_match(stripped)
}

/// Drop status glyphs and bullets in front of the first digit or `*`.
pub fn strip_status_prefix(line: &str) -> &str {
    match line.find(|c: char| c.is_ascii_digit() || c == '*') {
        Some(idx) => line[idx..].trim(),
        None => line.trim(),
    }
}

/// Drop leading bullet glyphs, keeping structural openers (`*`, `(`, `[`, `\`).
pub fn strip_bullets(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_whitespace() || !(c.is_alphanumeric() || matches!(c, '*' | '(' | '[' | '\\'))
    })
    .trim_end()
}

pub fn is_task_code(token: &str) -> bool {
    !token.contains('/') && TASK_CODE.is_match(token)
}

/// `*9465150` and `9465150` name the same task.
pub fn normalize_task_code(code: &str) -> &str {
    code.strip_prefix('*').unwrap_or(code)
}

fn is_trade_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(char::is_alphabetic)
        && !token.chars().any(char::is_lowercase)
}
