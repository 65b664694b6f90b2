//! PDF text extraction into reading-order lines.
//!
//! Each page's content stream is walked operator by operator, tracking the
//! text and graphics matrices just far enough to know where every shown
//! string starts. Runs on the same baseline are then joined left to right and
//! lines are emitted top to bottom.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Error as LopdfError, Object, Result as LopdfResult};
use tracing::{debug, trace, warn};

use crate::error::SourceError;
use crate::logging::SOURCE;

/// Runs whose baselines differ by less than this share a line.
const BASELINE_TOLERANCE: f32 = 2.0;

/// `TJ` adjustments more negative than this (thousandths of an em) read as
/// a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Page furniture that the PDF front-end always drops.
const PDF_FOOTER_PREFIXES: &[&str] = &["database:", "printed by"];

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    x: f32,
    y: f32,
    text: String,
}

#[derive(Clone)]
struct TextState<'a> {
    text_matrix: [f32; 6],
    text_line_matrix: [f32; 6],
    leading: f32,
    encoding: Option<&'a Encoding<'a>>,
}

impl Default for TextState<'_> {
    fn default() -> Self {
        TextState {
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
            leading: 0.0,
            encoding: None,
        }
    }
}

#[derive(Clone, Default)]
struct GraphicsState<'a> {
    ctm: [f32; 6],
    text_state: TextState<'a>,
}

/// Walks one page's operators, collecting positioned text runs.
struct PageWalker<'a> {
    gs_stack: Vec<GraphicsState<'a>>,
    encodings: &'a BTreeMap<Vec<u8>, Encoding<'a>>,
    runs: Vec<TextRun>,
    /// Set after a show operator; cleared by any positioning operator so the
    /// next show starts a new run.
    continuing: bool,
}

impl<'a> PageWalker<'a> {
    fn new(encodings: &'a BTreeMap<Vec<u8>, Encoding<'a>>) -> Self {
        PageWalker {
            gs_stack: vec![GraphicsState {
                ctm: IDENTITY,
                ..Default::default()
            }],
            encodings,
            runs: Vec::new(),
            continuing: false,
        }
    }

    fn current(&mut self) -> &mut GraphicsState<'a> {
        if self.gs_stack.is_empty() {
            self.gs_stack.push(GraphicsState {
                ctm: IDENTITY,
                ..Default::default()
            });
        }
        let last = self.gs_stack.len() - 1;
        &mut self.gs_stack[last]
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        let ts = &mut self.current().text_state;
        ts.text_matrix = multiply_matrices(&translate_matrix(tx, ty), &ts.text_line_matrix);
        ts.text_line_matrix = ts.text_matrix;
        self.continuing = false;
    }

    fn handle(&mut self, op: &Operation) -> LopdfResult<()> {
        match op.operator.as_str() {
            "q" => {
                if let Some(top) = self.gs_stack.last().cloned() {
                    self.gs_stack.push(top);
                }
            }
            "Q" => {
                if self.gs_stack.len() > 1 {
                    self.gs_stack.pop();
                }
            }
            "cm" => {
                let m = matrix_from_operands(op);
                let gs = self.current();
                gs.ctm = multiply_matrices(&m, &gs.ctm);
            }
            "BT" => {
                let ts = &mut self.current().text_state;
                ts.text_matrix = IDENTITY;
                ts.text_line_matrix = IDENTITY;
                self.continuing = false;
            }
            "Tf" => {
                if let Some(Object::Name(font)) = op.operands.first() {
                    let encoding = self.encodings.get(font);
                    if encoding.is_none() {
                        trace!(target: SOURCE, font = %String::from_utf8_lossy(font), "font without encoding");
                    }
                    self.current().text_state.encoding = encoding;
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first() {
                    self.current().text_state.leading = operand_as_float(leading);
                }
            }
            "Tm" => {
                let m = matrix_from_operands(op);
                let ts = &mut self.current().text_state;
                ts.text_matrix = m;
                ts.text_line_matrix = m;
                self.continuing = false;
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (op.operands.first(), op.operands.get(1)) {
                    let (tx, ty) = (operand_as_float(tx), operand_as_float(ty));
                    if op.operator == "TD" {
                        self.current().text_state.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "T*" => {
                let leading = self.current().text_state.leading;
                self.move_line(0.0, -leading);
            }
            "Tj" | "TJ" => self.show(&op.operands)?,
            "'" => {
                let leading = self.current().text_state.leading;
                self.move_line(0.0, -leading);
                self.show(&op.operands)?;
            }
            "\"" => {
                let leading = self.current().text_state.leading;
                self.move_line(0.0, -leading);
                self.show(op.operands.get(2..).unwrap_or(&[]))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn show(&mut self, operands: &[Object]) -> LopdfResult<()> {
        let gs = self.current().clone();
        let mut text = String::new();
        for operand in operands {
            collect_text(&mut text, gs.text_state.encoding, operand)?;
        }
        if text.is_empty() {
            return Ok(());
        }

        if self.continuing {
            if let Some(run) = self.runs.last_mut() {
                run.text.push_str(&text);
                return Ok(());
            }
        }

        let m = multiply_matrices(&gs.text_state.text_matrix, &gs.ctm);
        self.runs.push(TextRun {
            x: m[4],
            y: m[5],
            text,
        });
        self.continuing = true;
        Ok(())
    }
}

fn collect_text(out: &mut String, encoding: Option<&Encoding>, operand: &Object) -> LopdfResult<()> {
    match operand {
        Object::String(bytes, _) => match encoding {
            Some(encoding) => out.push_str(&Document::decode_text(encoding, bytes)?),
            None => out.push_str(&String::from_utf8_lossy(bytes)),
        },
        Object::Array(items) => {
            for item in items {
                match item {
                    Object::Integer(_) | Object::Real(_)
                        if operand_as_float(item) < TJ_SPACE_THRESHOLD =>
                    {
                        out.push(' ')
                    }
                    _ => collect_text(out, encoding, item)?,
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Group runs sharing a baseline into lines, top of page first.
fn runs_into_lines(mut runs: Vec<TextRun>) -> Vec<String> {
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<(f32, Vec<TextRun>)> = Vec::new();
    for run in runs {
        match lines.last_mut() {
            Some((y, members)) if (*y - run.y).abs() < BASELINE_TOLERANCE => members.push(run),
            _ => lines.push((run.y, vec![run])),
        }
    }

    lines
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| a.x.total_cmp(&b.x));
            members
                .iter()
                .map(|r| r.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub fn load_pdf<P: AsRef<Path>>(path: P) -> Result<Document, SourceError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SourceError::io(path, e))?;
    Ok(Document::load_mem(&bytes)?)
}

/// Lines of a single page in reading order, blank lines included.
pub fn page_lines(doc: &Document, page_id: (u32, u16)) -> Result<Vec<String>, LopdfError> {
    let content = doc.get_and_decode_page_content(page_id)?;
    let fonts = doc.get_page_fonts(page_id)?;
    let encodings: BTreeMap<Vec<u8>, Encoding> = fonts
        .iter()
        .map(|(name, font)| font.get_font_encoding(doc).map(|enc| (name.clone(), enc)))
        .collect::<LopdfResult<_>>()?;

    let mut walker = PageWalker::new(&encodings);
    for op in &content.operations {
        walker.handle(op)?;
    }
    Ok(runs_into_lines(walker.runs))
}

pub fn is_pdf_footer(line: &str) -> bool {
    let low = line.trim().to_lowercase();
    PDF_FOOTER_PREFIXES.iter().any(|p| low.starts_with(p))
}

/// Every non-blank, non-footer line of the document, page by page.
///
/// Pages whose content cannot be decoded are skipped with a warning; the
/// caller decides whether what is left is enough.
pub fn pdf_lines(doc: &Document) -> Vec<String> {
    let mut out = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        match page_lines(doc, page_id) {
            Ok(lines) => {
                let before = out.len();
                out.extend(
                    lines
                        .into_iter()
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty() && !is_pdf_footer(l)),
                );
                debug!(target: SOURCE, page = page_number, lines = out.len() - before, "page text");
            }
            Err(e) => warn!(target: SOURCE, page = page_number, error = %e, "page text skipped"),
        }
    }
    out
}

fn matrix_from_operands(op: &Operation) -> [f32; 6] {
    op.operands
        .iter()
        .map(operand_as_float)
        .collect::<Vec<f32>>()
        .try_into()
        .unwrap_or(IDENTITY)
}

fn operand_as_float(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

pub fn multiply_matrices(a: &[f32; 6], b: &[f32; 6]) -> [f32; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub fn translate_matrix(x: f32, y: f32) -> [f32; 6] {
    [1.0, 0.0, 0.0, 1.0, x, y]
}
