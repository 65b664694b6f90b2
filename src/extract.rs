//! The two forward passes over the document's lines.
//!
//! The task pass runs first and builds the [`TaskLookup`]; the spare-part pass
//! reads the same lines again with a fresh [`Context`] and borrows placement
//! from the lookup for rows whose own context is missing.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{normalize_task_code, strip_status_prefix, Classifier, LineRole, Variant};
use crate::config::{Config, ExtractionConfig};
use crate::context::Context;
use crate::logging::{SPARE_PASS, TASK_PASS};
use crate::spare::{parse_spare_block, SparePartRecord};
use crate::task::{parse_task_block, TaskLookup, TaskRecord, TaskRowParser};

/// Knobs for a single extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub variant: Variant,
    pub footer_literals: Vec<String>,
    pub doc_ref_lookback: bool,
    pub segment_spares_on_header: bool,
}

impl ExtractOptions {
    pub fn new(variant: Variant) -> Self {
        ExtractOptions {
            variant,
            ..Default::default()
        }
    }

    pub fn from_config(config: &ExtractionConfig, variant: Variant) -> Self {
        ExtractOptions {
            variant,
            footer_literals: config.footer_literals.clone(),
            doc_ref_lookback: config.doc_ref_lookback,
            segment_spares_on_header: config.segment_spares_on_header,
        }
    }

    pub fn with_footers<I, S>(mut self, footers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.footer_literals.extend(footers.into_iter().map(Into::into));
        self
    }

    pub fn doc_ref_lookback(mut self, enabled: bool) -> Self {
        self.doc_ref_lookback = enabled;
        self
    }

    pub fn segment_spares_on_header(mut self, enabled: bool) -> Self {
        self.segment_spares_on_header = enabled;
        self
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.variant).with_footers(&self.footer_literals)
    }
}

/// Both output tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub tasks: Vec<TaskRecord>,
    pub spare_parts: Vec<SparePartRecord>,
}

/// Record the code of a task-start row as the carried task.
fn carry_task_code(ctx: &mut Context, line: &str) {
    if let Some(code) = strip_status_prefix(line).split_whitespace().next() {
        ctx.set_current_task(normalize_task_code(code));
    }
}

/// Task pass. Every task-start row is assembled with its continuation lines,
/// parsed and merged into the lookup under its normalized code.
pub fn extract_tasks<S: AsRef<str>>(
    lines: &[S],
    classifier: &Classifier,
    parser: &TaskRowParser,
) -> TaskLookup {
    let mut ctx = Context::new();
    let mut lookup = TaskLookup::new();
    let mut merged = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_ref();
        match classifier.classify(line) {
            LineRole::Asset => {
                ctx.update_from_asset_row(line);
                debug!(target: TASK_PASS, asset = %ctx.asset_code, kind = %ctx.asset_type, "asset");
                i += 1;
            }
            LineRole::Context => {
                ctx.update_from_context_row(line);
                i += 1;
            }
            LineRole::TaskStart => {
                carry_task_code(&mut ctx, line);
                let (row, next) = parse_task_block(lines, i, classifier, parser);
                match row {
                    Some(row) => {
                        if !lookup.upsert(row, &ctx) {
                            merged += 1;
                        }
                    }
                    None => debug!(target: TASK_PASS, line = i, "task row discarded"),
                }
                i = next.max(i + 1);
            }
            _ => i += 1,
        }
    }

    lookup.assign_sort();
    info!(target: TASK_PASS, tasks = lookup.len(), merged, "task pass done");
    lookup
}

/// Spare-part pass.
///
/// Task-start rows are not parsed here; their code only becomes the carried
/// task for spare rows that name none. Duplicate `(task, part, description)`
/// rows are dropped, keeping the first.
pub fn extract_spares<S: AsRef<str>>(
    lines: &[S],
    classifier: &Classifier,
    lookup: &TaskLookup,
    segment_on_header: bool,
) -> Vec<SparePartRecord> {
    let mut ctx = Context::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut records = Vec::new();
    let mut segments = 0usize;
    let mut dropped = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_ref();
        match classifier.classify(line) {
            LineRole::SpareHeader => {
                if segment_on_header {
                    ctx.reset_placement();
                    segments += 1;
                    debug!(target: SPARE_PASS, segment = segments, line = i, "spare segment");
                }
                i += 1;
            }
            LineRole::Asset => {
                ctx.update_from_asset_row(line);
                i += 1;
            }
            LineRole::Context => {
                ctx.update_from_context_row(line);
                i += 1;
            }
            LineRole::TaskStart => {
                carry_task_code(&mut ctx, line);
                i += 1;
            }
            LineRole::SparePartStart => {
                let (row, next) = parse_spare_block(lines, i, classifier);
                i = next.max(i + 1);

                let Some(row) = row else {
                    debug!(target: SPARE_PASS, line = i, "spare row discarded");
                    dropped += 1;
                    continue;
                };
                let part_no = row.part_no.clone();
                let Some(record) = SparePartRecord::resolve(row, &ctx, lookup) else {
                    debug!(target: SPARE_PASS, part = %part_no, "spare row without task");
                    dropped += 1;
                    continue;
                };
                if seen.insert(record.dedup_key()) {
                    records.push(record);
                } else {
                    debug!(target: SPARE_PASS, part = %part_no, "duplicate spare row");
                }
            }
            _ => i += 1,
        }
    }

    info!(
        target: SPARE_PASS,
        spare_parts = records.len(),
        dropped,
        segments,
        "spare pass done"
    );
    records
}

/// Run both passes over `lines`.
pub fn extract_with<S: AsRef<str>>(lines: &[S], options: &ExtractOptions) -> Extraction {
    let classifier = options.classifier();
    let parser = TaskRowParser::new(options.doc_ref_lookback);

    let lookup = extract_tasks(lines, &classifier, &parser);
    let spare_parts = extract_spares(
        lines,
        &classifier,
        &lookup,
        options.segment_spares_on_header,
    );

    Extraction {
        tasks: lookup.into_records(),
        spare_parts,
    }
}

pub fn extract<S: AsRef<str>>(lines: &[S], config: &Config, variant: Variant) -> Extraction {
    extract_with(lines, &ExtractOptions::from_config(&config.extraction, variant))
}
