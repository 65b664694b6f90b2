//! Spare-part rows:
//! `1550595-9960 Seal Kit 9465150 Check [648575-0400] 2 EA`
//!
//! part number, description, task code, task action, component path, quantity,
//! unit of measure. Only the part number position is fixed; the task code is
//! the first task-shaped token after it, and quantity/UOM are read off the end.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::assemble::{assemble, BlockKind};
use crate::classify::{is_task_code, normalize_task_code, strip_bullets, Classifier, Variant};
use crate::context::{last_paren_digits, Context};
use crate::task::TaskLookup;

static PART_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5,}-\d{3,}$").unwrap());
static PART_OCR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,}-\d{3,}$").unwrap());
static GLUED_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9,}$").unwrap());
static PART_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,}$").unwrap());
static PART_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}$").unwrap());
static UOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{1,4}$").unwrap());
static QUANTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").unwrap());

/// Digits split off the end of a glued OCR part number.
const GLUED_SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpareRow {
    pub part_no: String,
    pub description: String,
    /// Normalized; empty when the row names no task.
    pub task_code: String,
    pub task_action: String,
    pub quantity: String,
    pub uom: String,
    pub component_path: String,
}

/// Read a part number from the head of `tokens`, normalized to
/// `digits-digits`. Returns it with the number of tokens it occupied.
pub fn match_part_number(tokens: &[&str], variant: Variant) -> Option<(String, usize)> {
    let first = *tokens.first()?;
    match variant {
        Variant::Text => PART_TEXT.is_match(first).then(|| (first.to_string(), 1)),
        Variant::Ocr => {
            if PART_OCR.is_match(first) {
                return Some((first.to_string(), 1));
            }
            if GLUED_PART.is_match(first) {
                let (head, tail) = first.split_at(first.len() - GLUED_SUFFIX_LEN);
                return Some((format!("{}-{}", head, tail), 1));
            }
            match tokens.get(1) {
                Some(second) if PART_HEAD.is_match(first) && PART_TAIL.is_match(second) => {
                    Some((format!("{}-{}", first, second), 2))
                }
                _ => None,
            }
        }
    }
}

/// Split `[component path] [qty] [uom]` from the end of a row.
fn split_component_tail(mut tail: &[&str]) -> (String, String, String) {
    let mut uom = String::new();
    let mut quantity = String::new();

    if let [rest @ .., last] = tail {
        if UOM.is_match(last) {
            uom = last.to_string();
            tail = rest;
        }
    }
    if let [rest @ .., last] = tail {
        if QUANTITY.is_match(last) {
            quantity = last.to_string();
            tail = rest;
        }
    }

    (tail.join(" "), quantity, uom)
}

/// Parse one assembled spare-part line. `None` when it does not open with a
/// part number.
pub fn parse_spare_row(logical_line: &str, variant: Variant) -> Option<SpareRow> {
    let tokens: Vec<&str> = strip_bullets(logical_line).split_whitespace().collect();
    let (part_no, consumed) = match_part_number(&tokens, variant)?;
    let rest = &tokens[consumed..];

    let Some(task_idx) = rest.iter().position(|t| is_task_code(t)) else {
        return Some(SpareRow {
            part_no,
            description: rest.join(" "),
            ..SpareRow::default()
        });
    };

    let task_action = rest.get(task_idx + 1).map(|s| s.to_string()).unwrap_or_default();
    let tail = rest.get(task_idx + 2..).unwrap_or(&[]);
    let (component_path, quantity, uom) = split_component_tail(tail);

    Some(SpareRow {
        part_no,
        description: rest[..task_idx].join(" "),
        task_code: normalize_task_code(rest[task_idx]).to_string(),
        task_action,
        quantity,
        uom,
        component_path,
    })
}

/// Assemble the block starting at `start` and parse it. Returns the row, if
/// any, and the index of the first unconsumed line.
pub fn parse_spare_block<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    classifier: &Classifier,
) -> (Option<SpareRow>, usize) {
    let (logical, next) = assemble(lines, start, BlockKind::SparePart, classifier);
    (parse_spare_row(&logical, classifier.variant()), next)
}

fn or_task(own: &str, from_task: Option<&str>) -> String {
    if own.is_empty() {
        from_task.unwrap_or_default().to_string()
    } else {
        own.to_string()
    }
}

/// One row of the SpareParts table. Action and component path travel with
/// the record for logging but are not part of the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SparePartRecord {
    pub task_code: String,
    pub part_no: String,
    pub part_description: String,
    #[serde(rename = "MU_TL")]
    pub mu_tl: String,
    pub qty_required: String,
    #[serde(rename = "UOM")]
    pub uom: String,
    pub item_dependency: String,
    pub location1: String,
    pub location2: String,
    pub asset_type: String,
    pub asset_type_code: String,
    #[serde(skip)]
    pub task_action: String,
    #[serde(skip)]
    pub component_path: String,
}

impl SparePartRecord {
    /// Attach placement to a parsed row.
    ///
    /// The task code falls back to the pass's carried task; a row that still has
    /// none is dropped. Locations and set-type code prefer the nearest context
    /// row and fall back to the linked task, then to a `(digits)` group inside the
    /// row's own component path.
    pub fn resolve(row: SpareRow, ctx: &Context, lookup: &TaskLookup) -> Option<Self> {
        let task_code = if row.task_code.is_empty() {
            ctx.current_task_code.clone()
        } else {
            row.task_code
        };
        if task_code.is_empty() {
            return None;
        }

        let task = lookup.get(&task_code);
        let location1 = or_task(&ctx.location1, task.map(|t| t.location1.as_str()));
        let location2 = or_task(&ctx.location2, task.map(|t| t.location2.as_str()));
        let mut set_type_code =
            or_task(&ctx.set_type_code, task.map(|t| t.set_type_code.as_str()));
        if set_type_code.is_empty() {
            set_type_code = last_paren_digits(&row.component_path)
                .unwrap_or_default()
                .to_string();
        }

        Some(SparePartRecord {
            task_code,
            part_no: row.part_no,
            part_description: row.description,
            mu_tl: String::new(),
            qty_required: row.quantity,
            uom: row.uom,
            item_dependency: String::new(),
            location1,
            location2,
            asset_type: String::new(),
            asset_type_code: set_type_code,
            task_action: row.task_action,
            component_path: row.component_path,
        })
    }

    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.task_code.clone(),
            self.part_no.clone(),
            self.part_description.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskRowParser;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_spare_row() {
        let row = parse_spare_row(
            "1550595-9960 Seal Kit 9465150 Check [648575-0400] 2 EA",
            Variant::Text,
        )
        .unwrap();
        assert_eq!(
            row,
            SpareRow {
                part_no: "1550595-9960".into(),
                description: "Seal Kit".into(),
                task_code: "9465150".into(),
                task_action: "Check".into(),
                quantity: "2".into(),
                uom: "EA".into(),
                component_path: "[648575-0400]".into(),
            }
        );
    }

    #[test]
    fn decimal_quantity_without_uom() {
        let row = parse_spare_row(
            "1550600-0100 Grease 400g *9465150 Lubricate Pump \\ Bearing (9000171371) 0.5",
            Variant::Text,
        )
        .unwrap();
        assert_eq!(row.task_code, "9465150");
        assert_eq!(row.description, "Grease 400g");
        assert_eq!(row.quantity, "0.5");
        assert_eq!(row.uom, "");
        assert_eq!(row.component_path, "Pump \\ Bearing (9000171371)");
    }

    #[test]
    fn row_without_task_keeps_description() {
        let row = parse_spare_row("1550595-9960 Seal Kit complete", Variant::Text).unwrap();
        assert_eq!(row.description, "Seal Kit complete");
        assert_eq!(row.task_code, "");
        assert_eq!(row.component_path, "");
    }

    #[test]
    fn rejects_rows_without_leading_part_number() {
        assert!(parse_spare_row("Seal Kit 1550595-9960", Variant::Text).is_none());
        assert!(parse_spare_row("1550595 9960 Seal Kit", Variant::Text).is_none());
    }

    #[test]
    fn ocr_part_numbers_are_normalized() {
        let split = parse_spare_row("• 1550595 9960 Seal Kit 9465150 Check 2 EA", Variant::Ocr)
            .unwrap();
        assert_eq!(split.part_no, "1550595-9960");
        assert_eq!(split.description, "Seal Kit");
        assert_eq!(split.quantity, "2");

        let glued = parse_spare_row("15505959960 Seal Kit 9465150 Check", Variant::Ocr).unwrap();
        assert_eq!(glued.part_no, "1550595-9960");
        assert_eq!(glued.task_action, "Check");
    }

    #[test]
    fn block_parse_joins_wrapped_lines() {
        let lines = vec![
            "1550595-9960 Seal Kit 9465150 Check".to_string(),
            "[648575-0400] 2 EA".to_string(),
            "Database: PROD".to_string(),
        ];
        let c = Classifier::new(Variant::Text);
        let (row, next) = parse_spare_block(&lines, 0, &c);
        assert_eq!(next, 2);
        assert_eq!(row.unwrap().component_path, "[648575-0400]");
    }

    #[test]
    fn resolve_borrows_from_task_and_context() {
        let mut task_ctx = Context::new();
        task_ctx.update_from_context_row("1 Pre-Maintenance \\ Checks (9000171371)");
        let mut lookup = TaskLookup::new();
        lookup.upsert(
            TaskRowParser::default()
                .parse("9465150 ENGR Check Check labels")
                .unwrap(),
            &task_ctx,
        );

        let row = parse_spare_row("1550595-9960 Seal Kit 9465150 Check 2 EA", Variant::Text)
            .unwrap();

        let record = SparePartRecord::resolve(row.clone(), &Context::new(), &lookup).unwrap();
        assert_eq!(record.location1, "1 Pre-Maintenance");
        assert_eq!(record.location2, "Checks (9000171371)");
        assert_eq!(record.asset_type_code, "9000171371");
        assert_eq!(record.asset_type, "");

        let mut near = Context::new();
        near.update_from_context_row("2 Overhaul \\ Pump (9000172000)");
        let record = SparePartRecord::resolve(row, &near, &lookup).unwrap();
        assert_eq!(record.location1, "2 Overhaul");
        assert_eq!(record.asset_type_code, "9000172000");
    }

    #[test]
    fn resolve_uses_carried_task_or_drops() {
        let lookup = TaskLookup::new();
        let row = parse_spare_row("1550595-9960 Seal Kit", Variant::Text).unwrap();
        assert!(SparePartRecord::resolve(row.clone(), &Context::new(), &lookup).is_none());

        let mut ctx = Context::new();
        ctx.set_current_task("9465160");
        let record = SparePartRecord::resolve(row, &ctx, &lookup).unwrap();
        assert_eq!(record.task_code, "9465160");
    }

    #[test]
    fn set_type_scavenged_from_component_path() {
        let row = parse_spare_row(
            "1550595-9960 Seal Kit 9465150 Check Unit (9000171999) [648575-0400] 1 PC",
            Variant::Text,
        )
        .unwrap();
        let record = SparePartRecord::resolve(row, &Context::new(), &TaskLookup::new()).unwrap();
        assert_eq!(record.asset_type_code, "9000171999");
        assert_eq!(record.uom, "PC");
        assert_eq!(record.qty_required, "1");
    }
}
