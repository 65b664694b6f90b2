//! Task rows: `*9465150 ENGR Check Check warning labels MM 1000 Hours`.
//!
//! The first three tokens are fixed (code, trade, action). Everything after is a
//! free-text description followed, optionally, by a document reference and an
//! interval, with nothing but whitespace between them. The tail is peeled off
//! right to left by ordered lists of [`TailMatcher`]s; the first matcher that
//! accepts wins, and whatever is left is the description.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::assemble::{assemble, BlockKind};
use crate::classify::{normalize_task_code, strip_status_prefix, Classifier};
use crate::context::Context;
use crate::logging::TASK_PASS;

pub const NO_INTERVAL: &str = "No Interval";
pub const NO_REFERENCE: &str = "No reference";

const INTERVAL_UNITS: &[&str] = &[
    "hour", "hours", "week", "weeks", "month", "months", "day", "days",
];
const LOOKBACK_WINDOW: usize = 5;

static GLUED_NO_INTERVAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S)(No ?[Ii]nterval\s*)$").unwrap());
static SERIAL_GLUED_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/\d{3,})(\d(?:\.\d+){2,}(?:-\d+)?)\b").unwrap());
static UPPER_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,8}$").unwrap());
// `4.2.5` or `4.2-3`; a bare decimal such as `2.5` is a quantity, not a reference
static DOTTED_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+){2,}(?:-\d+)?$|^\d+\.\d+-\d+$").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// One parsed task line, before any context is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRow {
    /// Code as written, marker included.
    pub code: String,
    pub trade: String,
    pub action: String,
    pub description: String,
    pub doc_ref: String,
    pub interval: String,
}

impl TaskRow {
    pub fn normalized_code(&self) -> &str {
        normalize_task_code(&self.code)
    }
}

/// Peels a recognised suffix off a token list.
///
/// Returns how many leading tokens remain as body and the extracted value, or
/// `None` to pass to the next matcher.
pub trait TailMatcher: Sync {
    fn name(&self) -> &'static str;
    fn split(&self, tokens: &[&str]) -> Option<(usize, String)>;
}

fn trailing_pair_eq(tokens: &[&str], first: &str, second: &str) -> bool {
    match tokens {
        [.., a, b] => a.eq_ignore_ascii_case(first) && b.eq_ignore_ascii_case(second),
        _ => false,
    }
}

/// Trailing `No Interval`, in any case, also when OCR fused it into one token.
struct NoIntervalPhrase;

impl TailMatcher for NoIntervalPhrase {
    fn name(&self) -> &'static str {
        "no-interval"
    }

    fn split(&self, tokens: &[&str]) -> Option<(usize, String)> {
        if trailing_pair_eq(tokens, "no", "interval") {
            return Some((tokens.len() - 2, NO_INTERVAL.to_string()));
        }
        match tokens.last() {
            Some(last) if last.eq_ignore_ascii_case("nointerval") => {
                Some((tokens.len() - 1, NO_INTERVAL.to_string()))
            }
            _ => None,
        }
    }
}

/// Trailing `<integer> <unit>`, e.g. `1000 Hours`, `6 Month`.
struct CountAndUnit;

impl TailMatcher for CountAndUnit {
    fn name(&self) -> &'static str {
        "count-unit"
    }

    fn split(&self, tokens: &[&str]) -> Option<(usize, String)> {
        let [.., count, unit] = tokens else {
            return None;
        };
        let unit_lower = unit.to_lowercase();
        if INTEGER.is_match(count) && INTERVAL_UNITS.contains(&unit_lower.as_str()) {
            Some((tokens.len() - 2, format!("{} {}", count, unit)))
        } else {
            None
        }
    }
}

/// Trailing `No reference`.
struct NoReferencePhrase;

impl TailMatcher for NoReferencePhrase {
    fn name(&self) -> &'static str {
        "no-reference"
    }

    fn split(&self, tokens: &[&str]) -> Option<(usize, String)> {
        trailing_pair_eq(tokens, "no", "reference")
            .then(|| (tokens.len() - 2, NO_REFERENCE.to_string()))
    }
}

/// A single trailing token shaped like a reference: a short upper-case code
/// (`MM`, `OEM`) or a dotted section number (`4.2.5.1-3`). Tokens with `/` are
/// asset serials and stay in the description.
struct TrailingReferenceToken;

impl TailMatcher for TrailingReferenceToken {
    fn name(&self) -> &'static str {
        "reference-token"
    }

    fn split(&self, tokens: &[&str]) -> Option<(usize, String)> {
        let last = tokens.last()?;
        if last.contains('/') {
            return None;
        }
        (UPPER_CODE.is_match(last) || DOTTED_REF.is_match(last))
            .then(|| (tokens.len() - 1, last.to_string()))
    }
}

/// Best-effort: within the last few tokens, the first one carrying a digit,
/// reference punctuation or a short upper-case word starts the reference.
/// Misfires on descriptions ending in acronyms, so it is opt-in.
struct LookbackReference;

impl TailMatcher for LookbackReference {
    fn name(&self) -> &'static str {
        "reference-lookback"
    }

    fn split(&self, tokens: &[&str]) -> Option<(usize, String)> {
        let window_start = tokens.len().saturating_sub(LOOKBACK_WINDOW);
        let offset = tokens[window_start..].iter().position(|tok| {
            !tok.contains('/')
                && (tok.chars().any(|c| c.is_ascii_digit())
                    || tok.contains([':', ';', '.', '-'])
                    || (tok.chars().count() <= 4
                        && tok.chars().any(char::is_alphabetic)
                        && !tok.chars().any(char::is_lowercase)))
        })?;
        let start = window_start + offset;
        Some((start, tokens[start..].join(" ")))
    }
}

static INTERVAL_MATCHERS: &[&dyn TailMatcher] = &[&NoIntervalPhrase, &CountAndUnit];
static STRICT_DOC_REF_MATCHERS: &[&dyn TailMatcher] =
    &[&NoReferencePhrase, &TrailingReferenceToken];
static LOOKBACK_DOC_REF_MATCHERS: &[&dyn TailMatcher] =
    &[&NoReferencePhrase, &TrailingReferenceToken, &LookbackReference];

fn first_split(matchers: &[&dyn TailMatcher], tokens: &[&str]) -> Option<(usize, String)> {
    matchers.iter().find_map(|m| {
        let hit = m.split(tokens);
        if hit.is_some() {
            trace!(target: TASK_PASS, matcher = m.name(), "tail matched");
        }
        hit
    })
}

/// Repair spacing defects in the text after the action token.
pub fn normalize_remainder(rest: &str) -> String {
    let rest = GLUED_NO_INTERVAL.replace(rest, "$1 $2");
    SERIAL_GLUED_REF.replace_all(&rest, "$1 $2").into_owned()
}

#[derive(Clone, Copy)]
pub struct TaskRowParser {
    doc_ref_matchers: &'static [&'static dyn TailMatcher],
}

impl std::fmt::Debug for TaskRowParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.doc_ref_matchers.iter().map(|m| m.name()))
            .finish()
    }
}

impl Default for TaskRowParser {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TaskRowParser {
    pub fn new(doc_ref_lookback: bool) -> Self {
        let doc_ref_matchers = if doc_ref_lookback {
            LOOKBACK_DOC_REF_MATCHERS
        } else {
            STRICT_DOC_REF_MATCHERS
        };
        TaskRowParser { doc_ref_matchers }
    }

    /// Parse an assembled task line. `None` when fewer than three tokens remain
    /// after the status prefix is dropped.
    pub fn parse(&self, logical_line: &str) -> Option<TaskRow> {
        let tokens: Vec<&str> = strip_status_prefix(logical_line).split_whitespace().collect();
        let [code, trade, action, rest @ ..] = tokens.as_slice() else {
            return None;
        };

        let remainder = normalize_remainder(&rest.join(" "));
        let rest_tokens: Vec<&str> = remainder.split_whitespace().collect();

        let (body_len, interval) =
            first_split(INTERVAL_MATCHERS, &rest_tokens).unwrap_or((rest_tokens.len(), String::new()));
        let body = &rest_tokens[..body_len];

        let (desc_len, doc_ref) =
            first_split(self.doc_ref_matchers, body).unwrap_or((body.len(), String::new()));

        Some(TaskRow {
            code: code.to_string(),
            trade: trade.to_string(),
            action: action.to_string(),
            description: body[..desc_len].join(" "),
            doc_ref,
            interval,
        })
    }
}

/// Assemble the task block at `start` and parse it. Returns the row, if any,
/// and the index of the first unconsumed line.
pub fn parse_task_block<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    classifier: &Classifier,
    parser: &TaskRowParser,
) -> (Option<TaskRow>, usize) {
    let (logical, next) = assemble(lines, start, BlockKind::Task, classifier);
    (parser.parse(&logical), next)
}

/// Columns reserved for downstream planning tools; always blank except
/// `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskExtension {
    pub type_of_work: String,
    pub motion_type: String,
    pub duration: String,
    pub duration_calc: String,
    #[serde(rename = "DurationUOM")]
    pub duration_uom: String,
    #[serde(rename = "MTBMPredicted")]
    pub mtbm_predicted: String,
    pub cost_code: String,
    #[serde(rename = "IncludeInME")]
    pub include_in_me: String,
    pub task_dependency: String,
    pub follow_up_tasks: String,
    pub location_dependency: String,
    pub active: String,
    pub section: String,
}

impl Default for TaskExtension {
    fn default() -> Self {
        TaskExtension {
            type_of_work: String::new(),
            motion_type: String::new(),
            duration: String::new(),
            duration_calc: String::new(),
            duration_uom: String::new(),
            mtbm_predicted: String::new(),
            cost_code: String::new(),
            include_in_me: String::new(),
            task_dependency: String::new(),
            follow_up_tasks: String::new(),
            location_dependency: String::new(),
            active: "Y".to_string(),
            section: String::new(),
        }
    }
}

/// One row of the Tasks table; unique per normalized task code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskRecord {
    pub sort: usize,
    pub task_code: String,
    pub task_action: String,
    pub task_description: String,
    pub trade: String,
    pub doc_ref: String,
    pub interval: String,
    pub location1: String,
    pub location2: String,
    pub set_type_code: String,
    pub component_path: String,
    pub asset_type: String,
    pub asset_type_code: String,
    #[serde(flatten)]
    pub extension: TaskExtension,
}

impl TaskRecord {
    pub fn from_row(row: TaskRow, ctx: &Context) -> Self {
        let asset_type_code = if ctx.set_type_code.is_empty() {
            ctx.asset_code.clone()
        } else {
            ctx.set_type_code.clone()
        };
        TaskRecord {
            sort: 0,
            task_code: row.normalized_code().to_string(),
            task_action: row.action,
            task_description: row.description,
            trade: row.trade,
            doc_ref: row.doc_ref,
            interval: row.interval,
            location1: ctx.location1.clone(),
            location2: ctx.location2.clone(),
            set_type_code: ctx.set_type_code.clone(),
            component_path: ctx.component_path.clone(),
            asset_type: ctx.asset_type.clone(),
            asset_type_code,
            extension: TaskExtension::default(),
        }
    }

    /// Fold a repeated row for the same code into this record: the longer
    /// description wins, empty fields are filled, nothing is overwritten.
    pub fn merge(&mut self, row: &TaskRow, ctx: &Context) {
        if row.description.chars().count() > self.task_description.chars().count() {
            self.task_description = row.description.clone();
        }
        fill_if_empty(&mut self.doc_ref, &row.doc_ref);
        fill_if_empty(&mut self.interval, &row.interval);
        fill_if_empty(&mut self.location1, &ctx.location1);
        fill_if_empty(&mut self.location2, &ctx.location2);
    }
}

fn fill_if_empty(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

/// Task records keyed by normalized code, in first-seen order.
///
/// Built once by the task pass; the spare-part pass only reads it.
#[derive(Debug, Clone, Default)]
pub struct TaskLookup {
    by_code: IndexMap<String, TaskRecord>,
}

impl TaskLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, or merge `row` into the one already holding its
    /// code. Returns `true` when a new record was created.
    pub fn upsert(&mut self, row: TaskRow, ctx: &Context) -> bool {
        match self.by_code.get_mut(row.normalized_code()) {
            Some(existing) => {
                existing.merge(&row, ctx);
                false
            }
            None => {
                let record = TaskRecord::from_row(row, ctx);
                self.by_code.insert(record.task_code.clone(), record);
                true
            }
        }
    }

    /// Number records 1.. in output order.
    pub fn assign_sort(&mut self) {
        for (i, record) in self.by_code.values_mut().enumerate() {
            record.sort = i + 1;
        }
    }

    pub fn get(&self, code: &str) -> Option<&TaskRecord> {
        self.by_code.get(normalize_task_code(code))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.by_code.values()
    }

    pub fn into_records(self) -> Vec<TaskRecord> {
        self.by_code.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> TaskRow {
        TaskRowParser::default().parse(line).unwrap()
    }

    #[test]
    fn interval_without_reference() {
        let row = parse("9465150 ENGR Check Check warning labels 1000 Hours");
        assert_eq!(
            row,
            TaskRow {
                code: "9465150".into(),
                trade: "ENGR".into(),
                action: "Check".into(),
                description: "Check warning labels".into(),
                doc_ref: "".into(),
                interval: "1000 Hours".into(),
            }
        );
    }

    #[test]
    fn no_reference_without_interval() {
        let row = parse("9465160 TECH Check Check labels No reference");
        assert_eq!(row.description, "Check labels");
        assert_eq!(row.doc_ref, "No reference");
        assert_eq!(row.interval, "");
    }

    #[test]
    fn reference_code_and_interval() {
        let row = parse("*9465160 TECH Check Check Warning labels MM 1000 Hours");
        assert_eq!(row.code, "*9465160");
        assert_eq!(row.normalized_code(), "9465160");
        assert_eq!(row.description, "Check Warning labels");
        assert_eq!(row.doc_ref, "MM");
        assert_eq!(row.interval, "1000 Hours");
    }

    #[test]
    fn no_reference_and_interval() {
        let row = parse("9465150 ENGR Check Check labels No reference 6 months");
        assert_eq!(row.description, "Check labels");
        assert_eq!(row.doc_ref, "No reference");
        assert_eq!(row.interval, "6 months");
    }

    #[test]
    fn dotted_reference_and_no_interval() {
        let row = parse("9465170 MECH Replace Replace filter element 4.2.5.1-3 no interval");
        assert_eq!(row.description, "Replace filter element");
        assert_eq!(row.doc_ref, "4.2.5.1-3");
        assert_eq!(row.interval, NO_INTERVAL);
    }

    #[test]
    fn trailing_decimal_stays_in_description() {
        let row = parse("9465150 MECH Fill Fill gearbox oil to 2.5 6 Months");
        assert_eq!(row.description, "Fill gearbox oil to 2.5");
        assert_eq!(row.doc_ref, "");
        assert_eq!(row.interval, "6 Months");

        let row = parse("9465150 MECH Fill Fill gearbox oil 4.2-3 6 Months");
        assert_eq!(row.doc_ref, "4.2-3");
    }

    #[test]
    fn glued_no_interval_is_split() {
        let row = parse("9465170 MECH Replace Replace filter OEMNo Interval");
        assert_eq!(row.doc_ref, "OEM");
        assert_eq!(row.interval, NO_INTERVAL);
        assert_eq!(row.description, "Replace filter");

        let row = parse("9465170 MECH Replace Replace filter NoInterval");
        assert_eq!(row.interval, NO_INTERVAL);
        assert_eq!(row.description, "Replace filter");
    }

    #[test]
    fn serial_tokens_stay_in_description() {
        let row = parse("9465180 ELEC Inspect Inspect drive A3/F-040 1 Week");
        assert_eq!(row.description, "Inspect drive A3/F-040");
        assert_eq!(row.doc_ref, "");
        assert_eq!(row.interval, "1 Week");
    }

    #[test]
    fn serial_glued_to_reference_is_separated() {
        assert_eq!(
            normalize_remainder("Inspect pump SN/0404.2.5.1-3 No Interval"),
            "Inspect pump SN/040 4.2.5.1-3 No Interval"
        );
        let row = parse("9465180 ELEC Inspect Inspect pump SN/0404.2.5.1-3 No Interval");
        assert_eq!(row.description, "Inspect pump SN/040");
        assert_eq!(row.doc_ref, "4.2.5.1-3");
    }

    #[test]
    fn too_few_tokens_fail() {
        assert!(TaskRowParser::default().parse("9465150 ENGR").is_none());
        assert!(TaskRowParser::default().parse("• ").is_none());
    }

    #[test]
    fn bare_action_row() {
        let row = parse("• 9465190 TECH Lubricate");
        assert_eq!(row.code, "9465190");
        assert_eq!(row.description, "");
        assert_eq!(row.doc_ref, "");
        assert_eq!(row.interval, "");
    }

    #[test]
    fn lookback_is_opt_in() {
        let line = "9465200 ENGR Check Check torque per sec 4 rev B 500 Hours";
        let strict = TaskRowParser::new(false).parse(line).unwrap();
        assert_eq!(strict.doc_ref, "");
        assert_eq!(strict.description, "Check torque per sec 4 rev B");

        let lookback = TaskRowParser::new(true).parse(line).unwrap();
        assert_eq!(lookback.description, "Check torque per sec");
        assert_eq!(lookback.doc_ref, "4 rev B");
        assert_eq!(lookback.interval, "500 Hours");
    }

    #[test]
    fn merge_prefers_longer_description_and_fills_gaps() {
        let mut ctx = Context::new();
        let first = parse("9465150 ENGR Check Check labels 1000 Hours");
        let mut record = TaskRecord::from_row(first, &ctx);
        assert_eq!(record.extension.active, "Y");
        assert_eq!(record.location1, "");

        ctx.update_from_context_row("1 Pre-Maintenance \\ Checks (9000171371)");
        let second = parse("*9465150 ENGR Check Check warning labels on unit No reference 2 Weeks");
        record.merge(&second, &ctx);

        assert_eq!(record.task_description, "Check warning labels on unit");
        assert_eq!(record.doc_ref, "No reference");
        assert_eq!(record.interval, "1000 Hours");
        assert_eq!(record.location1, "1 Pre-Maintenance");
        assert_eq!(record.location2, "Checks (9000171371)");
        // set-type code comes from the first sighting only
        assert_eq!(record.set_type_code, "");

        let shorter = parse("9465150 ENGR Check Check");
        record.merge(&shorter, &ctx);
        assert_eq!(record.task_description, "Check warning labels on unit");
    }

    #[test]
    fn lookup_keeps_one_record_per_code() {
        let ctx = Context::new();
        let mut lookup = TaskLookup::new();
        assert!(lookup.upsert(parse("*9465150 ENGR Check Check labels"), &ctx));
        assert!(lookup.upsert(parse("9465160 TECH Check Check"), &ctx));
        assert!(!lookup.upsert(parse("9465150 ENGR Check Check all labels"), &ctx));
        lookup.assign_sort();

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get("*9465150").unwrap().task_description, "Check all labels");
        let records = lookup.into_records();
        assert_eq!(records[0].task_code, "9465150");
        assert_eq!(records[0].sort, 1);
        assert_eq!(records[1].task_code, "9465160");
        assert_eq!(records[1].sort, 2);
    }

    #[test]
    fn asset_type_code_falls_back_to_asset() {
        let mut ctx = Context::new();
        ctx.update_from_asset_row("Asset: 9000171371 TP A3/F-040V");
        let record = TaskRecord::from_row(parse("9465150 ENGR Check Check labels"), &ctx);
        assert_eq!(record.asset_type_code, "9000171371");
        assert_eq!(record.asset_type, "TP A3/F-040V");

        ctx.update_from_context_row("A \\ B (777)");
        let record = TaskRecord::from_row(parse("9465150 ENGR Check Check labels"), &ctx);
        assert_eq!(record.asset_type_code, "777");
    }
}
