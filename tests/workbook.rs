mod common;

use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use maintab::classify::Variant;
use maintab::extract::{extract_with, ExtractOptions, Extraction};
use maintab::sink::{
    write_output, OutputFormat, SPARE_PARTS_SHEET, SPARE_PART_COLUMNS, TASKS_SHEET, TASK_COLUMNS,
};
use pretty_assertions::assert_eq;

use crate::common::PLAN;

/// Every row of a sheet as display strings; missing cells read back as "".
fn sheet_rows(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn column(name: &str, columns: &[&str]) -> usize {
    columns.iter().position(|c| *c == name).unwrap()
}

fn plan() -> Extraction {
    extract_with(PLAN, &ExtractOptions::new(Variant::Text))
}

#[test]
fn workbook_has_both_sheets_with_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    let out = plan();
    write_output(&path, OutputFormat::Xlsx, &out).unwrap();

    let workbook: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec![TASKS_SHEET, SPARE_PARTS_SHEET]);

    let tasks = sheet_rows(&path, TASKS_SHEET);
    assert_eq!(tasks[0], TASK_COLUMNS.to_vec());
    assert_eq!(tasks.len(), out.tasks.len() + 1);

    let spares = sheet_rows(&path, SPARE_PARTS_SHEET);
    assert_eq!(spares[0], SPARE_PART_COLUMNS.to_vec());
    assert_eq!(spares.len(), out.spare_parts.len() + 1);
}

#[test]
fn task_rows_land_in_their_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    write_output(&path, OutputFormat::Xlsx, &plan()).unwrap();

    let tasks = sheet_rows(&path, TASKS_SHEET);
    let first = &tasks[1];
    let cell = |name: &str| first[column(name, TASK_COLUMNS)].as_str();
    assert_eq!(cell("Sort"), "1");
    assert_eq!(cell("TaskCode"), "9465150");
    assert_eq!(cell("Interval"), "1000 Hours");
    assert_eq!(cell("Active"), "Y");
    assert_eq!(cell("Trade"), "ENGR");
    assert_eq!(cell("TypeOfWork"), "");

    assert_eq!(tasks[4][column("DocRef", TASK_COLUMNS)], "4.2.5.1-3");
}

#[test]
fn spare_rows_land_in_their_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    let out = plan();
    write_output(&path, OutputFormat::Xlsx, &out).unwrap();

    let spares = sheet_rows(&path, SPARE_PARTS_SHEET);
    let first = &out.spare_parts[0];
    let cell = |name: &str| spares[1][column(name, SPARE_PART_COLUMNS)].clone();
    assert_eq!(cell("TaskCode"), first.task_code);
    assert_eq!(cell("PartNo"), first.part_no);
    assert_eq!(cell("QtyRequired"), first.qty_required);
    assert_eq!(cell("UOM"), first.uom);
    assert_eq!(cell("AssetType"), "");
}

#[test]
fn special_characters_survive() {
    let lines = [
        "9465150 ENGR Check Check <guard> & cover",
        "Part No Part Description Task Code Task Action Qty Required UOM",
        "1550595-9960 Seal \"Kit\" 9465150 Check 2 EA",
    ];
    let out = extract_with(&lines, &ExtractOptions::new(Variant::Text));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    write_output(&path, OutputFormat::Xlsx, &out).unwrap();

    let tasks = sheet_rows(&path, TASKS_SHEET);
    assert_eq!(
        tasks[1][column("TaskDescription", TASK_COLUMNS)],
        "Check <guard> & cover"
    );
    let spares = sheet_rows(&path, SPARE_PARTS_SHEET);
    assert_eq!(
        spares[1][column("PartDescription", SPARE_PART_COLUMNS)],
        "Seal \"Kit\""
    );
}

#[test]
fn json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let out = plan();
    write_output(&path, OutputFormat::Json, &out).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["tasks"].as_array().unwrap().len(), out.tasks.len());
    assert_eq!(
        value["spare_parts"].as_array().unwrap().len(),
        out.spare_parts.len()
    );
}

#[test]
fn unwritable_path_is_an_error() {
    let out = plan();
    let err = write_output(
        Path::new("/nonexistent/dir/out.xlsx"),
        OutputFormat::Xlsx,
        &out,
    )
    .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/dir/out.xlsx"));
}
