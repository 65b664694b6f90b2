//! Output tables: a two-sheet `.xlsx` workbook, or JSON.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::info;

use crate::error::SinkError;
use crate::extract::Extraction;
use crate::logging::SINK;
use crate::spare::SparePartRecord;
use crate::task::TaskRecord;
pub const TASKS_SHEET: &str = "Tasks";
pub const SPARE_PARTS_SHEET: &str = "SpareParts";

pub const TASK_COLUMNS: &[&str] = &[
    "Sort",
    "TaskCode",
    "TaskAction",
    "TaskDescription",
    "TypeOfWork",
    "MotionType",
    "Duration",
    "DurationCalc",
    "DurationUOM",
    "Interval",
    "MTBMPredicted",
    "CostCode",
    "IncludeInME",
    "TaskDependency",
    "FollowUpTasks",
    "LocationDependency",
    "Active",
    "Trade",
    "Section",
    "DocRef",
    "Location1",
    "Location2",
    "ComponentPath",
    "AssetType",
    "AssetTypeCode",
];

pub const SPARE_PART_COLUMNS: &[&str] = &[
    "TaskCode",
    "PartNo",
    "PartDescription",
    "MU_TL",
    "QtyRequired",
    "UOM",
    "ItemDependency",
    "Location1",
    "Location2",
    "AssetType",
    "AssetTypeCode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
}

/// A record that can be laid out as one sheet row.
pub trait SheetRow {
    const COLUMNS: &'static [&'static str];

    /// One cell per entry of `COLUMNS`, in the same order.
    fn cells(&self) -> Vec<Cell<'_>>;
}

impl SheetRow for TaskRecord {
    const COLUMNS: &'static [&'static str] = TASK_COLUMNS;

    fn cells(&self) -> Vec<Cell<'_>> {
        let ext = &self.extension;
        let mut cells = vec![Cell::Number(self.sort as f64)];
        cells.extend(
            [
                &self.task_code,
                &self.task_action,
                &self.task_description,
                &ext.type_of_work,
                &ext.motion_type,
                &ext.duration,
                &ext.duration_calc,
                &ext.duration_uom,
                &self.interval,
                &ext.mtbm_predicted,
                &ext.cost_code,
                &ext.include_in_me,
                &ext.task_dependency,
                &ext.follow_up_tasks,
                &ext.location_dependency,
                &ext.active,
                &self.trade,
                &ext.section,
                &self.doc_ref,
                &self.location1,
                &self.location2,
                &self.component_path,
                &self.asset_type,
                &self.asset_type_code,
            ]
            .into_iter()
            .map(|s| Cell::Text(s.as_str())),
        );
        cells
    }
}

impl SheetRow for SparePartRecord {
    const COLUMNS: &'static [&'static str] = SPARE_PART_COLUMNS;

    fn cells(&self) -> Vec<Cell<'_>> {
        [
            &self.task_code,
            &self.part_no,
            &self.part_description,
            &self.mu_tl,
            &self.qty_required,
            &self.uom,
            &self.item_dependency,
            &self.location1,
            &self.location2,
            &self.asset_type,
            &self.asset_type_code,
        ]
        .into_iter()
        .map(|s| Cell::Text(s.as_str()))
        .collect()
    }
}

fn write_sheet<R: SheetRow>(
    workbook: &mut Workbook,
    name: &str,
    rows: &[R],
    header: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (col, title) in R::COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, header)?;
    }
    for (i, record) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record.cells().into_iter().enumerate() {
            let col = col as u16;
            // empty strings are left as missing cells
            match cell {
                Cell::Text(text) => sheet.write_string(row, col, text)?,
                Cell::Number(n) => sheet.write_number(row, col, n)?,
            };
        }
    }
    Ok(())
}

/// Both sheets, each with a bold header row followed by one row per record.
pub fn build_workbook(extraction: &Extraction) -> Result<Workbook, XlsxError> {
    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, TASKS_SHEET, &extraction.tasks, &header)?;
    write_sheet(&mut workbook, SPARE_PARTS_SHEET, &extraction.spare_parts, &header)?;
    Ok(workbook)
}

fn save_workbook<W: Write + Seek + Send>(
    workbook: &mut Workbook,
    writer: W,
    path: &Path,
) -> Result<(), SinkError> {
    workbook
        .save_to_writer(writer)
        .map_err(|source| SinkError::Xlsx {
            path: path.to_path_buf(),
            source,
        })
}

fn create(path: &Path) -> Result<BufWriter<File>, SinkError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_xlsx(path: &Path, extraction: &Extraction) -> Result<(), SinkError> {
    let mut workbook = build_workbook(extraction).map_err(|source| SinkError::Xlsx {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = create(path)?;
    save_workbook(&mut workbook, &mut out, path)?;
    out.flush().map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        target: SINK,
        path = %path.display(),
        tasks = extraction.tasks.len(),
        spare_parts = extraction.spare_parts.len(),
        "workbook written"
    );
    Ok(())
}

pub fn write_json(path: &Path, extraction: &Extraction) -> Result<(), SinkError> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, extraction).map_err(|source| SinkError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.flush().map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(target: SINK, path = %path.display(), "json written");
    Ok(())
}

pub fn write_output(path: &Path, format: OutputFormat, extraction: &Extraction) -> Result<(), SinkError> {
    match format {
        OutputFormat::Xlsx => write_xlsx(path, extraction),
        OutputFormat::Json => write_json(path, extraction),
    }
}
