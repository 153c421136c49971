use tracing::{debug, info};

use crate::error::{ManualEntryError, Result, ScheduleError};
use crate::models::{Activity, CleaningReport, Column, RawTable, ScheduleRow};
use crate::utils::{cell_to_date, parse_day_first};

/// Turn an uploaded sheet into activities, in sheet order.
///
/// The four required columns must be present. A missing deliverable column
/// means empty deliverables. Rows without a project or task, and rows whose
/// start or end date cannot be read, are dropped and counted in the report.
/// An empty result is not an error.
pub fn load_activities(table: &RawTable, sheet: &str) -> Result<(Vec<Activity>, CleaningReport)> {
    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(Column::REQUIRED) {
        *slot = column
            .position(&table.headers)
            .ok_or_else(|| ScheduleError::MissingColumn {
                sheet: sheet.to_string(),
                column: column.header().to_string(),
            })?;
    }
    let [project_col, task_col, start_col, end_col] = positions;
    let deliverable_col = Column::Deliverable.position(&table.headers);

    let mut report = CleaningReport {
        total_rows: table.len(),
        ..Default::default()
    };
    let mut activities = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let project = table.cell(row, project_col).as_text();
        let task = table.cell(row, task_col).as_text();
        if project.is_empty() || task.is_empty() {
            report.dropped_blank += 1;
            continue;
        }

        let start = cell_to_date(table.cell(row, start_col), table.date1904);
        let end = cell_to_date(table.cell(row, end_col), table.date1904);
        let (Some(start), Some(end)) = (start, end) else {
            debug!(sheet, row = row + 1, "Dropping row with unreadable dates");
            report.dropped_invalid_dates += 1;
            continue;
        };

        let deliverable = deliverable_col
            .map(|col| table.cell(row, col).as_text())
            .unwrap_or_default();

        let activity = Activity {
            project,
            task,
            start,
            end,
            deliverable,
        };
        if activity.is_inverted() {
            report.inverted.push(row + 1);
        }
        activities.push(activity);
    }

    info!(
        sheet,
        total = report.total_rows,
        kept = activities.len(),
        dropped_blank = report.dropped_blank,
        dropped_invalid_dates = report.dropped_invalid_dates,
        "Loaded activities from sheet"
    );
    Ok((activities, report))
}

/// Clean rows typed into the editor.
///
/// Rows missing a project, task, start or end are dropped first; if none
/// remain the entry has no valid rows. Dates are then parsed day-first and
/// unreadable ones dropped; if none remain every date was invalid.
pub fn clean_manual_rows(
    rows: &[ScheduleRow],
) -> std::result::Result<(Vec<Activity>, CleaningReport), ManualEntryError> {
    let mut report = CleaningReport {
        total_rows: rows.len(),
        ..Default::default()
    };

    let complete: Vec<(usize, &ScheduleRow)> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.has_blank_required())
        .collect();
    report.dropped_blank = rows.len() - complete.len();

    if complete.is_empty() {
        return Err(ManualEntryError::NoValidRows);
    }

    let mut activities = Vec::with_capacity(complete.len());
    for (index, row) in complete {
        let (Some(start), Some(end)) = (parse_day_first(&row.start), parse_day_first(&row.end)) else {
            report.dropped_invalid_dates += 1;
            continue;
        };
        let activity = Activity {
            project: row.project.trim().to_string(),
            task: row.task.trim().to_string(),
            start,
            end,
            deliverable: row.deliverable.trim().to_string(),
        };
        if activity.is_inverted() {
            report.inverted.push(index + 1);
        }
        activities.push(activity);
    }

    if activities.is_empty() {
        return Err(ManualEntryError::AllDatesInvalid);
    }

    info!(
        total = report.total_rows,
        kept = activities.len(),
        "Cleaned manual schedule rows"
    );
    Ok((activities, report))
}

/// Order activities for the chart: by project, then by start date. Ties keep
/// their input order.
pub fn prepare_for_gantt(activities: &[Activity]) -> Vec<Activity> {
    let mut sorted = activities.to_vec();
    sorted.sort_by(|a, b| a.project.cmp(&b.project).then(a.start.cmp(&b.start)));
    sorted
}
