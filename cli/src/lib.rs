//! # ganttlab - research schedules to Gantt timelines
//!
//! Reads project schedules (project, task, start, end, deliverable) from
//! `.xlsx` or `.csv` files or from rows typed into a form, cleans them and
//! draws a Gantt-style timeline as SVG.
//!
//! ## Quick Start
//!
//! ```rust
//! use ganttlab::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (activities, _report) = clean_manual_rows(&ScheduleRow::example_rows())?;
//! let sorted = prepare_for_gantt(&activities);
//! let layout = TimelineLayout::build(&sorted).expect("at least one activity");
//! let svg = render_svg(&layout, &ChartOptions::for_manual_entry())?;
//! assert!(svg.contains("Coleta de dados"));
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Prelude for convenient imports
pub mod prelude {
    //! Import this module to get the most commonly used types and functions:
    //! ```rust
    //! use ganttlab::prelude::*;
    //! ```

    pub use crate::chart::{render_activities, render_svg, ChartOptions, Lane, TimelineLayout};
    pub use crate::error::{ManualEntryError, ScheduleError};
    pub use crate::models::{Activity, CellValue, CleaningReport, Column, RawTable, ScheduleRow, Sheet};
    pub use crate::services::{clean_manual_rows, load_activities, prepare_for_gantt, Workbook};
    pub use crate::utils::{format_day_first, parse_day_first};
}

pub use utils::{init_logger, Timer};
