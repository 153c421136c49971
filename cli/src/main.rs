use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ganttlab::{
    chart::{render_svg, ChartOptions, TimelineLayout, DEFAULT_WIDTH},
    init_logger,
    models::{Activity, CleaningReport},
    services::{load_activities, prepare_for_gantt, Workbook},
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ganttlab")]
#[command(about = "Turn research schedule spreadsheets into Gantt timeline charts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sheets of a schedule file
    Sheets {
        /// Schedule file (.xlsx or .csv)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the cleaned, sorted activities of one sheet as JSON
    Check {
        /// Schedule file (.xlsx or .csv)
        #[arg(short, long)]
        input: PathBuf,
        /// Sheet to read (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },
    /// Draw the Gantt chart of one sheet as SVG
    Render {
        /// Schedule file (.xlsx or .csv)
        #[arg(short, long)]
        input: PathBuf,
        /// Sheet to read (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
        /// Output file (defaults to the input name with .svg)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Chart title (defaults to "Cronograma – <sheet>")
        #[arg(short, long)]
        title: Option<String>,
        /// Chart width in pixels
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: u32,
    },
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    sheet: &'a str,
    activities: Vec<Activity>,
    report: CleaningReport,
}

fn main() -> anyhow::Result<()> {
    init_logger()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Sheets { input } => {
            let workbook = open(&input)?;
            for name in workbook.sheet_names() {
                println!("{}", name);
            }
        }
        Commands::Check { input, sheet } => {
            let workbook = open(&input)?;
            let sheet = workbook.sheet_or_first(sheet.as_deref())?;
            let (activities, report) = load_activities(&sheet.table, &sheet.name)?;
            let output = CheckOutput {
                sheet: &sheet.name,
                activities: prepare_for_gantt(&activities),
                report,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Render {
            input,
            sheet,
            output,
            title,
            width,
        } => {
            let workbook = open(&input)?;
            let sheet = workbook.sheet_or_first(sheet.as_deref())?;
            let (activities, report) = load_activities(&sheet.table, &sheet.name)?;
            if report.has_drops() {
                warn!(
                    dropped_blank = report.dropped_blank,
                    dropped_invalid_dates = report.dropped_invalid_dates,
                    "Some rows were left out of the chart"
                );
            }

            let sorted = prepare_for_gantt(&activities);
            let layout = TimelineLayout::build(&sorted)
                .with_context(|| format!("sheet '{}' has no activity with valid dates", sheet.name))?;

            let options = match title {
                Some(title) => ChartOptions::titled(&title),
                None => ChartOptions::for_sheet(&sheet.name),
            }
            .with_width(width);
            let svg = render_svg(&layout, &options)?;

            let output = output.unwrap_or_else(|| input.with_extension("svg"));
            std::fs::write(&output, svg)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(output = %output.display(), lanes = layout.lane_count(), "Chart written");
            println!("{}", output.display());
        }
    }

    Ok(())
}

fn open(input: &Path) -> anyhow::Result<Workbook> {
    Workbook::open(input).with_context(|| format!("Error reading the file {}", input.display()))
}
