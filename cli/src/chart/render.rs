use chrono::{Duration, NaiveDate};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::layout::TimelineLayout;
use crate::error::{Result, ScheduleError};
use crate::utils::{format_day_first, Timer};

pub const DEFAULT_WIDTH: u32 = 1200;
const MIN_HEIGHT: u32 = 360;
const MAX_HEIGHT: u32 = 8000;
const LANE_HEIGHT: u32 = 32;
/// Caption, x-axis labels and margins
const CHROME_HEIGHT: u32 = 120;
const MAX_LABEL_CHARS: usize = 48;
/// Vertical gap left above and below each bar, in lane units
const BAR_GAP: f64 = 0.15;
const SEPARATOR: RGBColor = RGBColor(150, 150, 150);
const NOTE: RGBColor = RGBColor(40, 40, 40);
const FONT: &str = "sans-serif";

/// Presentation settings for a timeline chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub title: String,
    pub width: u32,
    /// Fixed height; derived from the lane count when `None`
    pub height: Option<u32>,
    pub x_title: String,
    pub y_title: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Cronograma".to_string(),
            width: DEFAULT_WIDTH,
            height: None,
            x_title: "Tempo".to_string(),
            y_title: "Tarefas".to_string(),
        }
    }
}

impl ChartOptions {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Chart of one uploaded sheet.
    pub fn for_sheet(sheet: &str) -> Self {
        Self::titled(&format!("Cronograma – {}", sheet))
    }

    /// Chart of rows typed into the editor.
    pub fn for_manual_entry() -> Self {
        Self::titled("Cronograma – entrada manual")
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn height_for(&self, lanes: usize) -> u32 {
        self.height.unwrap_or_else(|| {
            let lanes = u32::try_from(lanes).unwrap_or(u32::MAX);
            CHROME_HEIGHT
                .saturating_add(LANE_HEIGHT.saturating_mul(lanes))
                .clamp(MIN_HEIGHT, MAX_HEIGHT)
        })
    }
}

fn chart_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ScheduleError {
    ScheduleError::Chart(err.to_string())
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
        short.push('…');
        short
    }
}

fn label_area_width(layout: &TimelineLayout) -> u32 {
    let longest = layout
        .lanes
        .iter()
        .map(|lane| lane.label.chars().count().min(MAX_LABEL_CHARS))
        .max()
        .unwrap_or(0);
    (longest as u32 * 7 + 40).clamp(90, 380)
}

fn day_offset(layout: &TimelineLayout, date: NaiveDate) -> i32 {
    i32::try_from(layout.offset(date)).unwrap_or(i32::MAX)
}

/// Draw the timeline as an SVG document.
///
/// Lane 0 is the top row. Bars are colored by project, a thin line separates
/// consecutive projects, and the y-axis carries the task names. Each bar
/// carries its deliverable, starting at the bar's left edge.
pub fn render_svg(layout: &TimelineLayout, options: &ChartOptions) -> Result<String> {
    let timer = Timer::start("chart render");
    let rows = layout.lane_count() as f64;
    let span = i32::try_from(layout.span_days()).unwrap_or(i32::MAX);
    let height = options.height_for(layout.lane_count());

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, (FONT, 22))
            .margin(16)
            .x_label_area_size(56)
            .y_label_area_size(label_area_width(layout))
            .build_cartesian_2d(0i32..span, 0f64..rows)
            .map_err(chart_error)?;

        let origin = layout.first_day;
        let date_label = |offset: &i32| format_day_first(origin + Duration::days(i64::from(*offset)));

        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_labels(8)
            .x_label_formatter(&date_label)
            .y_label_formatter(&|_: &f64| String::new())
            .x_desc(options.x_title.as_str())
            .y_desc(options.y_title.as_str())
            .label_style((FONT, 12))
            .axis_desc_style((FONT, 14))
            .draw()
            .map_err(chart_error)?;

        for (project_index, project) in layout.projects.iter().enumerate() {
            let color = Palette99::pick(project_index).mix(0.9);
            let bars = layout
                .lanes
                .iter()
                .enumerate()
                .filter(|(_, lane)| lane.color_index == project_index)
                .map(|(index, lane)| {
                    let top = rows - index as f64 - BAR_GAP;
                    let bottom = rows - index as f64 - 1.0 + BAR_GAP;
                    Rectangle::new(
                        [
                            (day_offset(layout, lane.from), top),
                            (day_offset(layout, lane.until), bottom),
                        ],
                        color.filled(),
                    )
                });

            chart
                .draw_series(bars)
                .map_err(chart_error)?
                .label(project.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        chart
            .draw_series(layout.separators.iter().map(|&index| {
                let y = rows - (index + 1) as f64;
                PathElement::new(vec![(0, y), (span, y)], SEPARATOR.stroke_width(1))
            }))
            .map_err(chart_error)?;

        let note_style = (FONT, 11)
            .into_font()
            .color(&NOTE)
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart
            .draw_series(
                layout
                    .lanes
                    .iter()
                    .enumerate()
                    .filter(|(_, lane)| !lane.deliverable.is_empty())
                    .map(|(index, lane)| {
                        EmptyElement::at((day_offset(layout, lane.from), rows - index as f64 - 0.5))
                            + Text::new(truncate_label(&lane.deliverable), (4, 0), note_style.clone())
                    }),
            )
            .map_err(chart_error)?;

        // lane labels go in the label area, right-aligned against the axis
        let label_style = (FONT, 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        for (index, lane) in layout.lanes.iter().enumerate() {
            let (x, y) = chart.backend_coord(&(0, rows - index as f64 - 0.5));
            root.draw(&Text::new(
                truncate_label(&lane.label),
                (x - 8, y),
                label_style.clone(),
            ))
            .map_err(chart_error)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font((FONT, 13))
            .draw()
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }

    timer.log_elapsed();
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::layout::Lane;
    use crate::models::Activity;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_layout() -> TimelineLayout {
        let activities = vec![
            Activity {
                project: "Dowsing".to_string(),
                task: "Revisão da literatura".to_string(),
                start: ymd(2025, 1, 6),
                end: ymd(2025, 2, 14),
                deliverable: "Bibliografia organizada".to_string(),
            },
            Activity {
                project: "GML".to_string(),
                task: "Coleta de dados".to_string(),
                start: ymd(2025, 3, 1),
                end: ymd(2025, 5, 31),
                deliverable: String::new(),
            },
        ];
        TimelineLayout::build(&activities).unwrap()
    }

    #[test]
    fn test_render_svg_contains_labels_and_legend() {
        let svg = render_svg(&sample_layout(), &ChartOptions::for_sheet("Ana")).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Cronograma – Ana"));
        assert!(svg.contains("Revisão da literatura"));
        assert!(svg.contains("Coleta de dados"));
        assert!(svg.contains("Dowsing"));
        assert!(svg.contains("GML"));
        assert!(svg.contains("Tempo"));
    }

    #[test]
    fn test_render_svg_writes_deliverables() {
        let layout = sample_layout();
        let svg = render_svg(&layout, &ChartOptions::default()).unwrap();
        assert!(svg.contains("Bibliografia organizada"));

        let without = TimelineLayout {
            lanes: layout
                .lanes
                .iter()
                .map(|lane| Lane {
                    deliverable: String::new(),
                    ..lane.clone()
                })
                .collect(),
            ..layout
        };
        let plain = render_svg(&without, &ChartOptions::default()).unwrap();
        assert!(!plain.contains("Bibliografia organizada"));
        assert!(plain.matches("<text").count() < svg.matches("<text").count());
    }

    #[test]
    fn test_height_grows_with_lanes() {
        let options = ChartOptions::default();
        assert_eq!(options.height_for(1), MIN_HEIGHT);
        assert_eq!(options.height_for(20), CHROME_HEIGHT + 20 * LANE_HEIGHT);
        assert_eq!(options.height_for(10_000), MAX_HEIGHT);
        let fixed = ChartOptions {
            height: Some(500),
            ..Default::default()
        };
        assert_eq!(fixed.height_for(50), 500);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Coleta"), "Coleta");
        let long = "x".repeat(60);
        let short = truncate_label(&long);
        assert_eq!(short.chars().count(), MAX_LABEL_CHARS);
        assert!(short.ends_with('…'));
    }
}
