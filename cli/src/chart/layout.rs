use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Activity;
use crate::utils::next_day;

/// One horizontal lane of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    /// Y-axis label (the task name)
    pub label: String,
    /// Index into [`TimelineLayout::projects`], also the palette index
    pub color_index: usize,
    /// First day covered by the bar
    pub from: NaiveDate,
    /// Day after the last day covered by the bar
    pub until: NaiveDate,
    /// Written on the bar; empty for none
    pub deliverable: String,
}

/// Everything needed to draw a timeline, independent of the drawing backend.
///
/// Lanes are in display order, lane 0 at the top. Each activity gets its own
/// lane, so tasks with the same name in different projects stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineLayout {
    pub lanes: Vec<Lane>,
    /// Projects in order of first appearance
    pub projects: Vec<String>,
    /// Lane indices `i` such that lanes `i` and `i + 1` belong to different projects
    pub separators: Vec<usize>,
    pub first_day: NaiveDate,
    /// Exclusive end of the time axis
    pub last_day: NaiveDate,
}

impl TimelineLayout {
    /// Lay out activities in the given order. `None` when there is nothing
    /// to draw.
    pub fn build(activities: &[Activity]) -> Option<Self> {
        let first = activities.first()?;

        let mut lanes = Vec::with_capacity(activities.len());
        let mut projects: Vec<String> = Vec::new();
        let mut separators = Vec::new();
        let mut first_day = first.start.min(first.end);
        let mut last_day = next_day(first.start.max(first.end));

        for (index, activity) in activities.iter().enumerate() {
            let color_index = match projects.iter().position(|p| *p == activity.project) {
                Some(position) => position,
                None => {
                    projects.push(activity.project.clone());
                    projects.len() - 1
                }
            };

            if index > 0 && activities[index - 1].project != activity.project {
                separators.push(index - 1);
            }

            // inverted rows still span both dates
            let from = activity.start.min(activity.end);
            let until = next_day(activity.start.max(activity.end));
            first_day = first_day.min(from);
            last_day = last_day.max(until);

            lanes.push(Lane {
                label: activity.task.clone(),
                color_index,
                from,
                until,
                deliverable: activity.deliverable.clone(),
            });
        }

        Some(Self {
            lanes,
            projects,
            separators,
            first_day,
            last_day,
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Length of the time axis in days, at least one.
    pub fn span_days(&self) -> i64 {
        (self.last_day - self.first_day).num_days().max(1)
    }

    /// Days from the start of the axis to `date`.
    pub fn offset(&self, date: NaiveDate) -> i64 {
        (date - self.first_day).num_days()
    }
}
