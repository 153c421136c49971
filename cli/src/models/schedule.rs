use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Schedule columns. Headers are matched trimmed and ASCII case-insensitively
/// against the canonical name and its aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Project,
    Task,
    Start,
    End,
    Deliverable,
}

impl Column {
    /// Columns every uploaded sheet must carry.
    pub const REQUIRED: [Column; 4] = [Column::Project, Column::Task, Column::Start, Column::End];

    pub const ALL: [Column; 5] = [
        Column::Project,
        Column::Task,
        Column::Start,
        Column::End,
        Column::Deliverable,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Project => "Projeto",
            Column::Task => "Tarefa",
            Column::Start => "Início",
            Column::End => "Fim",
            Column::Deliverable => "Entrega_mensurável",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Project => &["Projeto", "Project"],
            Column::Task => &["Tarefa", "Task"],
            Column::Start => &["Início", "Inicio", "Start"],
            Column::End => &["Fim", "End"],
            Column::Deliverable => &[
                "Entrega_mensurável",
                "Entrega_mensuravel",
                "Entrega mensurável",
                "Deliverable",
            ],
        }
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        self.aliases()
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(header))
    }

    /// Index of the first header matching this column.
    pub fn position(&self, headers: &[String]) -> Option<usize> {
        headers.iter().position(|h| self.matches(h))
    }
}

/// One row of the in-browser editor, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub project: String,
    pub task: String,
    pub start: String,
    pub end: String,
    pub deliverable: String,
}

impl ScheduleRow {
    pub fn new(project: &str, task: &str, start: &str, end: &str, deliverable: &str) -> Self {
        Self {
            project: project.to_string(),
            task: task.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            deliverable: deliverable.to_string(),
        }
    }

    /// True when any of project, task, start or end is blank.
    pub fn has_blank_required(&self) -> bool {
        [&self.project, &self.task, &self.start, &self.end]
            .iter()
            .any(|field| field.trim().is_empty())
    }

    pub fn is_blank(&self) -> bool {
        [&self.project, &self.task, &self.start, &self.end, &self.deliverable]
            .iter()
            .all(|field| field.trim().is_empty())
    }

    /// Rows the editor starts with.
    pub fn example_rows() -> Vec<ScheduleRow> {
        vec![
            ScheduleRow::new(
                "Exemplo Projeto X",
                "Planejamento experimento",
                "01-02-2025",
                "28-02-2025",
                "Documento de protocolo experimental",
            ),
            ScheduleRow::new(
                "Exemplo Projeto X",
                "Coleta de dados",
                "15-03-2025",
                "30-04-2025",
                "Banco de dados bruto organizado",
            ),
        ]
    }
}

/// A cleaned schedule activity with parsed dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub project: String,
    pub task: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub deliverable: String,
}

impl Activity {
    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }
}

/// What cleaning removed or flagged. Row numbers count data rows from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub total_rows: usize,
    pub dropped_blank: usize,
    pub dropped_invalid_dates: usize,
    /// Rows whose end date precedes the start date (kept, but suspicious)
    pub inverted: Vec<usize>,
}

impl CleaningReport {
    pub fn kept(&self) -> usize {
        self.total_rows - self.dropped_blank - self.dropped_invalid_dates
    }

    pub fn has_drops(&self) -> bool {
        self.dropped_blank > 0 || self.dropped_invalid_dates > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_matching_aliases() {
        assert!(Column::Start.matches("Início"));
        assert!(Column::Start.matches(" inicio "));
        assert!(Column::Start.matches("START"));
        assert!(Column::Deliverable.matches("Entrega_mensurável"));
        assert!(!Column::End.matches("Fim previsto"));
    }

    #[test]
    fn test_column_position() {
        let headers: Vec<String> = ["Tarefa", "Projeto", "Fim"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(Column::Project.position(&headers), Some(1));
        assert_eq!(Column::Start.position(&headers), None);
    }

    #[test]
    fn test_blank_required_fields() {
        let mut row = ScheduleRow::example_rows().remove(0);
        assert!(!row.has_blank_required());
        row.deliverable.clear();
        assert!(!row.has_blank_required());
        row.task = "   ".to_string();
        assert!(row.has_blank_required());
        assert!(ScheduleRow::default().is_blank());
    }
}
