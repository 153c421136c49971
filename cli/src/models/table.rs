use serde::{Deserialize, Serialize};

/// A single cell as read from a spreadsheet, before any interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Build a cell from free text; whitespace-only text is empty.
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Render the cell the way it would appear in a table, trimmed.
    /// Whole numbers drop their fractional part (`3.0` -> `3`).
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

/// Rows of one sheet. The first non-empty row of the source becomes `headers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// Workbook uses the 1904 date system for serial dates
    pub date1904: bool,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            headers,
            rows,
            date1904: false,
        }
    }

    /// Cell at `row`/`col`, `Empty` when the row is shorter than the header.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A named sheet of an uploaded workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub table: RawTable,
}
