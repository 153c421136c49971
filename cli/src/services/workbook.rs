use std::path::Path;

use tracing::info;

use super::csv_reader::read_csv_table;
use super::xlsx_reader::read_xlsx;
use crate::error::{Result, ScheduleError};
use crate::models::Sheet;
use crate::utils::Timer;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const DEFAULT_CSV_SHEET: &str = "Planilha1";

/// An uploaded schedule source: one sheet per researcher, in file order.
/// CSV input always yields a single sheet named after the file.
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn from_sheets(sheets: Vec<Sheet>) -> Result<Self> {
        if sheets.is_empty() {
            return Err(ScheduleError::NoSheets);
        }
        Ok(Self { sheets })
    }

    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_sheets(read_xlsx(bytes)?)
    }

    pub fn from_csv_bytes(sheet_name: &str, bytes: &[u8]) -> Result<Self> {
        let table = read_csv_table(bytes)?;
        Self::from_sheets(vec![Sheet {
            name: sheet_name.to_string(),
            table,
        }])
    }

    /// Pick a reader from the content (zip packages are xlsx) and fall back
    /// to the file extension.
    pub fn from_upload(filename: &str, bytes: &[u8]) -> Result<Self> {
        let timer = Timer::start("workbook parse");
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let workbook = if bytes.starts_with(ZIP_MAGIC) {
            Self::from_xlsx_bytes(bytes)?
        } else {
            match extension.as_deref() {
                Some("csv") | Some("txt") => {
                    Self::from_csv_bytes(&csv_sheet_name(filename), bytes)?
                }
                Some("xlsx") | Some("xlsm") => Self::from_xlsx_bytes(bytes)?,
                _ => return Err(ScheduleError::UnsupportedFormat(filename.to_string())),
            }
        };

        info!(
            filename,
            sheets = workbook.sheets.len(),
            "Loaded schedule workbook"
        );
        timer.log_elapsed();
        Ok(workbook)
    }

    /// Read a workbook from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        Self::from_upload(filename, &bytes)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn is_single_sheet(&self) -> bool {
        self.sheets.len() == 1
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ScheduleError::SheetNotFound(name.to_string()))
    }

    /// The named sheet, or the first one when no name is given.
    pub fn sheet_or_first(&self, name: Option<&str>) -> Result<&Sheet> {
        match name {
            Some(name) if !name.is_empty() => self.sheet(name),
            _ => Ok(&self.sheets[0]),
        }
    }
}

fn csv_sheet_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_CSV_SHEET.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::xlsx_reader::tests::{build_xlsx, SCHEDULE_SHEET, SHARED_STRINGS};

    #[test]
    fn test_from_upload_detects_xlsx_by_content() {
        let bytes = build_xlsx(&[("Ana", SCHEDULE_SHEET), ("Bruno", SCHEDULE_SHEET)], Some(SHARED_STRINGS));
        // misleading extension, zip content wins
        let workbook = Workbook::from_upload("cronograma.csv", &bytes).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Ana", "Bruno"]);
        assert!(!workbook.is_single_sheet());
    }

    #[test]
    fn test_from_upload_csv_sheet_named_after_file() {
        let csv = b"Projeto,Tarefa,Inicio,Fim\nGML,Coleta,01-03-2025,31-05-2025\n";
        let workbook = Workbook::from_upload("maria.csv", csv).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["maria"]);
        assert!(workbook.is_single_sheet());
        assert_eq!(workbook.sheet_or_first(None).unwrap().table.len(), 1);
    }

    #[test]
    fn test_from_upload_rejects_unknown_format() {
        let err = Workbook::from_upload("notes.pdf", b"%PDF-1.4").unwrap_err();
        assert!(matches!(err, ScheduleError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_sheet_lookup() {
        let bytes = build_xlsx(&[("Ana", SCHEDULE_SHEET)], Some(SHARED_STRINGS));
        let workbook = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(workbook.sheet_or_first(Some("")).unwrap().name, "Ana");
        assert!(matches!(
            workbook.sheet("Carlos"),
            Err(ScheduleError::SheetNotFound(name)) if name == "Carlos"
        ));
    }
}
