use crate::error::Result;
use crate::models::{CellValue, RawTable};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse CSV content into a table. The first record is the header.
///
/// Spreadsheets exported with a comma decimal separator use `;` between
/// fields, so the delimiter is picked from the header line. Invalid UTF-8 is
/// replaced rather than rejected. Cells stay text; dates are parsed during
/// cleaning.
pub fn read_csv_table(bytes: &[u8]) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let delimiter = detect_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .byte_headers()?
        .iter()
        .map(|field| String::from_utf8_lossy(field).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row: Vec<CellValue> = record
            .iter()
            .map(|field| CellValue::from_text(&String::from_utf8_lossy(field)))
            .collect();
        if row.iter().any(|cell| !cell.is_empty()) {
            rows.push(row);
        }
    }

    Ok(RawTable::new(headers, rows))
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = header_line.iter().filter(|b| **b == b';').count();
    let commas = header_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_separated() {
        let csv = "Projeto,Tarefa,Início,Fim\nGML,Coleta,01-03-2025,31-05-2025\n";
        let table = read_csv_table(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Projeto", "Tarefa", "Início", "Fim"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 2), &CellValue::Text("01-03-2025".to_string()));
    }

    #[test]
    fn test_semicolon_separated_with_bom() {
        let csv = "\u{feff}Projeto;Tarefa;Início;Fim;Entrega_mensurável\nDowsing;Análise, fase 1;01-03-2025;31-05-2025;Notebook\n";
        let table = read_csv_table(csv.as_bytes()).unwrap();
        assert_eq!(table.headers[0], "Projeto");
        assert_eq!(table.cell(0, 1), &CellValue::Text("Análise, fase 1".to_string()));
        assert_eq!(table.cell(0, 4), &CellValue::Text("Notebook".to_string()));
    }

    #[test]
    fn test_blank_and_short_rows() {
        let csv = "Projeto,Tarefa,Início,Fim\n,,,\nGML,Coleta\n";
        let table = read_csv_table(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.cell(0, 3).is_empty());
    }
}
