//! Reader for `.xlsx` workbooks.
//!
//! An xlsx file is a zip package of XML parts. Only what the schedule needs
//! is read: sheet names and order (`xl/workbook.xml`), the sheet part paths
//! (`xl/_rels/workbook.xml.rels`), the shared strings table and the cell
//! values of each worksheet. Styles, formulas and drawings are ignored, so
//! date cells arrive as serial numbers and are converted during cleaning.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Result, ScheduleError};
use crate::models::{CellValue, Column, RawTable, Sheet};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
/// Largest decompressed XML part read from a package
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Sheet declared in the workbook part, in workbook order.
#[derive(Debug)]
struct SheetEntry {
    name: String,
    rel_id: Option<String>,
}

/// Read every sheet of an xlsx package held in memory.
pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<Sheet>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| ScheduleError::xml(WORKBOOK_PART, "part is missing"))?;
    let (entries, date1904) = parse_workbook(&workbook_xml)?;

    let relationships = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let shared_strings = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    debug!(
        sheets = entries.len(),
        shared_strings = shared_strings.len(),
        date1904,
        "Parsed workbook structure"
    );

    let mut sheets = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let part = entry
            .rel_id
            .as_ref()
            .and_then(|id| relationships.get(id))
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let xml = read_part(&mut archive, &part)?
            .ok_or_else(|| ScheduleError::xml(&part, "worksheet part is missing"))?;

        let mut table = parse_worksheet(&xml, &shared_strings, &part)?;
        table.date1904 = date1904;

        debug!(sheet = %entry.name, rows = table.len(), "Parsed worksheet");
        sheets.push(Sheet {
            name: entry.name,
            table,
        });
    }

    Ok(sheets)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    read_part_within(archive, name, MAX_PART_BYTES)
}

/// Read a part, refusing anything that decompresses to more than `limit` bytes.
fn read_part_within<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<Option<String>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let too_large = || ScheduleError::PartTooLarge {
        part: name.to_string(),
        limit,
    };
    if file.size() > limit {
        return Err(too_large());
    }

    // the declared size can lie, so the read is bounded too
    let mut content = String::new();
    file.take(limit.saturating_add(1)).read_to_string(&mut content)?;
    if content.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(Some(content))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{}", target)
    }
}

fn attribute(element: &BytesStart, local_name: &[u8], part: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ScheduleError::xml(part, e))?;
        if attr.key.local_name().as_ref() == local_name {
            let value = attr.unescape_value().map_err(|e| ScheduleError::xml(part, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_workbook(xml: &str) -> Result<(Vec<SheetEntry>, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut date1904 = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attribute(&e, b"name", WORKBOOK_PART)?
                        .ok_or_else(|| ScheduleError::xml(WORKBOOK_PART, "sheet without a name"))?;
                    let rel_id = attribute(&e, b"id", WORKBOOK_PART)?;
                    entries.push(SheetEntry { name, rel_id });
                }
                b"workbookPr" => {
                    if let Some(flag) = attribute(&e, b"date1904", WORKBOOK_PART)? {
                        date1904 = flag == "1" || flag.eq_ignore_ascii_case("true");
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScheduleError::xml(WORKBOOK_PART, e)),
            _ => {}
        }
    }

    Ok((entries, date1904))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let id = attribute(&e, b"Id", WORKBOOK_RELS_PART)?;
                    let target = attribute(&e, b"Target", WORKBOOK_RELS_PART)?;
                    if let (Some(id), Some(target)) = (id, target) {
                        targets.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScheduleError::xml(WORKBOOK_RELS_PART, e)),
            _ => {}
        }
    }

    Ok(targets)
}

/// Shared strings in table order. Rich text runs are concatenated and
/// phonetic hints (`rPh`) are skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = phonetic_depth == 0,
                b"rPh" => phonetic_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Text(text)) => {
                if in_text {
                    if let Some(s) = current.as_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| ScheduleError::xml(SHARED_STRINGS_PART, e))?;
                        s.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if in_text {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&String::from_utf8_lossy(&data));
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScheduleError::xml(SHARED_STRINGS_PART, e)),
            _ => {}
        }
    }

    Ok(strings)
}

/// Cell being read: 0-based column, type attribute and raw text.
struct PendingCell {
    column: u32,
    kind: String,
    raw: String,
}

fn parse_worksheet(xml: &str, shared_strings: &[String], part: &str) -> Result<RawTable> {
    let mut reader = Reader::from_str(xml);
    let mut rows: BTreeMap<u32, Vec<(u32, CellValue)>> = BTreeMap::new();

    let mut current_row = 0u32;
    let mut next_column = 0u32;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = row_number(&e, current_row, part)?;
                    next_column = 0;
                }
                b"c" => {
                    let (column, kind) = cell_position(&e, next_column, part)?;
                    next_column = column.saturating_add(1);
                    pending = Some(PendingCell {
                        column,
                        kind,
                        raw: String::new(),
                    });
                }
                b"v" => in_value = true,
                b"t" => {
                    in_inline_text = pending.as_ref().is_some_and(|cell| cell.kind == "inlineStr");
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = row_number(&e, current_row, part)?;
                    next_column = 0;
                }
                b"c" => {
                    let (column, _) = cell_position(&e, next_column, part)?;
                    next_column = column.saturating_add(1);
                }
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if in_value || in_inline_text {
                    if let Some(cell) = pending.as_mut() {
                        let text = text.unescape().map_err(|e| ScheduleError::xml(part, e))?;
                        cell.raw.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = convert_cell(&cell.kind, &cell.raw, shared_strings);
                        if !value.is_empty() {
                            rows.entry(current_row).or_default().push((cell.column, value));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScheduleError::xml(part, e)),
            _ => {}
        }
    }

    Ok(assemble_table(rows))
}

fn row_number(element: &BytesStart, previous: u32, part: &str) -> Result<u32> {
    match attribute(element, b"r", part)?.and_then(|r| r.trim().parse().ok()) {
        Some(number) => Ok(number),
        None => previous
            .checked_add(1)
            .ok_or_else(|| ScheduleError::xml(part, "row number out of range")),
    }
}

fn cell_position(element: &BytesStart, next_column: u32, part: &str) -> Result<(u32, String)> {
    let column = attribute(element, b"r", part)?
        .and_then(|reference| column_index(&reference))
        .unwrap_or(next_column);
    let kind = attribute(element, b"t", part)?.unwrap_or_else(|| "n".to_string());
    Ok((column, kind))
}

/// 0-based column of an A1 reference (`"C7"` -> 2).
pub fn column_index(reference: &str) -> Option<u32> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let column = letters.iter().fold(0u32, |acc, b| {
        acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1)
    });
    Some(column - 1)
}

fn convert_cell(kind: &str, raw: &str, shared_strings: &[String]) -> CellValue {
    match kind {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| shared_strings.get(index))
            .map(|s| CellValue::from_text(s))
            .unwrap_or(CellValue::Empty),
        "inlineStr" | "str" | "d" => CellValue::from_text(raw),
        "b" => match raw.trim() {
            "1" => CellValue::Bool(true),
            "0" => CellValue::Bool(false),
            _ => CellValue::Empty,
        },
        "e" => CellValue::Empty,
        _ => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                trimmed
                    .parse::<f64>()
                    .map(CellValue::Number)
                    .unwrap_or_else(|_| CellValue::from_text(raw))
            }
        }
    }
}

/// The first non-empty row becomes the header. The table ends at the last
/// header naming a schedule column; cells right of it and rows without any
/// value are skipped.
fn assemble_table(rows: BTreeMap<u32, Vec<(u32, CellValue)>>) -> RawTable {
    let mut rows = rows.into_values();

    let Some(header_cells) = rows.next() else {
        return RawTable::default();
    };

    let header_cells: Vec<(usize, String)> = header_cells
        .into_iter()
        .map(|(column, value)| (column as usize, value.as_text()))
        .collect();
    let width = header_cells
        .iter()
        .filter(|(_, text)| Column::ALL.iter().any(|c| c.matches(text)))
        .map(|(column, _)| column + 1)
        .max()
        .unwrap_or(0);
    let mut headers = vec![String::new(); width];
    for (column, text) in header_cells {
        if let Some(slot) = headers.get_mut(column) {
            *slot = text;
        }
    }

    let data = rows
        .map(|cells| {
            let mut row = vec![CellValue::Empty; width];
            for (column, value) in cells {
                if let Some(slot) = row.get_mut(column as usize) {
                    *slot = value;
                }
            }
            row
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    RawTable::new(headers, data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::cell_to_date;
    use chrono::NaiveDate;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal xlsx package from (sheet name, sheet xml) pairs.
    pub(crate) fn build_xlsx(sheets: &[(&str, &str)], shared_strings: Option<&str>) -> Vec<u8> {
        build_xlsx_with(sheets, shared_strings, "")
    }

    /// Same as [`build_xlsx`], with extra markup ahead of `<sheets>` in the workbook part.
    pub(crate) fn build_xlsx_with(
        sheets: &[(&str, &str)],
        shared_strings: Option<&str>,
        workbook_props: &str,
    ) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();

            let mut workbook = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            );
            workbook.push_str(workbook_props);
            workbook.push_str("<sheets>");
            let mut rels = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for (i, (name, _)) in sheets.iter().enumerate() {
                workbook.push_str(&format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    name,
                    i + 1,
                    i + 1
                ));
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                    i + 1,
                    i + 1
                ));
            }
            workbook.push_str("</sheets></workbook>");
            rels.push_str("</Relationships>");

            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(workbook.as_bytes()).unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(rels.as_bytes()).unwrap();
            if let Some(sst) = shared_strings {
                zip.start_file("xl/sharedStrings.xml", options).unwrap();
                zip.write_all(sst.as_bytes()).unwrap();
            }
            for (i, (_, xml)) in sheets.iter().enumerate() {
                zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                    .unwrap();
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    pub(crate) const SHARED_STRINGS: &str = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Projeto</t></si><si><t>Tarefa</t></si><si><t>Início</t></si><si><t>Fim</t></si><si><t>Entrega_mensurável</t></si><si><t>Dowsing</t></si><si><r><t>Coleta de </t></r><r><t>dados</t></r></si><si><t>Banco &amp; dados</t></si></sst>"#;

    /// Header row, one row with serial dates, one with text dates, one blank row.
    pub(crate) const SCHEDULE_SHEET: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c><c r="D1" t="s"><v>3</v></c><c r="E1" t="s"><v>4</v></c></row>
<row r="2"><c r="A2" t="s"><v>5</v></c><c r="B2" t="s"><v>6</v></c><c r="C2"><v>45717</v></c><c r="D2"><v>45808</v></c><c r="E2" t="s"><v>7</v></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t>GML</t></is></c><c r="B3" t="inlineStr"><is><t>Revisão</t></is></c><c r="C3" t="inlineStr"><is><t>01-02-2025</t></is></c><c r="D3" t="str"><f>TEXT(C3)</f><v>28-02-2025</v></c></row>
<row r="5"><c r="A5" s="1"/></row>
</sheetData></worksheet>"#;

    #[test]
    fn test_read_xlsx_sheet_names_in_order() {
        let bytes = build_xlsx(
            &[("Ana", SCHEDULE_SHEET), ("Bruno", SCHEDULE_SHEET)],
            Some(SHARED_STRINGS),
        );
        let sheets = read_xlsx(&bytes).unwrap();
        let names: Vec<_> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bruno"]);
    }

    #[test]
    fn test_read_xlsx_cells() {
        let bytes = build_xlsx(&[("Ana", SCHEDULE_SHEET)], Some(SHARED_STRINGS));
        let sheets = read_xlsx(&bytes).unwrap();
        let table = &sheets[0].table;

        assert_eq!(
            table.headers,
            vec!["Projeto", "Tarefa", "Início", "Fim", "Entrega_mensurável"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), &CellValue::Text("Dowsing".to_string()));
        assert_eq!(table.cell(0, 1), &CellValue::Text("Coleta de dados".to_string()));
        assert_eq!(table.cell(0, 2), &CellValue::Number(45717.0));
        assert_eq!(table.cell(0, 4), &CellValue::Text("Banco & dados".to_string()));
        assert_eq!(table.cell(1, 1), &CellValue::Text("Revisão".to_string()));
        // formula strings keep the cached value, not the formula
        assert_eq!(table.cell(1, 3), &CellValue::Text("28-02-2025".to_string()));
        assert!(table.cell(1, 4).is_empty());
        assert!(!table.date1904);
    }

    #[test]
    fn test_header_is_first_non_empty_row() {
        let sheet = r#"<worksheet><sheetData>
<row r="1"></row>
<row r="2"><c r="B2" t="inlineStr"><is><t>Projeto</t></is></c><c r="C2" t="inlineStr"><is><t>Tarefa</t></is></c></row>
<row r="3"><c r="B3" t="inlineStr"><is><t>X</t></is></c><c r="C3" t="inlineStr"><is><t>Y</t></is></c><c r="F3"><v>1</v></c></row>
</sheetData></worksheet>"#;
        let bytes = build_xlsx(&[("S", sheet)], None);
        let table = &read_xlsx(&bytes).unwrap()[0].table;
        assert_eq!(table.headers, vec!["", "Projeto", "Tarefa"]);
        assert_eq!(table.rows, vec![vec![
            CellValue::Empty,
            CellValue::Text("X".to_string()),
            CellValue::Text("Y".to_string()),
        ]]);
    }

    #[test]
    fn test_read_xlsx_date1904() {
        let bytes = build_xlsx_with(
            &[("Ana", SCHEDULE_SHEET)],
            Some(SHARED_STRINGS),
            r#"<workbookPr date1904="1"/>"#,
        );
        let table = &read_xlsx(&bytes).unwrap()[0].table;
        assert!(table.date1904);
        assert_eq!(
            cell_to_date(table.cell(0, 2), table.date1904),
            NaiveDate::from_ymd_opt(2029, 3, 2)
        );

        let bytes = build_xlsx(&[("Ana", SCHEDULE_SHEET)], Some(SHARED_STRINGS));
        let table = &read_xlsx(&bytes).unwrap()[0].table;
        assert_eq!(
            cell_to_date(table.cell(0, 2), table.date1904),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_width_ends_at_last_schedule_header() {
        let mut sheet = String::from(
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Projeto</t></is></c><c r="B1" t="inlineStr"><is><t>Tarefa</t></is></c><c r="XFD1" t="inlineStr"><is><t>Notas</t></is></c></row>"#,
        );
        for r in 2..202 {
            sheet.push_str(&format!(r#"<row r="{r}"><c r="A{r}"><v>{r}</v></c></row>"#));
        }
        sheet.push_str("</sheetData></worksheet>");

        let bytes = build_xlsx(&[("S", &sheet)], None);
        let table = &read_xlsx(&bytes).unwrap()[0].table;
        assert_eq!(table.headers, vec!["Projeto", "Tarefa"]);
        assert_eq!(table.len(), 200);
        assert!(table.rows.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_row_number_overflow_is_an_error() {
        let sheet = r#"<worksheet><sheetData>
<row r="4294967295"><c t="inlineStr"><is><t>Projeto</t></is></c></row>
<row><c t="inlineStr"><is><t>GML</t></is></c></row>
</sheetData></worksheet>"#;
        let bytes = build_xlsx(&[("S", sheet)], None);
        assert!(matches!(read_xlsx(&bytes), Err(ScheduleError::Xml { .. })));
    }

    #[test]
    fn test_oversized_part_is_refused() {
        let bytes = build_xlsx(&[("Ana", SCHEDULE_SHEET)], Some(SHARED_STRINGS));
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();

        let err = read_part_within(&mut archive, "xl/worksheets/sheet1.xml", 64).unwrap_err();
        assert!(matches!(err, ScheduleError::PartTooLarge { limit: 64, .. }));
        assert!(read_part_within(&mut archive, WORKBOOK_PART, MAX_PART_BYTES)
            .unwrap()
            .is_some());
        assert!(read_part_within(&mut archive, "xl/missing.xml", 64).unwrap().is_none());
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("E12"), Some(4));
        assert_eq!(column_index("AA3"), Some(26));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(read_xlsx(b"Projeto,Tarefa"), Err(ScheduleError::Zip(_))));
    }
}
