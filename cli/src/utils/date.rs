use chrono::{Days, NaiveDate};

use crate::models::CellValue;

/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Parse a day-first date string.
///
/// Accepts `DD-MM-YYYY`, `DD/MM/YYYY` and `DD.MM.YYYY` (one or two digit day
/// and month, two digit years mean 20YY) as well as ISO `YYYY-MM-DD` and
/// `YYYY/MM/DD`. A trailing time part is ignored. Everything else, including
/// impossible calendar dates, yields `None`.
pub fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let date_part = text
        .split_whitespace()
        .next()?
        .split('T')
        .next()?;

    let parts: Vec<&str> = date_part.split(['-', '/', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    if day.len() > 2 || month.len() > 2 {
        return None;
    }

    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Convert an Excel serial date to a calendar date. The time of day is dropped.
///
/// The 1900 system carries the Lotus bug: serial 60 is the nonexistent
/// 1900-02-29, which maps to 1900-02-28 here.
pub fn excel_serial_to_date(serial: f64, date1904: bool) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let days = serial.trunc() as u64;

    if date1904 {
        return NaiveDate::from_ymd_opt(1904, 1, 1)?.checked_add_days(Days::new(days));
    }

    match days {
        0 => None,
        1..=59 => NaiveDate::from_ymd_opt(1899, 12, 31)?.checked_add_days(Days::new(days)),
        60 => NaiveDate::from_ymd_opt(1900, 2, 28),
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days)),
    }
}

/// Interpret a spreadsheet cell as a date: text is parsed day-first, numbers
/// are Excel serials.
pub fn cell_to_date(cell: &CellValue, date1904: bool) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(text) => parse_day_first(text),
        CellValue::Number(serial) => excel_serial_to_date(*serial, date1904),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Format a date as `DD-MM-YYYY`
pub fn format_day_first(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// The day after `date`, saturating at the last representable date.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// Format duration for logging
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.1}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0).floor();
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_day_first_formats() {
        assert_eq!(parse_day_first("01-03-2025"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_day_first("1/3/2025"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_day_first("31.05.2025"), Some(ymd(2025, 5, 31)));
        assert_eq!(parse_day_first("15-03-25"), Some(ymd(2025, 3, 15)));
        assert_eq!(parse_day_first("2025-03-01"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_day_first("2025-03-01 00:00:00"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_day_first("2025-03-01T08:30:00"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_day_first(" 28-02-2025 "), Some(ymd(2025, 2, 28)));
    }

    #[test]
    fn test_parse_day_first_rejects_garbage() {
        assert_eq!(parse_day_first(""), None);
        assert_eq!(parse_day_first("amanhã"), None);
        assert_eq!(parse_day_first("31-02-2025"), None);
        assert_eq!(parse_day_first("13-13-2025"), None);
        assert_eq!(parse_day_first("01-03"), None);
        assert_eq!(parse_day_first("001-03-2025"), None);
        assert_eq!(parse_day_first("01-03-202"), None);
    }

    #[test]
    fn test_excel_serial_1900_system() {
        assert_eq!(excel_serial_to_date(1.0, false), Some(ymd(1900, 1, 1)));
        assert_eq!(excel_serial_to_date(59.0, false), Some(ymd(1900, 2, 28)));
        assert_eq!(excel_serial_to_date(61.0, false), Some(ymd(1900, 3, 1)));
        assert_eq!(excel_serial_to_date(45717.0, false), Some(ymd(2025, 3, 1)));
        // time of day is dropped
        assert_eq!(excel_serial_to_date(45717.75, false), Some(ymd(2025, 3, 1)));
        assert_eq!(excel_serial_to_date(0.0, false), None);
        assert_eq!(excel_serial_to_date(-3.0, false), None);
        assert_eq!(excel_serial_to_date(f64::NAN, false), None);
    }

    #[test]
    fn test_excel_serial_1904_system() {
        assert_eq!(excel_serial_to_date(0.0, true), Some(ymd(1904, 1, 1)));
        assert_eq!(excel_serial_to_date(44255.0, true), Some(ymd(2025, 3, 1)));
    }

    #[test]
    fn test_cell_to_date() {
        let text = CellValue::Text("01-03-2025".to_string());
        assert_eq!(cell_to_date(&text, false), Some(ymd(2025, 3, 1)));
        assert_eq!(cell_to_date(&CellValue::Number(45717.0), false), Some(ymd(2025, 3, 1)));
        assert_eq!(cell_to_date(&CellValue::Empty, false), None);
        assert_eq!(cell_to_date(&CellValue::Bool(true), false), None);
    }

    #[test]
    fn test_format_day_first() {
        assert_eq!(format_day_first(ymd(2025, 3, 1)), "01-03-2025");
        assert_eq!(next_day(ymd(2025, 2, 28)), ymd(2025, 3, 1));
    }
}
