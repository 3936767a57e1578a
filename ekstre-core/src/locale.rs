//! Locale normalization: bank-formatted amounts and dates.
//!
//! Turkish banks print amounts two ways:
//!   Turkish   1.234,56   (dot thousands, comma decimal)
//!   standard  1,234.56   (comma thousands, dot decimal)
//! and dates as `DD.MM.YYYY`, `DD/MM/YYYY`, `DD <Ay> YYYY` or `DD <Ay>`.
//!
//! Every function here is total: unparseable input yields `None`.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

/// Default zone for anchoring due dates.
pub const DEFAULT_TIMEZONE: &str = "Europe/Istanbul";

const MONTHS: [(&str, u32); 12] = [
    ("ocak", 1),
    ("subat", 2),
    ("mart", 3),
    ("nisan", 4),
    ("mayis", 5),
    ("haziran", 6),
    ("temmuz", 7),
    ("agustos", 8),
    ("eylul", 9),
    ("ekim", 10),
    ("kasim", 11),
    ("aralik", 12),
];

fn finite(v: f64) -> Option<f64> {
    if v.is_finite() { Some(v) } else { None }
}

/// "1,234.56" -> 1234.56
pub fn parse_standard_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().and_then(finite)
}

/// "1.234,56" -> 1234.56
pub fn parse_turkish_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().and_then(finite)
}

/// For fields where the same bank mixes both notations.
///
/// With both separators present the later one is the decimal point. A lone
/// comma means Turkish. A single dot followed by exactly two digits is a
/// decimal point; any other dot is a thousands separator.
pub fn parse_ambiguous_number(text: &str) -> Option<f64> {
    let s = text.trim();
    match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => parse_standard_number(s),
        (Some(_), _) => parse_turkish_number(s),
        (None, Some(dot)) => {
            let single = s.find('.') == Some(dot);
            if single && s.len() - dot - 1 == 2 {
                parse_standard_number(s)
            } else {
                parse_turkish_number(s)
            }
        }
        (None, None) => s.parse::<f64>().ok().and_then(finite),
    }
}

/// "15.000" -> 15000. A decimal comma is rejected.
pub fn parse_turkish_integer(text: &str) -> Option<i64> {
    let s = text.trim();
    if s.is_empty() || s.contains(',') {
        return None;
    }
    s.replace('.', "").parse::<i64>().ok()
}

fn ymd(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let d: u32 = day.parse().ok()?;
    let m: u32 = month.parse().ok()?;
    let y: i32 = year.parse().ok()?;
    if !(1..=31).contains(&d) || !(1..=12).contains(&m) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(y, m, d)?;
    // Reject anything that did not survive construction unchanged.
    if date.day() != d || date.month() != m || date.year() != y {
        return None;
    }
    Some(date)
}

fn parse_separated(text: &str, sep: char) -> Option<NaiveDate> {
    let sep = regex::escape(&sep.to_string());
    let pattern = format!(r"^(\d{{2}}){sep}(\d{{2}}){sep}(\d{{4}})$");
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text.trim())?;
    ymd(&caps[1], &caps[2], &caps[3])
}

/// `DD.MM.YYYY`
pub fn parse_dotted_date(text: &str) -> Option<NaiveDate> {
    parse_separated(text, '.')
}

/// `DD/MM/YYYY`
pub fn parse_dmy_date(text: &str) -> Option<NaiveDate> {
    parse_separated(text, '/')
}

/// Lowercase with the dotted capital I mapped to a plain `i`.
pub fn turkish_lowercase(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'İ' => 'i',
            c => c,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Lowercase and strip Turkish diacritics (`Şubat` -> `subat`, `KASIM` -> `kasim`).
pub fn fold_turkish(text: &str) -> String {
    turkish_lowercase(text)
        .chars()
        .map(|c| match c {
            'ç' => 'c',
            'ğ' => 'g',
            'ı' => 'i',
            'ö' => 'o',
            'ş' => 's',
            'ü' => 'u',
            c => c,
        })
        .collect()
}

/// Month number for a Turkish month name, with or without diacritics.
pub fn turkish_month(name: &str) -> Option<u32> {
    let folded = fold_turkish(name.trim());
    MONTHS
        .iter()
        .find(|(m, _)| *m == folded)
        .map(|(_, n)| *n)
}

/// `DD <Ay> YYYY`, e.g. "5 Haziran 2025".
pub fn parse_turkish_date(text: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"^(\d{1,2})\s+(\S+)\s+(\d{4})$").ok()?;
    let caps = re.captures(text.trim())?;
    let month = turkish_month(&caps[2])?;
    ymd(&caps[1], &month.to_string(), &caps[3])
}

/// `DD <Ay>` with no year, as shown by banking apps.
///
/// The year comes from `reference`. A result more than six months before the
/// reference is taken to mean next year.
pub fn parse_turkish_day_month(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let re = Regex::new(r"^(\d{1,2})\s+(\S+)$").ok()?;
    let caps = re.captures(text.trim())?;
    let month = turkish_month(&caps[2])?;
    let date = ymd(&caps[1], &month.to_string(), &reference.year().to_string())?;
    let cutoff = reference.checked_sub_months(Months::new(6))?;
    if date < cutoff {
        return ymd(&caps[1], &month.to_string(), &(reference.year() + 1).to_string());
    }
    Some(date)
}

/// Calendar month arithmetic, clamped to the end of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// The instant a due date refers to: 12:00 local time in `tz`.
pub fn due_instant(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?;
    let local = tz.from_local_datetime(&noon).single()?;
    Some(local.with_timezone(&Utc))
}

/// Parse an IANA zone name like "Europe/Istanbul".
pub fn parse_timezone(name: &str) -> anyhow::Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_turkish_and_standard_numbers() {
        assert_eq!(parse_turkish_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_standard_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_turkish_number("5.200,50"), Some(5200.50));
        assert_eq!(parse_standard_number("1,800.50"), Some(1800.50));
        assert_eq!(parse_turkish_number("750"), Some(750.0));
    }

    #[test]
    fn test_numbers_reject_garbage() {
        assert_eq!(parse_turkish_number(""), None);
        assert_eq!(parse_standard_number("abc"), None);
        assert_eq!(parse_standard_number("inf"), None);
        assert_eq!(parse_turkish_number("1,2,3"), None);
    }

    #[test]
    fn test_ambiguous_numbers() {
        assert_eq!(parse_ambiguous_number("2.345,67"), Some(2345.67));
        assert_eq!(parse_ambiguous_number("1,119.55"), Some(1119.55));
        assert_eq!(parse_ambiguous_number("12,50"), Some(12.5));
        assert_eq!(parse_ambiguous_number("2345.67"), Some(2345.67));
        assert_eq!(parse_ambiguous_number("12.345"), Some(12345.0));
        assert_eq!(parse_ambiguous_number("1.234.567"), Some(1234567.0));
        assert_eq!(parse_ambiguous_number("980"), Some(980.0));
    }

    #[test]
    fn test_turkish_integer() {
        assert_eq!(parse_turkish_integer("15.000"), Some(15000));
        assert_eq!(parse_turkish_integer("15.000,00"), None);
    }

    #[test]
    fn test_dotted_and_dmy_dates() {
        assert_eq!(parse_dotted_date("15.05.2025"), Some(d(2025, 5, 15)));
        assert_eq!(parse_dmy_date("25/05/2026"), Some(d(2026, 5, 25)));
        assert_eq!(parse_dotted_date("29.02.2024"), Some(d(2024, 2, 29)));
    }

    #[test]
    fn test_invalid_calendar_dates_are_rejected() {
        assert_eq!(parse_dotted_date("31.02.2025"), None);
        assert_eq!(parse_dotted_date("29.02.2025"), None);
        assert_eq!(parse_dmy_date("31/04/2025"), None);
        assert_eq!(parse_dmy_date("00/01/2025"), None);
        assert_eq!(parse_dotted_date("15/05/2025"), None);
        assert_eq!(parse_dmy_date("1/5/2025"), None);
    }

    #[test]
    fn test_turkish_date_names() {
        assert_eq!(parse_turkish_date("5 Haziran 2025"), Some(d(2025, 6, 5)));
        assert_eq!(parse_turkish_date("12 Şubat 2026"), Some(d(2026, 2, 12)));
        assert_eq!(parse_turkish_date("12 subat 2026"), Some(d(2026, 2, 12)));
        assert_eq!(parse_turkish_date("01 EKİM 2025"), Some(d(2025, 10, 1)));
        assert_eq!(parse_turkish_date("30 Şubat 2026"), None);
        assert_eq!(parse_turkish_date("5 Juni 2025"), None);
    }

    #[test]
    fn test_day_month_rolls_into_next_year() {
        let reference = d(2025, 12, 20);
        assert_eq!(parse_turkish_day_month("8 Aralık", reference), Some(d(2025, 12, 8)));
        assert_eq!(parse_turkish_day_month("8 Ocak", reference), Some(d(2026, 1, 8)));
        assert_eq!(parse_turkish_day_month("26 Kasım", d(2025, 11, 10)), Some(d(2025, 11, 26)));
    }

    #[test]
    fn test_add_months_clamps() {
        assert_eq!(add_months(d(2025, 1, 31), 1), Some(d(2025, 2, 28)));
        assert_eq!(add_months(d(2025, 11, 15), 3), Some(d(2026, 2, 15)));
    }

    #[test]
    fn test_due_instant_is_local_noon() {
        let tz = parse_timezone(DEFAULT_TIMEZONE).unwrap();
        let at = due_instant(d(2026, 5, 25), tz).unwrap();
        // Istanbul is UTC+3 year-round
        assert_eq!(at.to_rfc3339(), "2026-05-25T09:00:00+00:00");
    }
}
