//! Akbank: statement emails and mobile app screen captures.
//!
//! Captured text is noisy. The masked card prefix `****` is often read as
//! `co0e`, and brand names come out as `aIxess` or `W/NGS`.
//! A capture reads like:
//!   Akbank ****1234 38.222,22TL Son gün: 26 Kasım 6.028,66TL Ekstreni öde

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::AKBANK;
use ekstre_core::locale::{fold_turkish, parse_dotted_date, parse_turkish_day_month, parse_turkish_number, turkish_lowercase};
use ekstre_core::{Obligation, RawMessage};

use super::capture;
use crate::mime::html_to_text;

const BRAND_MARKERS: &[&str] = &["akbank", "axess", "aixess", "aıxess", "wings", "w/ngs"];
const STATEMENT_MARKERS: &[&str] = &["son gün", "ekstre", "öde"];

pub fn can_parse_email(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("hizmet@bilgi.akbank.com")
        && fold_turkish(msg.subject()).contains("kredi karti ekstre bilgileri")
}

pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let Some(html) = msg.html_body.as_deref() else {
        return Ok(None);
    };
    let text = html_to_text(html);

    let Some(due) = capture(r"(?i)son ödeme tarihi (\d{2}\.\d{2}\.\d{4})", &text)?
        .as_deref()
        .and_then(parse_dotted_date)
    else {
        return Ok(None);
    };
    let amount = capture(r"(?i)dönem borcunuz ([\d.,]+) TL", &text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let last4 = capture(r"(?i)(\d{4})'le biten", &text)?;

    Ok(Some(Obligation::statement(AKBANK, due, amount, last4, msg)))
}

pub fn can_parse_screenshot(msg: &RawMessage) -> bool {
    let text = turkish_lowercase(msg.body());
    BRAND_MARKERS.iter().any(|m| text.contains(m))
        && STATEMENT_MARKERS.iter().any(|m| text.contains(m))
}

fn screenshot_card(text: &str) -> Result<Option<String>> {
    if let Some(last4) = capture(r"\*+(\d{4})", text)? {
        return Ok(Some(last4));
    }
    if let Some(last4) = capture(r"(?i)c[o0]+e\s+(\d{4})", text)? {
        return Ok(Some(last4));
    }
    // Some cards print only the last four digits on their own line.
    let line_re = Regex::new(r"(?m)^\s*(\d{4})\s*$")?;
    Ok(line_re.captures(text).map(|c| c[1].to_string()))
}

/// The capture has no year; it is taken from when the capture was made.
pub fn parse_screenshot(msg: &RawMessage) -> Result<Option<Obligation>> {
    let text = msg.body();
    let reference = msg.received_at.date_naive();

    let Some(due) = capture(r"(?i)son\s+gün\s*:\s*(\d{1,2}\s+[a-zçğıöşü]+)", text)?
        .as_deref()
        .and_then(|d| parse_turkish_day_month(d, reference))
    else {
        return Ok(None);
    };
    let amount = capture(r"(?i)son\s+gün\s*:\s*\d{1,2}\s+[a-zçğıöşü]+\s+([\d.,]+)\s*TL", text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let last4 = screenshot_card(text)?;

    Ok(Some(Obligation::statement(AKBANK, due, amount, last4, msg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use ekstre_core::{Channel, EntryType, Source};

    const AXESS: &str = "BIMcell D: ll3,51K/s
aIxess
PLATINUM
co0e 1234
Kredi kartı
Dönem içi harcama
8500,00 TL
Kullanilabilir limit: 4.500,00 TL
Toplam limit: 35.000,00 TL
Son ödeme tarihi:
Son gün: 26 Kasım
5.200,50 TL
Ana sayfa Transfer ve ödeme
%50 22:30
16.11.2025
26.11.2025
Ekstreni öde
Arama ve asistan";

    const WINGS: &str = "BIMcell D: . 5,37K/s $
W/NGS classic
BLACK
5678
Kredi kartı
Dönem içi harcama
O,00 TL
Kullanılabilir limit: 11.690,29 TL
Toplam limit: 40.000,00 TL
* Toplam mil puan:
Son gün: 8 Aralık
1.623,88 TL
Ekstre
321
Ekstreni öde";

    fn capture_at(text: &str, y: i32, m: u32, d: u32) -> RawMessage {
        RawMessage::screenshot(text, Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_axess_capture() {
        let msg = capture_at(AXESS, 2025, 11, 17);
        assert!(can_parse_screenshot(&msg));
        let o = parse_screenshot(&msg).unwrap().unwrap();
        assert_eq!(o.bank_name, "Akbank");
        assert_eq!(o.last4_digits.as_deref(), Some("1234"));
        assert_eq!(o.amount, Some(5200.50));
        assert_eq!(o.due_date, NaiveDate::from_ymd_opt(2025, 11, 26).unwrap());
        assert_eq!(o.source, Source::Screenshot);
        assert_eq!(o.entry_type, EntryType::Debt);
    }

    #[test]
    fn test_wings_capture() {
        let msg = capture_at(WINGS, 2025, 12, 1);
        assert!(can_parse_screenshot(&msg));
        let o = parse_screenshot(&msg).unwrap().unwrap();
        assert_eq!(o.last4_digits.as_deref(), Some("5678"));
        assert_eq!(o.amount, Some(1623.88));
        assert_eq!(o.due_date, NaiveDate::from_ymd_opt(2025, 12, 8).unwrap());
    }

    #[test]
    fn test_due_rolls_into_next_year() {
        let msg = capture_at("Akbank ****4321 Son gün: 5 Ocak 900,00TL Ekstreni öde", 2025, 12, 20);
        let o = parse_screenshot(&msg).unwrap().unwrap();
        assert_eq!(o.last4_digits.as_deref(), Some("4321"));
        assert_eq!(o.amount, Some(900.0));
        assert_eq!(o.due_date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn test_other_apps_are_ignored() {
        assert!(!can_parse_screenshot(&capture_at("Garanti BBVA Son gün: 8 Aralık", 2025, 12, 1)));
        assert!(!can_parse_screenshot(&capture_at("Akbank kampanya duyurusu", 2025, 12, 1)));
        let msg = capture_at("Akbank Ekstre hazır", 2025, 12, 1);
        assert_eq!(parse_screenshot(&msg).unwrap(), None);
    }

    #[test]
    fn test_statement_email() {
        let msg = RawMessage {
            id: "ak-1".into(),
            channel: Channel::Email,
            sender: "Akbank <hizmet@bilgi.akbank.com>".into(),
            subject: Some("Kredi Kartı Ekstre Bilgileri".into()),
            plain_body: None,
            html_body: Some(
                "<p>Sayın müşterimiz,</p><p>1234'le biten kartınızın <b>son ödeme tarihi 26.05.2025</b> olan ekstresinde dönem borcunuz 2.022,95 TL'dir.</p>"
                    .into(),
            ),
            received_at: Utc.with_ymd_and_hms(2025, 5, 16, 6, 0, 0).unwrap(),
            attachments: Vec::new(),
        };
        assert!(can_parse_email(&msg));
        let o = parse_email(&msg).unwrap().unwrap();
        assert_eq!(o.due_date, NaiveDate::from_ymd_opt(2025, 5, 26).unwrap());
        assert_eq!(o.amount, Some(2022.95));
        assert_eq!(o.last4_digits.as_deref(), Some("1234"));
    }
}
