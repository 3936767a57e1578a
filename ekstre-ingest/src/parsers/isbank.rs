//! İş Bankası: statement emails whose figures live in a PDF attachment.
//!
//! The decoder does not read PDFs; an attachment's text arrives already
//! extracted. Without it the mail body is tried instead.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::IS_BANKASI;
use ekstre_core::locale::{parse_dotted_date, parse_turkish_number};
use ekstre_core::{Obligation, RawMessage};

use super::capture;

pub fn can_parse_email(msg: &RawMessage) -> bool {
    if !msg.sender.to_lowercase().contains("bilgilendirme@ileti.isbank.com.tr") {
        return false;
    }
    // "1234 **** **** 5678 - Temmuz 2025 Maximum Kredi Kartı Hesap Özeti"
    Regex::new(r"(?i)^(.*?)\d{4}\s\*{4}\s\*{4}\s\d{4}\s-\s.*?\d{4}\s(.*?)Kredi\sKartı\sHesap\sÖzeti$")
        .map(|re| re.is_match(msg.subject().trim()))
        .unwrap_or(false)
}

fn statement_text(msg: &RawMessage) -> String {
    let from_pdf: Vec<&str> = msg
        .attachments
        .iter()
        .filter(|a| a.filename.to_lowercase().ends_with(".pdf"))
        .filter_map(|a| a.extracted_text.as_deref())
        .collect();
    if from_pdf.is_empty() {
        msg.body().to_string()
    } else {
        from_pdf.join("\n")
    }
}

/// Date and amount are both required.
pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let text = statement_text(msg);

    let due = capture(r"(?i)Son Ödeme Tarihi\s*:\s*(\d{2}\.\d{2}\.\d{4})", &text)?
        .as_deref()
        .and_then(parse_dotted_date);
    let amount = capture(r"(?i)Hesap Özeti Borcu\s*:\s*([\d.,]+)\s*TL", &text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let (Some(due), Some(amount)) = (due, amount) else {
        return Ok(None);
    };

    let card_re = Regex::new(r"\b(\d{4})\s*\*{4}\s*\*{4}\s*(\d{4})\b")?;
    let last4 = card_re.captures(&text).map(|c| c[2].to_string());

    Ok(Some(Obligation::statement(IS_BANKASI, due, Some(amount), last4, msg)))
}
