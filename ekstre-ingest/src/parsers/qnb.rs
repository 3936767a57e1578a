//! QNB: statement and loan text messages, statement emails.
//!
//! Statement message (also sent verbatim as a plain email):
//!   Bilgi: 9876 ile biten kartinizin borcu 1,800.50 TL, asgari borcu 700.00 TL,
//!   son odeme tarihi 25/05/2026. Ekstre detayiniz icin: http://... B002
//!
//! Loan message:
//!   Sayin musterimiz, 60.000,00 TL tutarinda 12 ay vadeli krediniz 12345678 nolu
//!   hesabiniza aktarilmistir. Taksit tutari: 5.616,35 TL, ilk taksit tarihi: 15/07/2025. B002
//!
//! Statement email: HTML table with "Son Ödeme Tarihi" and "Dönem Borcu" cells.
//! The amount cell uses either notation.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::QNB;
use ekstre_core::locale::{parse_ambiguous_number, parse_dmy_date, parse_standard_number, parse_turkish_number};
use ekstre_core::{LoanAgreement, Obligation, RawMessage};

use super::{capture, contains_all};
use crate::mime::html_to_text;

fn is_qnb_sender(sender: &str) -> bool {
    sender.to_lowercase().contains("qnb")
}

pub fn can_parse_message(msg: &RawMessage) -> bool {
    is_qnb_sender(&msg.sender)
        && contains_all(msg.body(), &["ile biten kartinizin borcu", "son odeme tarihi"])
}

/// Fields of the plain statement wording, shared by messages and plain emails.
fn parse_statement_text(text: &str, msg: &RawMessage) -> Result<Option<Obligation>> {
    let Some(due) = capture(r"(?i)son odeme tarihi:?\s*(\d{2}/\d{2}/\d{4})", text)?
        .as_deref()
        .and_then(parse_dmy_date)
    else {
        return Ok(None);
    };
    let amount = capture(r"(?i)kartinizin borcu\s*([\d.,]+)\s*TL", text)?
        .as_deref()
        .and_then(parse_standard_number);
    let last4 = capture(r"(?i)(\d{4}) ile biten kartinizin", text)?;

    Ok(Some(Obligation::statement(QNB, due, amount, last4, msg)))
}

pub fn parse_message(msg: &RawMessage) -> Result<Option<Obligation>> {
    parse_statement_text(msg.body(), msg)
}

pub fn can_parse_loan_message(msg: &RawMessage) -> bool {
    is_qnb_sender(&msg.sender)
        && contains_all(msg.body(), &["tutarinda", "ay vadeli", "krediniz", "taksit"])
}

pub fn parse_loan_message(msg: &RawMessage) -> Result<Option<LoanAgreement>> {
    let text = msg.body();
    let Some(term) = capture(r"(?i)(\d+)\s*ay vadeli", text)?.and_then(|t| t.parse::<u32>().ok())
    else {
        return Ok(None);
    };

    let loan_amount = capture(r"(?i)([\d.,]+)\s*TL tutarinda", text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let installment_amount = capture(r"(?i)taksit tutari:?\s*([\d.,]+)\s*TL", text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let first_payment_date = capture(r"(?i)ilk taksit tarihi:?\s*(\d{2}/\d{2}/\d{4})", text)?
        .as_deref()
        .and_then(parse_dmy_date);
    let account_number = capture(r"(?i)(\d{6,})\s*(?:nolu|numarali) hesab", text)?;

    Ok(Some(LoanAgreement {
        bank_name: QNB.to_string(),
        loan_amount,
        installment_amount,
        term_months: Some(term),
        first_payment_date,
        account_number,
        original_message: msg.clone(),
    }))
}

pub fn can_parse_email(msg: &RawMessage) -> bool {
    let sender = msg.sender.to_lowercase();
    sender.contains("eekstre.qnb.com.tr") || is_qnb_sender(&sender)
}

fn parse_statement_html(html: &str, msg: &RawMessage) -> Result<Option<Obligation>> {
    let Some(due) = capture(r"(?s)Son Ödeme Tarihi.*?(\d{2}/\d{2}/\d{4})", html)?
        .as_deref()
        .and_then(parse_dmy_date)
    else {
        return Ok(None);
    };
    let amount = capture(r"(?s)Dönem Borcu.*?([\d.,]+)\s*TL", html)?
        .as_deref()
        .and_then(parse_ambiguous_number);

    // 5311 57** **** 7535
    let card_re = Regex::new(r"(\d{4})\s*\d{2}\*\*\s*\*\*\*\*\s*(\d{4})")?;
    let last4 = card_re.captures(html).map(|c| c[2].to_string());

    Ok(Some(Obligation::statement(QNB, due, amount, last4, msg)))
}

pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let content = msg.body();
    if content.is_empty() {
        return Ok(None);
    }
    if let Some(o) = parse_statement_html(content, msg)? {
        return Ok(Some(o));
    }
    parse_statement_text(&html_to_text(content), msg)
}
