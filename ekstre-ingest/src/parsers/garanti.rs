//! Garanti BBVA: Bonus card deferral messages, consumer loan messages and
//! Bonus statement emails.
//!
//! The Bonus message offers to defer the statement until a cut-off date. The
//! real due date is the day after that cut-off.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::{GARANTI_BBVA, GARANTI_BONUS};
use ekstre_core::locale::{fold_turkish, parse_dotted_date, parse_standard_number, parse_turkish_integer, parse_turkish_number};
use ekstre_core::{LoanAgreement, Obligation, RawMessage};

use super::{capture, contains_all};

pub fn can_parse_message(msg: &RawMessage) -> bool {
    fold_turkish(msg.sender.trim()) == "bonus"
        && contains_all(
            msg.body(),
            &[
                "ekstresinin minimum tutarini",
                "kalan kismini aylik",
                "ertelemek icin",
                "tarihine kadar atlat",
            ],
        )
}

pub fn parse_message(msg: &RawMessage) -> Result<Option<Obligation>> {
    let text = msg.body();
    let Some(due) = capture(r"(?i)(\d{2}\.\d{2}\.\d{4}) tarihine kadar", text)?
        .as_deref()
        .and_then(parse_dotted_date)
        .and_then(|d| d.succ_opt())
    else {
        return Ok(None);
    };
    let amount = capture(r"(?i)([\d.,]+) TL ekstresinin", text)?
        .as_deref()
        .and_then(parse_standard_number);
    let last4 = capture(r"(?i)(\d{4}) ile biten", text)?;

    Ok(Some(Obligation::statement(GARANTI_BONUS, due, amount, last4, msg)))
}

pub fn can_parse_loan_message(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("garantibbva")
        && contains_all(
            msg.body(),
            &["tutarinda", "ay vadeli", "ihtiyac krediniz", "kullaniminiza acilmistir"],
        )
}

/// The approval message carries only principal and term.
pub fn parse_loan_message(msg: &RawMessage) -> Result<Option<LoanAgreement>> {
    let text = msg.body();
    let loan_amount = capture(r"(?i)([\d.]+) TL tutarinda", text)?
        .as_deref()
        .and_then(parse_turkish_integer);
    let term = capture(r"(?i)(\d+) ay vadeli", text)?.and_then(|t| t.parse::<u32>().ok());

    let (Some(loan_amount), Some(term)) = (loan_amount, term) else {
        return Ok(None);
    };

    Ok(Some(LoanAgreement {
        bank_name: GARANTI_BBVA.to_string(),
        loan_amount: Some(loan_amount as f64),
        installment_amount: None,
        term_months: Some(term),
        first_payment_date: None,
        account_number: None,
        original_message: msg.clone(),
    }))
}

pub fn can_parse_email(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("garantibbva@garantibbva.com.tr")
        && fold_turkish(msg.subject()).contains("bonus ekstresi")
}

pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let Some(html) = msg.html_body.as_deref() else {
        return Ok(None);
    };

    // <strong>Son Ödeme Tarihi:</strong><br>02.06.2025, or a label cell
    // followed by a value cell.
    let due = match capture(r"(?i)Son Ödeme Tarihi:</strong><br>(\d{2}\.\d{2}\.\d{4})", html)? {
        Some(d) => Some(d),
        None => capture(
            r"(?is)Son Ödeme Tarihi:?\s*</td>\s*<td[^>]*>\s*(\d{2}\.\d{2}\.\d{4})",
            html,
        )?,
    };
    let Some(due) = due.as_deref().and_then(parse_dotted_date) else {
        return Ok(None);
    };

    let amount = match capture(r"(?i)Toplam Borç Tutarı:</strong><br>[+]?([\d.,]+) TL", html)? {
        Some(a) => Some(a),
        None => capture(
            r"(?is)Toplam Borç Tutarı:?\s*</td>\s*<td[^>]*>\s*[+]?([\d.,]+)\s*TL",
            html,
        )?,
    }
    .as_deref()
    .and_then(parse_turkish_number);

    // 5549 60** **** 3700
    let card_re = Regex::new(r"(\d{4})\s*\d{2}\*\*\s*\*\*\*\*\s*(\d{4})")?;
    let last4 = card_re.captures(html).map(|c| c[2].to_string());

    Ok(Some(Obligation::statement(GARANTI_BONUS, due, amount, last4, msg)))
}
