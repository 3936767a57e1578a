//! Kuveyt Türk: statement-cut messages and statement emails.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::KUVEYT_TURK;
use ekstre_core::locale::{fold_turkish, parse_dotted_date, parse_standard_number, parse_turkish_number};
use ekstre_core::{Obligation, RawMessage};

use super::{capture, contains_all};

pub fn can_parse_message(msg: &RawMessage) -> bool {
    fold_turkish(&msg.sender).contains("kuveyt turk")
        && contains_all(msg.body(), &["ile biten kartinizin ekstresi kesildi", "son odeme tarihi:"])
}

pub fn parse_message(msg: &RawMessage) -> Result<Option<Obligation>> {
    let text = msg.body();
    let Some(due) = capture(r"(?i)Son Odeme Tarihi: (\d{2}\.\d{2}\.\d{4})", text)?
        .as_deref()
        .and_then(parse_dotted_date)
    else {
        return Ok(None);
    };
    let amount = capture(r"(?i)Toplam Borc: ([\d.,]+) TL", text)?
        .as_deref()
        .and_then(parse_turkish_number);
    let last4 = capture(r"(?i)(\d{4}) ile biten kartinizin", text)?;

    Ok(Some(Obligation::statement(KUVEYT_TURK, due, amount, last4, msg)))
}

pub fn can_parse_email(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("bilgilendirme@kuveytturk.com.tr")
        && fold_turkish(msg.subject()).contains("kuveyt turk kredi karti hesap ekstreniz")
}

/// Label and value sit in adjacent `<td><span>` cells. Amounts use the
/// standard notation.
pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let Some(html) = msg.html_body.as_deref() else {
        return Ok(None);
    };

    let Some(due) = capture(
        r"(?is)Son Ödeme Tarihi\s*</span>\s*</td>\s*<td[^>]*>\s*<span[^>]*>\s*([\d.]{10})\s*</span>",
        html,
    )?
    .as_deref()
    .and_then(parse_dotted_date) else {
        return Ok(None);
    };

    let amount = capture(
        r"(?is)Ekstre Dönem Tutarı\s*</span>\s*</td>\s*<td[^>]*>\s*<span[^>]*>\s*([\d.,]+)\s*TL\s*</span>",
        html,
    )?
    .as_deref()
    .and_then(parse_standard_number);

    // 000000******0000 nolu
    let card_re = Regex::new(r"(?i)(\d{6})\*{6}(\d{4})\s+nolu")?;
    let last4 = card_re.captures(html).map(|c| c[2].to_string());

    Ok(Some(Obligation::statement(KUVEYT_TURK, due, amount, last4, msg)))
}
