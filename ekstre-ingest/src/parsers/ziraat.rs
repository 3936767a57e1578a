//! Ziraat Bankası: e-ekstre emails.
//!
//! Values sit in `<center>` cells of a summary table; the amount is read
//! only from the debt row. The card appears masked as `4446-####-####-0811` or `4446 **** **** 0811`.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::ZIRAAT;
use ekstre_core::locale::{fold_turkish, parse_dmy_date, parse_turkish_number};
use ekstre_core::{Obligation, RawMessage};

use super::capture;

pub fn can_parse_email(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("ziraatbank.com.tr")
        && fold_turkish(msg.subject()).contains("e-ekstre")
}

/// The numeric cell of the row labelled as the statement debt. Other rows
/// (limits, minimum payment) are never read.
fn debt_amount(content: &str) -> Result<Option<f64>> {
    let row_end = Regex::new(r"(?i)</tr>")?;
    let label = Regex::new(r"(?i)<b>(?:D[öo]nem|Toplam)[&nbsp;\s]+Bor(?:cu|ç|c)</b>")?;
    for row in row_end.split(content).filter(|r| label.is_match(r)) {
        let cell = capture(r"(?is)<center>\s*(?:<b>)?\s*([\d.,]+)\s*(?:</b>)?\s*</center>", row)?;
        if let Some(amount) = cell.as_deref().and_then(parse_turkish_number) {
            return Ok(Some(amount));
        }
    }
    Ok(None)
}

pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let content = msg.body();
    if content.is_empty() {
        return Ok(None);
    }

    let Some(due) = capture(
        r"(?is)<b>Son[&nbsp;\s]+[ÖO]deme[&nbsp;\s]+Tarihi</b>.*?<center>(\d{2}/\d{2}/\d{4})</center>",
        content,
    )?
    .as_deref()
    .and_then(parse_dmy_date) else {
        return Ok(None);
    };

    let amount = debt_amount(content)?;

    let card_re = Regex::new(r"(?i)<p><b>(?:\d{4}-####-####-|\d{4} \*{4} \*{4} )(\d{4})</b>")?;
    let last4 = card_re.captures(content).map(|c| c[1].to_string());

    Ok(Some(Obligation::statement(ZIRAAT, due, amount, last4, msg)))
}
