//! Yapı Kredi: statement notification emails.
//!
//! The notice names the due date in words ("son ödeme tarihi 5 Haziran 2025
//! olan") and never the amount.

use anyhow::Result;
use regex::Regex;

use ekstre_core::banks::YAPI_KREDI;
use ekstre_core::locale::{fold_turkish, parse_turkish_date};
use ekstre_core::{Obligation, RawMessage};

use super::capture;

pub fn can_parse_email(msg: &RawMessage) -> bool {
    msg.sender.to_lowercase().contains("yapikredi.com.tr")
        && fold_turkish(msg.subject()).contains("hesap ozeti")
}

pub fn parse_email(msg: &RawMessage) -> Result<Option<Obligation>> {
    let content = msg.body();
    if content.is_empty() {
        return Ok(None);
    }

    let Some(due) = capture(r"(?i)son [oö]deme tarihi (\d{1,2}\s+\S+\s+\d{4})\s+olan", content)?
        .as_deref()
        .and_then(parse_turkish_date)
    else {
        return Ok(None);
    };

    // 123456******7890 numaralı
    let card_re = Regex::new(r"(?i)(\d{6})\*{6}(\d{4})\s+numaral[ıi]")?;
    let last4 = card_re.captures(content).map(|c| c[2].to_string());

    Ok(Some(Obligation::statement(YAPI_KREDI, due, None, last4, msg)))
}
