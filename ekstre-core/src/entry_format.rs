//! "<Bank> - ****1234" descriptions used for bank-tagged manual entries.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::banks::is_known_bank_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankEntryDescription {
    pub bank_name: String,
    pub last4_digits: String,
}

pub fn format_bank_entry_description(bank_name: &str, last4_digits: Option<&str>) -> String {
    match last4_digits {
        Some(last4) => format!("{bank_name} - ****{last4}"),
        None => bank_name.to_string(),
    }
}

/// Inverse of [`format_bank_entry_description`]. The bank part must be a known bank.
pub fn parse_bank_entry_description(text: &str) -> Option<BankEntryDescription> {
    let re = Regex::new(r"^(?P<bank>.+?)\s*-\s*\*+(?P<last4>\d{4})$").ok()?;
    let caps = re.captures(text.trim())?;
    let bank_name = caps["bank"].trim();
    if !is_known_bank_name(bank_name) {
        return None;
    }
    Some(BankEntryDescription {
        bank_name: bank_name.to_string(),
        last4_digits: caps["last4"].to_string(),
    })
}
