//! Obligation model: raw channel messages in, dated payment items out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::locale::turkish_lowercase;

/// Raw input modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Message,
    Email,
    Screenshot,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Message => "message",
            Channel::Email => "email",
            Channel::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an obligation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Message,
    Email,
    Screenshot,
    Manual,
}

impl From<Channel> for Source {
    fn from(c: Channel) -> Self {
        match c {
            Channel::Message => Source::Message,
            Channel::Email => Source::Email,
            Channel::Screenshot => Source::Screenshot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debt,
    Expense,
}

/// Email attachment reference. `extracted_text` is filled by the caller's
/// document-text extractor; this crate never decodes documents itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// A message as delivered by a retrieval collaborator, already decoded to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub channel: Channel,
    pub sender: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub plain_body: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    /// Arrival time, as reported by the message itself.
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl RawMessage {
    pub fn text_message(
        id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            channel: Channel::Message,
            sender: sender.into(),
            subject: None,
            plain_body: Some(body.into()),
            html_body: None,
            received_at,
            attachments: Vec::new(),
        }
    }

    /// Recognized text of a screen capture. There is no sender.
    pub fn screenshot(text: impl Into<String>, taken_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("screenshot-{}", taken_at.timestamp_millis()),
            channel: Channel::Screenshot,
            sender: String::new(),
            subject: None,
            plain_body: Some(text.into()),
            html_body: None,
            received_at: taken_at,
            attachments: Vec::new(),
        }
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    /// Best available body: HTML if present, else plain text, else empty.
    pub fn body(&self) -> &str {
        self.html_body
            .as_deref()
            .or(self.plain_body.as_deref())
            .unwrap_or("")
    }

    pub fn has_body(&self) -> bool {
        !self.body().trim().is_empty()
    }
}

/// A normalized, dated payment item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    /// Canonical bank name, installment label, or the description of a manual entry.
    pub bank_name: String,
    pub due_date: NaiveDate,
    pub amount: Option<f64>,
    #[serde(default)]
    pub last4_digits: Option<String>,
    pub source: Source,
    pub entry_type: EntryType,
    #[serde(default)]
    pub original_message: Option<RawMessage>,
    #[serde(default)]
    pub is_paid: bool,
    /// Amount typed in by the user for statements that did not state one.
    #[serde(default)]
    pub user_amount: Option<f64>,
}

impl Obligation {
    /// A statement extracted from `message`.
    pub fn statement(
        bank_name: &str,
        due_date: NaiveDate,
        amount: Option<f64>,
        last4_digits: Option<String>,
        message: &RawMessage,
    ) -> Self {
        Self {
            id: format!("{}-{}", message.channel, message.id),
            bank_name: bank_name.to_string(),
            due_date,
            amount,
            last4_digits,
            source: message.channel.into(),
            entry_type: EntryType::Debt,
            original_message: Some(message.clone()),
            is_paid: false,
            user_amount: None,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source == Source::Manual
    }

    /// `user_amount` wins over the extracted amount.
    pub fn effective_amount(&self) -> Option<f64> {
        self.user_amount.or(self.amount)
    }

    pub fn stable_key(&self) -> StableKey {
        StableKey::of(self)
    }

    /// Arrival time of the message this obligation was extracted from.
    pub fn arrived_at(&self) -> Option<DateTime<Utc>> {
        self.original_message.as_ref().map(|m| m.received_at)
    }
}

/// One-time loan issuance notice; expanded into installments and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAgreement {
    pub bank_name: String,
    pub loan_amount: Option<f64>,
    pub installment_amount: Option<f64>,
    pub term_months: Option<u32>,
    pub first_payment_date: Option<NaiveDate>,
    pub account_number: Option<String>,
    pub original_message: RawMessage,
}

/// Content fingerprint: `bank:last4:amount:YYYY-MM-DD`, lowercased.
///
/// Both sides of a merge must build it through [`StableKey::of`] so the amount
/// rounding and date truncation agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableKey(String);

impl StableKey {
    pub fn of(o: &Obligation) -> Self {
        let last4 = o.last4_digits.as_deref().unwrap_or("none");
        let amount = match o.amount {
            Some(a) => format!("{a:.2}"),
            None => "none".to_string(),
        };
        let key = format!(
            "{}:{}:{}:{}",
            o.bank_name,
            last4,
            amount,
            o.due_date.format("%Y-%m-%d")
        );
        StableKey(turkish_lowercase(&key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sms() -> RawMessage {
        RawMessage::text_message(
            "42",
            "QNB",
            "body",
            Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_stable_key_format() {
        let due = NaiveDate::from_ymd_opt(2026, 5, 25).unwrap();
        let o = Obligation::statement("QNB", due, Some(1800.5), Some("9876".into()), &sms());
        assert_eq!(o.stable_key().as_str(), "qnb:9876:1800.50:2026-05-25");

        let o = Obligation::statement("Yapı Kredi", due, None, None, &sms());
        assert_eq!(o.stable_key().as_str(), "yapı kredi:none:none:2026-05-25");
    }

    #[test]
    fn test_stable_key_ignores_id_and_flags() {
        let due = NaiveDate::from_ymd_opt(2026, 5, 25).unwrap();
        let a = Obligation::statement("QNB", due, Some(10.0), None, &sms());
        let mut b = a.clone();
        b.id = "other".into();
        b.is_paid = true;
        b.user_amount = Some(3.0);
        assert_eq!(a.stable_key(), b.stable_key());
    }

    #[test]
    fn test_serde_enums_are_lowercase() {
        let due = NaiveDate::from_ymd_opt(2026, 5, 25).unwrap();
        let o = Obligation::statement("QNB", due, Some(1.0), None, &sms());
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["source"], "message");
        assert_eq!(json["entry_type"], "debt");
        assert_eq!(json["due_date"], "2026-05-25");
    }
}
