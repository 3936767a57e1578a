//! Per-bank parsers and their registry.
//!
//! Each bank module exposes `can_parse_*` / `parse_*` pairs per channel.
//! `can_parse_*` is a cheap, conservative pre-filter on sender and keywords;
//! `parse_*` runs the regex cascade for every layout that bank is known to send.
//!
//! [`ParserKind`] is the closed set of (bank, channel) parsers. [`REGISTRY`]
//! fixes their order: within a channel the first `can_parse` that says yes
//! owns the message.

pub mod akbank;
pub mod garanti;
pub mod isbank;
pub mod kuveytturk;
pub mod qnb;
pub mod yapikredi;
pub mod ziraat;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};

use ekstre_core::banks;
use ekstre_core::locale::fold_turkish;
use ekstre_core::{Channel, LoanAgreement, Obligation, RawMessage};

/// What a parser produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Statement(Obligation),
    Loan(LoanAgreement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    QnbMessage,
    QnbLoanMessage,
    GarantiMessage,
    GarantiLoanMessage,
    KuveytTurkMessage,
    YapiKrediEmail,
    ZiraatEmail,
    GarantiEmail,
    KuveytTurkEmail,
    IsbankEmail,
    AkbankEmail,
    QnbEmail,
    AkbankScreenshot,
}

pub const REGISTRY: &[ParserKind] = &[
    ParserKind::QnbMessage,
    ParserKind::QnbLoanMessage,
    ParserKind::GarantiMessage,
    ParserKind::GarantiLoanMessage,
    ParserKind::KuveytTurkMessage,
    ParserKind::YapiKrediEmail,
    ParserKind::ZiraatEmail,
    ParserKind::GarantiEmail,
    ParserKind::KuveytTurkEmail,
    ParserKind::IsbankEmail,
    ParserKind::AkbankEmail,
    ParserKind::QnbEmail,
    ParserKind::AkbankScreenshot,
];

impl ParserKind {
    pub fn channel(&self) -> Channel {
        match self {
            ParserKind::QnbMessage
            | ParserKind::QnbLoanMessage
            | ParserKind::GarantiMessage
            | ParserKind::GarantiLoanMessage
            | ParserKind::KuveytTurkMessage => Channel::Message,
            ParserKind::AkbankScreenshot => Channel::Screenshot,
            _ => Channel::Email,
        }
    }

    pub fn bank_name(&self) -> &'static str {
        match self {
            ParserKind::QnbMessage | ParserKind::QnbLoanMessage | ParserKind::QnbEmail => banks::QNB,
            ParserKind::GarantiMessage | ParserKind::GarantiEmail => banks::GARANTI_BONUS,
            ParserKind::GarantiLoanMessage => banks::GARANTI_BBVA,
            ParserKind::KuveytTurkMessage | ParserKind::KuveytTurkEmail => banks::KUVEYT_TURK,
            ParserKind::YapiKrediEmail => banks::YAPI_KREDI,
            ParserKind::ZiraatEmail => banks::ZIRAAT,
            ParserKind::IsbankEmail => banks::IS_BANKASI,
            ParserKind::AkbankEmail | ParserKind::AkbankScreenshot => banks::AKBANK,
        }
    }

    pub fn is_loan(&self) -> bool {
        matches!(self, ParserKind::QnbLoanMessage | ParserKind::GarantiLoanMessage)
    }

    /// Cheap pre-filter. A message from another channel, or with an empty body
    /// and no attachment text, never matches.
    pub fn can_parse(&self, msg: &RawMessage) -> bool {
        if msg.channel != self.channel() {
            return false;
        }
        let has_text = msg.has_body() || msg.attachments.iter().any(|a| a.extracted_text.is_some());
        if !has_text {
            return false;
        }
        match self {
            ParserKind::QnbMessage => qnb::can_parse_message(msg),
            ParserKind::QnbLoanMessage => qnb::can_parse_loan_message(msg),
            ParserKind::GarantiMessage => garanti::can_parse_message(msg),
            ParserKind::GarantiLoanMessage => garanti::can_parse_loan_message(msg),
            ParserKind::KuveytTurkMessage => kuveytturk::can_parse_message(msg),
            ParserKind::YapiKrediEmail => yapikredi::can_parse_email(msg),
            ParserKind::ZiraatEmail => ziraat::can_parse_email(msg),
            ParserKind::GarantiEmail => garanti::can_parse_email(msg),
            ParserKind::KuveytTurkEmail => kuveytturk::can_parse_email(msg),
            ParserKind::IsbankEmail => isbank::can_parse_email(msg),
            ParserKind::AkbankEmail => akbank::can_parse_email(msg),
            ParserKind::QnbEmail => qnb::can_parse_email(msg),
            ParserKind::AkbankScreenshot => akbank::can_parse_screenshot(msg),
        }
    }

    fn try_parse(&self, msg: &RawMessage) -> Result<Option<Parsed>> {
        let statement = |o: Option<Obligation>| o.map(Parsed::Statement);
        let loan = |l: Option<LoanAgreement>| l.map(Parsed::Loan);
        Ok(match self {
            ParserKind::QnbMessage => statement(qnb::parse_message(msg)?),
            ParserKind::QnbLoanMessage => loan(qnb::parse_loan_message(msg)?),
            ParserKind::GarantiMessage => statement(garanti::parse_message(msg)?),
            ParserKind::GarantiLoanMessage => loan(garanti::parse_loan_message(msg)?),
            ParserKind::KuveytTurkMessage => statement(kuveytturk::parse_message(msg)?),
            ParserKind::YapiKrediEmail => statement(yapikredi::parse_email(msg)?),
            ParserKind::ZiraatEmail => statement(ziraat::parse_email(msg)?),
            ParserKind::GarantiEmail => statement(garanti::parse_email(msg)?),
            ParserKind::KuveytTurkEmail => statement(kuveytturk::parse_email(msg)?),
            ParserKind::IsbankEmail => statement(isbank::parse_email(msg)?),
            ParserKind::AkbankEmail => statement(akbank::parse_email(msg)?),
            ParserKind::QnbEmail => statement(qnb::parse_email(msg)?),
            ParserKind::AkbankScreenshot => statement(akbank::parse_screenshot(msg)?),
        })
    }

    /// Parse, converting any internal error into `None`.
    pub fn parse(&self, msg: &RawMessage) -> Option<Parsed> {
        match self.try_parse(msg) {
            Ok(Some(p)) => Some(p),
            Ok(None) => {
                debug!(parser = ?self, id = %msg.id, "message matched but yielded nothing");
                None
            }
            Err(e) => {
                warn!(parser = ?self, id = %msg.id, error = %e, "parser failed");
                None
            }
        }
    }
}

/// Registry parsers for one channel, in registration order.
pub fn parsers_for(channel: Channel) -> impl Iterator<Item = ParserKind> {
    REGISTRY.iter().copied().filter(move |p| p.channel() == channel)
}

/// Run `candidates` in order; the first whose `can_parse` accepts decides.
pub fn first_match(
    candidates: impl IntoIterator<Item = ParserKind>,
    msg: &RawMessage,
) -> Option<Parsed> {
    candidates
        .into_iter()
        .find(|p| p.can_parse(msg))
        .and_then(|p| p.parse(msg))
}

/// Run the whole registry against one message.
pub fn parse_message(msg: &RawMessage) -> Option<Parsed> {
    first_match(parsers_for(msg.channel), msg)
}

/// First capture group of `pattern` in `text`.
pub(crate) fn capture(pattern: &str, text: &str) -> Result<Option<String>> {
    let re = Regex::new(pattern)?;
    Ok(re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string()))
}

/// Case- and diacritic-insensitive "contains every needle".
pub(crate) fn contains_all(haystack: &str, needles: &[&str]) -> bool {
    let folded = fold_turkish(haystack);
    needles.iter().all(|n| folded.contains(&fold_turkish(n)))
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let folded = fold_turkish(haystack);
    needles.iter().any(|n| folded.contains(&fold_turkish(n)))
}
