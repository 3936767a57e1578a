//! Statement/loan processor: per-bank retrieval and parsing.
//!
//! Each bank lists the channels it notifies on, with the retrieval filter for
//! that channel and the parsers to try. Retrievals run concurrently; parsing
//! happens once every retrieval for the run has returned. A failed retrieval
//! costs that bank its candidates and nothing else.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use ekstre_core::banks;
use ekstre_core::locale::fold_turkish;
use ekstre_core::{Channel, LoanAgreement, Obligation, RawMessage};

use crate::parsers::{first_match, parse_message, parsers_for, Parsed, ParserKind};

pub const DEFAULT_RETRIEVAL_WINDOW_MONTHS: u32 = 2;
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// How to find candidate messages on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalFilter {
    /// Mailbox search expression, e.g. `from:(x@bank.com) subject:("Ekstre")`.
    Mailbox { query: String },
    /// Message inbox: any of `senders`, optionally containing `keyword`.
    Inbox {
        senders: Vec<String>,
        keyword: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub channel: Channel,
    pub filter: RetrievalFilter,
    /// Tried in order; the first whose pre-filter accepts owns the message.
    pub parsers: Vec<ParserKind>,
}

#[derive(Debug, Clone)]
pub struct BankConfig {
    pub bank_name: String,
    pub channels: Vec<ChannelConfig>,
}

fn mailbox(query: &str, parser: ParserKind) -> ChannelConfig {
    ChannelConfig {
        channel: Channel::Email,
        filter: RetrievalFilter::Mailbox {
            query: query.to_string(),
        },
        parsers: vec![parser],
    }
}

fn inbox(senders: &[&str], keyword: &str, parser: ParserKind) -> ChannelConfig {
    ChannelConfig {
        channel: Channel::Message,
        filter: RetrievalFilter::Inbox {
            senders: senders.iter().map(|s| s.to_string()).collect(),
            keyword: Some(keyword.to_string()),
        },
        parsers: vec![parser],
    }
}

/// The built-in bank table.
pub fn default_banks() -> Vec<BankConfig> {
    vec![
        BankConfig {
            bank_name: banks::QNB.to_string(),
            channels: vec![
                inbox(&["QNB"], "borcu", ParserKind::QnbMessage),
                inbox(&["QNB"], "krediniz", ParserKind::QnbLoanMessage),
                mailbox("from:(qnb.com.tr)", ParserKind::QnbEmail),
            ],
        },
        BankConfig {
            bank_name: banks::YAPI_KREDI.to_string(),
            channels: vec![mailbox(
                r#"from:(ekstre@ekstre.yapikredi.com.tr) subject:("Hesap Özeti")"#,
                ParserKind::YapiKrediEmail,
            )],
        },
        BankConfig {
            bank_name: banks::ZIRAAT.to_string(),
            channels: vec![mailbox(
                r#"from:(ziraat@ileti.ziraatbank.com.tr) subject:("e-ekstre")"#,
                ParserKind::ZiraatEmail,
            )],
        },
        BankConfig {
            bank_name: banks::GARANTI_BONUS.to_string(),
            channels: vec![
                inbox(&["GARANTIBBVA", "BONUS"], "ekstresinin", ParserKind::GarantiMessage),
                inbox(&["GARANTIBBVA"], "ihtiyac krediniz", ParserKind::GarantiLoanMessage),
                mailbox(
                    r#"from:(garantibbva@garantibbva.com.tr) subject:("Bonus Ekstresi")"#,
                    ParserKind::GarantiEmail,
                ),
            ],
        },
        BankConfig {
            bank_name: banks::KUVEYT_TURK.to_string(),
            channels: vec![
                inbox(&["KUVEYT TURK"], "ekstresi kesildi", ParserKind::KuveytTurkMessage),
                mailbox(
                    r#"from:(bilgilendirme@kuveytturk.com.tr) subject:("Kuveyt Türk Kredi Kartı Hesap Ekstreniz")"#,
                    ParserKind::KuveytTurkEmail,
                ),
            ],
        },
        BankConfig {
            bank_name: banks::IS_BANKASI.to_string(),
            channels: vec![mailbox(
                r#"from:(bilgilendirme@ileti.isbank.com.tr) subject:("Maximum Kredi Kartı Hesap Özeti")"#,
                ParserKind::IsbankEmail,
            )],
        },
        BankConfig {
            bank_name: banks::AKBANK.to_string(),
            channels: vec![mailbox(
                r#"from:(hizmet@bilgi.akbank.com) subject:("Kredi kartı ekstre bilgileri")"#,
                ParserKind::AkbankEmail,
            )],
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// How far back retrieval looks.
    pub retrieval_window_months: u32,
    pub max_results_per_query: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            retrieval_window_months: DEFAULT_RETRIEVAL_WINDOW_MONTHS,
            max_results_per_query: DEFAULT_MAX_RESULTS,
        }
    }
}

impl ProcessorConfig {
    /// First day inside the retrieval window.
    pub fn since(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        today
            .checked_sub_months(Months::new(self.retrieval_window_months))
            .unwrap_or(today)
    }
}

/// What a source is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub channel: Channel,
    pub filter: RetrievalFilter,
    pub since: NaiveDate,
    pub max_results: usize,
}

impl RetrievalQuery {
    /// Mailbox-style rendering with the window appended as `after:YYYY/MM/DD`.
    pub fn expression(&self) -> String {
        let after = format!("after:{}", self.since.format("%Y/%m/%d"));
        match &self.filter {
            RetrievalFilter::Mailbox { query } => format!("{query} {after}"),
            RetrievalFilter::Inbox { senders, keyword } => {
                let from = format!("from:({})", senders.join(" OR "));
                match keyword {
                    Some(k) => format!("{from} \"{k}\" {after}"),
                    None => format!("{from} {after}"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    pub channel: Channel,
}

/// Retrieval collaborator. Implementations own all I/O.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<MessageRef>>;
    async fn fetch_body(&self, message: &MessageRef) -> Result<RawMessage>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalFailure {
    pub bank_name: String,
    pub channel: Channel,
    pub error: String,
}

/// Everything one run extracted, before reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionBatch {
    pub statements: Vec<Obligation>,
    pub loans: Vec<LoanAgreement>,
    pub failures: Vec<RetrievalFailure>,
}

async fn retrieve(
    source: &dyn MessageSource,
    bank: &BankConfig,
    channel: &ChannelConfig,
    query: RetrievalQuery,
) -> (String, Channel, Result<Vec<Parsed>>) {
    let outcome = async {
        let refs = source.search(&query).await?;
        debug!(
            bank = %bank.bank_name,
            channel = %channel.channel,
            query = %query.expression(),
            found = refs.len(),
            "searched"
        );

        let mut parsed = Vec::new();
        for r in refs.iter().take(query.max_results) {
            let msg = match source.fetch_body(r).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(bank = %bank.bank_name, id = %r.id, error = %e, "fetch failed, skipping message");
                    continue;
                }
            };
            if let Some(p) = first_match(channel.parsers.iter().copied(), &msg) {
                parsed.push(p);
            }
        }
        Ok::<_, anyhow::Error>(parsed)
    }
    .await;
    (bank.bank_name.clone(), channel.channel, outcome)
}

/// Only the most recently announced loan per bank survives.
fn newest_loan_per_bank(loans: Vec<LoanAgreement>) -> Vec<LoanAgreement> {
    let mut order: Vec<String> = Vec::new();
    let mut newest: HashMap<String, LoanAgreement> = HashMap::new();
    for loan in loans {
        let replace = match newest.get(&loan.bank_name) {
            Some(kept) => kept.original_message.received_at < loan.original_message.received_at,
            None => {
                order.push(loan.bank_name.clone());
                true
            }
        };
        if replace {
            newest.insert(loan.bank_name.clone(), loan);
        }
    }
    order.iter().filter_map(|b| newest.remove(b)).collect()
}

/// Retrieve and parse for every bank and channel.
pub async fn run(
    source: &dyn MessageSource,
    banks: &[BankConfig],
    cfg: &ProcessorConfig,
    now: DateTime<Utc>,
) -> ExtractionBatch {
    let since = cfg.since(now);
    let tasks = banks.iter().flat_map(|bank| {
        bank.channels.iter().map(move |channel| {
            let query = RetrievalQuery {
                channel: channel.channel,
                filter: channel.filter.clone(),
                since,
                max_results: cfg.max_results_per_query,
            };
            retrieve(source, bank, channel, query)
        })
    });
    let results = join_all(tasks).await;

    let mut batch = ExtractionBatch::default();
    let mut loans = Vec::new();
    for (bank_name, channel, outcome) in results {
        match outcome {
            Ok(parsed) => {
                for p in parsed {
                    match p {
                        Parsed::Statement(o) => batch.statements.push(o),
                        Parsed::Loan(l) => loans.push(l),
                    }
                }
            }
            Err(e) => {
                warn!(bank = %bank_name, channel = %channel, error = %e, "retrieval failed");
                batch.failures.push(RetrievalFailure {
                    bank_name,
                    channel,
                    error: e.to_string(),
                });
            }
        }
    }
    batch.loans = newest_loan_per_bank(loans);

    info!(
        statements = batch.statements.len(),
        loans = batch.loans.len(),
        failures = batch.failures.len(),
        "extraction finished"
    );
    batch
}

/// Parse one recognized screen capture. Empty text yields nothing.
pub fn process_screenshot(text: &str, taken_at: DateTime<Utc>) -> Option<Obligation> {
    if text.trim().is_empty() {
        return None;
    }
    let msg = RawMessage::screenshot(text, taken_at);
    match first_match(parsers_for(Channel::Screenshot), &msg) {
        Some(Parsed::Statement(o)) => Some(o),
        Some(Parsed::Loan(_)) | None => {
            debug!("no screenshot parser matched");
            None
        }
    }
}

/// Banks that have a screenshot parser, in registration order.
pub fn supported_screenshot_banks() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    for p in parsers_for(Channel::Screenshot) {
        if !names.contains(&p.bank_name()) {
            names.push(p.bank_name());
        }
    }
    names
}

pub fn has_screenshot_parser_for(bank_name: &str) -> bool {
    let wanted = fold_turkish(bank_name);
    supported_screenshot_banks()
        .iter()
        .any(|b| fold_turkish(b) == wanted)
}

/// Run the whole registry for a single already-decoded message.
pub fn parse_raw(msg: &RawMessage) -> Option<Parsed> {
    parse_message(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    /// In-memory source keyed by the query's first sender or mailbox query.
    struct MockSource {
        messages: Vec<(String, RawMessage)>,
        failing_filter: Option<String>,
        broken_ids: Vec<String>,
    }

    fn filter_key(filter: &RetrievalFilter) -> String {
        match filter {
            RetrievalFilter::Mailbox { query } => query.clone(),
            RetrievalFilter::Inbox { senders, keyword } => {
                format!("{}|{}", senders.join(","), keyword.clone().unwrap_or_default())
            }
        }
    }

    #[async_trait]
    impl MessageSource for MockSource {
        async fn search(&self, query: &RetrievalQuery) -> Result<Vec<MessageRef>> {
            let key = filter_key(&query.filter);
            if self.failing_filter.as_deref() == Some(key.as_str()) {
                return Err(anyhow!("mailbox unavailable"));
            }
            Ok(self
                .messages
                .iter()
                .filter(|(k, _)| *k == key)
                .map(|(_, m)| MessageRef {
                    id: m.id.clone(),
                    channel: m.channel,
                })
                .collect())
        }

        async fn fetch_body(&self, message: &MessageRef) -> Result<RawMessage> {
            if self.broken_ids.contains(&message.id) {
                return Err(anyhow!("gone"));
            }
            self.messages
                .iter()
                .map(|(_, m)| m)
                .find(|m| m.id == message.id)
                .cloned()
                .ok_or_else(|| anyhow!("unknown id {}", message.id))
        }
    }

    fn qnb_statement(id: &str, received: DateTime<Utc>) -> (String, RawMessage) {
        (
            "QNB|borcu".into(),
            RawMessage::text_message(
                id,
                "QNB",
                "Bilgi: 9876 ile biten kartinizin borcu 1,800.50 TL, asgari borcu 700.00 TL, son odeme tarihi 25/05/2026.",
                received,
            ),
        )
    }

    fn qnb_loan(id: &str, amount: &str, received: DateTime<Utc>) -> (String, RawMessage) {
        (
            "QNB|krediniz".into(),
            RawMessage::text_message(
                id,
                "QNB",
                &format!(
                    "Sayin musterimiz, {amount} TL tutarinda 12 ay vadeli krediniz 12345678 nolu hesabiniza aktarilmistir. Taksit tutari: 5.616,35 TL, ilk taksit tarihi: 15/07/2025. B002"
                ),
                received,
            ),
        )
    }

    #[test]
    fn test_query_expression_appends_window() {
        let cfg = ProcessorConfig::default();
        let query = RetrievalQuery {
            channel: Channel::Email,
            filter: RetrievalFilter::Mailbox {
                query: "from:(eekstre@eekstre.qnb.com.tr)".into(),
            },
            since: cfg.since(at(2026, 5, 10)),
            max_results: cfg.max_results_per_query,
        };
        assert_eq!(
            query.expression(),
            "from:(eekstre@eekstre.qnb.com.tr) after:2026/03/10"
        );

        let inbox_query = RetrievalQuery {
            filter: RetrievalFilter::Inbox {
                senders: vec!["GARANTIBBVA".into(), "BONUS".into()],
                keyword: Some("ekstresinin".into()),
            },
            ..query
        };
        assert_eq!(
            inbox_query.expression(),
            "from:(GARANTIBBVA OR BONUS) \"ekstresinin\" after:2026/03/10"
        );
    }

    #[test]
    fn test_default_banks_use_registered_parsers() {
        let banks = default_banks();
        assert_eq!(banks.len(), 7);
        for bank in &banks {
            for channel in &bank.channels {
                for p in &channel.parsers {
                    assert_eq!(p.channel(), channel.channel);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_run_collects_statements_and_loans() {
        let source = MockSource {
            messages: vec![
                qnb_statement("s1", at(2026, 5, 9)),
                qnb_loan("l1", "60.000,00", at(2025, 6, 1)),
            ],
            failing_filter: None,
            broken_ids: Vec::new(),
        };
        let batch = run(&source, &default_banks(), &ProcessorConfig::default(), at(2026, 5, 10)).await;
        assert_eq!(batch.statements.len(), 1);
        assert_eq!(batch.statements[0].bank_name, "QNB");
        assert_eq!(batch.loans.len(), 1);
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_isolated() {
        let source = MockSource {
            messages: vec![qnb_statement("s1", at(2026, 5, 9))],
            failing_filter: Some("QNB|krediniz".into()),
            broken_ids: Vec::new(),
        };
        let batch = run(&source, &default_banks(), &ProcessorConfig::default(), at(2026, 5, 10)).await;
        assert_eq!(batch.statements.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].bank_name, "QNB");
        assert_eq!(batch.failures[0].channel, Channel::Message);
    }

    #[tokio::test]
    async fn test_broken_message_is_skipped() {
        let source = MockSource {
            messages: vec![qnb_statement("s1", at(2026, 5, 9)), qnb_statement("s2", at(2026, 5, 8))],
            failing_filter: None,
            broken_ids: vec!["s1".into()],
        };
        let batch = run(&source, &default_banks(), &ProcessorConfig::default(), at(2026, 5, 10)).await;
        assert_eq!(batch.statements.len(), 1);
        assert_eq!(batch.statements[0].id, "message-s2");
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn test_newest_loan_per_bank_wins() {
        let source = MockSource {
            messages: vec![
                qnb_loan("old", "10.000,00", at(2025, 1, 1)),
                qnb_loan("new", "60.000,00", at(2025, 6, 1)),
            ],
            failing_filter: None,
            broken_ids: Vec::new(),
        };
        let batch = run(&source, &default_banks(), &ProcessorConfig::default(), at(2025, 7, 1)).await;
        assert_eq!(batch.loans.len(), 1);
        assert_eq!(batch.loans[0].loan_amount, Some(60000.0));
    }

    #[test]
    fn test_process_screenshot() {
        assert_eq!(process_screenshot("   ", at(2025, 11, 17)), None);
        let o = process_screenshot("Akbank ****1234 Son gün: 26 Kasım 6.028,66TL Ekstreni öde", at(2025, 11, 17))
            .unwrap();
        assert_eq!(o.bank_name, "Akbank");
        assert_eq!(o.amount, Some(6028.66));
        assert_eq!(process_screenshot("Hava durumu: güneşli", at(2025, 11, 17)), None);
    }

    #[test]
    fn test_supported_screenshot_banks() {
        assert_eq!(supported_screenshot_banks(), vec!["Akbank"]);
        assert!(has_screenshot_parser_for("AKBANK"));
        assert!(!has_screenshot_parser_for("QNB"));
    }
}
