//! Local inbox directory used as the retrieval collaborator for `sync`.
//!
//! Layout:
//!   DIR/email/*.eml   raw RFC 822 messages
//!   DIR/sms/*.json    arrays of `{"sender", "body", "date"}` records
//!
//! Mailbox queries are evaluated against the `from:(..)` and `subject:("..")`
//! terms only.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ekstre_core::locale::fold_turkish;
use ekstre_core::{Channel, RawMessage};
use ekstre_ingest::{parse_eml, MessageRef, MessageSource, RetrievalFilter, RetrievalQuery};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct SmsRecord {
    pub sender: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MailboxTerms {
    senders: Vec<String>,
    subject: Option<String>,
}

fn mailbox_terms(query: &str) -> Result<MailboxTerms> {
    let from_re = Regex::new(r"from:\(([^)]*)\)")?;
    let subject_re = Regex::new(r#"subject:\("([^"]*)"\)"#)?;
    let senders = from_re
        .captures(query)
        .map(|c| {
            c[1].split(" OR ")
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let subject = subject_re.captures(query).map(|c| fold_turkish(&c[1]));
    Ok(MailboxTerms { senders, subject })
}

fn matches(filter: &RetrievalFilter, msg: &RawMessage) -> Result<bool> {
    let sender = msg.sender.to_lowercase();
    Ok(match filter {
        RetrievalFilter::Mailbox { query } => {
            let terms = mailbox_terms(query)?;
            terms.senders.iter().any(|s| sender.contains(s))
                && terms
                    .subject
                    .as_deref()
                    .is_none_or(|s| fold_turkish(msg.subject()).contains(s))
        }
        RetrievalFilter::Inbox { senders, keyword } => {
            senders.iter().any(|s| sender.trim() == s.to_lowercase())
                && keyword
                    .as_deref()
                    .is_none_or(|k| fold_turkish(msg.body()).contains(&fold_turkish(k)))
        }
    })
}

fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Every message under one inbox directory, loaded up front.
pub struct DirectorySource {
    messages: Vec<RawMessage>,
}

impl DirectorySource {
    /// `now` stands in for messages without a usable `Date` header.
    pub fn load(root: &Path, now: DateTime<Utc>) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!("inbox directory not found: {}", root.display()));
        }
        let mut messages = Vec::new();

        for path in files_with_extension(&root.join("email"), "eml")? {
            let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            messages.push(parse_eml(&raw, now));
        }

        for path in files_with_extension(&root.join("sms"), "json")? {
            let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            let records: Vec<SmsRecord> = match serde_json::from_str(&s) {
                Ok(r) => r,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable sms file");
                    continue;
                }
            };
            for (i, r) in records.into_iter().enumerate() {
                let id = format!("{}#{i}", path.display());
                messages.push(RawMessage::text_message(id, r.sender, r.body, r.date));
            }
        }

        debug!(root = %root.display(), count = messages.len(), "loaded inbox");
        Ok(Self { messages })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MessageSource for DirectorySource {
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<MessageRef>> {
        let mut hits = Vec::new();
        for msg in &self.messages {
            if msg.channel == query.channel
                && msg.received_at.date_naive() >= query.since
                && matches(&query.filter, msg)?
            {
                hits.push(msg);
            }
        }
        hits.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(hits
            .into_iter()
            .take(query.max_results)
            .map(|m| MessageRef {
                id: m.id.clone(),
                channel: m.channel,
            })
            .collect())
    }

    async fn fetch_body(&self, message: &MessageRef) -> Result<RawMessage> {
        self.messages
            .iter()
            .find(|m| m.id == message.id && m.channel == message.channel)
            .cloned()
            .ok_or_else(|| anyhow!("no message {}", message.id))
    }
}
