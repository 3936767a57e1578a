//! Email source decoding on top of `mailparse`.
//!
//! `mailparse` handles header unfolding, RFC 2047 words, transfer encodings
//! and the nested multipart tree. Parts that declare no charset are decoded
//! here, using an HTML `<meta charset>` hint when present and UTF-8 otherwise.
//!
//! Nothing here fails loudly. An undecodable part yields `None`, and parsers
//! treat an empty body as "cannot parse".

use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use mailparse::{parse_mail, DispositionType, MailHeaderMap, ParsedMail};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use ekstre_core::{Attachment, Channel, RawMessage};

/// Decoded text alternatives of one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBody {
    pub plain_body: Option<String>,
    pub html_body: Option<String>,
}

#[derive(Debug, Default)]
struct Collected {
    plain: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

/// A `charset=` hint inside the decoded document itself (HTML `<meta>`).
fn charset_hint(bytes: &[u8]) -> Option<String> {
    let re = Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).ok()?;
    let text = String::from_utf8_lossy(bytes);
    re.captures(&text).map(|c| c[1].to_string())
}

/// Decode `bytes` as `charset`, retrying once as UTF-8 before giving up.
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> Option<String> {
    let encoding = charset
        .and_then(|c| Encoding::for_label(c.trim().as_bytes()))
        .unwrap_or(UTF_8);
    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        return Some(text.into_owned());
    }
    debug!(charset = encoding.name(), "charset decode failed; retrying as UTF-8");
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn declares_charset(part: &ParsedMail) -> bool {
    part.headers
        .get_first_value("Content-Type")
        .is_some_and(|v| v.to_ascii_lowercase().contains("charset"))
}

fn decode_leaf(part: &ParsedMail) -> Option<String> {
    let text = if declares_charset(part) {
        part.get_body().ok()?
    } else {
        let bytes = part.get_body_raw().ok()?;
        decode_charset(&bytes, charset_hint(&bytes).as_deref())?
    };
    Some(text.trim_end_matches(['\r', '\n']).to_string())
}

fn attachment_name(part: &ParsedMail) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
}

fn walk(part: &ParsedMail, out: &mut Collected) {
    let media = part.ctype.mimetype.to_ascii_lowercase();
    if media.starts_with("multipart/") {
        for sub in &part.subparts {
            walk(sub, out);
        }
        return;
    }

    let filename = attachment_name(part);
    let is_attachment = matches!(
        part.get_content_disposition().disposition,
        DispositionType::Attachment
    ) || (filename.is_some() && !media.starts_with("text/"));
    if is_attachment {
        out.attachments.push(Attachment {
            filename: filename.unwrap_or_default(),
            mime_type: media,
            extracted_text: None,
        });
        return;
    }

    match media.as_str() {
        "text/html" if out.html.is_none() => out.html = decode_leaf(part),
        "text/plain" if out.plain.is_none() => out.plain = decode_leaf(part),
        _ => {}
    }
}

fn collect(mail: &ParsedMail) -> Collected {
    let mut out = Collected::default();
    walk(mail, &mut out);
    out
}

/// Decode a full message source into its text alternatives.
pub fn decode_body(raw: &[u8]) -> DecodedBody {
    match parse_mail(raw) {
        Ok(mail) => {
            let c = collect(&mail);
            DecodedBody {
                plain_body: c.plain,
                html_body: c.html,
            }
        }
        Err(e) => {
            debug!(error = %e, "unparseable message source");
            DecodedBody::default()
        }
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let secs = mailparse::dateparse(value).ok()?;
    DateTime::from_timestamp(secs, 0)
}

/// Parse a `.eml` source into a [`RawMessage`].
///
/// `fallback_received` is used when the `Date` header is missing or invalid,
/// and for the whole message when the source cannot be parsed at all.
pub fn parse_eml(raw: &[u8], fallback_received: DateTime<Utc>) -> RawMessage {
    let mail = match parse_mail(raw) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "unparseable message source");
            return RawMessage {
                id: format!("eml-{}", fallback_received.timestamp_millis()),
                channel: Channel::Email,
                sender: String::new(),
                subject: None,
                plain_body: None,
                html_body: None,
                received_at: fallback_received,
                attachments: Vec::new(),
            };
        }
    };
    let headers = &mail.headers;

    let received_at = headers
        .get_first_value("Date")
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(fallback_received);
    let id = headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().trim_matches(|c| c == '<' || c == '>').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("eml-{}", received_at.timestamp_millis()));

    let body = collect(&mail);
    RawMessage {
        id,
        channel: Channel::Email,
        sender: headers
            .get_first_value("From")
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
        subject: headers.get_first_value("Subject").map(|v| v.trim().to_string()),
        plain_body: body.plain,
        html_body: body.html,
        received_at,
        attachments: body.attachments,
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "br", "p", "div", "tr", "li", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];
const CELL_ELEMENTS: &[&str] = &["td", "th"];

fn push_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) => {
                let name = e.name();
                if name == "script" || name == "style" {
                    continue;
                }
                if let Some(inner) = ElementRef::wrap(child) {
                    push_text(inner, out);
                }
                if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                } else if CELL_ELEMENTS.contains(&name) {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Flatten HTML to text: block elements end a line, entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();
    push_text(doc.root_element(), &mut raw);

    raw.lines()
        .map(|l| {
            l.split([' ', '\t', '\u{a0}'])
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
