//! ekstre-ingest: channel decoding, per-bank parsers and the extraction run.

pub mod mime;
pub mod parsers;
pub mod pipeline;
pub mod processor;

pub use mime::{decode_body, html_to_text, parse_eml, DecodedBody};
pub use parsers::{parse_message, Parsed, ParserKind, REGISTRY};
pub use pipeline::{refresh, RefreshOutcome};
pub use processor::{
    default_banks, parse_raw, process_screenshot, supported_screenshot_banks, BankConfig,
    ChannelConfig, ExtractionBatch, MessageRef, MessageSource, ProcessorConfig, RetrievalFailure,
    RetrievalFilter, RetrievalQuery,
};
