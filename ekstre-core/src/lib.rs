//! ekstre-core: obligation model, locale normalization, bank registry and the
//! reconciliation engine for Turkish bank payment notices.

pub mod banks;
pub mod entry_format;
pub mod ledger;
pub mod locale;
pub mod obligation;
pub mod reconcile;

pub use banks::{canonical_bank_name, is_known_bank_name, match_patterns, BankEntry, BANKS};
pub use entry_format::{format_bank_entry_description, parse_bank_entry_description, BankEntryDescription};
pub use ledger::{Ledger, LedgerError, LoanGroup, ManualEntry, ManualKind};
pub use obligation::{
    Attachment, Channel, EntryType, LoanAgreement, Obligation, RawMessage, Source, StableKey,
};
pub use reconcile::{reconcile, ReconcileConfig, RunReport, DEFAULT_LOOKAHEAD_DAYS};
