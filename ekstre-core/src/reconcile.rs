//! Reconciliation engine: one extraction run in, the sorted obligation list out.
//!
//! Stages:
//!   1. expand loan agreements into installments inside the lookahead horizon
//!   2. collapse same-card notifications to the latest arrival
//!   3. carry paid flags and user amounts over from the prior list by StableKey
//!   4. prepend manual entries, sort by due date descending
//!
//! Stateless: the prior list and configuration are explicit arguments.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::locale::add_months;
use crate::obligation::{EntryType, LoanAgreement, Obligation, StableKey};

pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Forward display window for synthesized installments, in days.
    pub lookahead_days: i64,
    pub today: NaiveDate,
}

impl ReconcileConfig {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            today,
        }
    }

    /// Last day of the horizon. Saturates at the calendar bounds.
    pub fn horizon_end(&self) -> NaiveDate {
        let end = Duration::try_days(self.lookahead_days)
            .and_then(|d| self.today.checked_add_signed(d));
        match end {
            Some(d) => d,
            None if self.lookahead_days < 0 => NaiveDate::MIN,
            None => NaiveDate::MAX,
        }
    }

    pub fn in_horizon(&self, date: NaiveDate) -> bool {
        date >= self.today && date <= self.horizon_end()
    }
}

/// Engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub obligations: Vec<Obligation>,
    /// Automatic items extracted this run, after dedup and before merge.
    pub fresh_count: usize,
}

/// "<bank> - Taksit i/N", 1-based.
pub fn installment_label(bank_name: &str, index: u32, term: u32) -> String {
    format!("{bank_name} - Taksit {index}/{term}")
}

/// Installments of `loan` whose due date falls in `[today, today + lookahead]`.
///
/// Loans missing their term, first payment date or installment amount yield nothing.
pub fn expand_loan(loan: &LoanAgreement, cfg: &ReconcileConfig) -> Vec<Obligation> {
    let (Some(term), Some(first), Some(amount)) = (
        loan.term_months,
        loan.first_payment_date,
        loan.installment_amount,
    ) else {
        debug!(bank = %loan.bank_name, "loan lacks term/date/installment; not expanded");
        return Vec::new();
    };

    let msg = &loan.original_message;
    (0..term)
        .filter_map(|i| add_months(first, i).map(|due| (i, due)))
        .filter(|(_, due)| cfg.in_horizon(*due))
        .map(|(i, due)| Obligation {
            id: format!("{}-{}-installment-{}", msg.channel, msg.id, i + 1),
            bank_name: installment_label(&loan.bank_name, i + 1, term),
            due_date: due,
            amount: Some(amount),
            last4_digits: None,
            source: msg.channel.into(),
            entry_type: EntryType::Debt,
            original_message: Some(msg.clone()),
            is_paid: false,
            user_amount: None,
        })
        .collect()
}

/// Keep one obligation per `(bank, last4)`: the one whose message arrived last.
///
/// Ties keep the earlier candidate. Output preserves first-seen group order.
pub fn dedupe_latest(candidates: Vec<Obligation>) -> Vec<Obligation> {
    let mut slots: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut out: Vec<Obligation> = Vec::new();

    for cand in candidates {
        let key = (cand.bank_name.clone(), cand.last4_digits.clone());
        match slots.get(&key) {
            Some(&idx) => {
                if cand.arrived_at() > out[idx].arrived_at() {
                    debug!(bank = %cand.bank_name, "newer notification supersedes earlier one");
                    out[idx] = cand;
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(cand);
            }
        }
    }
    out
}

/// Apply prior user state to freshly extracted obligations.
///
/// Automatic items match by StableKey; manual entries from `prior` are carried
/// over untouched and returned first.
pub fn merge_with_prior(fresh: Vec<Obligation>, prior: &[Obligation]) -> Vec<Obligation> {
    let mut paid: HashSet<StableKey> = HashSet::new();
    let mut user_amounts: HashMap<StableKey, f64> = HashMap::new();
    let mut manual: Vec<Obligation> = Vec::new();

    for p in prior {
        if p.is_manual() {
            manual.push(p.clone());
            continue;
        }
        let key = p.stable_key();
        if p.is_paid {
            paid.insert(key.clone());
        }
        if let Some(a) = p.user_amount {
            user_amounts.insert(key, a);
        }
    }

    let automatic = fresh.into_iter().map(|mut o| {
        let key = o.stable_key();
        o.is_paid = paid.contains(&key);
        o.user_amount = user_amounts.get(&key).copied();
        o
    });

    manual.into_iter().chain(automatic).collect()
}

/// Descending by due date; stable, so equal dates keep their relative order.
pub fn sort_by_due_desc(items: &mut [Obligation]) {
    items.sort_by(|a, b| b.due_date.cmp(&a.due_date));
}

/// Run the full reconciliation for one extraction run.
pub fn reconcile(
    statements: Vec<Obligation>,
    loans: &[LoanAgreement],
    prior: &[Obligation],
    cfg: &ReconcileConfig,
) -> RunReport {
    let mut candidates = statements;
    for loan in loans {
        candidates.extend(expand_loan(loan, cfg));
    }

    let fresh = dedupe_latest(candidates);
    let fresh_count = fresh.len();

    let mut obligations = merge_with_prior(fresh, prior);
    sort_by_due_desc(&mut obligations);

    info!(
        fresh = fresh_count,
        total = obligations.len(),
        "reconciled extraction run"
    );

    RunReport {
        obligations,
        fresh_count,
    }
}
