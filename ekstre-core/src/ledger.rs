//! User-side operations over the persisted obligation list.
//!
//! The ledger owns no storage. Callers load the list, mutate it here and
//! persist the result.

use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::entry_format::parse_bank_entry_description;
use crate::locale::add_months;
use crate::obligation::{EntryType, Obligation, Source};
use crate::reconcile::{sort_by_due_desc, RunReport};

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("no obligation with id '{0}'")]
    NotFound(String),

    #[error("an entry with id '{0}' already exists")]
    DuplicateId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("'{0}' is not a manual entry")]
    NotManual(String),

    #[error("'{0}' is a manual entry")]
    IsManual(String),

    #[error("installment {0} falls outside the calendar")]
    DateOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualKind {
    Debt,
    Expense,
    Loan,
}

/// Already-structured user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub kind: ManualKind,
    /// Only meaningful for `ManualKind::Loan`.
    #[serde(default)]
    pub installment_count: Option<u32>,
}

/// Manual installments that belong to one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanGroup {
    pub loan_id: String,
    pub description: String,
    pub installment_count: u32,
    pub paid_count: usize,
    pub installments: Vec<Obligation>,
}

pub fn installment_id(loan_id: &str, index: u32) -> String {
    format!("{loan_id}_installment_{index}")
}

fn check_amount(amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    items: Vec<Obligation>,
}

impl Ledger {
    pub fn new(mut items: Vec<Obligation>) -> Self {
        sort_by_due_desc(&mut items);
        Self { items }
    }

    pub fn items(&self) -> &[Obligation] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Obligation> {
        self.items
    }

    pub fn get(&self, id: &str) -> Option<&Obligation> {
        self.items.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Obligation, LedgerError> {
        self.items
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Replace the list with an engine run's output.
    pub fn apply_run(&mut self, report: RunReport) {
        info!(fresh = report.fresh_count, "applying extraction run");
        self.items = report.obligations;
    }

    /// Flip the paid flag; returns the new value.
    pub fn toggle_paid(&mut self, id: &str) -> Result<bool, LedgerError> {
        let item = self.get_mut(id)?;
        item.is_paid = !item.is_paid;
        Ok(item.is_paid)
    }

    /// Record the amount the user read off a statement that did not state one.
    pub fn set_user_amount(&mut self, id: &str, amount: f64) -> Result<(), LedgerError> {
        check_amount(amount)?;
        let item = self.get_mut(id)?;
        if item.is_manual() {
            return Err(LedgerError::IsManual(id.to_string()));
        }
        item.user_amount = Some(amount);
        Ok(())
    }

    pub fn clear_user_amount(&mut self, id: &str) -> Result<(), LedgerError> {
        self.get_mut(id)?.user_amount = None;
        Ok(())
    }

    pub fn update_due_date(&mut self, id: &str, due_date: NaiveDate) -> Result<(), LedgerError> {
        self.get_mut(id)?.due_date = due_date;
        sort_by_due_desc(&mut self.items);
        Ok(())
    }

    /// Add a manual entry. Loans with an installment count expand into one
    /// debt per month; returns the ids created.
    pub fn add_manual_entry(&mut self, entry: ManualEntry) -> Result<Vec<String>, LedgerError> {
        check_amount(entry.amount)?;
        if self.get(&entry.id).is_some() {
            return Err(LedgerError::DuplicateId(entry.id));
        }

        let created = match (entry.kind, entry.installment_count) {
            (ManualKind::Loan, Some(count)) if count > 0 => {
                let mut out = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let due = add_months(entry.due_date, i)
                        .ok_or(LedgerError::DateOutOfRange(i + 1))?;
                    out.push(manual_obligation(
                        installment_id(&entry.id, i + 1),
                        format!("{} - Taksit {}/{}", entry.description, i + 1, count),
                        entry.amount,
                        due,
                        EntryType::Debt,
                    ));
                }
                out
            }
            (kind, _) => {
                let entry_type = match kind {
                    ManualKind::Expense => EntryType::Expense,
                    _ => EntryType::Debt,
                };
                vec![manual_obligation(
                    entry.id.clone(),
                    entry.description.clone(),
                    entry.amount,
                    entry.due_date,
                    entry_type,
                )]
            }
        };

        if let Some(clash) = created.iter().find(|o| self.get(&o.id).is_some()) {
            return Err(LedgerError::DuplicateId(clash.id.clone()));
        }

        let ids: Vec<String> = created.iter().map(|o| o.id.clone()).collect();
        debug!(count = created.len(), "added manual entries");
        self.items.extend(created);
        sort_by_due_desc(&mut self.items);
        Ok(ids)
    }

    pub fn delete_manual_entry(&mut self, id: &str) -> Result<(), LedgerError> {
        let idx = self
            .items
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        if !self.items[idx].is_manual() {
            return Err(LedgerError::NotManual(id.to_string()));
        }
        self.items.remove(idx);
        Ok(())
    }

    /// Remove every installment of a manual loan; returns how many were removed.
    pub fn delete_loan(&mut self, loan_id: &str) -> usize {
        let prefix = format!("{loan_id}_installment_");
        let before = self.items.len();
        self.items
            .retain(|o| !(o.is_manual() && o.id.starts_with(&prefix)));
        before - self.items.len()
    }

    /// Import a backup. `merge` keeps current items and skips ids already
    /// present; otherwise the list is replaced. Returns the number of items added.
    pub fn import(&mut self, items: Vec<Obligation>, merge: bool) -> usize {
        let added = if merge {
            let existing: HashSet<String> = self.items.iter().map(|o| o.id.clone()).collect();
            let fresh: Vec<Obligation> = items
                .into_iter()
                .filter(|o| !existing.contains(&o.id))
                .collect();
            let n = fresh.len();
            self.items.extend(fresh);
            n
        } else {
            let n = items.len();
            self.items = items;
            n
        };
        sort_by_due_desc(&mut self.items);
        added
    }

    /// Sum of unpaid debts. A user amount wins; missing amounts count as zero.
    pub fn total_debt(&self) -> f64 {
        self.items
            .iter()
            .filter(|o| !o.is_paid && o.entry_type == EntryType::Debt)
            .map(|o| o.effective_amount().unwrap_or(0.0))
            .sum()
    }

    /// Manual loan installments grouped by loan id, ascending by due date.
    pub fn grouped_loans(&self) -> Vec<LoanGroup> {
        let (Ok(id_re), Ok(desc_re)) = (
            Regex::new(r"^(?P<loan>.+)_installment_\d+$"),
            Regex::new(r"^(?P<desc>.+) - Taksit \d+/(?P<total>\d+)$"),
        ) else {
            return Vec::new();
        };

        let mut groups: BTreeMap<String, LoanGroup> = BTreeMap::new();
        for o in self.items.iter().filter(|o| o.is_manual()) {
            let (Some(id_caps), Some(desc_caps)) =
                (id_re.captures(&o.id), desc_re.captures(&o.bank_name))
            else {
                continue;
            };
            let group = groups
                .entry(id_caps["loan"].to_string())
                .or_insert_with(|| LoanGroup {
                    loan_id: id_caps["loan"].to_string(),
                    description: desc_caps["desc"].to_string(),
                    installment_count: desc_caps["total"].parse().unwrap_or(0),
                    paid_count: 0,
                    installments: Vec::new(),
                });
            if o.is_paid {
                group.paid_count += 1;
            }
            group.installments.push(o.clone());
        }

        groups
            .into_values()
            .map(|mut g| {
                g.installments.sort_by_key(|o| o.due_date);
                g
            })
            .collect()
    }

    /// Items worth showing today: manual loan installments only within the
    /// coming month, everything else as is.
    pub fn display_items(&self, today: NaiveDate) -> Vec<&Obligation> {
        let until = today.checked_add_months(Months::new(1)).unwrap_or(today);
        self.items
            .iter()
            .filter(|o| {
                let manual_installment = o.is_manual() && o.bank_name.contains(" - Taksit ");
                !manual_installment || (o.due_date >= today && o.due_date <= until)
            })
            .collect()
    }
}

fn manual_obligation(
    id: String,
    description: String,
    amount: f64,
    due_date: NaiveDate,
    entry_type: EntryType,
) -> Obligation {
    let last4_digits = parse_bank_entry_description(&description).map(|b| b.last4_digits);
    Obligation {
        id,
        bank_name: description,
        due_date,
        amount: Some(amount),
        last4_digits,
        source: Source::Manual,
        entry_type,
        original_message: None,
        is_paid: false,
        user_amount: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::RawMessage;
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(id: &str, kind: ManualKind, count: Option<u32>) -> ManualEntry {
        ManualEntry {
            id: id.to_string(),
            description: "İhtiyaç Kredisi".to_string(),
            amount: 2500.0,
            due_date: d(2026, 1, 31),
            kind,
            installment_count: count,
        }
    }

    fn statement(amount: Option<f64>) -> Obligation {
        let msg = RawMessage::text_message(
            "s1",
            "YAPIKREDI",
            "",
            Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(),
        );
        Obligation::statement("Yapı Kredi", d(2026, 1, 20), amount, Some("1234".into()), &msg)
    }

    #[test]
    fn test_loan_entry_expands_with_month_end_clamping() {
        let mut ledger = Ledger::default();
        let ids = ledger
            .add_manual_entry(entry("loan1", ManualKind::Loan, Some(3)))
            .unwrap();
        assert_eq!(ids, vec!["loan1_installment_1", "loan1_installment_2", "loan1_installment_3"]);

        let second = ledger.get("loan1_installment_2").unwrap();
        assert_eq!(second.bank_name, "İhtiyaç Kredisi - Taksit 2/3");
        assert_eq!(second.due_date, d(2026, 2, 28));
        assert_eq!(second.entry_type, EntryType::Debt);
        assert_eq!(second.source, Source::Manual);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut ledger = Ledger::default();
        ledger.add_manual_entry(entry("rent", ManualKind::Expense, None)).unwrap();
        let err = ledger
            .add_manual_entry(entry("rent", ManualKind::Expense, None))
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateId("rent".into()));
    }

    #[test]
    fn test_invalid_amount_is_rejected() {
        let mut ledger = Ledger::default();
        let mut e = entry("x", ManualKind::Debt, None);
        e.amount = f64::NAN;
        assert!(matches!(
            ledger.add_manual_entry(e),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_bank_tagged_description_fills_last4() {
        let mut ledger = Ledger::default();
        let mut e = entry("card", ManualKind::Debt, None);
        e.description = "Akbank - ****1234".to_string();
        ledger.add_manual_entry(e).unwrap();
        assert_eq!(ledger.get("card").unwrap().last4_digits.as_deref(), Some("1234"));
    }

    #[test]
    fn test_delete_loan_and_manual_entry() {
        let mut ledger = Ledger::new(vec![statement(Some(10.0))]);
        ledger.add_manual_entry(entry("loan1", ManualKind::Loan, Some(4))).unwrap();
        ledger.add_manual_entry(entry("rent", ManualKind::Expense, None)).unwrap();

        assert_eq!(ledger.delete_loan("loan1"), 4);
        assert_eq!(
            ledger.delete_manual_entry("message-s1"),
            Err(LedgerError::NotManual("message-s1".into()))
        );
        ledger.delete_manual_entry("rent").unwrap();
        assert_eq!(ledger.items().len(), 1);
    }

    #[test]
    fn test_total_debt_prefers_user_amount_and_skips_paid() {
        let mut ledger = Ledger::new(vec![statement(None)]);
        ledger.add_manual_entry(entry("debt", ManualKind::Debt, None)).unwrap();
        ledger.add_manual_entry(entry("food", ManualKind::Expense, None)).unwrap();
        assert_eq!(ledger.total_debt(), 2500.0);

        ledger.set_user_amount("message-s1", 400.0).unwrap();
        assert_eq!(ledger.total_debt(), 2900.0);

        ledger.toggle_paid("debt").unwrap();
        assert_eq!(ledger.total_debt(), 400.0);

        ledger.clear_user_amount("message-s1").unwrap();
        assert_eq!(ledger.total_debt(), 0.0);
    }

    #[test]
    fn test_user_amount_only_for_statements() {
        let mut ledger = Ledger::default();
        ledger.add_manual_entry(entry("debt", ManualKind::Debt, None)).unwrap();
        assert_eq!(
            ledger.set_user_amount("debt", 5.0),
            Err(LedgerError::IsManual("debt".into()))
        );
        assert_eq!(
            ledger.set_user_amount("nope", 5.0),
            Err(LedgerError::NotFound("nope".into()))
        );
    }

    #[test]
    fn test_grouped_loans_counts_paid() {
        let mut ledger = Ledger::default();
        ledger.add_manual_entry(entry("loan1", ManualKind::Loan, Some(3))).unwrap();
        ledger.toggle_paid("loan1_installment_1").unwrap();

        let groups = ledger.grouped_loans();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].loan_id, "loan1");
        assert_eq!(groups[0].description, "İhtiyaç Kredisi");
        assert_eq!(groups[0].installment_count, 3);
        assert_eq!(groups[0].paid_count, 1);
        assert_eq!(groups[0].installments[0].due_date, d(2026, 1, 31));
    }

    #[test]
    fn test_import_merge_skips_existing_ids() {
        let mut ledger = Ledger::new(vec![statement(Some(1.0))]);
        let mut dup = statement(Some(99.0));
        dup.is_paid = true;
        let mut other = statement(Some(2.0));
        other.id = "other".into();

        assert_eq!(ledger.import(vec![dup, other.clone()], true), 1);
        assert_eq!(ledger.items().len(), 2);
        assert!(!ledger.get("message-s1").unwrap().is_paid);

        assert_eq!(ledger.import(vec![other], false), 1);
        assert_eq!(ledger.items().len(), 1);
    }

    #[test]
    fn test_display_hides_distant_manual_installments() {
        let mut ledger = Ledger::new(vec![statement(Some(1.0))]);
        ledger.add_manual_entry(entry("loan1", ManualKind::Loan, Some(6))).unwrap();

        let visible = ledger.display_items(d(2026, 2, 10));
        let ids: Vec<_> = visible.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&"loan1_installment_2"));
        assert!(ids.contains(&"message-s1"));
        assert!(!ids.contains(&"loan1_installment_1"));
        assert!(!ids.contains(&"loan1_installment_4"));
    }

    #[test]
    fn test_update_due_date_resorts() {
        let mut ledger = Ledger::new(vec![statement(Some(1.0))]);
        ledger.add_manual_entry(entry("rent", ManualKind::Expense, None)).unwrap();
        assert_eq!(ledger.items()[0].id, "rent");
        ledger.update_due_date("message-s1", d(2026, 3, 1)).unwrap();
        assert_eq!(ledger.items()[0].id, "message-s1");
    }
}
