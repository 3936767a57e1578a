use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ekstre_core::{
    format_bank_entry_description, Ledger, ManualEntry, ManualKind, Obligation, RawMessage,
};
use ekstre_ingest::{
    default_banks, parse_eml, parse_raw, process_screenshot, refresh, supported_screenshot_banks,
    Parsed,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod inbox;
mod state;

use config::{init_config, load_config, Config};
use inbox::DirectorySource;
use state::{obligations_path, read_obligations, write_obligations};

#[derive(Parser, Debug)]
#[command(
    name = "ekstre",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("EKSTRE_BUILD_ID"), ")"),
    about = "Track credit card statements and loan installments from Turkish bank notices"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Decode and parse a single message file, print the result as JSON
    Parse {
        #[arg(long, value_enum)]
        channel: ChannelArg,

        #[arg(long)]
        file: PathBuf,

        /// Sender for text messages (email files carry their own)
        #[arg(long)]
        sender: Option<String>,
    },

    /// Extract from the inbox directory and reconcile with the stored list
    Sync {
        /// Inbox directory (defaults to [inbox] dir in config.toml)
        #[arg(long)]
        inbox: Option<PathBuf>,

        /// Override today's date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Print the stored list and the total unpaid debt
    List {
        /// Include manual installments outside the coming month
        #[arg(long)]
        all: bool,
    },

    /// Toggle the paid flag of an item
    Paid { id: String },

    /// Set the amount for a statement that did not state one; omit it to clear
    Amount { id: String, amount: Option<f64> },

    /// Move an item to another due date
    Due { id: String, date: NaiveDate },

    /// Show manual loans with their paid installments
    Loans,

    /// Write the stored list to a JSON backup
    Export { file: PathBuf },

    /// Load a JSON backup, replacing the list unless --merge is given
    Import {
        file: PathBuf,

        #[arg(long)]
        merge: bool,
    },

    /// Add a manual debt, expense or loan
    Add {
        #[arg(long)]
        description: String,

        #[arg(long)]
        amount: f64,

        /// Due date, or first installment date for loans (YYYY-MM-DD)
        #[arg(long)]
        due: NaiveDate,

        #[arg(long, value_enum, default_value_t = KindArg::Debt)]
        kind: KindArg,

        /// Number of monthly installments (loans only)
        #[arg(long)]
        installments: Option<u32>,
    },

    /// Parse recognized text of a banking app screen capture and add it
    Screenshot {
        #[arg(long)]
        file: PathBuf,

        /// Amount to use when the capture shows none
        #[arg(long)]
        amount: Option<f64>,
    },

    /// Delete a manual entry, or every installment of a manual loan
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default ~/.ekstre/config.toml
    Init,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    Message,
    Email,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Debt,
    Expense,
    Loan,
}

impl From<KindArg> for ManualKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Debt => ManualKind::Debt,
            KindArg::Expense => ManualKind::Expense,
            KindArg::Loan => ManualKind::Loan,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ekstre=info,ekstre_core=info,ekstre_ingest=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => init_config()?,
        },

        Command::Parse {
            channel,
            file,
            sender,
        } => parse_file(channel, &file, sender)?,

        Command::Sync { inbox, today } => {
            let cfg = load_config()?;
            sync(&cfg, inbox, today).await?;
        }

        Command::List { all } => {
            let cfg = load_config()?;
            let ledger = load_ledger()?;
            print_list(&ledger, today_in(&cfg)?, all);
        }

        Command::Paid { id } => {
            let mut ledger = load_ledger()?;
            let paid = ledger.toggle_paid(&id)?;
            save_ledger(&ledger)?;
            println!("{id}: {}", if paid { "paid" } else { "unpaid" });
        }

        Command::Amount { id, amount } => {
            let mut ledger = load_ledger()?;
            match amount {
                Some(a) => {
                    ledger.set_user_amount(&id, a)?;
                    println!("{id}: {a:.2} TL");
                }
                None => {
                    ledger.clear_user_amount(&id)?;
                    println!("{id}: amount cleared");
                }
            }
            save_ledger(&ledger)?;
        }

        Command::Due { id, date } => {
            let mut ledger = load_ledger()?;
            ledger.update_due_date(&id, date)?;
            save_ledger(&ledger)?;
            println!("{id}: due {date}");
        }

        Command::Loans => {
            let ledger = load_ledger()?;
            for g in ledger.grouped_loans() {
                println!(
                    "{} | {} | {}/{} paid",
                    g.loan_id, g.description, g.paid_count, g.installment_count
                );
                for o in &g.installments {
                    println!(
                        "    {} {} {}",
                        if o.is_paid { "[x]" } else { "[ ]" },
                        o.due_date,
                        o.id
                    );
                }
            }
        }

        Command::Export { file } => {
            let ledger = load_ledger()?;
            write_obligations(&file, ledger.items())?;
            println!("Wrote {} items to {}", ledger.items().len(), file.display());
        }

        Command::Import { file, merge } => {
            if !file.exists() {
                bail!("backup not found: {}", file.display());
            }
            let items = read_obligations(&file)?;
            let mut ledger = load_ledger()?;
            let added = ledger.import(items, merge);
            save_ledger(&ledger)?;
            println!("Imported {added} items");
        }

        Command::Add {
            description,
            amount,
            due,
            kind,
            installments,
        } => {
            if installments.is_some() && kind != KindArg::Loan {
                bail!("--installments only applies to --kind loan");
            }
            let mut ledger = load_ledger()?;
            let ids = ledger.add_manual_entry(ManualEntry {
                id: manual_id(Utc::now()),
                description,
                amount,
                due_date: due,
                kind: kind.into(),
                installment_count: installments,
            })?;
            save_ledger(&ledger)?;
            for id in ids {
                println!("Added {id}");
            }
        }

        Command::Screenshot { file, amount } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let Some(found) = process_screenshot(&text, Utc::now()) else {
                bail!(
                    "no supported bank found in the capture (supported: {})",
                    supported_screenshot_banks().join(", ")
                );
            };
            let mut ledger = load_ledger()?;
            let ids = ledger.add_manual_entry(screenshot_entry(&found, amount)?)?;
            save_ledger(&ledger)?;
            for id in ids {
                println!("Added {id}: {} due {}", found.bank_name, found.due_date);
            }
        }

        Command::Delete { id } => {
            let mut ledger = load_ledger()?;
            let removed = ledger.delete_loan(&id);
            if removed > 0 {
                println!("Deleted {removed} installments of {id}");
            } else {
                ledger.delete_manual_entry(&id)?;
                println!("Deleted {id}");
            }
            save_ledger(&ledger)?;
        }
    }

    Ok(())
}

fn today_in(cfg: &Config) -> Result<NaiveDate> {
    let tz = cfg.timezone()?;
    Ok(Utc::now().with_timezone(&tz).date_naive())
}

fn manual_id(now: DateTime<Utc>) -> String {
    format!("manual-{}", now.timestamp_millis())
}

fn load_ledger() -> Result<Ledger> {
    Ok(Ledger::new(read_obligations(&obligations_path()?)?))
}

fn save_ledger(ledger: &Ledger) -> Result<()> {
    write_obligations(&obligations_path()?, ledger.items())
}

/// A screenshot result is stored as a bank-tagged manual debt.
fn screenshot_entry(found: &Obligation, amount: Option<f64>) -> Result<ManualEntry> {
    let Some(amount) = found.amount.or(amount) else {
        bail!("the capture shows no amount; pass --amount");
    };
    let received = found
        .original_message
        .as_ref()
        .map(|m| m.received_at)
        .unwrap_or_else(Utc::now);
    Ok(ManualEntry {
        id: format!("screenshot-{}", received.timestamp_millis()),
        description: format_bank_entry_description(&found.bank_name, found.last4_digits.as_deref()),
        amount,
        due_date: found.due_date,
        kind: ManualKind::Debt,
        installment_count: None,
    })
}

fn read_message(channel: ChannelArg, file: &Path, sender: Option<String>) -> Result<RawMessage> {
    let now = Utc::now();
    let msg = match channel {
        ChannelArg::Email => {
            let raw = std::fs::read(file).with_context(|| format!("read {}", file.display()))?;
            let mut msg = parse_eml(&raw, now);
            if let Some(s) = sender {
                msg.sender = s;
            }
            msg
        }
        ChannelArg::Message => {
            let body = std::fs::read_to_string(file)
                .with_context(|| format!("read {}", file.display()))?;
            let id = file.display().to_string();
            RawMessage::text_message(id, sender.unwrap_or_default(), body.trim(), now)
        }
        ChannelArg::Screenshot => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("read {}", file.display()))?;
            RawMessage::screenshot(text, now)
        }
    };
    Ok(msg)
}

fn parse_file(channel: ChannelArg, file: &Path, sender: Option<String>) -> Result<()> {
    let msg = read_message(channel, file, sender)?;
    let json = match parse_raw(&msg) {
        Some(Parsed::Statement(o)) => serde_json::to_string_pretty(&o)?,
        Some(Parsed::Loan(l)) => serde_json::to_string_pretty(&l)?,
        None => bail!("no parser recognized {}", file.display()),
    };
    println!("{json}");
    Ok(())
}

async fn sync(cfg: &Config, inbox: Option<PathBuf>, today: Option<NaiveDate>) -> Result<()> {
    let Some(dir) = inbox.or_else(|| cfg.inbox.dir.as_ref().map(PathBuf::from)) else {
        bail!("no inbox directory (pass --inbox or set [inbox] dir in config.toml)");
    };
    let now = Utc::now();
    let today = match today {
        Some(d) => d,
        None => today_in(cfg)?,
    };

    let source = DirectorySource::load(&dir, now)?;
    if source.is_empty() {
        println!("No messages under {}", dir.display());
    }

    let path = obligations_path()?;
    let prior = read_obligations(&path)?;
    let outcome = refresh(
        &source,
        &default_banks(),
        &cfg.processor_config(),
        &prior,
        &cfg.reconcile_config(today),
        now,
    )
    .await;

    let mut ledger = Ledger::new(prior);
    let fresh = outcome.report.fresh_count;
    ledger.apply_run(outcome.report);
    write_obligations(&path, ledger.items())?;

    println!(
        "Synced {} messages: {} new items, {} total",
        source.len(),
        fresh,
        ledger.items().len()
    );
    for f in &outcome.failures {
        println!("  failed: {} ({}): {}", f.bank_name, f.channel, f.error);
    }
    Ok(())
}

fn print_list(ledger: &Ledger, today: NaiveDate, all: bool) {
    let items: Vec<&Obligation> = if all {
        ledger.items().iter().collect()
    } else {
        ledger.display_items(today)
    };
    if items.is_empty() {
        println!("Nothing to pay.");
        return;
    }

    for o in items {
        let amount = match o.effective_amount() {
            Some(a) => format!("{a:>12.2} TL"),
            None => format!("{:>15}", "?"),
        };
        let card = o
            .last4_digits
            .as_deref()
            .map(|d| format!(" ****{d}"))
            .unwrap_or_default();
        println!(
            "{} {} {} | {}{} [{:?}] {}",
            if o.is_paid { "[x]" } else { "[ ]" },
            o.due_date,
            amount,
            o.bank_name,
            card,
            o.source,
            o.id
        );
    }
    println!("\nUnpaid total: {:.2} TL", ledger.total_debt());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "ekstre",
            "add",
            "--description",
            "Kira",
            "--amount",
            "12500",
            "--due",
            "2025-06-01",
            "--kind",
            "expense",
        ])
        .unwrap();
        match cli.command {
            Command::Add { kind, due, .. } => {
                assert_eq!(kind, KindArg::Expense);
                assert_eq!(due, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["ekstre", "sync", "--today", "01.06.2025"]).is_err());
    }

    #[test]
    fn test_screenshot_entry_is_bank_tagged() {
        let taken = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let found = process_screenshot("Akbank ****4321 Son gün: 26 Kasım 900,00TL Ekstreni öde", taken)
            .unwrap();
        let entry = screenshot_entry(&found, None).unwrap();
        assert_eq!(entry.description, "Akbank - ****4321");
        assert_eq!(entry.amount, 900.0);
        assert_eq!(entry.id, format!("screenshot-{}", taken.timestamp_millis()));

        let mut ledger = Ledger::new(Vec::new());
        ledger.add_manual_entry(entry).unwrap();
        assert_eq!(ledger.items()[0].last4_digits.as_deref(), Some("4321"));
    }

    #[test]
    fn test_screenshot_entry_needs_an_amount() {
        let taken = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let found = process_screenshot("Akbank ****4321 Son gün: 26 Kasım Ekstreni öde", taken)
            .unwrap();
        assert!(screenshot_entry(&found, None).is_err());
        assert_eq!(screenshot_entry(&found, Some(50.0)).unwrap().amount, 50.0);
    }
}
