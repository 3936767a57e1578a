use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use ekstre_core::locale::{parse_timezone, DEFAULT_TIMEZONE};
use ekstre_core::{ReconcileConfig, DEFAULT_LOOKAHEAD_DAYS};
use ekstre_ingest::processor::{DEFAULT_MAX_RESULTS, DEFAULT_RETRIEVAL_WINDOW_MONTHS};
use ekstre_ingest::ProcessorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_ekstre_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub inbox: InboxSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Loan installments due within this many days of today are kept.
    pub lookahead_days: i64,
    /// How far back `sync` looks, in months.
    pub retrieval_window_months: u32,
    pub max_results_per_query: usize,
    /// Zone used to decide what "today" is.
    pub timezone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxSection {
    /// Directory with `email/*.eml` and `sms/*.json`; `sync --inbox` overrides it.
    pub dir: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            retrieval_window_months: DEFAULT_RETRIEVAL_WINDOW_MONTHS,
            max_results_per_query: DEFAULT_MAX_RESULTS,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.engine.timezone)
    }

    pub fn reconcile_config(&self, today: NaiveDate) -> ReconcileConfig {
        ReconcileConfig {
            today,
            lookahead_days: self.engine.lookahead_days,
        }
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            retrieval_window_months: self.engine.retrieval_window_months,
            max_results_per_query: self.engine.max_results_per_query,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_ekstre_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
