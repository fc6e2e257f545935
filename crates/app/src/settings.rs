//! Settings for the service. Values come from `config/mess_fund.toml` (or the
//! file given with `--config`) and can be overridden with `MESS_FUND__*`
//! environment variables, e.g. `MESS_FUND__SCHEDULER__TIMEZONE=Asia/Dhaka`.
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/mess_fund";

#[derive(Debug, Parser)]
#[command(name = "mess_fund", about = "Mess fund ledger service")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Storage {
    Memory,
    Json { path: String },
    Sqlite { path: String },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::Json {
            path: "mess_fund_groups.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub enabled: bool,
    /// IANA name, e.g. `Asia/Dhaka`.
    pub timezone: String,
    pub reminder_days_before: u32,
    /// `HH:MM`, local to `timezone`.
    pub reminder_time: String,
    /// `HH:MM`, local to `timezone`.
    pub settlement_time: String,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "UTC".to_string(),
            reminder_days_before: 3,
            reminder_time: "10:00".to_string(),
            settlement_time: "23:59".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub storage: Storage,
    pub scheduler: Scheduler,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        Self::from_sources(path)
    }

    fn from_sources(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MESS_FUND").separator("__"))
            .build()?
            .try_deserialize()
    }
}
