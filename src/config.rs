use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SummaryQuery;

const API_URL_ENV: &str = "REVIEW_INSIGHT_API_URL";
const PRODUCT_ID_ENV: &str = "REVIEW_INSIGHT_PRODUCT_ID";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub product_id: i64,
    /// Length of the default date range, ending today.
    pub range_days: i64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            product_id: 1,
            range_days: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(id) = var(PRODUCT_ID_ENV) {
            self.product_id = id
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got '{}'", PRODUCT_ID_ENV, id))?;
        }
        Ok(())
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub product_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Effective configuration after defaults, file, environment and flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "review-insight")
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = project_dirs() {
        dirs.config_dir().join("config.toml")
    } else {
        PathBuf::from("review-insight.toml")
    }
}

pub fn default_data_dir() -> PathBuf {
    if let Some(dirs) = project_dirs() {
        dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>, overrides: Overrides) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut settings = Settings::load(&config_path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        let today = chrono::Local::now().date_naive();
        Self::resolve(settings, overrides, today, config_path, default_data_dir())
    }

    pub fn resolve(
        mut settings: Settings,
        overrides: Overrides,
        today: NaiveDate,
        config_path: PathBuf,
        data_dir: PathBuf,
    ) -> Result<Self> {
        if let Some(url) = overrides.api_url {
            settings.api_url = url;
        }
        if let Some(id) = overrides.product_id {
            settings.product_id = id;
        }
        if settings.range_days < 0 {
            return Err(anyhow!("range_days must not be negative, got {}", settings.range_days));
        }

        let end_date = overrides.end_date.unwrap_or(today);
        let start_date = match overrides.start_date {
            Some(start) => start,
            None => Duration::try_days(settings.range_days)
                .and_then(|span| end_date.checked_sub_signed(span))
                .ok_or_else(|| {
                    anyhow!(
                        "range_days {} reaches before the earliest supported date",
                        settings.range_days
                    )
                })?,
        };
        if end_date < start_date {
            return Err(anyhow!(
                "End date {} is before start date {}",
                end_date,
                start_date
            ));
        }

        Ok(Self {
            settings,
            start_date,
            end_date,
            config_path,
            data_dir,
        })
    }

    pub fn query(&self) -> SummaryQuery {
        SummaryQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            product_id: self.settings.product_id,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("snapshots.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("review-insight.log")
    }
}

/// Write a default config file. Returns false if one already exists.
pub fn write_default(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(&Settings::default())?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", value))
}
