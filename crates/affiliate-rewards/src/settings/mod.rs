pub mod validation;

use crate::calculator::{
    RunDefaults,
    constants::{DEFAULT_CURRENCY, DEFAULT_FIRST_EMP_DATE, DEFAULT_SNAPSHOT_STEPS},
};
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};
use validation::validate_config;

/// Main settings configuration for affiliate-rewards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Location of pre-fetched chain data and prices
    #[serde(default)]
    pub dataset: DatasetSettings,
    /// Values used when run parameters leave them out
    #[serde(default)]
    pub defaults: DefaultSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Root directory holding blocks.json, logs/, traces/ and prices/
    pub path: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            path: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSettings {
    /// Start of history queries (YYYY-MM-DD, UTC)
    pub first_emp_date: String,
    /// Blocks between dev mining samples
    pub snapshot_steps: u64,
    /// Currency collateral prices are quoted in
    pub currency: String,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            first_emp_date: DEFAULT_FIRST_EMP_DATE.to_string(),
            snapshot_steps: DEFAULT_SNAPSHOT_STEPS,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load configuration from a specific config file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Construct settings, env vars take priority still
        let settings = ConfigBuilder::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()))
            .add_source(
                Environment::with_prefix("AFFILIATES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(
                Environment::with_prefix("AFFILIATES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    pub fn run_defaults(&self) -> Result<RunDefaults> {
        RunDefaults::new(
            &self.defaults.first_emp_date,
            self.defaults.snapshot_steps,
            &self.defaults.currency,
        )
        .context("Invalid run defaults")
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tDataset Path: {}\n\
             \tFirst EMP Date: {}\n\
             \tSnapshot Steps: {}\n\
             \tCurrency: {}\n\
             }}",
            self.log_level,
            self.dataset.path,
            self.defaults.first_emp_date,
            self.defaults.snapshot_steps,
            self.defaults.currency,
        )
    }
}
