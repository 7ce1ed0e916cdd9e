use crate::{calculator::constants::date_to_ms, settings::Settings};
use anyhow::{Result, bail};

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    // Validate log level
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    if settings.dataset.path.trim().is_empty() {
        bail!("Dataset path cannot be empty");
    }

    // Validate defaults
    if let Err(err) = date_to_ms(&settings.defaults.first_emp_date) {
        bail!(
            "Default first_emp_date must be a YYYY-MM-DD date, got '{}': {}",
            settings.defaults.first_emp_date,
            err
        );
    }

    if settings.defaults.snapshot_steps == 0 {
        bail!("Default snapshot_steps must be greater than 0");
    }

    if settings.defaults.currency.trim().is_empty() {
        bail!("Default currency cannot be empty");
    }

    Ok(())
}
