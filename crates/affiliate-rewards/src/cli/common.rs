use crate::cli::traits::Exportable;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
};
use tabled::{Table, Tabled, settings::Style};
use tracing::info;

/// Encoding of exported payouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    #[value(name = "csv")]
    Csv,
    #[value(name = "json")]
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::JsonPretty => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonPretty => write!(f, "json-pretty"),
            other => write!(f, "{}", other.extension()),
        }
    }
}

/// Where and how reward payouts are written
#[derive(Args, Debug, Clone)]
pub struct OutputOptions {
    /// Payout export format
    #[arg(short = 'f', long, default_value = "json-pretty")]
    pub output_format: OutputFormat,

    /// Directory for payout files, named after the calculation and its block range
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Exact payout file path, takes precedence over --output-dir
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,
}

impl OutputOptions {
    /// True when payouts go to stdout
    pub fn is_stdout(&self) -> bool {
        self.output_file.is_none() && self.output_dir.is_none()
    }

    /// File the payouts of `data` are written to, if any
    pub fn destination<T: Exportable>(&self, data: &T) -> Option<PathBuf> {
        self.output_file.clone().or_else(|| {
            self.output_dir.as_ref().map(|dir| {
                dir.join(format!(
                    "{}.{}",
                    data.file_stem(),
                    self.output_format.extension()
                ))
            })
        })
    }

    pub fn write<T: Exportable>(&self, data: &T) -> Result<()> {
        let content = data.export(self.output_format)?;
        let Some(path) = self.destination(data) else {
            println!("{content}");
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write payouts to {}", path.display()))?;
        info!("Payouts ({}) written to {}", self.output_format, path.display());
        Ok(())
    }
}

/// Load a JSON run parameter file
pub fn read_params<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameters from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse parameters in {}", path.display()))
}

pub fn records_to_csv<T: Serialize>(records: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for record in records {
        writer.serialize(record)?;
    }
    Ok(String::from_utf8(writer.into_inner()?)?)
}

pub fn to_json<T: Serialize + ?Sized>(data: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    Ok(json)
}

/// One payout line in csv exports and summary tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct PayoutRecord {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Amount")]
    pub amount: String,
}

pub fn payout_records(category: &str, payouts: &BTreeMap<String, String>) -> Vec<PayoutRecord> {
    payouts
        .iter()
        .map(|(address, amount)| PayoutRecord {
            category: category.to_string(),
            address: address.clone(),
            amount: amount.clone(),
        })
        .collect()
}

pub fn print_payouts(title: &str, records: Vec<PayoutRecord>) {
    println!("\n{title}:");
    if records.is_empty() {
        println!("(no payouts)");
        return;
    }
    let table = Table::new(records).with(Style::psql()).to_string();
    println!("{table}");
}
