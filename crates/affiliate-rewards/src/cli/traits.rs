use crate::cli::common::{OutputFormat, records_to_csv, to_json};
use anyhow::Result;
use serde::Serialize;

/// Reward results that can be written as csv payout rows or as a json document
pub trait Exportable: Serialize + Sized {
    type Row: Serialize;

    /// Flat records used for csv output
    fn rows(&self) -> Vec<Self::Row>;

    /// File name without extension when writing into an output directory
    fn file_stem(&self) -> String;

    fn export(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Csv => records_to_csv(&self.rows()),
            OutputFormat::Json => to_json(self, false),
            OutputFormat::JsonPretty => to_json(self, true),
        }
    }
}
