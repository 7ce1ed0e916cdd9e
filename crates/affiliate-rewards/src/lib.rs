pub mod calculator;
pub mod error;
pub mod ingestor;
pub mod models;
pub mod processor;
pub mod settings;

pub use error::{Error, Result};
