//! Command-line configuration

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use jiff::Timestamp;
use thiserror::Error;

use kasir::products::ProductId;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Kasir register configuration
#[derive(Debug, Parser)]
#[command(name = "kasir", about = "Price a sale at the register", long_about = None)]
pub struct KasirConfig {
    /// Directory holding fixture sets
    #[arg(long, env = "KASIR_FIXTURES_DIR", default_value = "./fixtures")]
    pub fixtures_dir: PathBuf,

    /// Fixture set to load
    #[arg(short, long, env = "KASIR_FIXTURE", default_value = "toko")]
    pub fixture: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Items to ring up, as `<product id>` or `<product id>x<quantity>`
    #[arg(value_name = "ITEM")]
    pub items: Vec<ItemArg>,

    /// Discount code to apply
    #[arg(short, long)]
    pub code: Option<String>,

    /// Record the transaction at this time (RFC 3339)
    #[arg(long)]
    pub at: Option<Timestamp>,

    /// Submit the order after previewing it
    #[arg(long)]
    pub submit: bool,
}

impl KasirConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

/// An item argument
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemArg {
    /// Product to add
    pub product_id: ProductId,

    /// Requested quantity
    pub quantity: u32,
}

/// Item argument errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemArgError {
    /// Product id was not an integer
    #[error("invalid product id: {0}")]
    ProductId(String),

    /// Quantity was not a positive integer
    #[error("invalid quantity: {0}")]
    Quantity(String),
}

impl FromStr for ItemArg {
    type Err = ItemArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, quantity) = s.split_once(['x', 'X']).unwrap_or((s, "1"));

        let product_id = id
            .trim()
            .parse::<i64>()
            .map_err(|_err| ItemArgError::ProductId(id.to_string()))?;

        let quantity = quantity
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|quantity| *quantity > 0)
            .ok_or_else(|| ItemArgError::Quantity(quantity.to_string()))?;

        Ok(Self {
            product_id: ProductId::new(product_id),
            quantity,
        })
    }
}
