//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for sfpd-etl
#[derive(Parser, Debug)]
#[command(name = "sfpd-etl")]
#[command(about = "Geocode SFPD incidents into neighborhoods and load them into the warehouse")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file (default: <config dir>/sfpd-etl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Working directory for the archive, extracted CSVs and the cache
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Reuse previously extracted CSV files instead of downloading the archive
    #[arg(long)]
    pub skip_download: bool,

    /// Without a command, run the full bulk pipeline
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load the coordinate → neighborhood CSV into the local cache
    Import,

    /// Fetch and print the incremental incident feed
    Latest,

    /// Geocode one coordinate pair without the cache
    Lookup {
        /// Longitude
        #[arg(allow_negative_numbers = true)]
        lng: f64,

        /// Latitude
        #[arg(allow_negative_numbers = true)]
        lat: f64,
    },

    /// Geocode the incremental feed and load it into the warehouse
    Sfpd,

    /// Anything else; rejected with an error
    #[command(external_subcommand)]
    External(Vec<String>),
}

/// Warning for a `.env` load failure; an absent file is not one
pub fn dotenv_warning<T>(result: &dotenvy::Result<T>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(format!("Ignoring unreadable .env file: {}", e)),
        _ => None,
    }
}
