pub mod aggregate;
pub mod cli;
pub mod data;
pub mod forecast;
pub mod io_utils;
pub mod pivot;
pub mod profile;
pub mod reducer;
pub mod table;
pub mod view;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::{
    aggregate::{AggregatedPoint, Series, aggregate},
    data::{CellValue, Row, Sheet},
    forecast::{ForecastPoint, SplicedPoint, SplicedSeries, splice},
    pivot::{PivotTable, pivot},
    profile::{ColumnProfile, ColumnType, SheetProfile, profile_rows, profile_sheet},
    reducer::Reducer,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetlens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command: {:?}", cli.command);
    match cli.command {
        Commands::Profile(args) => profile::execute(&args),
        Commands::Aggregate(args) => aggregate::execute(&args),
        Commands::Pivot(args) => pivot::execute(&args),
        Commands::Splice(args) => forecast::execute(&args),
    }
}
