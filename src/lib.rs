pub mod align;
pub mod analyze;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod frequency;
pub mod ingest;
pub mod io_utils;
pub mod join;
pub mod normalize;
pub mod predictors;
pub mod report;
pub mod stump;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("mapping_miner", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze::execute(&args),
        Commands::Align(args) => align::execute(&args),
        Commands::Profile(args) => predictors::execute(&args),
    }
}
