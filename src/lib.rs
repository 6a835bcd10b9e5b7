pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod io_utils;
pub mod report;
pub mod resolver;
pub mod sql;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    aggregate::{MarketBatch, SummaryStats},
    cli::{Cli, Commands, RunArgs},
    config::PipelineConfig,
    dataset::LoadOptions,
    sql::UpsertOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("metro_rents", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => handle_process(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Markets(args) => handle_markets(&args),
        Commands::Config(args) => {
            PipelineConfig::default().save(&args.output)?;
            info!("Default configuration written to {:?}", args.output);
            Ok(())
        }
    }
}

/// Outcome of resolving one dataset for one target month.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub config: PipelineConfig,
    pub target: NaiveDate,
    pub batch: MarketBatch,
    pub summary: SummaryStats,
}

/// Merges the configuration file (if any) with command-line overrides.
pub fn resolve_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(target) = args.target_month {
        config.target_month = Some(target);
    }
    if let Some(lookback) = args.max_lookback {
        config.max_lookback_months = usize::from(lookback);
    }
    if let Some(region_type) = &args.region_type {
        config.region_type =
            (!region_type.eq_ignore_ascii_case("all")).then(|| region_type.clone());
    }
    if let Some(anchor) = args.yoy_anchor {
        config.yoy_anchor = anchor;
    }
    if let Some(top) = args.top {
        config.top_n = top;
    }
    config.validate()?;
    Ok(config)
}

/// Loads the dataset and resolves every market with an explicit configuration.
pub fn run_pipeline(
    input: &Path,
    config: PipelineConfig,
    delimiter: Option<u8>,
    input_encoding: Option<&str>,
) -> Result<PipelineRun> {
    let options = LoadOptions {
        delimiter: io_utils::resolve_input_delimiter(input, delimiter),
        encoding: io_utils::resolve_encoding(input_encoding)?,
        region_type: config.region_type.clone(),
    };
    info!(
        "Reading '{}' (delimiter '{}')",
        input.display(),
        printable_delimiter(options.delimiter)
    );
    let dataset = dataset::load_dataset(input, &options)
        .with_context(|| format!("Loading dataset {input:?}"))?;
    info!(
        "Found {} {} record(s) of {} read",
        dataset.rows.len(),
        config.region_type.as_deref().unwrap_or("region"),
        dataset.records_read
    );

    let target = match config.target_month {
        Some(target) => target,
        None => dataset
            .latest_date()
            .ok_or_else(|| anyhow!("Dataset has no month columns to target"))?,
    };
    info!(
        "Processing rental data for target month {target} (lookback {} month(s), {:?} YOY anchor)",
        config.max_lookback_months, config.yoy_anchor
    );

    let batch = aggregate::process_markets(&dataset.rows, &config.resolve_options(target));
    info!(
        "Processed {} market(s) with valid data; skipped {}",
        batch.results.len(),
        batch.skipped.len()
    );
    let summary = aggregate::summarize(&batch.results, config.top_n);
    Ok(PipelineRun {
        config,
        target,
        batch,
        summary,
    })
}

fn run_from_args(args: &RunArgs) -> Result<PipelineRun> {
    let config = resolve_config(args)?;
    debug!("Effective configuration: {config:?}");
    run_pipeline(
        &args.input,
        config,
        args.delimiter,
        args.input_encoding.as_deref(),
    )
}

fn handle_process(args: &cli::ProcessArgs) -> Result<()> {
    let mut config = resolve_config(&args.run)?;
    if let Some(table) = &args.table {
        config.table = table.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;
    let run = run_pipeline(
        &args.run.input,
        config,
        args.run.delimiter,
        args.run.input_encoding.as_deref(),
    )?;

    let upsert = UpsertOptions {
        table: run.config.table.clone(),
        batch_size: run.config.batch_size,
        generated_at: (!args.omit_timestamp)
            .then(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        target: run.target,
    };
    let sql = sql::render_upsert(&run.batch.results, &upsert);
    let summary = report::render_summary(&run.summary);

    let stem = run.target.format("%Y_%m_%d");
    let sql_path = args
        .sql_output
        .clone()
        .unwrap_or_else(|| args.output_dir.join(format!("rental_data_upsert_{stem}.sql")));
    let summary_path = args
        .summary_output
        .clone()
        .unwrap_or_else(|| args.output_dir.join(format!("rental_data_summary_{stem}.txt")));

    io_utils::write_text(&sql_path, &sql)?;
    io_utils::write_text(&summary_path, &summary)?;
    if let Some(json_path) = &args.results_json {
        write_results_json(json_path, &run)?;
    }

    if !io_utils::is_dash(&sql_path) && !io_utils::is_dash(&summary_path) {
        println!("{summary}");
    }
    info!("SQL written to {}", describe_path(&sql_path));
    info!("Summary written to {}", describe_path(&summary_path));
    Ok(())
}

fn handle_summary(args: &RunArgs) -> Result<()> {
    let run = run_from_args(args)?;
    println!("{}", report::render_summary(&run.summary));
    Ok(())
}

fn handle_markets(args: &cli::MarketsArgs) -> Result<()> {
    let run = run_from_args(&args.run)?;
    let shown = args
        .limit
        .map_or(run.batch.results.len(), |limit| limit.min(run.batch.results.len()));
    print!("{}", report::render_market_table(&run.batch.results[..shown]));
    info!(
        "Displayed {shown} of {} market(s) for {}",
        run.batch.results.len(),
        run.target
    );
    Ok(())
}

fn write_results_json(path: &Path, run: &PipelineRun) -> Result<()> {
    let json = serde_json::to_string_pretty(&run.batch.results)
        .context("Serializing market results")?;
    io_utils::write_text(path, &json)?;
    info!("Results JSON written to {}", describe_path(path));
    Ok(())
}

fn describe_path(path: &Path) -> String {
    if io_utils::is_dash(path) {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
