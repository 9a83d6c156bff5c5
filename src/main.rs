use anyhow::{bail, Result};
use clap::Parser;
use tracing::{debug, info};

use poi_catalog::pipeline::{
    self, REVIEW_DELAY_MS, REVIEW_MAX_REQUESTS, SEED_DELAY_MS, SEED_MAX_REQUESTS,
};
use poi_catalog::{
    init_tracing, AppConfig, DataPaths, HttpJsonFetcher, MergeMode, PlacesClient, RequestBudget,
    RunReport,
};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_directives());

    let config = AppConfig::from_env();
    debug!(?args, config = ?config.public_profile(), "starting");
    let paths = DataPaths::from_config(&config);

    let report = match args.command {
        Command::OpenData { mode } => {
            let fetcher = HttpJsonFetcher::new(None)?;
            pipeline::run_open_data(&fetcher, &config.open_data_url, &paths, mode.into()).await?
        }
        Command::SeedGoogle { mode } => {
            let mode = mode.map(MergeMode::from).unwrap_or(config.merge_mode);
            let client = PlacesClient::from_config(&config, SEED_DELAY_MS)?;
            let budget = RequestBudget::new(config.max_requests.unwrap_or(SEED_MAX_REQUESTS));
            pipeline::run_google_seed(&client, &budget, &config.place_queries, &paths, mode)
                .await?
        }
        Command::EnrichReviews { no_merge } => {
            let client = PlacesClient::from_config(&config, REVIEW_DELAY_MS)?;
            let budget = RequestBudget::new(config.max_requests.unwrap_or(REVIEW_MAX_REQUESTS));
            pipeline::run_review_enrichment(
                &client,
                &budget,
                &paths,
                config.use_review_model,
                config.merge_to_db && !no_merge,
            )
            .await?
        }
        Command::MergeTags => pipeline::run_merge_tags(&paths)?,
        Command::MergeRatings => pipeline::run_merge_ratings(&paths)?,
    };

    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    info!(
        run = report.run,
        collected = report.collected,
        updated = report.updated,
        total = report.total,
        requests = report.requests_used,
        stop = ?report.stop,
        "run finished"
    );
    if report.quota_exceeded() {
        bail!("{} stopped on an exhausted API quota; partial results were saved", report.run);
    }
    Ok(())
}
