//! Batch matching driver: provider catalog CSV + needs CSV in, JSON lines out.

use anyhow::{Context, Result};
use clap::Parser;
use presta_match::catalog::{self, Catalog};
use presta_match::config::Config;
use presta_match::embeddings::create_embedder;
use presta_match::geo::{GeoImpact, GeoResolver};
use presta_match::matcher::{MatchOptions, Matcher, Request};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "match_needs",
    about = "Match service needs against a provider catalog"
)]
struct Args {
    /// Provider catalog CSV
    #[arg(long)]
    providers: PathBuf,

    /// Needs CSV to match in batch
    #[arg(long, conflicts_with = "message")]
    needs: Option<PathBuf>,

    /// Single free-text request instead of a needs file
    #[arg(long)]
    message: Option<String>,

    /// Maximum number of results per need (capped at 3)
    #[arg(long)]
    top_k: Option<usize>,

    /// Minimum final score
    #[arg(long)]
    threshold: Option<f32>,

    /// Disable the expertise-domain pre-filter
    #[arg(long)]
    no_domain_filter: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    presta_match::load_env();
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.runtime.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let catalog = Catalog::from_csv_path(&args.providers)?;
    let embedder = create_embedder(&config.embedding())?;
    let matcher = Matcher::new(catalog, embedder, GeoResolver::default(), &config).await?;

    let mut opts = MatchOptions::from_config(&config);
    if let Some(top_k) = args.top_k {
        opts.top_k = top_k;
    }
    if let Some(threshold) = args.threshold {
        opts.threshold = threshold;
    }
    if args.no_domain_filter {
        opts.apply_domain_filter = false;
    }

    if let Some(message) = args.message {
        let request = Request::from_text(message);
        let results = matcher.find_matches(&request, &opts).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let needs_path = args
        .needs
        .context("either --needs or --message is required")?;
    let needs = catalog::needs_from_csv_path(&needs_path)?;
    let default_impact = GeoImpact::try_from(config.matching.default_impact_geo)?;

    let mut requests = Vec::with_capacity(needs.len());
    for record in &needs {
        let mut request = Request::try_from(record)?;
        if request.impact_geo.is_none() {
            request.impact_geo = Some(default_impact);
        }
        requests.push(request);
    }

    let all = matcher.batch_match(&requests, &opts).await;
    for (record, results) in needs.iter().zip(&all) {
        let line = serde_json::json!({
            "message": record.message,
            "sous_categorie": record.sub_category,
            "matches": results,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}
