//! Migration Estimator
//!
//! Prices a discovered Azure inventory against AWS list prices and prints a
//! monthly cost estimate. Pricing data comes from the live retail APIs when
//! reachable, from the local cache when fresh, and from built-in tables
//! otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_pricing::{
    load_inventory, AnalysisRequest, EstimationPipeline, PricingResolver, PricingSource,
    SkuMapping, StatusTracker,
};
use eyre::{Result, WrapErr};
use rust_decimal::Decimal;
use tracing::{info, warn};

mod config;
mod report;

use config::Config;
use report::{render_cache_status, render_prices, render_report, OutputFormat};

#[derive(Parser)]
#[command(name = "migration-estimator")]
#[command(about = "Estimate the AWS monthly cost of an Azure inventory")]
struct Cli {
    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the monthly AWS cost of a discovered inventory
    Estimate {
        /// JSON array of discovered resources
        #[arg(short, long)]
        inventory: PathBuf,

        /// Negotiated commitment discount in percent (0-100). Defaults to DISCOUNT_PERCENT.
        #[arg(short, long)]
        discount: Option<Decimal>,

        /// JSON file of SKU mapping overrides. Defaults to SKU_OVERRIDES_PATH.
        #[arg(short, long)]
        overrides: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Also report totals in this currency (e.g. EUR)
        #[arg(short, long)]
        currency: Option<String>,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the resolved pricing catalog
    Prices {
        /// Bypass valid cache entries and fetch again
        #[arg(short, long)]
        refresh: bool,
    },

    /// Show cache freshness for each pricing source
    CacheStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    if let Err(e) = observability::init_metrics() {
        warn!(error = %e, "Metrics recorder unavailable");
    }

    let cli = Cli::parse();
    let resolver = Arc::new(PricingResolver::from_config(&config.pricing));

    match cli.command {
        Commands::Estimate {
            inventory,
            discount,
            overrides,
            format,
            currency,
            output,
        } => {
            let resources = load_inventory(&inventory)?;

            let overrides_path = overrides.or_else(|| config.pricing.sku_overrides_path.clone());
            let overrides = match overrides_path {
                Some(path) => SkuMapping::load_overrides(&path)?,
                None => Vec::new(),
            };

            let mut request = AnalysisRequest::new(resources)
                .with_discount(discount.unwrap_or(config.pricing.discount_percent))
                .with_overrides(overrides)
                .with_storage_gb(config.pricing.estimated_storage_gb);
            if let Some(code) = currency {
                request = request.with_currency(code);
            }

            let pipeline = EstimationPipeline::new(resolver, SkuMapping::with_defaults());
            let tracker = StatusTracker::new();
            info!(job_id = %tracker.job_id(), "Starting estimation");

            let report = pipeline.run(request, &tracker).await?;
            let rendered = render_report(&report, format)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .wrap_err_with(|| format!("writing report to {}", path.display()))?;
                    info!(path = %path.display(), "Report written");
                }
                None => println!("{rendered}"),
            }
        }

        Commands::Prices { refresh } => {
            let catalog = if refresh {
                resolver.refresh_catalog().await
            } else {
                resolver.resolve_catalog().await
            };
            print!("{}", render_prices(&catalog));
        }

        Commands::CacheStatus => {
            let rows: Vec<_> = PricingSource::ALL
                .iter()
                .map(|source| {
                    (
                        *source,
                        resolver
                            .cache()
                            .status(source.service_name(), resolver.cache_ttl()),
                    )
                })
                .collect();
            print!("{}", render_cache_status(&rows));
        }
    }

    if cli.metrics {
        eprintln!("{}", observability::render_metrics());
    }

    Ok(())
}
