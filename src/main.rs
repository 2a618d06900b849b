use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use shelfcheck::browser::ChromeCatalog;
use shelfcheck::config::AppConfig;
use shelfcheck::driver::CatalogDriver;
use shelfcheck::matcher::{PaginatedMatcher, TraversalReport};
use shelfcheck::models::Filter;
use shelfcheck::scenario::Scenario;
use shelfcheck::screenshot::Screenshoter;

/// Applies a scenario's filters to a live catalog search page and verifies
/// every listed product against them, page by page.
#[derive(Parser, Debug)]
#[command(name = "shelfcheck", version, about)]
struct Args {
    /// Path to the scenario file to run
    #[arg(long, default_value = "scenarios/smartphones.toml")]
    scenario: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelfcheck=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;
    let scenario = Scenario::load(&args.scenario)?;

    info!(
        url = %scenario.url,
        filters = scenario.filters.len(),
        "starting catalog filter check"
    );

    let mut catalog = ChromeCatalog::new(&config)?;
    catalog.open(&scenario.url).await?;
    if let (Some(section), Some(item)) = (&scenario.catalog_section, &scenario.catalog_item) {
        catalog.open_catalog_section(section, item).await?;
    }
    if let Some(query) = &scenario.search {
        catalog.search(query).await?;
    }

    let budget = Duration::from_secs(config.check.pagination_budget_minutes * 60);
    let mut matcher = PaginatedMatcher::new(catalog, budget);
    let screenshoter = Screenshoter::new(&config.screenshots);

    match run_check(&mut matcher, &scenario.filters).await {
        Ok(report) => {
            info!(
                pages = report.pages_scanned,
                products = report.products_checked,
                "all products match the active filters"
            );
            Ok(())
        }
        Err(err) => {
            error!(%err, "catalog filter check failed");
            match matcher.driver_mut().screenshot().await {
                Ok(png) => {
                    if let Some(path) = screenshoter.save(&png)? {
                        info!(path = %path.display(), "failure screenshot saved");
                    }
                }
                Err(shot_err) => error!(%shot_err, "could not capture failure screenshot"),
            }
            Err(err.into())
        }
    }
}

async fn run_check(
    matcher: &mut PaginatedMatcher<ChromeCatalog>,
    filters: &[Filter],
) -> shelfcheck::Result<TraversalReport> {
    matcher.apply_filters(filters).await?;
    matcher.verify_all_pages(filters).await
}
