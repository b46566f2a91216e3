//! CLI entry point for the media automation engine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fetchbay_core::dispatcher::media_item_tag;
use fetchbay_core::model::ValueMap;
use fetchbay_core::plugin::PluginRegistry;
use fetchbay_core::{Catalog, Config, Dispatcher, Importer, Scheduler};
use tracing::{info, warn};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => fetchbay_core::config::load_from_path(path)?,
        None => fetchbay_core::config::load_default()?,
    };

    let catalog = if args.db_path.as_os_str() == ":memory:" {
        Catalog::new_in_memory().await?
    } else {
        Catalog::new(&args.db_path).await?
    };

    // Indexer/downloader plugins are loaded and wired up by an external
    // transport layer; this binary only drives the core pipeline against
    // whatever the registry holds at boot, so it starts empty here.
    let plugins = Arc::new(PluginRegistry::new());
    let importer = Importer::new(catalog.clone(), config.library.clone(), config.downloads.clone());
    let dispatcher = Arc::new(Dispatcher::new(
        catalog.clone(),
        Arc::clone(&plugins),
        importer,
        config.downloads.max_concurrent_downloads,
    ));

    match args.command {
        Command::Run { tick_interval_secs } => run(catalog, plugins, dispatcher, tick_interval_secs).await,
        Command::Search { media_item_id, minimum_seeders } => search(&catalog, plugins.as_ref(), media_item_id, minimum_seeders).await,
        Command::Grab { plugin_id, name, source, release_guid, media_item_id, quality_label } => {
            grab(dispatcher.as_ref(), &plugin_id, &name, &source, &release_guid, media_item_id, &quality_label).await
        }
        Command::Import { source_path, media_item_id, quality_label } => {
            import(&catalog, &config, &source_path, media_item_id, quality_label.as_deref()).await
        }
        Command::Monitor { media_item_id, profile_id, mode, search_interval_secs } => {
            monitor(catalog, plugins, dispatcher, media_item_id, profile_id, &mode, search_interval_secs).await
        }
        Command::Jobs => jobs(&catalog).await,
    }
}

/// Runs the scheduler and the dispatcher's own tick loop side by side until
/// interrupted with Ctrl-C.
async fn run(
    catalog: Catalog,
    plugins: Arc<PluginRegistry>,
    dispatcher: Arc<Dispatcher>,
    tick_interval_secs: u64,
) -> Result<()> {
    let tick_interval = Duration::from_secs(tick_interval_secs);
    let (mut scheduler, shutdown_tx) = Scheduler::new(catalog, plugins, Arc::clone(&dispatcher), tick_interval);

    let dispatch_loop = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            loop {
                if let Err(error) = dispatcher.dispatch_tick().await {
                    warn!(%error, "dispatch tick failed");
                }
                if let Err(error) = dispatcher.poll_tick().await {
                    warn!(%error, "poll tick failed");
                }
                if let Err(error) = dispatcher.import_tick().await {
                    warn!(%error, "import tick failed");
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        })
    };

    info!(tick_interval_secs, "fetchbay starting");

    tokio::select! {
        () = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received interrupt, shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    dispatch_loop.abort();
    Ok(())
}

async fn search(catalog: &Catalog, plugins: &PluginRegistry, media_item_id: i64, minimum_seeders: i64) -> Result<()> {
    let aggregator = fetchbay_core::aggregator::AggregateSearch::new(catalog, plugins);
    let result = aggregator.search(media_item_id, minimum_seeders).await?;
    info!(media_item_id, total = result.total, sources_ok = result.sources_ok, sources_failed = result.sources_failed, "search complete");
    if result.releases.is_empty() {
        info!(media_item_id, "no releases found");
        return Ok(());
    }
    for release in result.releases {
        println!(
            "{}\t{}\tseeders={}\tsize={}",
            release.guid,
            release.title,
            release.seeders.map_or_else(|| "?".to_string(), |seeders| seeders.to_string()),
            release.size_bytes.map_or_else(|| "?".to_string(), |size| size.to_string()),
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn grab(
    dispatcher: &Dispatcher,
    plugin_id: &str,
    name: &str,
    source: &str,
    release_guid: &str,
    media_item_id: i64,
    quality_label: &str,
) -> Result<()> {
    let metadata: ValueMap = media_item_tag(media_item_id, quality_label, None);
    let download_id = dispatcher.grab(plugin_id, name, source, release_guid, 0, metadata).await?;
    println!("queued download {download_id}");
    Ok(())
}

async fn import(
    catalog: &Catalog,
    config: &Config,
    source_path: &Path,
    media_item_id: i64,
    quality_label: Option<&str>,
) -> Result<()> {
    let importer = Importer::new(catalog.clone(), config.library.clone(), config.downloads.clone());
    let outcome = importer.import(source_path, media_item_id, quality_label).await?;
    println!("imported to {}", outcome.final_path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn monitor(
    catalog: Catalog,
    plugins: Arc<PluginRegistry>,
    dispatcher: Arc<Dispatcher>,
    media_item_id: i64,
    profile_id: i64,
    mode: &str,
    search_interval_secs: i64,
) -> Result<()> {
    let rule_id = catalog.monitoring().create(media_item_id, profile_id, mode, search_interval_secs).await?;
    println!("created monitoring rule {rule_id}");
    let tick_interval = Duration::from_secs(u64::try_from(search_interval_secs).unwrap_or(300));
    let (scheduler, _shutdown_tx) = Scheduler::new(catalog, plugins, dispatcher, tick_interval);
    scheduler.search_on_add(media_item_id).await?;
    Ok(())
}

async fn jobs(catalog: &Catalog) -> Result<()> {
    match catalog.scheduler().get("monitored_search").await? {
        Some(job) => println!(
            "{}\tlast_run={}\tconsecutive_failures={}",
            job.name,
            job.last_run_at.as_deref().unwrap_or("never"),
            job.consecutive_failures
        ),
        None => println!("monitored_search job has not run yet"),
    }
    Ok(())
}
