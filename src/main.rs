use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Builder;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use typoguard::cli::{Cli, Commands};
use typoguard::core::Analyzer;
use typoguard::domain::AuthenticDomain;
use typoguard::store::{summarize, BlacklistStore, JsonlStore};

fn main() -> Result<()> {
    // Lookups are I/O bound; a few threads beyond the core count help, capped at 16
    let num_cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let worker_threads = std::cmp::min(num_cpus + 2, 16);

    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.analysis_config().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);

    let store = JsonlStore::open(&cli.store)
        .await
        .with_context(|| format!("Failed to open blacklist store {}", cli.store.display()))?;
    let store: Arc<dyn BlacklistStore> = Arc::new(store);

    match &cli.command {
        Commands::Analyze { domain } => {
            let analyzer = Analyzer::new(config, store)?;
            let ticket = analyzer.submit(domain)?;
            info!("Analysis {} started for {}", ticket.run_id, ticket.domain);
            let report = ticket.wait().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Batch { input_file } => {
            let analyzer = Analyzer::new(config, store)?;
            let file = File::open(input_file)
                .await
                .with_context(|| format!("Failed to open domain file: {:?}", input_file))?;
            let mut lines = BufReader::with_capacity(64 * 1024, file).lines();
            let mut tickets = Vec::new();

            while let Some(line) = lines.next_line().await? {
                let domain = line.trim();
                if domain.is_empty() || domain.starts_with('#') {
                    continue;
                }
                match analyzer.submit(domain) {
                    Ok(ticket) => tickets.push(ticket),
                    Err(e) => error!("Skipping {}: {}", domain, e),
                }
            }

            info!("Submitted {} analyses", tickets.len());
            for ticket in tickets {
                let domain = ticket.domain.clone();
                match ticket.wait().await {
                    Ok(report) => println!("{}", serde_json::to_string(&report)?),
                    Err(e) => error!("Analysis of {} failed: {}", domain, e),
                }
            }
        }
        Commands::Generate { domain } => {
            let analyzer = Analyzer::new(config, store)?;
            let domain = AuthenticDomain::parse(domain)?;
            let (_, set) = analyzer.candidates(&domain).await?;
            for candidate in &set.candidates {
                println!("{}", candidate);
            }
            eprintln!(
                "Generated {} candidates ({} already known)",
                set.len(),
                set.known_skipped
            );
        }
        Commands::List { original } => {
            let original = original
                .as_deref()
                .map(AuthenticDomain::parse)
                .transpose()?;
            let entries = store
                .list_entries(original.as_ref().map(|o| o.as_str()))
                .await?;
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Commands::Stats => {
            let entries = store.list_entries(None).await?;
            println!("{}", serde_json::to_string_pretty(&summarize(&entries))?);
        }
    }

    Ok(())
}
