//! Pyth Index Monitor
//!
//! Manages named baskets of Pyth price accounts stored by the index program
//! and charts the rolling average price of a basket.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pyth_indexer::{
    aggregator::AggregatorConfig,
    catalog,
    config::{Cluster, Config},
    IndexRegistry, MonitorSession, OracleReader, PriceUpdate, PythFeed,
};
use solana_sdk::pubkey::Pubkey;

#[derive(Parser)]
#[command(name = "pyth-indexer")]
#[command(about = "Compose and track custom indices of Pyth price feeds")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $INDEXER_CONFIG or indexer-config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List selectable assets
    Catalog,
    /// Create the storage account for baskets
    Init,
    /// Store a named basket of catalog symbols
    Save {
        name: String,
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Delete a stored basket
    Delete { name: String },
    /// Show stored baskets
    List,
    /// Sample oracle prices for a stored basket until Ctrl-C
    Monitor {
        name: String,
        /// Write the recorded series as JSON on exit
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the current price of a Pyth price account
    Price { account: String },
    /// List the products of a Pyth mapping account
    Mapping { account: String },
    /// Write a default config file
    WriteConfig {
        #[arg(default_value = "indexer-config.toml")]
        path: String,
        #[arg(long, value_enum, default_value = "devnet")]
        cluster: ClusterArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ClusterArg {
    Devnet,
    Localnet,
}

impl From<ClusterArg> for Cluster {
    fn from(arg: ClusterArg) -> Self {
        match arg {
            ClusterArg::Devnet => Cluster::Devnet,
            ClusterArg::Localnet => Cluster::Localnet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Load configuration
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default devnet config", e);
        Config::default_devnet()
    });

    match cli.command {
        Commands::Catalog => {
            for asset in catalog::ASSETS {
                println!("{:<18} {}", asset.symbol, asset.account);
            }
        }
        Commands::Init => {
            let mut registry = IndexRegistry::for_init(&config)?;
            registry
                .initialize_storage()
                .await
                .context("Failed to initialize storage account")?;
            print_baskets(&registry);
        }
        Commands::Save { name, symbols } => {
            let account_ids = catalog::resolve(&symbols)?;
            let mut registry = IndexRegistry::from_config(&config)?;
            registry
                .save_basket(&name, &account_ids)
                .await
                .context(format!("Failed to save basket '{}'", name))?;
            print_baskets(&registry);
        }
        Commands::Delete { name } => {
            let mut registry = IndexRegistry::from_config(&config)?;
            registry
                .delete_basket(&name)
                .await
                .context(format!("Failed to delete basket '{}'", name))?;
            print_baskets(&registry);
        }
        Commands::List => {
            let mut registry = IndexRegistry::from_config(&config)?;
            registry.refresh().await.context("Failed to fetch baskets")?;
            print_baskets(&registry);
        }
        Commands::Monitor { name, output } => {
            run_monitor(&config, &name, output.as_deref()).await?;
        }
        Commands::Price { account } => {
            let account_id = parse_account(&account)?;
            let update = OracleReader::from_config(&config)
                .fetch_price(account_id)
                .await
                .context(format!("Failed to read price account {}", account_id))?;
            print_price(&update);
        }
        Commands::Mapping { account } => {
            let mapping = parse_account(&account)?;
            let listings = OracleReader::from_config(&config)
                .fetch_products(mapping)
                .await
                .context(format!("Failed to read mapping account {}", mapping))?;

            for listing in &listings {
                println!(
                    "{:<24} product {}  price {}",
                    listing.product.symbol.as_deref().unwrap_or("?"),
                    listing.product.product_account,
                    listing.price_account
                );
            }
            println!("{} products", listings.len());
        }
        Commands::WriteConfig { path, cluster } => {
            Config::write_default(&path, cluster.into())?;
        }
    }

    Ok(())
}

async fn run_monitor(config: &Config, name: &str, output: Option<&str>) -> Result<()> {
    log::info!("Connected to RPC: {}", config.rpc_url);
    log::info!("Index program: {}", config.index_program);

    let mut registry = IndexRegistry::from_config(config)?;
    registry.refresh().await.context("Failed to fetch baskets")?;

    let basket = registry
        .find_cached(name)
        .with_context(|| format!("No basket named '{}' in storage", name))?
        .clone();

    // Watch the whole catalog; the aggregator keeps only basket members
    let feed = PythFeed::new(config.ws_url.clone(), catalog::all_accounts()?);
    let aggregator_config = AggregatorConfig::from_config(config, basket.account_ids);
    let session = MonitorSession::new(name, aggregator_config, feed)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let series = session.run(shutdown).await;

    if let Some(path) = output {
        series.save_json(path)?;
    }

    Ok(())
}

fn parse_account(account: &str) -> Result<Pubkey> {
    account
        .parse()
        .with_context(|| format!("Invalid account address '{}'", account))
}

fn print_price(update: &PriceUpdate) {
    let sample = &update.sample;
    let symbol = update.product.symbol.as_deref().unwrap_or("?");
    match (sample.price, sample.confidence) {
        (Some(price), Some(conf)) => {
            println!("{} {}: {:.4} ± {:.4}", symbol, sample.account_id, price, conf)
        }
        _ => println!("{} {}: no current price", symbol, sample.account_id),
    }
    println!("  product {}", update.product.product_account);
}

fn print_baskets(registry: &IndexRegistry) {
    if registry.cached().is_empty() {
        println!("No baskets stored in {}", registry.storage_account());
        return;
    }

    for basket in registry.cached() {
        println!("{}", basket.name);
        for id in &basket.account_ids {
            println!("  {:<18} {}", catalog::symbol_for(id).unwrap_or("?"), id);
        }
    }
}
