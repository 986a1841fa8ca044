//! Dataset marketplace command line

mod cli;
mod console;
mod logging;

use anyhow::Context;
use clap::Parser;
use datamarket_config::{validate_config, ConfigLoader, ENV_PREFIX};
use datamarket_ledger::JsonRpcLedgerClient;
use datamarket_marketplace::{AutoConfirm, Confirmer, MarketplaceSession, RegisterRequest};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Args, Command};
use crate::console::{ConsoleConfirmer, ConsoleSigner, DotProgress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::from_file_with_env(&args.config, ENV_PREFIX)
        .with_context(|| format!("loading {}", args.config.display()))?;
    validate_config(&config)?;
    logging::init(&config.network.log_level, args.log_json)?;

    let addresses_path = args
        .addresses
        .clone()
        .unwrap_or_else(|| config.addresses.path.clone());
    let addresses = ConfigLoader::load_addresses(&addresses_path)?;

    let ledger = JsonRpcLedgerClient::new(
        &config.ledger.rpc_url,
        Duration::from_millis(config.ledger.timeout_ms),
        config.ledger.max_retries,
    )?;
    let session = MarketplaceSession::from_config(
        &config,
        addresses,
        Arc::new(ledger),
        Arc::new(ConsoleSigner),
        Arc::new(DotProgress),
    )?;

    tracing::info!(
        environment = ?config.network.environment,
        rpc_url = %config.ledger.rpc_url,
        "Starting"
    );

    if let Err(e) = run(&session, args.command).await {
        if let Some(hash) = e.tx_hash() {
            let link = session.network().explorer_link(hash.as_str());
            tracing::error!(tx_hash = %hash, url = ?link, "Transaction needs manual inspection");
        }
        return Err(e.into());
    }
    Ok(())
}

async fn run(
    session: &MarketplaceSession,
    command: Command,
) -> Result<(), datamarket_marketplace::MarketplaceError> {
    match command {
        Command::List => {
            for dataset in session.list().await? {
                println!("{}", dataset);
            }
        }

        Command::Subscribe {
            dataset,
            address,
            yes,
        } => {
            let confirmer: &dyn Confirmer = if yes { &AutoConfirm } else { &ConsoleConfirmer };
            let outcome = session.subscribe(&dataset, address, confirmer).await?;
            println!("Subscribed {} to {}", outcome.address, outcome.dataset);
            println!("  approval:     {}", outcome.approval);
            println!("  subscription: {}", outcome.subscription);
        }

        Command::Ingest { dataset, address } => {
            let report = session.ingest(&dataset, address).await?;
            for part in &report.parts {
                println!("{} -> {}", part.file_name, part.outcome.bundle().display());
            }
            println!("Ingested {} part(s) of {}", report.parts.len(), report.dataset);
        }

        Command::Register {
            dataset,
            price,
            frequency,
            description,
            history,
            live,
            address,
        } => {
            let request = RegisterRequest {
                dataset,
                description,
                monthly_price: price,
                frequency,
                has_history: history,
                has_live: live,
            };
            let outcome = session.register(&request, address).await?;
            println!(
                "Registered {} owned by {} in {}",
                outcome.dataset, outcome.owner, outcome.tx_hash
            );
        }

        Command::Publish { dataset, dir } => {
            let outcome = session.publish(&dataset, &dir).await?;
            println!("Uploaded {} file(s) to {}", outcome.files.len(), outcome.dataset);
        }

        Command::Clean { dataset, frequency } => {
            if session.clean(&dataset, frequency).await? {
                println!("Removed local data for {}", dataset);
            } else {
                println!("No local data for {}", dataset);
            }
        }

        Command::Show {
            dataset,
            frequency,
            start,
        } => {
            let start = start
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|datetime| datetime.and_utc().timestamp());
            let bundle = session.show(&dataset, frequency, start).await?;

            println!("date\tsymbol\t{}", bundle.value_columns.join("\t"));
            for row in &bundle.rows {
                let values: Vec<String> = row
                    .values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                println!("{}\t{}\t{}", row.date, row.symbol, values.join("\t"));
            }
        }
    }
    Ok(())
}
