use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use customer_sync::{
    init_logging, load_incoming, CustomerSync, SqliteStore, SyncConfig,
};

fn main() -> Result<()> {
    let config = SyncConfig::discover()?;
    init_logging(&config.logging.filter);

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("sync") => match args.get(2) {
            Some(file) => run_sync(&config, Path::new(file)),
            None => usage(),
        },
        Some("list") => run_list(&config),
        Some("history") => match args.get(2) {
            Some(customer_id) => run_history(&config, customer_id),
            None => usage(),
        },
        _ => usage(),
    }
}

fn usage() -> Result<()> {
    eprintln!("customer-sync {}", customer_sync::VERSION);
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  customer-sync sync <incoming.json>   Create/update customers from a feed file");
    eprintln!("  customer-sync list                   Print every stored customer");
    eprintln!("  customer-sync history <customer-id>  Print the audit trail of a customer");
    std::process::exit(2);
}

fn open_store(config: &SyncConfig) -> Result<SqliteStore> {
    let store = SqliteStore::open(&config.database.path, config.database.wal)?;
    Ok(store.with_actor(&config.actor))
}

fn run_sync(config: &SyncConfig, file: &Path) -> Result<()> {
    let incoming = load_incoming(file)?;
    println!("📂 Loaded {} incoming customer(s) from {}", incoming.len(), file.display());

    let mut sync = CustomerSync::new(open_store(config)?);

    let mut created = 0;
    let mut updated = 0;
    let mut failed = 0;

    // Each record is its own sync; a rejected record does not stop the rest
    for customer in &incoming {
        match sync.sync_detailed(customer) {
            Ok(outcome) if outcome.created => {
                created += 1;
                println!("✓ Created {} ({})", customer.external_id, customer.name);
            }
            Ok(outcome) => {
                updated += 1;
                println!(
                    "✓ Updated {} ({}), {} duplicate(s)",
                    customer.external_id,
                    customer.name,
                    outcome.duplicates.len()
                );
            }
            Err(err) => {
                failed += 1;
                eprintln!("❌ {}: {}", customer.external_id, err);
            }
        }
    }

    println!("\nCreated: {}  Updated: {}  Failed: {}", created, updated, failed);

    if failed > 0 {
        bail!("{} of {} customer(s) failed to sync", failed, incoming.len());
    }

    Ok(())
}

fn run_list(config: &SyncConfig) -> Result<()> {
    let store = open_store(config)?;
    let customers = store.all_customers()?;

    for customer in &customers {
        println!("{}", customer);
    }
    println!("\n{} customer(s)", customers.len());

    Ok(())
}

fn run_history(config: &SyncConfig, customer_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let events = store.events_for(customer_id)?;

    if events.is_empty() {
        println!("No events for customer {}", customer_id);
        return Ok(());
    }

    for event in &events {
        println!(
            "{}  {:<18} {:<14} {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor,
            event.data
        );
    }

    Ok(())
}
