// Customer Sync - Core Library
// Reconciles incoming feed records against the customer store.
// Exposes the sync pipeline, its collaborators and store implementations.

pub mod config;
pub mod deduplication;  // Duplicate Propagator
pub mod entities;
pub mod error;
pub mod matching;       // Matcher
pub mod reconciliation; // Reconciler
pub mod store;
pub mod sync;
pub mod validation;

// Re-export commonly used types
pub use config::SyncConfig;
pub use deduplication::DuplicatePropagator;
pub use entities::{
    load_incoming, parse_incoming, Address, CustomerKey, CustomerRecord, CustomerType,
    IncomingCustomer, ShoppingList,
};
pub use error::{SyncError, SyncResult, Violation};
pub use matching::{MatchResult, MatchTerm, Matcher};
pub use reconciliation::Reconciler;
pub use store::{Event, InMemoryStore, RecordStore, SqliteStore};
pub use sync::{CustomerSync, SyncOutcome};
pub use validation::{RequiredFieldValidator, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber.
///
/// RUST_LOG wins over `default_filter` when set.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
