// 🔄 Customer Sync - validate → match → reconcile → propagate
//
// One incoming record per call, single-threaded. Every rejection is raised
// before the first store write; the primary is always persisted before any
// duplicate is touched.

use crate::deduplication::DuplicatePropagator;
use crate::entities::{CustomerRecord, IncomingCustomer};
use crate::error::{SyncError, SyncResult};
use crate::matching::{MatchResult, MatchTerm, Matcher};
use crate::reconciliation::Reconciler;
use crate::store::RecordStore;
use crate::validation::{RequiredFieldValidator, Validator};
use serde::Serialize;
use tracing::{info, warn};

/// What a single sync did
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// The persisted primary record
    pub record: CustomerRecord,

    /// True if `record` was newly created
    pub created: bool,

    pub term: MatchTerm,

    /// Duplicates whose name was updated, in discovery order
    pub duplicates: Vec<CustomerRecord>,
}

pub struct CustomerSync<S: RecordStore, V: Validator = RequiredFieldValidator> {
    store: S,
    validator: V,
}

impl<S: RecordStore> CustomerSync<S> {
    pub fn new(store: S) -> Self {
        CustomerSync {
            store,
            validator: RequiredFieldValidator::new(),
        }
    }
}

impl<S: RecordStore, V: Validator> CustomerSync<S, V> {
    pub fn with_validator(store: S, validator: V) -> Self {
        CustomerSync { store, validator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create or update the customer for `incoming`.
    ///
    /// Returns true if a new record was created, false if one was updated.
    pub fn sync(&mut self, incoming: &IncomingCustomer) -> SyncResult<bool> {
        Ok(self.sync_detailed(incoming)?.created)
    }

    pub fn sync_detailed(&mut self, incoming: &IncomingCustomer) -> SyncResult<SyncOutcome> {
        info!(
            external_id = %incoming.external_id,
            company = incoming.is_company(),
            "Customer sync started"
        );

        let result = self.validate(incoming).and_then(|()| self.apply(incoming));

        match &result {
            Ok(outcome) => info!(
                external_id = %incoming.external_id,
                created = outcome.created,
                duplicates = outcome.duplicates.len(),
                "Finished customer sync"
            ),
            Err(err) if err.is_rejection() => warn!(
                external_id = %incoming.external_id,
                error = %err,
                "Customer sync rejected"
            ),
            Err(err) => warn!(
                external_id = %incoming.external_id,
                error = %err,
                "Customer sync failed"
            ),
        }

        result
    }

    fn validate(&self, incoming: &IncomingCustomer) -> SyncResult<()> {
        let violations = self.validator.validate(incoming);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Validation(violations))
        }
    }

    fn apply(&mut self, incoming: &IncomingCustomer) -> SyncResult<SyncOutcome> {
        let MatchResult {
            primary,
            duplicates,
            term,
        } = Matcher::new(&self.store).find(incoming)?;

        let (record, created) = Reconciler::new(&mut self.store).reconcile(incoming, primary)?;
        let duplicates = DuplicatePropagator::new(&mut self.store).propagate(incoming, duplicates)?;

        Ok(SyncOutcome {
            record,
            created,
            term,
            duplicates,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Address, CustomerType, ShoppingList};
    use crate::store::{InMemoryStore, SqliteStore};
    use anyhow::Result;
    use std::cell::Cell;
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Opt into pipeline logs with RUST_LOG=debug
    fn init_test_logging() {
        INIT.call_once(|| {
            if std::env::var("RUST_LOG").is_ok() {
                tracing_subscriber::fmt()
                    .with_test_writer()
                    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                    .try_init()
                    .ok();
            }
        });
    }

    /// Wraps a store; counts lookups and logs writes in call order
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryStore,
        reads: Cell<usize>,
        writes: Vec<String>,
    }

    impl RecordStore for CountingStore {
        fn find_by_external_id(&self, id: &str) -> Result<Option<CustomerRecord>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.find_by_external_id(id)
        }

        fn find_by_master_external_id(&self, id: &str) -> Result<Option<CustomerRecord>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.find_by_master_external_id(id)
        }

        fn find_by_company_number(&self, number: &str) -> Result<Option<CustomerRecord>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.find_by_company_number(number)
        }

        fn create(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
            self.writes.push("create".to_string());
            self.inner.create(record)
        }

        fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
            let id = record.id.clone().unwrap_or_default();
            self.writes.push(format!("update {}", id));
            self.inner.update(record)
        }
    }

    fn create_external_company() -> IncomingCustomer {
        IncomingCustomer {
            external_id: "12345".to_string(),
            name: "Acme Inc.".to_string(),
            company_number: Some("470813-8895".to_string()),
            address: Some(Address::new("123 main st", "Helsingborg", "SE-123 45")),
            shopping_lists: vec![ShoppingList::new(["lipstick", "blusher"])],
            ..Default::default()
        }
    }

    fn create_external_person() -> IncomingCustomer {
        IncomingCustomer {
            external_id: "12345".to_string(),
            name: "Joe Bloggs".to_string(),
            address: Some(Address::new("123 main st", "Stockholm", "SE-123 45")),
            preferred_store: Some("Nordstan".to_string()),
            bonus_points: 50,
            shopping_lists: vec![ShoppingList::new(["lipstick", "foundation"])],
            ..Default::default()
        }
    }

    fn company_with_same_number(incoming: &IncomingCustomer) -> CustomerRecord {
        let mut record = CustomerRecord::new(CustomerType::Company);
        record.id = Some("45435".to_string());
        record.company_number = incoming.company_number.clone();
        record
    }

    #[test]
    fn test_sync_new_company_customer() {
        init_test_logging();
        let mut sync = CustomerSync::new(InMemoryStore::new());

        let created = sync.sync(&create_external_company()).unwrap();

        assert!(created);
        let stored = &sync.store().all()[0];
        assert_eq!(stored.external_id.as_deref(), Some("12345"));
        assert_eq!(stored.master_external_id.as_deref(), Some("12345"));
        assert_eq!(stored.customer_type, CustomerType::Company);
        assert_eq!(stored.company_number.as_deref(), Some("470813-8895"));
    }

    #[test]
    fn test_sync_new_private_customer() {
        let mut sync = CustomerSync::new(InMemoryStore::new());

        let created = sync.sync(&create_external_person()).unwrap();

        assert!(created);
        let stored = &sync.store().all()[0];
        assert_eq!(stored.customer_type, CustomerType::Person);
        assert_eq!(stored.bonus_points, 50);
        assert_eq!(stored.company_number, None);
    }

    #[test]
    fn test_sync_company_by_external_id() {
        let incoming = create_external_company();
        let mut existing = company_with_same_number(&incoming);
        existing.external_id = Some("12345".to_string());

        let mut store = InMemoryStore::new();
        store.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let created = sync.sync(&incoming).unwrap();

        assert!(!created);
        assert_eq!(sync.store().len(), 1);
        let stored = sync.store().get("45435").unwrap();
        assert_eq!(stored.name, "Acme Inc.");
        assert_eq!(stored.shopping_lists, incoming.shopping_lists);
    }

    #[test]
    fn test_sync_private_person_by_external_id() {
        let mut existing = CustomerRecord::new(CustomerType::Person);
        existing.id = Some("67576".to_string());
        existing.external_id = Some("12345".to_string());

        let mut store = InMemoryStore::new();
        store.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let outcome = sync.sync_detailed(&create_external_person()).unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.term, MatchTerm::ByExternalId);
        assert_eq!(outcome.record.id.as_deref(), Some("67576"));
        assert_eq!(outcome.record.name, "Joe Bloggs");
        assert_eq!(outcome.record.bonus_points, 50);
    }

    #[test]
    fn test_sync_shopping_lists_replaced_wholesale() {
        let mut sync = CustomerSync::new(InMemoryStore::new());
        let mut incoming = create_external_company();
        incoming.shopping_lists = vec![ShoppingList::new(["A"]), ShoppingList::new(["B"])];
        sync.sync(&incoming).unwrap();

        incoming.shopping_lists = vec![ShoppingList::new(["C"])];
        let created = sync.sync(&incoming).unwrap();

        assert!(!created);
        assert_eq!(sync.store().all()[0].shopping_lists, vec![ShoppingList::new(["C"])]);
    }

    #[test]
    fn test_sync_by_external_id_but_company_numbers_conflict() {
        init_test_logging();
        let incoming = create_external_company();
        let mut existing = company_with_same_number(&incoming);
        existing.external_id = Some("12345".to_string());
        existing.company_number = Some("000-3234".to_string());
        existing.name = "Old Acme".to_string();

        let mut store = InMemoryStore::new();
        store.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let outcome = sync.sync_detailed(&incoming).unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(sync.store().len(), 2);

        // The old record keeps its company number but takes the new name
        let old = sync.store().get("45435").unwrap();
        assert_eq!(old.name, "Acme Inc.");
        assert_eq!(old.company_number.as_deref(), Some("000-3234"));

        assert_ne!(outcome.record.id.as_deref(), Some("45435"));
        assert_eq!(outcome.record.company_number.as_deref(), Some("470813-8895"));
        assert_eq!(outcome.record.master_external_id.as_deref(), Some("12345"));
    }

    #[test]
    fn test_primary_persisted_before_duplicates() {
        let incoming = create_external_company();
        let mut existing = company_with_same_number(&incoming);
        existing.external_id = Some("12345".to_string());
        existing.company_number = Some("000-3234".to_string());

        let mut store = CountingStore::default();
        store.inner.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        assert!(sync.sync(&incoming).unwrap());
        assert_eq!(sync.store().writes, vec!["create", "update 45435"]);
    }

    #[test]
    fn test_sync_by_company_number() {
        let mut incoming = create_external_company();
        incoming.company_number = Some("12345".to_string());
        let mut existing = company_with_same_number(&incoming);
        existing.shopping_lists = vec![ShoppingList::new(["eyeliner", "mascara", "blue bombe eyeshadow"])];

        let mut store = InMemoryStore::new();
        store.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let outcome = sync.sync_detailed(&incoming).unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.term, MatchTerm::ByCompanyNumber);
        let stored = sync.store().get("45435").unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("12345"));
        assert_eq!(stored.master_external_id.as_deref(), Some("12345"));
        assert_eq!(stored.shopping_lists, incoming.shopping_lists);
    }

    #[test]
    fn test_sync_by_company_number_with_conflicting_external_id() {
        let mut incoming = create_external_company();
        incoming.company_number = Some("12345".to_string());
        incoming.external_id = "45646".to_string();
        let mut existing = company_with_same_number(&incoming);
        existing.external_id = Some("conflicting id".to_string());

        let mut store = CountingStore::default();
        store.inner.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let err = sync.sync(&incoming).unwrap_err();

        assert!(matches!(err, SyncError::ExternalIdConflict { .. }));
        assert!(sync.store().writes.is_empty());
        assert_eq!(
            sync.store().inner.get("45435").unwrap().external_id.as_deref(),
            Some("conflicting id")
        );
    }

    #[test]
    fn test_wrong_customer_type_when_existing_is_person() {
        let mut existing = CustomerRecord::new(CustomerType::Person);
        existing.id = Some("45435".to_string());
        existing.external_id = Some("12345".to_string());

        let mut store = CountingStore::default();
        store.inner.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let err = sync.sync(&create_external_company()).unwrap_err();

        assert!(matches!(err, SyncError::TypeMismatch { .. }));
        assert!(sync.store().writes.is_empty());
    }

    #[test]
    fn test_wrong_customer_type_when_existing_is_company() {
        let mut existing = CustomerRecord::new(CustomerType::Company);
        existing.id = Some("45435".to_string());
        existing.external_id = Some("12345".to_string());
        existing.company_number = Some("32423-342".to_string());

        let mut store = CountingStore::default();
        store.inner.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let err = sync.sync(&create_external_person()).unwrap_err();

        assert!(matches!(err, SyncError::TypeMismatch { .. }));
        assert!(sync.store().writes.is_empty());
        assert_eq!(
            sync.store().inner.get("45435").unwrap().customer_type,
            CustomerType::Company
        );
    }

    #[test]
    fn test_sync_company_by_external_id_with_non_matching_master_id() {
        let incoming = create_external_company();
        let mut first = company_with_same_number(&incoming);
        first.external_id = Some("12345".to_string());
        first.name = "company 1".to_string();

        let mut second = CustomerRecord::new(CustomerType::Company);
        second.id = Some("45435234".to_string());
        second.company_number = incoming.company_number.clone();
        second.master_external_id = Some("12345".to_string());
        second.name = "company 2".to_string();

        let mut store = InMemoryStore::new();
        store.seed(first).unwrap();
        store.seed(second).unwrap();
        let mut sync = CustomerSync::new(store);

        let outcome = sync.sync_detailed(&incoming).unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.record.id.as_deref(), Some("45435"));
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(sync.store().get("45435").unwrap().name, "Acme Inc.");
        assert_eq!(sync.store().get("45435234").unwrap().name, "Acme Inc.");
        assert_eq!(sync.store().get("45435234").unwrap().external_id, None);
    }

    #[test]
    fn test_blank_name_fails_before_any_lookup() {
        let mut existing = CustomerRecord::new(CustomerType::Person);
        existing.id = Some("45435".to_string());
        existing.external_id = Some("12345".to_string());

        let mut store = CountingStore::default();
        store.inner.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        let mut incoming = create_external_company();
        incoming.name = String::new();
        let err = sync.sync(&incoming).unwrap_err();

        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(err.to_string(), "name must not be blank");
        assert_eq!(sync.store().reads.get(), 0);
        assert!(sync.store().writes.is_empty());
    }

    #[test]
    fn test_custom_validator_is_used() {
        struct RejectAll;

        impl Validator for RejectAll {
            fn validate(&self, _incoming: &IncomingCustomer) -> Vec<crate::error::Violation> {
                vec![crate::error::Violation::new("preferredStore", "is required")]
            }
        }

        let mut sync = CustomerSync::with_validator(InMemoryStore::new(), RejectAll);
        let err = sync.sync(&create_external_person()).unwrap_err();

        assert_eq!(err.to_string(), "preferredStore is required");
        assert!(sync.store().is_empty());
    }

    #[test]
    fn test_round_trip_second_sync_updates() {
        let mut sync = CustomerSync::new(InMemoryStore::new());
        let mut incoming = create_external_company();

        assert!(sync.sync(&incoming).unwrap());
        let first = sync.store().all()[0].clone();

        incoming.name = "Acme Corp".to_string();
        assert!(!sync.sync(&incoming).unwrap());

        let second = &sync.store().all()[0];
        assert_eq!(sync.store().len(), 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Acme Corp");
        assert_eq!(second.key(), first.key());
    }

    #[test]
    fn test_round_trip_after_demotion_is_stable() {
        let incoming = create_external_company();
        let mut existing = company_with_same_number(&incoming);
        existing.external_id = Some("12345".to_string());
        existing.company_number = Some("000-3234".to_string());

        let mut store = InMemoryStore::new();
        store.seed(existing).unwrap();
        let mut sync = CustomerSync::new(store);

        assert!(sync.sync(&incoming).unwrap());
        assert!(!sync.sync(&incoming).unwrap());
        assert_eq!(sync.store().len(), 2);
    }

    #[test]
    fn test_round_trip_against_sqlite() {
        init_test_logging();
        let mut sync = CustomerSync::new(SqliteStore::open_in_memory().unwrap());
        let mut incoming = create_external_company();

        assert!(sync.sync(&incoming).unwrap());

        incoming.name = "Acme Corp".to_string();
        incoming.shopping_lists = vec![ShoppingList::new(["C"])];
        assert!(!sync.sync(&incoming).unwrap());

        let all = sync.store().all_customers().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Acme Corp");
        assert_eq!(all[0].external_id.as_deref(), Some("12345"));
        assert_eq!(all[0].master_external_id.as_deref(), Some("12345"));
        assert_eq!(all[0].company_number.as_deref(), Some("470813-8895"));
        assert_eq!(all[0].shopping_lists, vec![ShoppingList::new(["C"])]);

        let events = sync.store().events_for(all[0].id.as_deref().unwrap()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_store_failure_propagates() {
        struct BrokenStore;

        impl RecordStore for BrokenStore {
            fn find_by_external_id(&self, _: &str) -> Result<Option<CustomerRecord>> {
                anyhow::bail!("connection lost")
            }
            fn find_by_master_external_id(&self, _: &str) -> Result<Option<CustomerRecord>> {
                Ok(None)
            }
            fn find_by_company_number(&self, _: &str) -> Result<Option<CustomerRecord>> {
                Ok(None)
            }
            fn create(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
                Ok(record)
            }
            fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
                Ok(record)
            }
        }

        let mut sync = CustomerSync::new(BrokenStore);
        let err = sync.sync(&create_external_person()).unwrap_err();

        assert!(!err.is_rejection());
        assert_eq!(err.to_string(), "connection lost");
    }
}
