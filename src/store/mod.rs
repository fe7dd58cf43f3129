// 🗄️ Record Store - lookup and persistence capability used by the sync core
//
// The core only ever talks to this trait. Two implementations ship with the
// crate: InMemoryStore (test double, dry runs) and SqliteStore.

pub mod memory;
pub mod sqlite;

use crate::entities::CustomerRecord;
use anyhow::Result;

pub use memory::InMemoryStore;
pub use sqlite::{Event, SqliteStore};

pub trait RecordStore {
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<CustomerRecord>>;

    fn find_by_master_external_id(&self, master_external_id: &str)
        -> Result<Option<CustomerRecord>>;

    fn find_by_company_number(&self, company_number: &str) -> Result<Option<CustomerRecord>>;

    /// Persist a new record; the returned copy carries the assigned identity
    fn create(&mut self, record: CustomerRecord) -> Result<CustomerRecord>;

    /// Persist changes to an existing record
    fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord>;

    /// Batch variant of `update`, same semantics as updating one by one
    fn update_all(&mut self, records: Vec<CustomerRecord>) -> Result<Vec<CustomerRecord>> {
        records.into_iter().map(|record| self.update(record)).collect()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<CustomerRecord>> {
        (**self).find_by_external_id(external_id)
    }

    fn find_by_master_external_id(
        &self,
        master_external_id: &str,
    ) -> Result<Option<CustomerRecord>> {
        (**self).find_by_master_external_id(master_external_id)
    }

    fn find_by_company_number(&self, company_number: &str) -> Result<Option<CustomerRecord>> {
        (**self).find_by_company_number(company_number)
    }

    fn create(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
        (**self).create(record)
    }

    fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
        (**self).update(record)
    }

    fn update_all(&mut self, records: Vec<CustomerRecord>) -> Result<Vec<CustomerRecord>> {
        (**self).update_all(records)
    }
}

/// Fresh store-side identity
pub(crate) fn new_identity() -> String {
    uuid::Uuid::new_v4().to_string()
}
