// 🧠 In-memory Record Store
//
// Records are kept in creation order. When several records share a lookup
// key, the most recently created one is returned.

use crate::entities::CustomerRecord;
use crate::store::{new_identity, RecordStore};
use anyhow::{bail, Result};

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    records: Vec<CustomerRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            records: Vec::new(),
        }
    }

    /// Insert a pre-existing record, assigning an identity if it has none
    pub fn seed(&mut self, mut record: CustomerRecord) -> Result<CustomerRecord> {
        match &record.id {
            Some(id) if self.position(id).is_some() => {
                bail!("Customer {} already exists", id)
            }
            Some(_) => {}
            None => record.id = Some(new_identity()),
        }

        self.records.push(record.clone());
        Ok(record)
    }

    /// All records in creation order
    pub fn all(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&CustomerRecord> {
        self.records.iter().find(|r| r.id.as_deref() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id.as_deref() == Some(id))
    }

    fn find_latest<F>(&self, predicate: F) -> Option<CustomerRecord>
    where
        F: Fn(&CustomerRecord) -> bool,
    {
        self.records.iter().rev().find(|r| predicate(r)).cloned()
    }
}

impl RecordStore for InMemoryStore {
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<CustomerRecord>> {
        Ok(self.find_latest(|r| r.external_id.as_deref() == Some(external_id)))
    }

    fn find_by_master_external_id(
        &self,
        master_external_id: &str,
    ) -> Result<Option<CustomerRecord>> {
        Ok(self.find_latest(|r| r.master_external_id.as_deref() == Some(master_external_id)))
    }

    fn find_by_company_number(&self, company_number: &str) -> Result<Option<CustomerRecord>> {
        Ok(self.find_latest(|r| r.company_number.as_deref() == Some(company_number)))
    }

    fn create(&mut self, mut record: CustomerRecord) -> Result<CustomerRecord> {
        if let Some(id) = &record.id {
            bail!("Customer {} is already persisted", id);
        }

        record.id = Some(new_identity());
        self.records.push(record.clone());
        Ok(record)
    }

    fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
        let Some(id) = record.id.as_deref() else {
            bail!("Cannot update a customer without identity");
        };

        match self.position(id) {
            Some(index) => {
                self.records[index] = record.clone();
                Ok(record)
            }
            None => bail!("Customer {} not found", id),
        }
    }
}
