// 🔁 Duplicate Propagator - carry the incoming name over to every duplicate
//
// Duplicates only ever get their name updated. Identifiers, type, address and
// shopping lists are left alone, and duplicates are never created or deleted.

use crate::entities::{CustomerRecord, IncomingCustomer};
use crate::error::SyncResult;
use crate::store::RecordStore;
use tracing::info;

pub struct DuplicatePropagator<'a, S: RecordStore> {
    store: &'a mut S,
}

impl<'a, S: RecordStore> DuplicatePropagator<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        DuplicatePropagator { store }
    }

    /// Rename each duplicate after the incoming customer, in discovery order
    pub fn propagate(
        &mut self,
        incoming: &IncomingCustomer,
        duplicates: Vec<CustomerRecord>,
    ) -> SyncResult<Vec<CustomerRecord>> {
        if duplicates.is_empty() {
            return Ok(Vec::new());
        }

        let renamed: Vec<CustomerRecord> = duplicates
            .into_iter()
            .map(|mut duplicate| {
                duplicate.name = incoming.name.clone();
                duplicate
            })
            .collect();

        let updated = self.store.update_all(renamed)?;
        info!(
            external_id = %incoming.external_id,
            count = updated.len(),
            "Updated customer duplicates"
        );

        Ok(updated)
    }
}
