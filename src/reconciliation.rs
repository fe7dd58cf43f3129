// ⚖️ Reconciler - decide create vs update and write incoming fields onto the record
//
// The primary arrives already identifier-adjusted by the Matcher. Fields are
// overwritten unconditionally from the incoming record; address and shopping
// lists are replaced wholesale.

use crate::entities::{CustomerRecord, IncomingCustomer};
use crate::error::SyncResult;
use crate::store::RecordStore;
use tracing::info;

pub struct Reconciler<'a, S: RecordStore> {
    store: &'a mut S,
}

impl<'a, S: RecordStore> Reconciler<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Reconciler { store }
    }

    /// Persist the incoming data onto `primary` (or a new record).
    ///
    /// Returns the stored record and whether it was newly created.
    pub fn reconcile(
        &mut self,
        incoming: &IncomingCustomer,
        primary: Option<CustomerRecord>,
    ) -> SyncResult<(CustomerRecord, bool)> {
        let mut record = primary.unwrap_or_else(|| new_record(incoming));
        populate_fields(incoming, &mut record);

        if record.is_persisted() {
            let stored = self.store.update(record)?;
            info!(
                customer_id = stored.id.as_deref().unwrap_or_default(),
                external_id = %incoming.external_id,
                "Updated customer"
            );
            Ok((stored, false))
        } else {
            let stored = self.store.create(record)?;
            info!(
                customer_id = stored.id.as_deref().unwrap_or_default(),
                external_id = %incoming.external_id,
                customer_type = %stored.customer_type,
                "Created customer"
            );
            Ok((stored, true))
        }
    }
}

/// Unpersisted record whose identifiers come from the incoming customer
pub fn new_record(incoming: &IncomingCustomer) -> CustomerRecord {
    let mut record = CustomerRecord::new(incoming.customer_type());
    record.assign_external_id(&incoming.external_id);
    record
}

/// Overwrite the record's data fields from the incoming customer
pub fn populate_fields(incoming: &IncomingCustomer, record: &mut CustomerRecord) {
    record.name = incoming.name.clone();
    record.customer_type = incoming.customer_type();

    match &incoming.company_number {
        Some(company_number) => {
            record.company_number = Some(company_number.clone());
        }
        None => {
            record.bonus_points = incoming.bonus_points;
        }
    }

    record.preferred_store = incoming.preferred_store.clone();
    record.address = incoming.address.clone();
    record.shopping_lists = incoming.shopping_lists.clone();
}

// ============================================================================
// TESTS
// ============================================================================
