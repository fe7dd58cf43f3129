// 🔍 Matcher - find the authoritative existing record for an incoming customer
//
// Companies are looked up by external id, then by company number.
// Persons are looked up by external id only.
// Type and identifier conflicts are raised here, before anything is written.

use crate::entities::{CustomerRecord, CustomerType, IncomingCustomer};
use crate::error::{SyncError, SyncResult};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// MATCH TERM
// ============================================================================

/// Which lookup produced the primary match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTerm {
    ByExternalId,
    ByCompanyNumber,
    NoMatch,
}

impl MatchTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTerm::ByExternalId => "external_id",
            MatchTerm::ByCompanyNumber => "company_number",
            MatchTerm::NoMatch => "none",
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// None means a new record will be created
    pub primary: Option<CustomerRecord>,

    /// Other records for the same logical customer, in discovery order
    pub duplicates: Vec<CustomerRecord>,

    pub term: MatchTerm,
}

impl MatchResult {
    pub fn no_match() -> Self {
        MatchResult {
            primary: None,
            duplicates: Vec::new(),
            term: MatchTerm::NoMatch,
        }
    }

    pub fn matched(primary: CustomerRecord, term: MatchTerm) -> Self {
        MatchResult {
            primary: Some(primary),
            duplicates: Vec::new(),
            term,
        }
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Add a duplicate unless the same logical customer is already in the set
    pub fn add_duplicate(&mut self, duplicate: CustomerRecord) {
        if !self.duplicates.iter().any(|d| d.is_same_customer(&duplicate)) {
            self.duplicates.push(duplicate);
        }
    }

    /// Move the primary into the duplicate set; the sync falls through to create
    fn demote_primary(&mut self) {
        if let Some(primary) = self.primary.take() {
            self.add_duplicate(primary);
        }
    }
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct Matcher<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> Matcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Matcher { store }
    }

    /// Find the primary match and duplicates for an incoming customer
    pub fn find(&self, incoming: &IncomingCustomer) -> SyncResult<MatchResult> {
        match &incoming.company_number {
            Some(company_number) => self.match_company(&incoming.external_id, company_number),
            None => self.match_person(&incoming.external_id),
        }
    }

    fn match_company(&self, external_id: &str, company_number: &str) -> SyncResult<MatchResult> {
        let mut result = self.load_company(external_id, company_number)?;

        if let Some(primary) = &result.primary {
            ensure_type(primary, CustomerType::Company, external_id)?;
        }

        match result.term {
            MatchTerm::ByExternalId => {
                let existing_number = result
                    .primary
                    .as_ref()
                    .and_then(|p| p.company_number.clone());

                if existing_number.as_deref() != Some(company_number) {
                    info!(
                        external_id,
                        existing_company_number = ?existing_number,
                        incoming_company_number = company_number,
                        "Company number changed, moving matched customer to duplicates"
                    );
                    result.demote_primary();
                }
            }
            MatchTerm::ByCompanyNumber => {
                if let Some(primary) = result.primary.as_mut() {
                    if let Some(existing) = primary.external_id.as_deref() {
                        if existing != external_id {
                            warn!(
                                company_number,
                                incoming_external_id = external_id,
                                existing_external_id = existing,
                                "External id conflict on company number match"
                            );
                            return Err(SyncError::ExternalIdConflict {
                                company_number: company_number.to_string(),
                                incoming_external_id: external_id.to_string(),
                                existing_external_id: existing.to_string(),
                            });
                        }
                    }
                    primary.assign_external_id(external_id);
                }
            }
            MatchTerm::NoMatch => {}
        }

        Ok(result)
    }

    fn load_company(&self, external_id: &str, company_number: &str) -> SyncResult<MatchResult> {
        if let Some(primary) = self.store.find_by_external_id(external_id)? {
            debug!(external_id, "Company matched by external id");
            let master = self.store.find_by_master_external_id(external_id)?;

            let mut result = MatchResult::matched(primary, MatchTerm::ByExternalId);
            if let Some(master) = master {
                let is_primary = result
                    .primary
                    .as_ref()
                    .is_some_and(|p| p.is_same_customer(&master));
                if !is_primary {
                    debug!(external_id, "Found duplicate by master external id");
                    result.add_duplicate(master);
                }
            }
            return Ok(result);
        }

        match self.store.find_by_company_number(company_number)? {
            Some(primary) => {
                debug!(company_number, "Company matched by company number");
                Ok(MatchResult::matched(primary, MatchTerm::ByCompanyNumber))
            }
            None => Ok(MatchResult::no_match()),
        }
    }

    fn match_person(&self, external_id: &str) -> SyncResult<MatchResult> {
        let mut result = match self.store.find_by_external_id(external_id)? {
            Some(primary) => MatchResult::matched(primary, MatchTerm::ByExternalId),
            None => MatchResult::no_match(),
        };

        let term = result.term;
        if let Some(primary) = result.primary.as_mut() {
            ensure_type(primary, CustomerType::Person, external_id)?;

            if term != MatchTerm::ByExternalId {
                debug!(external_id, "Reassigning external id on person match");
                primary.assign_external_id(external_id);
            }
        }

        Ok(result)
    }
}

fn ensure_type(primary: &CustomerRecord, expected: CustomerType, external_id: &str) -> SyncResult<()> {
    if primary.customer_type == expected {
        return Ok(());
    }

    warn!(
        external_id,
        existing = %primary.customer_type,
        incoming = %expected,
        "Customer type mismatch"
    );
    Err(SyncError::TypeMismatch {
        external_id: external_id.to_string(),
        existing: primary.customer_type,
        incoming: expected,
    })
}

// ============================================================================
// TESTS
// ============================================================================
