// 📐 Validation - required-field checks on incoming records
// Collects every violation instead of stopping at the first one

use crate::entities::IncomingCustomer;
use crate::error::Violation;

/// Checks an incoming record; an empty list means valid.
pub trait Validator {
    fn validate(&self, incoming: &IncomingCustomer) -> Vec<Violation>;
}

/// Default rules: externalId and name must be non-blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldValidator;

impl RequiredFieldValidator {
    pub fn new() -> Self {
        RequiredFieldValidator
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl Validator for RequiredFieldValidator {
    fn validate(&self, incoming: &IncomingCustomer) -> Vec<Violation> {
        let mut violations = Vec::new();

        if is_blank(&incoming.external_id) {
            violations.push(Violation::new("externalId", "must not be blank"));
        }

        if is_blank(&incoming.name) {
            violations.push(Violation::new("name", "must not be blank"));
        }

        violations
    }
}
