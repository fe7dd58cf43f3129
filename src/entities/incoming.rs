// 📥 Incoming Customer - a record as delivered by the external feed
//
// Immutable for the duration of a sync. A present company number makes the
// record a COMPANY, otherwise it is a PERSON.

use crate::entities::customer::{Address, CustomerType, ShoppingList};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCustomer {
    #[serde(default)]
    pub external_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub company_number: Option<String>,

    #[serde(default)]
    pub address: Option<Address>,

    #[serde(default)]
    pub preferred_store: Option<String>,

    /// Only meaningful for persons
    #[serde(default)]
    pub bonus_points: i64,

    #[serde(default)]
    pub shopping_lists: Vec<ShoppingList>,
}

impl IncomingCustomer {
    pub fn is_company(&self) -> bool {
        self.company_number.is_some()
    }

    pub fn customer_type(&self) -> CustomerType {
        if self.is_company() {
            CustomerType::Company
        } else {
            CustomerType::Person
        }
    }
}

impl fmt::Display for IncomingCustomer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExternalCustomer {{")?;
        writeln!(f, "    externalId='{}'", self.external_id)?;
        match &self.company_number {
            Some(number) => writeln!(f, "    companyNumber='{}'", number)?,
            None => writeln!(f, "    companyNumber=null")?,
        }
        writeln!(f, "    name='{}'", self.name)?;
        match &self.preferred_store {
            Some(store) => writeln!(f, "    preferredStore='{}'", store)?,
            None => writeln!(f, "    preferredStore=null")?,
        }
        writeln!(f, "    bonusPoints={}", self.bonus_points)?;
        match &self.address {
            Some(address) => writeln!(f, "    address='{}'", address)?,
            None => writeln!(f, "    address=null")?,
        }
        let lists: Vec<String> = self.shopping_lists.iter().map(|l| l.to_string()).collect();
        writeln!(f, "    shoppingLists=[{}]", lists.join(", "))?;
        write!(f, "}}")
    }
}

/// A feed file holds either one record or an array of them
#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingBatch {
    Many(Vec<IncomingCustomer>),
    One(IncomingCustomer),
}

/// Parse one or many incoming customers from JSON text
pub fn parse_incoming(json: &str) -> Result<Vec<IncomingCustomer>> {
    let batch: IncomingBatch =
        serde_json::from_str(json).context("Failed to deserialize incoming customer JSON")?;

    Ok(match batch {
        IncomingBatch::Many(customers) => customers,
        IncomingBatch::One(customer) => vec![customer],
    })
}

/// Load incoming customers from a JSON file
pub fn load_incoming(path: &Path) -> Result<Vec<IncomingCustomer>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read incoming file {}", path.display()))?;
    parse_incoming(&json)
}
