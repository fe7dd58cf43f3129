// 👤 Customer Entity - the persisted record the sync writes to
//
// Identity (id) is assigned by the store, never by the sync core.
// Logical sameness for duplicate handling is the (externalId, masterExternalId,
// companyNumber) triple, exposed as CustomerKey.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CUSTOMER TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    /// Private person (carries bonus points)
    Person,

    /// Company (identified by company number)
    Company,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Person => "PERSON",
            CustomerType::Company => "COMPANY",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSON" => Ok(CustomerType::Person),
            "COMPANY" => Ok(CustomerType::Company),
            other => Err(anyhow::anyhow!("unknown customer type: {}", other)),
        }
    }
}

// ============================================================================
// VALUE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl Address {
    pub fn new(street: &str, city: &str, postal_code: &str) -> Self {
        Address {
            street: street.to_string(),
            city: city.to_string(),
            postal_code: postal_code.to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} {}", self.street, self.postal_code, self.city)
    }
}

/// Ordered list of product names
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShoppingList {
    pub products: Vec<String>,
}

impl ShoppingList {
    pub fn new<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShoppingList {
            products: products.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ShoppingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.products.join(", "))
    }
}

// ============================================================================
// CUSTOMER KEY
// ============================================================================

/// The identifier triple that decides whether two records are the same
/// logical customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerKey {
    pub external_id: Option<String>,
    pub master_external_id: Option<String>,
    pub company_number: Option<String>,
}

// ============================================================================
// CUSTOMER RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    /// Store-assigned identity (None until created)
    pub id: Option<String>,

    pub external_id: Option<String>,
    pub master_external_id: Option<String>,
    pub company_number: Option<String>,

    /// Never flipped by a sync; a mismatch aborts the sync instead
    pub customer_type: CustomerType,

    pub name: String,
    pub preferred_store: Option<String>,
    pub bonus_points: i64,
    pub address: Option<Address>,
    pub shopping_lists: Vec<ShoppingList>,
}

impl CustomerRecord {
    /// Blank, not yet persisted record of the given type
    pub fn new(customer_type: CustomerType) -> Self {
        CustomerRecord {
            id: None,
            external_id: None,
            master_external_id: None,
            company_number: None,
            customer_type,
            name: String::new(),
            preferred_store: None,
            bonus_points: 0,
            address: None,
            shopping_lists: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn key(&self) -> CustomerKey {
        CustomerKey {
            external_id: self.external_id.clone(),
            master_external_id: self.master_external_id.clone(),
            company_number: self.company_number.clone(),
        }
    }

    pub fn is_same_customer(&self, other: &CustomerRecord) -> bool {
        self.key() == other.key()
    }

    /// Point both the external id and the master external id at `external_id`
    pub fn assign_external_id(&mut self, external_id: &str) {
        self.external_id = Some(external_id.to_string());
        self.master_external_id = Some(external_id.to_string());
    }
}

fn quoted(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v),
        None => "null".to_string(),
    }
}

impl fmt::Display for CustomerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Customer {{")?;
        writeln!(f, "    id={}", quoted(self.id.as_deref()))?;
        writeln!(f, "    externalId={}", quoted(self.external_id.as_deref()))?;
        writeln!(f, "    masterExternalId={}", quoted(self.master_external_id.as_deref()))?;
        writeln!(f, "    companyNumber={}", quoted(self.company_number.as_deref()))?;
        writeln!(f, "    customerType={}", self.customer_type)?;
        writeln!(f, "    name='{}'", self.name)?;
        writeln!(f, "    preferredStore={}", quoted(self.preferred_store.as_deref()))?;
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

// ============================================================================
// TESTS
// ============================================================================
