// 💾 SQLite Record Store - customers + shopping lists + audit trail
//
// Every create/update runs in one SQLite transaction together with its
// shopping-list rewrite and the audit event it produces.

use crate::entities::{Address, CustomerRecord, CustomerType, ShoppingList};
use crate::store::{new_identity, RecordStore};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CUSTOMER_COLUMNS: &str = "customer_id, external_id, master_external_id, company_number,
        customer_type, name, preferred_store, bonus_points, street, city, postal_code";

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    fn for_customer(event_type: &str, customer_id: &str, record: &CustomerRecord, actor: &str) -> Self {
        Event::new(
            event_type,
            "customer",
            customer_id,
            serde_json::json!({
                "externalId": record.external_id,
                "masterExternalId": record.master_external_id,
                "companyNumber": record.company_number,
                "customerType": record.customer_type.as_str(),
                "name": record.name,
            }),
            actor,
        )
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT UNIQUE NOT NULL,
            external_id TEXT,
            master_external_id TEXT,
            company_number TEXT,
            customer_type TEXT NOT NULL,
            name TEXT NOT NULL,
            preferred_store TEXT,
            bonus_points INTEGER NOT NULL DEFAULT 0,
            street TEXT,
            city TEXT,
            postal_code TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // One row per list; products stored as a JSON array
    conn.execute(
        "CREATE TABLE IF NOT EXISTS shopping_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT NOT NULL REFERENCES customers(customer_id),
            position INTEGER NOT NULL,
            products TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_external_id ON customers(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_master_external_id ON customers(master_external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_company_number ON customers(company_number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_shopping_lists_customer ON shopping_lists(customer_id, position)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

struct CustomerRow {
    customer_id: String,
    external_id: Option<String>,
    master_external_id: Option<String>,
    company_number: Option<String>,
    customer_type: String,
    name: String,
    preferred_store: Option<String>,
    bonus_points: i64,
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
}

impl CustomerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CustomerRow {
            customer_id: row.get(0)?,
            external_id: row.get(1)?,
            master_external_id: row.get(2)?,
            company_number: row.get(3)?,
            customer_type: row.get(4)?,
            name: row.get(5)?,
            preferred_store: row.get(6)?,
            bonus_points: row.get(7)?,
            street: row.get(8)?,
            city: row.get(9)?,
            postal_code: row.get(10)?,
        })
    }

    fn into_record(self, conn: &Connection) -> Result<CustomerRecord> {
        let customer_type: CustomerType = self.customer_type.parse()?;
        let shopping_lists = load_shopping_lists(conn, &self.customer_id)?;

        // Address columns are written together; any present column means an address
        let address = if self.street.is_none() && self.city.is_none() && self.postal_code.is_none() {
            None
        } else {
            Some(Address {
                street: self.street.unwrap_or_default(),
                city: self.city.unwrap_or_default(),
                postal_code: self.postal_code.unwrap_or_default(),
            })
        };

        Ok(CustomerRecord {
            id: Some(self.customer_id),
            external_id: self.external_id,
            master_external_id: self.master_external_id,
            company_number: self.company_number,
            customer_type,
            name: self.name,
            preferred_store: self.preferred_store,
            bonus_points: self.bonus_points,
            address,
            shopping_lists,
        })
    }
}

fn load_shopping_lists(conn: &Connection, customer_id: &str) -> Result<Vec<ShoppingList>> {
    let mut stmt = conn.prepare(
        "SELECT products FROM shopping_lists
         WHERE customer_id = ?1
         ORDER BY position ASC",
    )?;

    let rows = stmt
        .query_map([customer_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.iter()
        .map(|json| -> Result<ShoppingList> {
            let products: Vec<String> = serde_json::from_str(json)
                .with_context(|| format!("Corrupt shopping list for customer {}", customer_id))?;
            Ok(ShoppingList { products })
        })
        .collect()
}

fn replace_shopping_lists(conn: &Connection, customer_id: &str, lists: &[ShoppingList]) -> Result<()> {
    conn.execute("DELETE FROM shopping_lists WHERE customer_id = ?1", [customer_id])?;

    for (position, list) in lists.iter().enumerate() {
        let products_json = serde_json::to_string(&list.products)?;
        conn.execute(
            "INSERT INTO shopping_lists (customer_id, position, products) VALUES (?1, ?2, ?3)",
            params![customer_id, position as i64, products_json],
        )?;
    }

    Ok(())
}

fn insert_customer(conn: &Connection, customer_id: &str, record: &CustomerRecord) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let address = record.address.as_ref();

    conn.execute(
        "INSERT INTO customers (
            customer_id, external_id, master_external_id, company_number,
            customer_type, name, preferred_store, bonus_points,
            street, city, postal_code, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            customer_id,
            record.external_id,
            record.master_external_id,
            record.company_number,
            record.customer_type.as_str(),
            record.name,
            record.preferred_store,
            record.bonus_points,
            address.map(|a| a.street.as_str()),
            address.map(|a| a.city.as_str()),
            address.map(|a| a.postal_code.as_str()),
            now,
        ],
    )
    .with_context(|| format!("Failed to insert customer {}", customer_id))?;

    replace_shopping_lists(conn, customer_id, &record.shopping_lists)
}

fn update_customer(conn: &Connection, customer_id: &str, record: &CustomerRecord) -> Result<()> {
    let address = record.address.as_ref();

    let changed = conn.execute(
        "UPDATE customers
         SET external_id = ?2,
             master_external_id = ?3,
             company_number = ?4,
             customer_type = ?5,
             name = ?6,
             preferred_store = ?7,
             bonus_points = ?8,
             street = ?9,
             city = ?10,
             postal_code = ?11,
             updated_at = ?12
         WHERE customer_id = ?1",
        params![
            customer_id,
            record.external_id,
            record.master_external_id,
            record.company_number,
            record.customer_type.as_str(),
            record.name,
            record.preferred_store,
            record.bonus_points,
            address.map(|a| a.street.as_str()),
            address.map(|a| a.city.as_str()),
            address.map(|a| a.postal_code.as_str()),
            Utc::now().to_rfc3339(),
        ],
    )?;

    if changed == 0 {
        bail!("Customer {} not found", customer_id);
    }

    replace_shopping_lists(conn, customer_id, &record.shopping_lists)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| -> Result<Event> {
            Ok(Event {
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("Bad timestamp on event {}", event_id))?
                    .with_timezone(&Utc),
                data: serde_json::from_str(&data)
                    .with_context(|| format!("Bad payload on event {}", event_id))?,
                event_id,
                event_type,
                entity_type,
                entity_id,
                actor,
            })
        })
        .collect()
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
    actor: String,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path, wal: bool) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        if wal {
            // Crash recovery for the on-disk store
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(SqliteStore {
            conn,
            actor: "customer-sync".to_string(),
        })
    }

    /// Name written into audit events
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    /// Insert a pre-existing record, keeping its identity if it has one
    pub fn seed(&mut self, mut record: CustomerRecord) -> Result<CustomerRecord> {
        let customer_id = record.id.clone().unwrap_or_else(new_identity);
        record.id = Some(customer_id.clone());

        let tx = self.conn.transaction()?;
        insert_customer(&tx, &customer_id, &record)?;
        tx.commit()?;

        Ok(record)
    }

    /// All customers in creation order
    pub fn all_customers(&self) -> Result<Vec<CustomerRecord>> {
        let sql = format!("SELECT {} FROM customers ORDER BY id ASC", CUSTOMER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], CustomerRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| row.into_record(&self.conn))
            .collect()
    }

    pub fn customer_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;

        Ok(count)
    }

    /// Audit history of one customer, newest first
    pub fn events_for(&self, customer_id: &str) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, "customer", customer_id)
    }

    fn find_latest_by(&self, column: &str, value: &str) -> Result<Option<CustomerRecord>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE {} = ?1 ORDER BY id DESC LIMIT 1",
            CUSTOMER_COLUMNS, column
        );

        let row = self
            .conn
            .query_row(&sql, [value], CustomerRow::from_row)
            .optional()
            .with_context(|| format!("Failed to look up customer by {}", column))?;

        row.map(|row| row.into_record(&self.conn)).transpose()
    }
}

fn identity_of(record: &CustomerRecord) -> Result<String> {
    match &record.id {
        Some(id) => Ok(id.clone()),
        None => bail!("Cannot update a customer without identity"),
    }
}

impl RecordStore for SqliteStore {
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<CustomerRecord>> {
        self.find_latest_by("external_id", external_id)
    }

    fn find_by_master_external_id(
        &self,
        master_external_id: &str,
    ) -> Result<Option<CustomerRecord>> {
        self.find_latest_by("master_external_id", master_external_id)
    }

    fn find_by_company_number(&self, company_number: &str) -> Result<Option<CustomerRecord>> {
        self.find_latest_by("company_number", company_number)
    }

    fn create(&mut self, mut record: CustomerRecord) -> Result<CustomerRecord> {
        if let Some(id) = &record.id {
            bail!("Customer {} is already persisted", id);
        }

        let customer_id = new_identity();
        record.id = Some(customer_id.clone());

        let tx = self.conn.transaction()?;
        insert_customer(&tx, &customer_id, &record)?;
        insert_event(
            &tx,
            &Event::for_customer("customer_created", &customer_id, &record, &self.actor),
        )?;
        tx.commit()?;

        Ok(record)
    }

    fn update(&mut self, record: CustomerRecord) -> Result<CustomerRecord> {
        let customer_id = identity_of(&record)?;

        let tx = self.conn.transaction()?;
        update_customer(&tx, &customer_id, &record)?;
        insert_event(
            &tx,
            &Event::for_customer("customer_updated", &customer_id, &record, &self.actor),
        )?;
        tx.commit()?;

        Ok(record)
    }

    fn update_all(&mut self, records: Vec<CustomerRecord>) -> Result<Vec<CustomerRecord>> {
        let tx = self.conn.transaction()?;

        for record in &records {
            let customer_id = identity_of(record)?;
            update_customer(&tx, &customer_id, record)?;
            insert_event(
                &tx,
                &Event::for_customer("customer_updated", &customer_id, record, &self.actor),
            )?;
        }

        tx.commit()?;
        Ok(records)
    }
}

// ============================================================================
// TESTS
// ============================================================================
