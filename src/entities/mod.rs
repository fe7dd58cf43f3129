// Entity Models
//
// - CustomerRecord: what the store persists (identity assigned by the store)
// - IncomingCustomer: what the external feed delivers

pub mod customer;
pub mod incoming;

pub use customer::{Address, CustomerKey, CustomerRecord, CustomerType, ShoppingList};
pub use incoming::{load_incoming, parse_incoming, IncomingCustomer};
