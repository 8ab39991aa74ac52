//! Transactional store boundary.
//!
//! Every orchestrator step runs inside one [`Transaction`] obtained from
//! [`Store::begin`]: reads, precondition checks and writes share the unit of
//! work, which either commits as a whole or rolls back when dropped.
//! Publishing happens only after `commit` returns.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryStore, InMemoryTransaction, Tables};
pub use r#trait::{
    AuditRepository, BookingRepository, ProviderRepository, ReviewRepository, ServiceRepository,
    Store, Transaction, UserRepository,
};
