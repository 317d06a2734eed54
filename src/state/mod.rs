//! Session state: an append-only, ordered log of messages per session.

pub mod in_memory;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::{Message, Role, StateStore};
