//! Persistence for the engine: a `Storage` trait plus in-memory and SQLite backends.

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{ActorCounts, ActorFilter, DecayOutcome, PublishStamp, Storage};
