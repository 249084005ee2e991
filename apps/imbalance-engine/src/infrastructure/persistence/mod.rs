//! Persistence Adapters
//!
//! Implementations of the storage ports: a turso-backed store for
//! production and an in-memory store for tests.

pub mod in_memory;
pub mod turso;

pub use in_memory::InMemoryStore;
pub use turso::TursoStore;
