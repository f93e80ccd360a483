// crates/relic-store/src/lib.rs
//
// relic-store: Storage layer for the Relic heritage monitor.
//
// Provides the RocksDB-backed store used by the daemon and CLI, an in-memory
// store for tests and ephemeral runs (both implement every storage trait in
// relic-core), and the validating site registry built on top of them.

pub mod keys;
pub mod memory;
pub mod registry;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::InMemoryStore;
pub use registry::SiteRegistry;
pub use rocks::RocksStore;
