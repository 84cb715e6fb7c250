//! SQLite backend for the Strayline rescue engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The conditional UPDATE in
//! `apply_transition` is the engine's concurrency mechanism; no in-process
//! locking is involved.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
