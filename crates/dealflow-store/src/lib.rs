//! Storage layer: the analysis store contract, an in-memory store, and DuckDB.

mod error;
pub use error::StoreError;

mod store;
pub use store::{AnalysisStore, UpsertOutcome};

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
