//! Read-only SQLite querying with typed parameters and tabular results.
//!
//! # Intention
//!
//! - Run `SELECT` statements against an existing SQLite file with values bound
//!   positionally (`?`) or by name (`:name`), never spliced into the SQL text.
//! - Hand results back either as a lazy row sequence tied to a scoped
//!   connection, or as a fully materialized [`ResultTable`].
//!
//! # Architectural Boundaries
//!
//! - Only read access. No schema management, writes, pooling or query building.
//! - The engine is rusqlite's bundled SQLite; nothing here re-implements it.

pub mod error;
pub mod logging;
pub mod sqlite;
pub mod table;

pub use error::{Result, SqliteError};
pub use sqlite::{
    fetch_all, run, run_to_table, Params, PreparedQuery, ResultRow, ResultRows, Session, SqlQuery,
    SqliteConfig, Value,
};
pub use table::ResultTable;
