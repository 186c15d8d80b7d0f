use thiserror::Error;

/// Failures surfaced by the query runner.
///
/// None of these are recovered inside the crate; they carry enough context
/// (path or statement plus the engine's cause) for the caller to report them.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The database file is missing, unreadable, or not a SQLite database.
    #[error("cannot open database at {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Malformed SQL, unknown table/column, or a failure while stepping rows.
    #[error("query failed: {statement}: {source}")]
    Query {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Placeholders in the statement don't line up with the supplied parameters.
    #[error("parameter mismatch in `{statement}`: expected {expected}, got {got}")]
    ParameterMismatch {
        statement: String,
        expected: String,
        got: String,
    },

    /// Rows could not be assembled into a result table.
    #[error("cannot build result table: {0}")]
    Table(#[from] arrow::error::ArrowError),
}

impl SqliteError {
    pub(crate) fn connection(path: &str, source: rusqlite::Error) -> Self {
        Self::Connection {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn query(statement: &str, source: rusqlite::Error) -> Self {
        Self::Query {
            statement: statement.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqliteError>;
