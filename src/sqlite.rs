use crate::error::{Result, SqliteError};
use crate::table::ResultTable;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, Rows, Statement, ToSql};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Bound as 0/1. Never produced when reading rows back.
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Literal-style rendering used when printing whole rows.
    fn fmt_literal(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

/// Parameter bindings for SQL queries
///
/// `Positional` values bind to `?` placeholders in order; `Named` values bind
/// to `:name`, `@name` or `$name` placeholders. Keys may be given with or
/// without the leading sigil.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named() -> Self {
        Params::Named(BTreeMap::new())
    }

    /// Add a named value. Turns an empty set into a named one; positional
    /// values already present are kept and the shape check will reject them.
    pub fn with_value(self, name: &str, value: impl Into<Value>) -> Self {
        let mut values = match self {
            Params::Named(values) => values,
            Params::None => BTreeMap::new(),
            positional @ Params::Positional(_) => return positional,
        };
        values.insert(strip_sigil(name).to_string(), value.into());
        Params::Named(values)
    }

    fn describe(&self) -> String {
        match self {
            Params::None => "no parameters".to_string(),
            Params::Positional(values) => format!("{} positional value(s)", values.len()),
            Params::Named(values) => {
                let names: Vec<&str> = values.keys().map(String::as_str).collect();
                format!("named values {{{}}}", names.join(", "))
            }
        }
    }
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix([':', '@', '$']).unwrap_or(name)
}

/// Look up a named value whether or not its key carries a sigil.
fn named_value<'v>(values: &'v BTreeMap<String, Value>, name: &str) -> Option<&'v Value> {
    values
        .get(name)
        .or_else(|| values.iter().find(|(k, _)| strip_sigil(k) == name).map(|(_, v)| v))
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Placeholders found in a prepared statement, by binding slot.
struct Placeholders {
    /// One entry per 1-based slot; `None` for anonymous (`?`, `?NNN`).
    slots: Vec<Option<String>>,
}

impl Placeholders {
    fn of(stmt: &Statement<'_>) -> Self {
        let slots = (1..=stmt.parameter_count())
            .map(|i| {
                stmt.parameter_name(i)
                    .filter(|name| !name.starts_with('?'))
                    .map(|name| strip_sigil(name).to_string())
            })
            .collect();
        Self { slots }
    }

    fn anonymous(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    fn names(&self) -> BTreeSet<&str> {
        self.slots.iter().flatten().map(String::as_str).collect()
    }

    fn describe(&self) -> String {
        let anonymous = self.anonymous();
        let names: Vec<&str> = self.names().into_iter().collect();
        match (anonymous, names.is_empty()) {
            (0, true) => "no parameters".to_string(),
            (n, true) => format!("{n} positional value(s)"),
            (0, false) => format!("named values {{{}}}", names.join(", ")),
            (n, false) => format!(
                "{n} positional value(s) and named values {{{}}}",
                names.join(", ")
            ),
        }
    }

    fn matches(&self, params: &Params) -> bool {
        match params {
            Params::None => self.slots.is_empty(),
            Params::Positional(values) => {
                self.names().is_empty() && self.slots.len() == values.len()
            }
            Params::Named(values) => {
                self.anonymous() == 0
                    && self.names()
                        == values
                            .keys()
                            .map(|k| strip_sigil(k))
                            .collect::<BTreeSet<_>>()
            }
        }
    }
}

/// SQLite Service configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteConfig {
    /// Path to an existing SQLite database file
    pub db_path: PathBuf,
    /// Open without write access. On by default.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
    /// How long to wait on a locked database before giving up
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

fn default_read_only() -> bool {
    true
}

impl SqliteConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            read_only: true,
            busy_timeout_ms: None,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    fn open_flags(&self) -> OpenFlags {
        let access = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

impl From<&str> for SqliteConfig {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for SqliteConfig {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for SqliteConfig {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for SqliteConfig {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&SqliteConfig> for SqliteConfig {
    fn from(config: &SqliteConfig) -> Self {
        config.clone()
    }
}

/// An open database connection owned by one scope.
///
/// Dropping the session releases the connection; [`Session::close`] does the
/// same but reports a failure to close.
pub struct Session {
    conn: Connection,
    path: String,
}

impl Session {
    /// Open the configured file. The file must already exist and be a SQLite
    /// database; nothing is created.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let path = config.db_path.display().to_string();
        debug!(path = %path, read_only = config.read_only, "opening database");

        let conn = Connection::open_with_flags(&config.db_path, config.open_flags())
            .map_err(|e| SqliteError::connection(&path, e))?;
        if let Some(ms) = config.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(ms))
                .map_err(|e| SqliteError::connection(&path, e))?;
        }
        // SQLite opens lazily; reading the schema forces the header check.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| SqliteError::connection(&path, e))?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compile `query` and bind its parameters.
    ///
    /// Fails with `ParameterMismatch` before anything executes when the
    /// placeholders and the parameter set disagree.
    pub fn prepare<'s>(&'s self, query: &SqlQuery) -> Result<PreparedQuery<'s>> {
        let sql = query.statement.as_str();
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| SqliteError::query(sql, e))?;

        let placeholders = Placeholders::of(&stmt);
        if !placeholders.matches(&query.params) {
            return Err(SqliteError::ParameterMismatch {
                statement: sql.to_string(),
                expected: placeholders.describe(),
                got: query.params.describe(),
            });
        }
        debug!(statement = sql, params = %query.params.describe(), "executing");

        match &query.params {
            Params::None => {}
            Params::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)
                        .map_err(|e| SqliteError::query(sql, e))?;
                }
            }
            Params::Named(values) => {
                for (i, slot) in placeholders.slots.iter().enumerate() {
                    let value = slot.as_deref().and_then(|name| named_value(values, name));
                    if let Some(value) = value {
                        stmt.raw_bind_parameter(i + 1, value)
                            .map_err(|e| SqliteError::query(sql, e))?;
                    }
                }
            }
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        Ok(PreparedQuery {
            stmt,
            sql: sql.to_string(),
            columns: columns.into(),
        })
    }

    /// Execute `query` and collect every row.
    pub fn fetch_all(&self, query: &SqlQuery) -> Result<Vec<ResultRow>> {
        self.prepare(query)?.rows().collect()
    }

    /// Execute `query` and materialize the result into a table.
    pub fn query_table(&self, query: &SqlQuery) -> Result<ResultTable> {
        let mut prepared = self.prepare(query)?;
        let table = drain_into_table(prepared.rows())?;
        info!(
            statement = %query.statement,
            rows = table.row_count(),
            "materialized result table"
        );
        Ok(table)
    }

    /// Release the connection, reporting any failure to do so.
    pub fn close(self) -> Result<()> {
        debug!(path = %self.path, "closing database");
        let path = self.path;
        self.conn.close().map_err(|(_, e)| {
            warn!(path = %path, error = %e, "failed to close database");
            SqliteError::connection(&path, e)
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("path", &self.path).finish()
    }
}

/// A compiled statement with its parameters bound.
pub struct PreparedQuery<'s> {
    stmt: Statement<'s>,
    sql: String,
    columns: Arc<[String]>,
}

impl<'s> PreparedQuery<'s> {
    /// Selected column names, in statement order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Start a fresh execution. Each call re-runs the statement from the top.
    pub fn rows(&mut self) -> ResultRows<'_> {
        let PreparedQuery { stmt, sql, columns } = self;
        ResultRows {
            rows: stmt.raw_query(),
            sql: sql.as_str(),
            columns: Arc::clone(columns),
            done: false,
        }
    }
}

/// Lazy, single-pass sequence of result rows.
///
/// Borrows the session, so it cannot outlive the connection it reads from.
/// Once exhausted (or after an error) it keeps returning `None`.
pub struct ResultRows<'a> {
    rows: Rows<'a>,
    sql: &'a str,
    columns: Arc<[String]>,
    done: bool,
}

impl ResultRows<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for ResultRows<'_> {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rows.next() {
            Ok(Some(row)) => Some(
                read_row(row, &self.columns).map_err(|e| SqliteError::query(self.sql, e)),
            ),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(SqliteError::query(self.sql, e)))
            }
        }
    }
}

fn read_row(row: &Row<'_>, columns: &Arc<[String]>) -> rusqlite::Result<ResultRow> {
    let values = (0..columns.len())
        .map(|i| row.get_ref(i).map(Value::from))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ResultRow {
        columns: Arc::clone(columns),
        values,
    })
}

/// One record: values in the order the statement selected them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl ResultRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            value.fmt_literal(f)?;
        }
        f.write_str(")")
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

fn drain_into_table(rows: ResultRows<'_>) -> Result<ResultTable> {
    let columns = rows.columns().to_vec();
    let data = rows
        .map(|row| row.map(ResultRow::into_values))
        .collect::<Result<Vec<_>>>()?;
    ResultTable::from_rows(columns, data)
}

/// Open `target`, execute `query`, and hand the lazy rows to `consume`.
///
/// The connection is released when this returns, whether `consume`
/// succeeded, failed, or stopped early.
pub fn run<C, T, F>(target: C, query: &SqlQuery, consume: F) -> Result<T>
where
    C: Into<SqliteConfig>,
    F: FnOnce(ResultRows<'_>) -> Result<T>,
{
    let session = Session::open(&target.into())?;
    let outcome = consume_rows(&session, query, consume);
    let closed = session.close();
    let value = outcome?;
    closed?;
    Ok(value)
}

fn consume_rows<T, F>(session: &Session, query: &SqlQuery, consume: F) -> Result<T>
where
    F: FnOnce(ResultRows<'_>) -> Result<T>,
{
    let mut prepared = session.prepare(query)?;
    consume(prepared.rows())
}

/// Execute `query` against `target` and collect every row.
pub fn fetch_all<C: Into<SqliteConfig>>(target: C, query: &SqlQuery) -> Result<Vec<ResultRow>> {
    run(target, query, |rows| rows.collect())
}

/// Execute `query` against `target` and materialize the rows into a table.
pub fn run_to_table<C: Into<SqliteConfig>>(target: C, query: &SqlQuery) -> Result<ResultTable> {
    let table = run(target, query, drain_into_table)?;
    info!(
        statement = %query.statement,
        rows = table.row_count(),
        "materialized result table"
    );
    Ok(table)
}
