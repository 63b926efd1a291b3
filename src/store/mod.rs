// Store boundary - every data-access call passes through the access policies
pub mod policy;
pub mod sqlite;
pub mod table;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::identity::UserId;

pub use policy::{policy_for, Operation, Policy, Predicate};
pub use sqlite::SqliteStore;
pub use table::Table;

/// A row as seen by callers: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A row failed its access predicate. Deliberately carries no detail.
    #[error("Permission denied")]
    Denied,

    #[error("Row not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown or read-only column: {0}")]
    UnknownColumn(String),

    #[error("Invalid value for column {0}")]
    InvalidValue(String),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(rusqlite::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(msg.unwrap_or_else(|| err.to_string()))
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sql(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse `column.asc` / `column.desc`; a bare column sorts ascending.
    pub fn parse(spec: &str) -> Self {
        match spec.rsplit_once('.') {
            Some((column, "desc")) => Self::desc(column),
            Some((column, "asc")) => Self::asc(column),
            _ => Self::asc(spec),
        }
    }
}

/// Select with equality filters, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The generic store surface: select, insert, update by id, delete by id.
/// Implementations evaluate [`policy_for`] against the caller on every call.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(
        &self,
        caller: &UserId,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, caller: &UserId, table: Table, values: Row) -> Result<Row, StoreError>;

    async fn update(
        &self,
        caller: &UserId,
        table: Table,
        id: &str,
        changes: Row,
    ) -> Result<Row, StoreError>;

    async fn delete(&self, caller: &UserId, table: Table, id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_parse() {
        assert_eq!(Order::parse("created_at.desc"), Order::desc("created_at"));
        assert_eq!(Order::parse("created_at.asc"), Order::asc("created_at"));
        assert_eq!(Order::parse("username"), Order::asc("username"));
    }

    #[test]
    fn constraint_failures_map_to_constraint() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: likes.post_id, likes.user_id".into()),
        );
        match StoreError::from(err) {
            StoreError::Constraint(msg) => assert!(msg.contains("UNIQUE")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn query_builder_collects_filters() {
        let q = Query::new()
            .eq("post_id", "p1")
            .order(Order::desc("created_at"))
            .limit(10);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].1, Value::String("p1".into()));
        assert_eq!(q.limit, Some(10));
    }
}
