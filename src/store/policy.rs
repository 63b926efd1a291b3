//! Row-level access policies.
//!
//! Each (table, operation) pair carries a [`Policy`]: a `using` predicate that
//! decides which existing rows the caller can see or touch, and a `check`
//! predicate that every row the caller writes must satisfy. Predicates are
//! plain data so the store can either evaluate them against a row in memory or
//! push them into the WHERE clause of a read.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::identity::UserId;
use crate::store::table::Table;
use crate::store::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Allow,
    Deny,
    /// The caller's identity equals the named column.
    CallerIs(&'static str),
    /// The caller's identity equals at least one of the named columns.
    CallerIsAny(&'static [&'static str]),
    /// The named column holds exactly this text value.
    ColumnIs(&'static str, &'static str),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn permits(&self, caller: &UserId, row: &Row) -> bool {
        match self {
            Predicate::Allow => true,
            Predicate::Deny => false,
            Predicate::CallerIs(column) => column_is(row, column, caller),
            Predicate::CallerIsAny(columns) => columns.iter().any(|c| column_is(row, c, caller)),
            Predicate::ColumnIs(column, value) => {
                matches!(row.get(*column), Some(Value::String(v)) if v == value)
            }
            Predicate::All(preds) => preds.iter().all(|p| p.permits(caller, row)),
        }
    }

    /// Render as a SQL boolean expression, appending bound values to `params`
    /// in placeholder order. Column names come from `'static` policy tables,
    /// never from callers.
    pub fn to_sql(&self, caller: &UserId, params: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Allow => "1".to_string(),
            Predicate::Deny => "0".to_string(),
            Predicate::CallerIs(column) => {
                params.push(SqlValue::Text(caller.as_str().to_string()));
                format!("{} = ?", column)
            }
            Predicate::CallerIsAny(columns) => {
                let parts: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        params.push(SqlValue::Text(caller.as_str().to_string()));
                        format!("{} = ?", c)
                    })
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Predicate::ColumnIs(column, value) => {
                params.push(SqlValue::Text(value.to_string()));
                format!("{} = ?", column)
            }
            Predicate::All(preds) => {
                let parts: Vec<String> = preds.iter().map(|p| p.to_sql(caller, params)).collect();
                format!("({})", parts.join(" AND "))
            }
        }
    }
}

fn column_is(row: &Row, column: &str, caller: &UserId) -> bool {
    matches!(row.get(column), Some(Value::String(v)) if v == caller.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub using: Predicate,
    pub check: Predicate,
}

impl Policy {
    fn new(using: Predicate, check: Predicate) -> Self {
        Self { using, check }
    }

    fn visible(using: Predicate) -> Self {
        Self::new(using, Predicate::Allow)
    }

    fn checked(check: Predicate) -> Self {
        Self::new(Predicate::Allow, check)
    }

    fn owner(pred: Predicate) -> Self {
        Self::new(pred.clone(), pred)
    }

    fn denied() -> Self {
        Self::new(Predicate::Deny, Predicate::Deny)
    }
}

const PARTICIPANTS: &[&str] = &["user_id_1", "user_id_2"];

pub fn policy_for(table: Table, op: Operation) -> Policy {
    use Operation::*;
    use Predicate::*;

    match (table, op) {
        (Table::Friendships, Select) => Policy::visible(CallerIsAny(PARTICIPANTS)),
        (_, Select) => Policy::visible(Allow),

        (Table::Profiles, Insert) => Policy::checked(CallerIs("id")),
        (Table::Profiles, Update) => Policy::owner(CallerIs("id")),
        (Table::Profiles, Delete) => Policy::visible(CallerIs("id")),

        (Table::Posts, Insert) => Policy::checked(CallerIs("author_id")),
        (Table::Posts, Update) => Policy::owner(CallerIs("author_id")),
        (Table::Posts, Delete) => Policy::visible(CallerIs("author_id")),

        (Table::Comments, Insert) => Policy::checked(CallerIs("author_id")),
        (Table::Comments, Update) => Policy::denied(),
        (Table::Comments, Delete) => Policy::visible(CallerIs("author_id")),

        (Table::Likes, Insert) => Policy::checked(CallerIs("user_id")),
        (Table::Likes, Update) => Policy::denied(),
        (Table::Likes, Delete) => Policy::visible(CallerIs("user_id")),

        (Table::Follows, Insert) => Policy::checked(CallerIs("follower_id")),
        (Table::Follows, Update) => Policy::denied(),
        (Table::Follows, Delete) => Policy::visible(CallerIs("follower_id")),

        (Table::Friendships, Insert) => Policy::checked(All(vec![
            CallerIs("requester_id"),
            CallerIsAny(PARTICIPANTS),
        ])),
        (Table::Friendships, Update) => Policy::owner(CallerIsAny(PARTICIPANTS)),
        // Pending rows only: rejecting or cancelling a request. Accepted
        // friendships are permanent.
        (Table::Friendships, Delete) => Policy::visible(All(vec![
            CallerIsAny(PARTICIPANTS),
            ColumnIs("status", "pending"),
        ])),
    }
}
