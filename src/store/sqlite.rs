use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use crate::identity::UserId;
use crate::state::DbPool;
use crate::store::{
    policy_for, DataStore, Operation, Predicate, Query, Row, StoreError, Table,
};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQLite-backed store. Identifiers interpolated into SQL always come from
/// [`Table`] metadata after validation; values are always bound.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_sql_value(column: &str, value: &Value) -> Result<SqlValue, StoreError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| StoreError::InvalidValue(column.to_string())),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidValue(column.to_string())),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

fn read_row(table: Table, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, column) in table.columns().iter().enumerate() {
        out.insert(column.to_string(), to_json(row.get_ref(i)?));
    }
    Ok(out)
}

fn column_list(table: Table) -> String {
    table.columns().join(", ")
}

fn fetch_by_id(
    conn: &rusqlite::Connection,
    table: Table,
    id: &str,
) -> Result<Option<Row>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        column_list(table),
        table
    );
    Ok(conn
        .query_row(&sql, params![id], |r| read_row(table, r))
        .optional()?)
}

fn denied(caller: &UserId, table: Table, op: Operation) -> StoreError {
    tracing::debug!(caller = %caller, table = %table, op = op.as_str(), "access denied");
    StoreError::Denied
}

/// Load an existing row for a write and apply the read and write `using`
/// predicates. Rows the caller cannot read are reported as missing.
fn load_for_write(
    conn: &rusqlite::Connection,
    caller: &UserId,
    table: Table,
    op: Operation,
    using: &Predicate,
    id: &str,
) -> Result<Row, StoreError> {
    let existing = fetch_by_id(conn, table, id)?.ok_or(StoreError::NotFound)?;
    if !policy_for(table, Operation::Select)
        .using
        .permits(caller, &existing)
    {
        return Err(StoreError::NotFound);
    }
    if !using.permits(caller, &existing) {
        return Err(denied(caller, table, op));
    }
    Ok(existing)
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn select(
        &self,
        caller: &UserId,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Row>, StoreError> {
        let policy = policy_for(table, Operation::Select);
        let mut params = Vec::new();
        let mut clauses = Vec::new();

        for (column, value) in &query.filters {
            if !table.has_column(column) {
                return Err(StoreError::UnknownColumn(column.clone()));
            }
            if value.is_null() {
                clauses.push(format!("{} IS NULL", column));
            } else {
                clauses.push(format!("{} = ?", column));
                params.push(to_sql_value(column, value)?);
            }
        }
        clauses.push(policy.using.to_sql(caller, &mut params));

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            column_list(table),
            table,
            clauses.join(" AND ")
        );
        if let Some(order) = &query.order {
            if !table.has_column(&order.column) {
                return Err(StoreError::UnknownColumn(order.column.clone()));
            }
            let dir = order.direction.as_sql();
            sql.push_str(&format!(" ORDER BY {} {}, id {}", order.column, dir, dir));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |r| read_row(table, r))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn insert(
        &self,
        caller: &UserId,
        table: Table,
        mut values: Row,
    ) -> Result<Row, StoreError> {
        if let Some(column) = values
            .keys()
            .find(|c| !table.insertable().contains(&c.as_str()))
        {
            return Err(StoreError::UnknownColumn(column.clone()));
        }
        if table.generates_id() {
            values.insert(
                "id".to_string(),
                Value::String(uuid::Uuid::now_v7().to_string()),
            );
        }

        let policy = policy_for(table, Operation::Insert);
        if !policy.check.permits(caller, &values) {
            return Err(denied(caller, table, Operation::Insert));
        }

        let columns: Vec<&str> = values.keys().map(String::as_str).collect();
        let params = values
            .iter()
            .map(|(c, v)| to_sql_value(c, v))
            .collect::<Result<Vec<_>, _>>()?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", "),
            column_list(table)
        );

        let conn = self.pool.get()?;
        let row = conn.query_row(&sql, params_from_iter(params.iter()), |r| {
            read_row(table, r)
        })?;
        tracing::debug!(caller = %caller, table = %table, "row inserted");
        Ok(row)
    }

    async fn update(
        &self,
        caller: &UserId,
        table: Table,
        id: &str,
        changes: Row,
    ) -> Result<Row, StoreError> {
        let policy = policy_for(table, Operation::Update);

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Existence and visibility first, so a missing id reads as NotFound
        // even on tables with no update path.
        let existing = load_for_write(&tx, caller, table, Operation::Update, &policy.using, id)?;
        if let Some(column) = changes
            .keys()
            .find(|c| !table.updatable().contains(&c.as_str()))
        {
            return Err(StoreError::UnknownColumn(column.clone()));
        }

        let mut next = existing;
        for (column, value) in &changes {
            next.insert(column.clone(), value.clone());
        }
        if !policy.check.permits(caller, &next) {
            return Err(denied(caller, table, Operation::Update));
        }

        if !changes.is_empty() {
            let mut sets: Vec<String> = changes.keys().map(|c| format!("{} = ?", c)).collect();
            if table.has_updated_at() {
                sets.push(format!("updated_at = {}", NOW));
            }
            let mut params = changes
                .iter()
                .map(|(c, v)| to_sql_value(c, v))
                .collect::<Result<Vec<_>, _>>()?;
            params.push(SqlValue::Text(id.to_string()));

            let sql = format!("UPDATE {} SET {} WHERE id = ?", table, sets.join(", "));
            tx.execute(&sql, params_from_iter(params.iter()))?;
        }

        let row = fetch_by_id(&tx, table, id)?.ok_or(StoreError::NotFound)?;
        tx.commit()?;
        tracing::debug!(caller = %caller, table = %table, id, "row updated");
        Ok(row)
    }

    async fn delete(&self, caller: &UserId, table: Table, id: &str) -> Result<(), StoreError> {
        let policy = policy_for(table, Operation::Delete);

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        load_for_write(&tx, caller, table, Operation::Delete, &policy.using, id)?;

        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        tx.execute(&sql, params![id])?;
        tx.commit()?;
        tracing::debug!(caller = %caller, table = %table, id, "row deleted");
        Ok(())
    }
}
