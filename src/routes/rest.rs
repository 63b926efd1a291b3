use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::store::{Order, Query as StoreQuery, Row, Table};

// Generic data-access surface. Handlers forward intents verbatim; the store
// decides what the caller may see or change.

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rest/{table}", get(select_rows).post(insert_row))
        .route("/rest/{table}/{id}", patch(update_row).delete(delete_row))
}

/// `order=column.dir` and `limit=n` are reserved; every other pair is an
/// equality filter.
fn parse_query(params: Vec<(String, String)>) -> AppResult<StoreQuery> {
    let mut query = StoreQuery::new();
    for (key, value) in params {
        match key.as_str() {
            "order" => query = query.order(Order::parse(&value)),
            "limit" => {
                let limit = value
                    .parse::<u32>()
                    .map_err(|_| AppError::BadRequest("limit must be a number".into()))?;
                query = query.limit(limit);
            }
            _ => query = query.eq(key, value),
        }
    }
    Ok(query)
}

fn body_object(body: Value) -> AppResult<Row> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest("Body must be a JSON object".into())),
    }
}

async fn select_rows(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Vec<Row>>> {
    let table: Table = table.parse()?;
    let query = parse_query(params)?;
    let rows = state.client(user.id).select(table, &query).await?;
    Ok(Json(rows))
}

async fn insert_row(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    let table: Table = table.parse()?;
    let row = state
        .client(user.id)
        .insert(table, body_object(body)?)
        .await?;
    Ok((StatusCode::CREATED, Json(row)).into_response())
}

async fn update_row(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> AppResult<Json<Row>> {
    let table: Table = table.parse()?;
    let row = state
        .client(user.id)
        .update(table, &id, body_object(body)?)
        .await?;
    Ok(Json(row))
}

async fn delete_row(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((table, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let table: Table = table.parse()?;
    state.client(user.id).delete(table, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_query_splits_reserved_keys() {
        let q = parse_query(pairs(&[
            ("post_id", "p1"),
            ("order", "created_at.asc"),
            ("limit", "20"),
        ]))
        .unwrap();
        assert_eq!(q.filters, vec![("post_id".to_string(), Value::from("p1"))]);
        assert_eq!(q.order, Some(Order::asc("created_at")));
        assert_eq!(q.limit, Some(20));
    }

    #[test]
    fn parse_query_rejects_bad_limit() {
        assert!(matches!(
            parse_query(pairs(&[("limit", "lots")])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn body_must_be_object() {
        assert!(body_object(serde_json::json!({"a": 1})).is_ok());
        assert!(body_object(serde_json::json!([1, 2])).is_err());
    }
}
