use chrono::{Duration, SecondsFormat, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::AppResult;
use crate::identity::UserId;
use crate::state::DbPool;

/// Create a new session for an account. Returns the session token.
/// Expired sessions are swept on the way in.
pub fn create_session(pool: &DbPool, account_id: &UserId, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let purged = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        [],
    )?;
    if purged > 0 {
        tracing::debug!(purged, "expired sessions removed");
    }

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let expires_at = (Utc::now() + Duration::hours(hours as i64))
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    conn.execute(
        "INSERT INTO sessions (id, account_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, account_id.as_str(), token, expires_at],
    )?;

    Ok(token)
}

/// Resolve an unexpired session token to its account id and email.
pub fn resolve_session(pool: &DbPool, token: &str) -> AppResult<Option<(UserId, String)>> {
    let conn = pool.get()?;

    let found = conn
        .query_row(
            "SELECT a.id, a.email FROM sessions s \
             JOIN accounts a ON a.id = s.account_id \
             WHERE s.token = ?1 AND s.expires_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![token],
            |row| Ok((UserId::new(row.get::<_, String>(0)?), row.get(1)?)),
        )
        .optional()?;

    Ok(found)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
