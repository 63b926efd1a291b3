use rusqlite::{params, OptionalExtension};

use crate::db::models::Account;
use crate::error::{AppError, AppResult};
use crate::identity::UserId;
use crate::state::DbPool;

pub const MIN_PASSWORD_LEN: usize = 8;

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::BadRequest("Invalid email address".into())),
    }
}

/// Register a new identity. Returns the id every access predicate will key off.
pub fn create_account(pool: &DbPool, email: &str, password: &str) -> AppResult<UserId> {
    let email = normalize_email(email)?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;
    let id = UserId::generate();

    let conn = pool.get()?;
    match conn.execute(
        "INSERT INTO accounts (id, email, password_hash) VALUES (?1, ?2, ?3)",
        params![id.as_str(), email, hash],
    ) {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(account = %id, "account created");
    Ok(id)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<Account>> {
    let conn = pool.get()?;
    let account = conn
        .query_row(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = ?1",
            params![email.trim().to_lowercase()],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(account)
}

/// Check an email/password pair. Unknown email and wrong password look the same.
pub fn verify_credentials(pool: &DbPool, email: &str, password: &str) -> AppResult<Option<UserId>> {
    let Some(account) = find_by_email(pool, email)? else {
        return Ok(None);
    };
    if bcrypt::verify(password, &account.password_hash).unwrap_or(false) {
        Ok(Some(UserId::new(account.id)))
    } else {
        Ok(None)
    }
}

/// Remove an account; its profile and everything the profile owns cascade.
pub fn delete_account(pool: &DbPool, id: &UserId) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM accounts WHERE id = ?1", params![id.as_str()])?;
    Ok(())
}
