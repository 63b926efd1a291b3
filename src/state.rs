use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::client::Client;
use crate::config::Config;
use crate::identity::UserId;
use crate::store::{DataStore, SqliteStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let store = Arc::new(SqliteStore::new(db.clone()));
        Self { db, config, store }
    }

    /// A data-access client acting as `caller`.
    pub fn client(&self, caller: UserId) -> Client {
        Client::new(self.store.clone(), caller)
    }
}
