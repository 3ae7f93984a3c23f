use std::sync::Arc;

use crate::db::Database;
use crate::transaction::TransactionEngine;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransactionEngine>,
    /// PostgreSQL pool, pinged by the health check
    pub database: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(engine: Arc<TransactionEngine>, database: Option<Arc<Database>>) -> Self {
        Self { engine, database }
    }
}
