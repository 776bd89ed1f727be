//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::{
    config::Config,
    db::DbPool,
    gateway::PaymentGateway,
    repositories::{CartStore, OrderStore, PgCartStore, PgOrderStore},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by PostgreSQL stores on `pool`.
    pub fn new(pool: DbPool, gateway: Arc<dyn PaymentGateway>, config: Config) -> Self {
        Self {
            carts: Arc::new(PgCartStore::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            pool,
            gateway,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory store and a fake gateway.
    ///
    /// The pool connects lazily, so requests that never reach the database
    /// need no server.
    pub fn for_tests(
        store: Arc<crate::repositories::memory::MemoryStore>,
        gateway: Arc<crate::gateway::fake::FakeGateway>,
    ) -> Self {
        let config = Config::for_tests();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        Self {
            pool,
            carts: store.clone(),
            orders: store,
            gateway,
            config: Arc::new(config),
        }
    }
}
