use sqlx::PgPool;

pub mod payment_ledger;
pub mod subscription;

/// Shared Postgres handle; the repo traits are implemented on this one
/// struct so the application layer wires a single adapter.
#[derive(Clone)]
pub struct PostgresPersistence {
    pub pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
