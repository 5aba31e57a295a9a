#![allow(dead_code)]

use std::path::PathBuf;

use shared::repos::Store;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

pub mod api_app;

static MIGRATIONS_APPLIED: OnceCell<()> = OnceCell::const_new();

/// Postgres-backed store, or `None` when `DATABASE_URL` is not set.
pub async fn test_store() -> Option<Store> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    apply_migrations_once(&database_url).await;

    Some(
        Store::connect(&database_url, 10)
            .await
            .expect("test store connection should succeed"),
    )
}

pub async fn reset_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE chat_encounters")
        .execute(pool)
        .await
        .expect("database reset should succeed");
}

async fn apply_migrations_once(database_url: &str) {
    MIGRATIONS_APPLIED
        .get_or_init(|| async move {
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .connect(database_url)
                .await
                .expect("migration pool connection should succeed");

            let migrations_dir =
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations");
            let migrator = sqlx::migrate::Migrator::new(migrations_dir)
                .await
                .expect("migrations should load");
            migrator
                .run(&pool)
                .await
                .expect("migrations should apply successfully");
        })
        .await;
}
