use std::collections::HashSet;

use deadpool_postgres::Pool;

use super::error::DbError;

/// Derived-table schema, applied in order and recorded in `_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_tx_payload_cache.sql",
        include_str!("../../migrations/001_tx_payload_cache.sql"),
    ),
    (
        "002_spend_history.sql",
        include_str!("../../migrations/002_spend_history.sql"),
    ),
    (
        "003_tx_relations.sql",
        include_str!("../../migrations/003_tx_relations.sql"),
    ),
];

pub async fn run(pool: &Pool) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();
    drop(client);

    for (name, sql) in pending(&applied) {
        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;

        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[&name])
            .await?;

        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("All migrations up to date");
    Ok(())
}

fn pending(applied: &HashSet<String>) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
    MIGRATIONS
        .iter()
        .copied()
        .filter(move |(name, _)| !applied.contains(*name))
}
