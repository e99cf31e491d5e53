//! Postgres-backed node store.
//!
//! Node records are stored as JSONB documents keyed by hostname, with the
//! lifecycle state mirrored into its own column so conditional writes and
//! state scans stay plain SQL. Multi-node writes run in one transaction;
//! a failed precondition rolls the whole batch back.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use crate::node::Node;

use super::{NodeStore, NodeWrite, Precondition, StoreError};

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/fleet".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Node record store on a shared Postgres database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &PostgresStoreConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to node store"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the nodes table when it does not exist yet. Production
    /// deployments manage schema out of band; this covers dev mode.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                hostname   TEXT PRIMARY KEY,
                state      TEXT NOT NULL,
                record     JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NodeStore for PostgresStore {
    async fn read(&self, hostname: &str) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query("SELECT record FROM nodes WHERE hostname = $1")
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let record: serde_json::Value = row.try_get("record")?;
                Ok(Some(serde_json::from_value(record)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Node>, StoreError> {
        let rows = sqlx::query("SELECT record FROM nodes ORDER BY hostname")
            .fetch_all(&self.pool)
            .await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let record: serde_json::Value = row.try_get("record")?;
            nodes.push(serde_json::from_value(record)?);
        }
        Ok(nodes)
    }

    async fn write_all(&self, writes: Vec<NodeWrite>) -> Result<Vec<Node>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut committed = Vec::with_capacity(writes.len());

        for write in writes {
            let hostname = write.node.hostname.clone();
            let state = write.node.state.to_string();
            let record = serde_json::to_value(&write.node)?;

            let applied = match write.precondition {
                Precondition::None => {
                    sqlx::query(
                        r#"
                        INSERT INTO nodes (hostname, state, record, updated_at)
                        VALUES ($1, $2, $3, now())
                        ON CONFLICT (hostname) DO UPDATE SET
                            state = EXCLUDED.state,
                            record = EXCLUDED.record,
                            updated_at = EXCLUDED.updated_at
                        "#,
                    )
                    .bind(&hostname)
                    .bind(&state)
                    .bind(&record)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                }
                Precondition::Absent => {
                    sqlx::query(
                        r#"
                        INSERT INTO nodes (hostname, state, record, updated_at)
                        VALUES ($1, $2, $3, now())
                        ON CONFLICT (hostname) DO NOTHING
                        "#,
                    )
                    .bind(&hostname)
                    .bind(&state)
                    .bind(&record)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                }
                Precondition::InState(expected) => {
                    sqlx::query(
                        r#"
                        UPDATE nodes
                        SET state = $2, record = $3, updated_at = now()
                        WHERE hostname = $1 AND state = $4
                        "#,
                    )
                    .bind(&hostname)
                    .bind(&state)
                    .bind(&record)
                    .bind(expected.to_string())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                }
            };

            if applied != 1 {
                // Dropping the transaction rolls back every earlier write.
                let detail = match write.precondition {
                    Precondition::Absent => "record already exists".to_string(),
                    Precondition::InState(expected) => {
                        format!("record not in expected state {expected}")
                    }
                    Precondition::None => "write was not applied".to_string(),
                };
                return Err(StoreError::Conflict { hostname, detail });
            }

            committed.push(write.node);
        }

        tx.commit().await?;
        Ok(committed)
    }
}
