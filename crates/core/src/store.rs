//! Concept Store
//!
//! The prerequisite graph: concept nodes with a definition and directed
//! "requires" edges between them. The tutor only depends on the
//! `ConceptStore` trait; `SqliteConceptStore` keeps the graph in a single
//! local SQLite file and talks to it through parameterized `sqlx` queries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tracing::{debug, info};

use crate::concept::ConceptContext;

/// Operations the tutor and the ingestion pass need from the concept graph.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConceptStore: Send + Sync {
    /// Creates the concept if absent, otherwise overwrites its definition.
    async fn upsert_concept(&self, name: &str, definition: &str) -> Result<()>;

    /// Ensures both concepts exist and exactly one `from -> to` edge joins them.
    async fn upsert_requires(&self, from: &str, to: &str) -> Result<()>;

    /// Case-insensitive lookup of a concept and its direct prerequisites.
    async fn get_context(&self, name: &str) -> Result<Option<ConceptContext>>;

    /// All stored concept names.
    async fn list_all_concept_names(&self) -> Result<Vec<String>>;

    /// Releases the underlying connection.
    async fn close(&self);
}

/// A `ConceptStore` backed by a SQLite database file.
#[derive(Clone)]
pub struct SqliteConceptStore {
    pool: SqlitePool,
}

impl SqliteConceptStore {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    ///
    /// `url` takes the usual `sqlite://path/to/file.db` form; `sqlite::memory:`
    /// gives a private in-memory graph that lives as long as the store.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid graph database URL: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single long-lived connection: the store is single-process, and an
        // in-memory database disappears with its last connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open graph database at {url}"))?;

        let store = Self::new(pool);
        store.run_migrations().await?;
        info!(%url, "Concept graph ready");
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to migrate concept graph schema")?;
        Ok(())
    }
}

#[async_trait]
impl ConceptStore for SqliteConceptStore {
    async fn upsert_concept(&self, name: &str, definition: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO concepts (name, definition)
            VALUES (?1, ?2)
            ON CONFLICT (name) DO UPDATE SET definition = excluded.definition
            "#,
        )
        .bind(name.trim())
        .bind(definition.trim())
        .execute(&self.pool)
        .await?;
        debug!(concept = %name, "Concept upserted");
        Ok(())
    }

    async fn upsert_requires(&self, from: &str, to: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for name in [from, to] {
            sqlx::query(
                "INSERT INTO concepts (name, definition) VALUES (?1, '') ON CONFLICT (name) DO NOTHING",
            )
            .bind(name.trim())
            .execute(&mut *tx)
            .await?;
        }

        // Edges always point at canonical names, whatever casing the caller used.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO requires (source, target)
            SELECT a.name, b.name FROM concepts a, concepts b
            WHERE a.name = ?1 AND b.name = ?2
            "#,
        )
        .bind(from.trim())
        .bind(to.trim())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%from, %to, "Requires edge upserted");
        Ok(())
    }

    async fn get_context(&self, name: &str) -> Result<Option<ConceptContext>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT name, definition FROM concepts WHERE name = ?1")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;

        let Some((name, definition)) = row else {
            return Ok(None);
        };

        let prerequisites: Vec<String> =
            sqlx::query_scalar("SELECT target FROM requires WHERE source = ?1 ORDER BY rowid")
                .bind(&name)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(ConceptContext {
            name,
            definition,
            prerequisites,
        }))
    }

    async fn list_all_concept_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM concepts ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
