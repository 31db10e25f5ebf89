use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    cache::LinkCache,
    error::StoreError,
    models::{Link, NewClick, NewLink},
    store::{ClickStore, LinkStore},
};

/// SQLite-backed implementation of both store traits.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a connection pool, creating the database file if it doesn't
    /// exist yet.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(
                database_url
                    .parse::<SqliteConnectOptions>()?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .foreign_keys(true),
            )
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

// ── Warm-up ────────────────────────────────────────────────────────────────

/// Load every link into the redirect cache at startup.
pub async fn warm_cache(store: &dyn LinkStore, cache: &LinkCache) -> Result<(), StoreError> {
    let links = store.list_links().await?;

    for link in &links {
        cache.set(link);
    }

    tracing::info!("Cache warmed with {} link(s)", cache.len());
    Ok(())
}

// ── Links ──────────────────────────────────────────────────────────────────

#[async_trait]
impl LinkStore for SqliteStore {
    async fn create_link(&self, link: NewLink) -> Result<Link, StoreError> {
        let id = sqlx::query(
            "INSERT INTO links (short_code, original_url, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&link.short_code)
        .bind(&link.original_url)
        .bind(link.created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Link {
            id,
            short_code: link.short_code,
            original_url: link.original_url,
            created_at: link.created_at,
        })
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Link, StoreError> {
        let link: Option<Link> = sqlx::query_as(
            "SELECT id, short_code, original_url, created_at
             FROM links WHERE short_code = ?1",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        link.ok_or(StoreError::NotFound)
    }

    async fn list_links(&self) -> Result<Vec<Link>, StoreError> {
        let links: Vec<Link> = sqlx::query_as(
            "SELECT id, short_code, original_url, created_at
             FROM links ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn count_clicks(&self, link_id: i64) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks WHERE link_id = ?1")
            .bind(link_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

// ── Clicks ─────────────────────────────────────────────────────────────────

#[async_trait]
impl ClickStore for SqliteStore {
    async fn create_click(&self, click: &NewClick) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO clicks (link_id, clicked_at, user_agent, ip_address)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(click.link_id)
        .bind(click.clicked_at)
        .bind(click.user_agent.as_deref())
        .bind(click.ip_address.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
