//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-bound queries.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite, SqlitePool};

use super::models::*;
use crate::error::AppError;
use crate::metrics::DB_QUERIES_TOTAL;

/// Rows inserted into an empty demo table
const SEED_RECORD_COUNT: usize = 10;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the database and prepare the schema
    ///
    /// Creates the database file if it doesn't exist, runs pending
    /// migrations and seeds the demo table when it is empty.
    ///
    /// # Arguments
    /// * `url` - SQLite connection URL, e.g. "sqlite:data/rowboard.db"
    ///
    /// # Errors
    /// Returns error if connection, migration or seeding fails
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        // Create parent directory for file-backed databases
        if let Some(file_path) = sqlite_file_path(url) {
            if let Some(parent) = std::path::Path::new(&file_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
                }
            }
        }

        let connection_string = if url.contains('?') || url.contains(":memory:") {
            url.to_string()
        } else {
            format!("{url}?mode=rwc")
        };

        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        let db = Self { pool };
        db.seed_sample_records().await?;

        tracing::info!("Database connected and migrated successfully");

        Ok(db)
    }

    // =========================================================================
    // Records (demo data)
    // =========================================================================

    /// Insert sample rows, only when the demo table is empty.
    ///
    /// Row names are the first 10 hex characters of the SHA-256 of the row
    /// ordinal, values are random floats in [0, 1).
    pub async fn seed_sample_records(&self) -> Result<(), AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playing_with_neon")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        let values: Vec<f64> = {
            let mut rng = rand::thread_rng();
            (0..SEED_RECORD_COUNT).map(|_| rng.r#gen()).collect()
        };

        let mut tx = self.pool.begin().await?;
        for (i, value) in values.into_iter().enumerate() {
            let name = short_hex_digest(&(i + 1).to_string());
            sqlx::query("INSERT INTO playing_with_neon (name, value) VALUES (?, ?)")
                .bind(&name)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["insert", "playing_with_neon"])
            .inc();
        tracing::info!(rows = SEED_RECORD_COUNT, "Seeded sample records");

        Ok(())
    }

    /// Get all demo records in id order
    pub async fn get_records(&self) -> Result<Vec<Record>, AppError> {
        let records = sqlx::query_as::<_, Record>(
            "SELECT id, name, value FROM playing_with_neon ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["select", "playing_with_neon"])
            .inc();

        Ok(records)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert or update a user, keyed by unique email
    ///
    /// Name and picture are refreshed on every login; id and created_at
    /// are stable across upserts.
    ///
    /// # Returns
    /// The stored row
    pub async fn upsert_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (email, name, picture)
            VALUES (?, ?, ?)
            ON CONFLICT(email)
            DO UPDATE SET name = excluded.name, picture = excluded.picture
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.picture)
        .execute(&self.pool)
        .await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["upsert", "users"])
            .inc();

        self.get_user_by_email(&new_user.email)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Look up a user by email
    ///
    /// # Returns
    /// The user or None if no row matches
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, picture, is_active, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["select", "users"])
            .inc();

        Ok(user)
    }
}

/// File path of a `sqlite:` URL, None for in-memory databases
fn sqlite_file_path(url: &str) -> Option<String> {
    let path = url.strip_prefix("sqlite:")?;
    let path = path.strip_prefix("//").unwrap_or(path);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(path.to_string())
}

fn short_hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..10].to_string()
}
