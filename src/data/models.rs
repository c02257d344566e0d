//! Data models
//!
//! Rust structs representing database rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A demo record shown on the home page
///
/// Seed data only, no invariants beyond the primary key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub value: f64,
}

/// A signed-in user
///
/// Upserted by unique email on every successful login. No deletion path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Display name from the provider
    pub name: Option<String>,
    /// Avatar URL from the provider
    pub picture: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Identity fields returned by the provider's userinfo endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}
