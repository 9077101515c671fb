use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::{include_res, AppResult};

pub const SCHEMA_VERSION: i64 = 1;

/// Applies the schema to a fresh database, or checks an existing one is at
/// [`SCHEMA_VERSION`].
pub async fn init(db_pool: &SqlitePool) -> AppResult<()> {
    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(db_pool)
        .await?;

    match version {
        0 => {
            info!("creating schema version {SCHEMA_VERSION}");
            let mut tx = db_pool.begin().await?;
            sqlx::raw_sql(include_res!(str, "/schema.sql"))
                .execute(&mut *tx)
                .await?;
            let stamp = format!("PRAGMA user_version = {SCHEMA_VERSION}");
            sqlx::raw_sql(&stamp)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        SCHEMA_VERSION => info!("schema version {SCHEMA_VERSION} ok"),
        other => {
            return Err(format!(
                "database schema version {other} is not supported (expected {SCHEMA_VERSION})"
            ))?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// Comma separated form input, trimmed, empties dropped.
    pub fn parse(input: &str) -> Self {
        Tags(
            input
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::Value::from(self.0.clone()).to_string()
    }
}

impl TryFrom<String> for Tags {
    type Error = serde_json::Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Ok(Tags(serde_json::from_str(&raw)?))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub alias: String,
    pub therian_type: String,
    pub animal_identity: Option<String>,
    #[sqlx(try_from = "String")]
    pub tags: Tags,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub safe_mode: bool,
    pub created_at: i64,
}

impl Profile {
    pub async fn find(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<Profile>> {
        Ok(
            sqlx::query_as("SELECT * FROM profiles WHERE id=?")
                .bind(user_id)
                .fetch_optional(db_pool)
                .await?
        )
    }

    pub fn display_alias(&self) -> &str {
        match self.alias.trim() {
            "" => "Anon",
            alias => alias,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Message {
    pub seq: i64,
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: i64,
    pub sender_alias: Option<String>,
    pub sender_avatar: Option<String>,
}

pub const MESSAGE_COLUMNS: &str = "m.rowid AS seq, m.id, m.chat_id, m.sender_id, m.content, m.created_at, \
    p.alias AS sender_alias, p.avatar_url AS sender_avatar";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Chat {
    pub id: String,
    pub match_id: Option<String>,
    pub therian_type: Option<String>,
    pub created_at: i64,
}

impl Chat {
    pub async fn find(db_pool: &SqlitePool, chat_id: &str) -> AppResult<Option<Chat>> {
        Ok(
            sqlx::query_as("SELECT id,match_id,therian_type,created_at FROM chats WHERE id=?")
                .bind(chat_id)
                .fetch_optional(db_pool)
                .await?
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Match {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub created_at: i64,
}

impl Match {
    pub fn other(&self, user_id: &str) -> &str {
        if self.user_a == user_id { &self.user_b } else { &self.user_a }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

/// Everyone `user_id` blocked or was blocked by.
pub async fn blocked_peers(db_pool: &SqlitePool, user_id: &str) -> AppResult<HashSet<String>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT from_user,to_user FROM blocks WHERE from_user=? OR to_user=?")
            .bind(user_id)
            .bind(user_id)
            .fetch_all(db_pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(from_user, to_user)| if from_user == user_id { to_user } else { from_user })
        .collect())
}

pub async fn is_blocked_between(db_pool: &SqlitePool, a: &str, b: &str) -> AppResult<bool> {
    Ok(
        sqlx::query("SELECT 1 FROM blocks WHERE (from_user=? AND to_user=?) OR (from_user=? AND to_user=?)")
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .fetch_optional(db_pool)
            .await?
            .is_some()
    )
}
