//! SQLite-backed guild config store.

use std::path::Path;
use std::time::Duration;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::ids::GuildId;

use super::{ConfigStore, ConfigStoreError, GuildTicketConfig};

/// SQLite-backed guild config store.
///
/// Each guild's config is one JSON document, written by a single statement,
/// so a reader never sees a partially written config.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> ConfigStoreError {
    ConfigStoreError::Database(e.to_string())
}

impl SqliteConfigStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: &Path) -> Result<Self, ConfigStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        // The ticket registry writes to the same file through its own connection.
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, ConfigStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ConfigStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, guild_id: GuildId) -> Result<GuildTicketConfig, ConfigStoreError> {
        let conn = self.conn();

        let json: Option<String> = conn
            .query_row(
                "SELECT config FROM guild_configs WHERE guild_id = ?",
                params![guild_id.as_i64()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match json {
            Some(json) => serde_json::from_str(&json).map_err(db_err),
            None => Err(ConfigStoreError::NotFound(guild_id)),
        }
    }

    fn upsert(&self, config: GuildTicketConfig) -> Result<GuildTicketConfig, ConfigStoreError> {
        config.validate().map_err(ConfigStoreError::Validation)?;

        let json = serde_json::to_string(&config).map_err(db_err)?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO guild_configs (guild_id, config, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at",
            params![config.guild_id.as_i64(), json, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;

        debug!(guild_id = %config.guild_id, types = config.ticket_types.len(), "Stored guild ticket config");
        Ok(config)
    }

    fn delete(&self, guild_id: GuildId) -> Result<(), ConfigStoreError> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM guild_configs WHERE guild_id = ?",
                params![guild_id.as_i64()],
            )
            .map_err(db_err)?;

        if removed == 0 {
            return Err(ConfigStoreError::NotFound(guild_id));
        }
        Ok(())
    }

    fn list_guilds(&self) -> Result<Vec<GuildId>, ConfigStoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT guild_id FROM guild_configs ORDER BY guild_id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(db_err)?;

        let mut guilds = Vec::new();
        for row in rows {
            guilds.push(GuildId::from_i64(row.map_err(db_err)?));
        }
        Ok(guilds)
    }
}
