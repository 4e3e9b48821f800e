//! SQLite-backed ticket registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::guild_config::{ConfigStore, ConfigStoreError, RetentionPolicy};
use crate::ids::{ChannelId, GuildId, TicketId, UserId};

use super::{StatusCount, Ticket, TicketError, TicketRegistry, TicketStatus, Transition};

const TICKET_COLUMNS: &str = "guild_id, number, owner_id, type_snapshot, channel_id, status, \
     created_at, closed_at, claimed_by, transcript, channel_released, updated_at";

const OPEN_STATUSES: &str = "('open', 'claimed')";

/// SQLite-backed ticket registry.
///
/// Retention delays for the due listings are looked up in the guild's
/// config; guilds without one use the fallback policy.
pub struct SqliteTicketRegistry {
    conn: Mutex<Connection>,
    configs: Arc<dyn ConfigStore>,
    fallback_retention: RetentionPolicy,
}

fn db_err(e: impl std::fmt::Display) -> TicketError {
    TicketError::Database(e.to_string())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(e: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.extended_code == extended_code)
}

/// True once `delay_secs` have passed since `since`. Delays too large to
/// represent never elapse.
fn has_elapsed(since: DateTime<Utc>, delay_secs: u64, now: DateTime<Utc>) -> bool {
    i64::try_from(delay_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|delay| since.checked_add_signed(delay))
        .is_some_and(|due| due <= now)
}

impl SqliteTicketRegistry {
    /// Open (or create) the registry at `path`.
    pub fn new(path: &Path, configs: Arc<dyn ConfigStore>) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            configs,
            fallback_retention: RetentionPolicy::default(),
        })
    }

    /// Create an in-memory registry (useful for testing).
    pub fn in_memory(configs: Arc<dyn ConfigStore>) -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            configs,
            fallback_retention: RetentionPolicy::default(),
        })
    }

    /// Retention used for guilds that have no config.
    pub fn with_fallback_retention(mut self, retention: RetentionPolicy) -> Self {
        self.fallback_retention = retention;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                guild_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                owner_id INTEGER NOT NULL,
                ticket_type TEXT NOT NULL,
                type_snapshot TEXT NOT NULL,
                channel_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                closed_at TEXT,
                claimed_by INTEGER,
                transcript TEXT,
                channel_released INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (guild_id, number)
            );

            CREATE TABLE IF NOT EXISTS ticket_sequences (
                guild_id INTEGER PRIMARY KEY,
                last_number INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_open_channel
                ON tickets(channel_id) WHERE status IN ('open', 'claimed');
            CREATE INDEX IF NOT EXISTS idx_tickets_owner
                ON tickets(guild_id, owner_id, ticket_type, status);
            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let guild_id = GuildId::from_i64(row.get(0)?);
        let number: i64 = row.get(1)?;
        let owner_id = UserId::from_i64(row.get(2)?);
        let snapshot_json: String = row.get(3)?;
        let channel_id = ChannelId::from_i64(row.get(4)?);
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let closed_at_str: Option<String> = row.get(7)?;
        let claimed_by: Option<i64> = row.get(8)?;
        let transcript: Option<String> = row.get(9)?;
        let channel_released: bool = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let ticket_type = serde_json::from_str(&snapshot_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        let status = status_str.parse::<TicketStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into())
        })?;

        let closed_at = closed_at_str
            .as_deref()
            .map(|value| parse_time(7, value))
            .transpose()?;

        Ok(Ticket {
            id: TicketId::new(guild_id, number as u64),
            owner_id,
            ticket_type,
            channel_id,
            status,
            created_at: parse_time(6, &created_at_str)?,
            closed_at,
            claimed_by: claimed_by.map(UserId::from_i64),
            transcript,
            channel_released,
            updated_at: parse_time(11, &updated_at_str)?,
        })
    }

    fn fetch(conn: &Connection, id: TicketId) -> Result<Ticket, TicketError> {
        conn.query_row(
            &format!(
                "SELECT {} FROM tickets WHERE guild_id = ? AND number = ?",
                TICKET_COLUMNS
            ),
            params![id.guild_id.as_i64(), id.number as i64],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)?
        .ok_or(TicketError::NotFound(id))
    }

    /// Open tickets the owner holds of the same type, not counting `ticket`.
    fn count_open(conn: &Connection, ticket: &Ticket) -> Result<u32, TicketError> {
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM tickets
                 WHERE guild_id = ? AND owner_id = ? AND ticket_type = ? AND status IN {}
                 AND number != ?",
                OPEN_STATUSES
            ),
            params![
                ticket.id.guild_id.as_i64(),
                ticket.owner_id.as_i64(),
                ticket.ticket_type.name,
                ticket.id.number as i64,
            ],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn query(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM tickets WHERE {} ORDER BY guild_id, number",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params, Self::row_to_ticket)
            .map_err(db_err)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result.map_err(db_err)?);
        }
        Ok(tickets)
    }

    /// Keep the tickets whose delay (picked from the guild's retention) has
    /// elapsed since they were closed.
    fn filter_due(
        &self,
        tickets: Vec<Ticket>,
        now: DateTime<Utc>,
        delay: impl Fn(&RetentionPolicy) -> u64,
    ) -> Vec<Ticket> {
        let mut retention: HashMap<GuildId, Option<RetentionPolicy>> = HashMap::new();

        tickets
            .into_iter()
            .filter(|ticket| {
                let guild_id = ticket.id.guild_id;
                let policy = *retention
                    .entry(guild_id)
                    .or_insert_with(|| match self.configs.get(guild_id) {
                        Ok(config) => Some(config.retention()),
                        Err(ConfigStoreError::NotFound(_)) => Some(self.fallback_retention),
                        Err(e) => {
                            warn!(guild_id = %guild_id, error = %e, "Skipping guild: retention lookup failed");
                            None
                        }
                    });

                match (policy, ticket.closed_at) {
                    (Some(policy), Some(closed_at)) => has_elapsed(closed_at, delay(&policy), now),
                    _ => false,
                }
            })
            .collect()
    }
}

impl TicketRegistry for SqliteTicketRegistry {
    fn allocate_id(&self, guild_id: GuildId) -> Result<TicketId, TicketError> {
        let conn = self.conn();
        let number: i64 = conn
            .query_row(
                "INSERT INTO ticket_sequences (guild_id, last_number) VALUES (?, 1)
                 ON CONFLICT(guild_id) DO UPDATE SET last_number = last_number + 1
                 RETURNING last_number",
                params![guild_id.as_i64()],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        Ok(TicketId::new(guild_id, number as u64))
    }

    fn insert(&self, ticket: Ticket) -> Result<Ticket, TicketError> {
        let snapshot_json = serde_json::to_string(&ticket.ticket_type).map_err(db_err)?;

        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        if ticket.status.is_open() {
            let open = Self::count_open(&tx, &ticket)?;
            if open >= ticket.ticket_type.open_cap {
                return Err(TicketError::CapReached {
                    owner_id: ticket.owner_id,
                    ticket_type: ticket.ticket_type.name.clone(),
                    open,
                    cap: ticket.ticket_type.open_cap,
                });
            }

            let channel_taken: bool = tx
                .query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM tickets WHERE channel_id = ? AND status IN {})",
                        OPEN_STATUSES
                    ),
                    params![ticket.channel_id.as_i64()],
                    |row| row.get(0),
                )
                .map_err(db_err)?;

            if channel_taken {
                return Err(TicketError::ChannelInUse(ticket.channel_id));
            }
        }

        tx.execute(
            &format!(
                "INSERT INTO tickets (ticket_type, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TICKET_COLUMNS
            ),
            params![
                ticket.ticket_type.name,
                ticket.id.guild_id.as_i64(),
                ticket.id.number as i64,
                ticket.owner_id.as_i64(),
                snapshot_json,
                ticket.channel_id.as_i64(),
                ticket.status.as_str(),
                format_time(&ticket.created_at),
                ticket.closed_at.as_ref().map(format_time),
                ticket.claimed_by.map(UserId::as_i64),
                ticket.transcript,
                ticket.channel_released,
                format_time(&ticket.updated_at),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) {
                TicketError::Duplicate(ticket.id)
            } else if is_constraint_violation(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
                TicketError::ChannelInUse(ticket.channel_id)
            } else {
                db_err(e)
            }
        })?;

        tx.commit().map_err(db_err)?;

        debug!(ticket_id = %ticket.id, owner_id = %ticket.owner_id, ticket_type = %ticket.ticket_type.name, "Inserted ticket");
        Ok(ticket)
    }

    fn get(&self, id: TicketId) -> Result<Ticket, TicketError> {
        let conn = self.conn();
        Self::fetch(&conn, id)
    }

    fn find_open_by_user(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Vec<Ticket>, TicketError> {
        self.query(
            &format!(
                "guild_id = ? AND owner_id = ? AND status IN {}",
                OPEN_STATUSES
            ),
            params![guild_id.as_i64(), user_id.as_i64()],
        )
    }

    fn list_open_in_guild(&self, guild_id: GuildId) -> Result<Vec<Ticket>, TicketError> {
        self.query(
            &format!("guild_id = ? AND status IN {}", OPEN_STATUSES),
            params![guild_id.as_i64()],
        )
    }

    fn update(&self, id: TicketId, transition: &Transition) -> Result<Ticket, TicketError> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let current = Self::fetch(&tx, id)?;
        let next = current.apply(transition)?;

        // Reopening puts the ticket back under the owner's cap.
        if next.status.is_open() && !current.status.is_open() {
            let open = Self::count_open(&tx, &next)?;
            if open >= next.ticket_type.open_cap {
                return Err(TicketError::CapReached {
                    owner_id: next.owner_id,
                    ticket_type: next.ticket_type.name.clone(),
                    open,
                    cap: next.ticket_type.open_cap,
                });
            }
        }

        tx.execute(
            "UPDATE tickets
             SET status = ?, closed_at = ?, claimed_by = ?, transcript = ?, updated_at = ?
             WHERE guild_id = ? AND number = ?",
            params![
                next.status.as_str(),
                next.closed_at.as_ref().map(format_time),
                next.claimed_by.map(UserId::as_i64),
                next.transcript,
                format_time(&next.updated_at),
                id.guild_id.as_i64(),
                id.number as i64,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
                TicketError::ChannelInUse(next.channel_id)
            } else {
                db_err(e)
            }
        })?;

        tx.commit().map_err(db_err)?;

        debug!(ticket_id = %id, from = %current.status, to = %next.status, "Ticket transitioned");
        Ok(next)
    }

    fn mark_channel_released(&self, id: TicketId) -> Result<Ticket, TicketError> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE tickets SET channel_released = 1 WHERE guild_id = ? AND number = ?",
                params![id.guild_id.as_i64(), id.number as i64],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(TicketError::NotFound(id));
        }
        Self::fetch(&conn, id)
    }

    fn list_due_for_archival(&self, now: DateTime<Utc>) -> Result<Vec<Ticket>, TicketError> {
        let closed = self.query("status = 'closed'", &[])?;
        Ok(self.filter_due(closed, now, |policy| policy.archive_delay_secs))
    }

    fn list_due_for_deletion(&self, now: DateTime<Utc>) -> Result<Vec<Ticket>, TicketError> {
        let archived = self.query("status = 'archived'", &[])?;
        Ok(self.filter_due(archived, now, |policy| policy.delete_delay_secs))
    }

    fn list_pending_channel_release(&self) -> Result<Vec<Ticket>, TicketError> {
        self.query("status = 'deleted' AND channel_released = 0", &[])
    }

    fn count_by_status(&self) -> Result<Vec<StatusCount>, TicketError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM tickets GROUP BY status")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in rows {
            let (status, count) = row.map_err(db_err)?;
            counts.insert(status, count as u64);
        }

        Ok(TicketStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counts.get(status.as_str()).copied().unwrap_or(0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild_config::{GuildTicketConfig, SqliteConfigStore};
    use crate::ids::{CategoryId, RoleId};
    use crate::ticket::TicketTypeSnapshot;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn create_test_registry() -> (SqliteTicketRegistry, Arc<SqliteConfigStore>) {
        let configs = Arc::new(SqliteConfigStore::in_memory().unwrap());
        let registry = SqliteTicketRegistry::in_memory(configs.clone()).unwrap();
        (registry, configs)
    }

    fn snapshot(name: &str, cap: u32) -> TicketTypeSnapshot {
        TicketTypeSnapshot {
            name: name.to_string(),
            display_name: None,
            category_id: CategoryId(10),
            staff_role_ids: vec![RoleId(5)],
            welcome_template: "Hello {user}".to_string(),
            staff_ping: true,
            open_cap: cap,
        }
    }

    fn new_ticket(
        registry: &SqliteTicketRegistry,
        guild: u64,
        owner: u64,
        channel: u64,
        ticket_type: TicketTypeSnapshot,
    ) -> Ticket {
        let id = registry.allocate_id(GuildId(guild)).unwrap();
        Ticket::new(id, UserId(owner), ticket_type, ChannelId(channel), t0())
    }

    fn insert_closed(
        registry: &SqliteTicketRegistry,
        guild: u64,
        channel: u64,
        closed_at: DateTime<Utc>,
    ) -> Ticket {
        let ticket = registry
            .insert(new_ticket(registry, guild, 1, channel, snapshot("support", 10)))
            .unwrap();
        registry
            .update(ticket.id, &Transition::Close { at: closed_at })
            .unwrap()
    }

    #[test]
    fn test_allocate_id_is_monotonic_per_guild() {
        let (registry, _) = create_test_registry();

        assert_eq!(registry.allocate_id(GuildId(1)).unwrap().number, 1);
        assert_eq!(registry.allocate_id(GuildId(1)).unwrap().number, 2);
        assert_eq!(registry.allocate_id(GuildId(2)).unwrap().number, 1);
        assert_eq!(registry.allocate_id(GuildId(1)).unwrap().number, 3);
    }

    #[test]
    fn test_insert_and_get() {
        let (registry, _) = create_test_registry();
        let ticket = new_ticket(&registry, 1, 100, 500, snapshot("support", 1));

        registry.insert(ticket.clone()).unwrap();
        let fetched = registry.get(ticket.id).unwrap();

        assert_eq!(fetched, ticket);
    }

    #[test]
    fn test_get_missing_ticket() {
        let (registry, _) = create_test_registry();
        let id = TicketId::new(GuildId(1), 99);
        assert!(matches!(registry.get(id), Err(TicketError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn test_insert_enforces_cap_per_type() {
        let (registry, _) = create_test_registry();

        registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();

        let second = registry.insert(new_ticket(&registry, 1, 100, 501, snapshot("support", 1)));
        assert!(matches!(
            second,
            Err(TicketError::CapReached { open: 1, cap: 1, .. })
        ));

        // Another type, another user, another guild are all independent
        registry
            .insert(new_ticket(&registry, 1, 100, 502, snapshot("bug", 1)))
            .unwrap();
        registry
            .insert(new_ticket(&registry, 1, 101, 503, snapshot("support", 1)))
            .unwrap();
        registry
            .insert(new_ticket(&registry, 2, 100, 504, snapshot("support", 1)))
            .unwrap();
    }

    #[test]
    fn test_insert_allows_multiples_up_to_type_cap() {
        let (registry, _) = create_test_registry();

        for channel in 500..503 {
            registry
                .insert(new_ticket(&registry, 1, 100, channel, snapshot("feature", 3)))
                .unwrap();
        }
        let fourth = registry.insert(new_ticket(&registry, 1, 100, 503, snapshot("feature", 3)));
        assert!(matches!(fourth, Err(TicketError::CapReached { open: 3, .. })));
    }

    #[test]
    fn test_closed_tickets_do_not_count_against_cap() {
        let (registry, _) = create_test_registry();
        let first = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();
        registry
            .update(first.id, &Transition::Close { at: t0() })
            .unwrap();

        registry
            .insert(new_ticket(&registry, 1, 100, 501, snapshot("support", 1)))
            .unwrap();
    }

    #[test]
    fn test_reopen_respects_cap() {
        let (registry, _) = create_test_registry();
        let first = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();
        registry
            .update(first.id, &Transition::Close { at: t0() })
            .unwrap();
        registry
            .insert(new_ticket(&registry, 1, 100, 501, snapshot("support", 1)))
            .unwrap();

        let reopen = registry.update(first.id, &Transition::Reopen { at: t0() });
        assert!(matches!(reopen, Err(TicketError::CapReached { .. })));
        assert_eq!(registry.get(first.id).unwrap().status, TicketStatus::Closed);
    }

    #[test]
    fn test_channel_unique_among_open_tickets() {
        let (registry, _) = create_test_registry();
        let first = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();

        let clash = registry.insert(new_ticket(&registry, 1, 101, 500, snapshot("support", 1)));
        assert!(matches!(clash, Err(TicketError::ChannelInUse(ChannelId(500)))));

        registry
            .update(first.id, &Transition::Close { at: t0() })
            .unwrap();
        registry
            .insert(new_ticket(&registry, 1, 101, 500, snapshot("support", 1)))
            .unwrap();

        // Reopening the first ticket would now share the channel
        let reopen = registry.update(first.id, &Transition::Reopen { at: t0() });
        assert!(matches!(reopen, Err(TicketError::ChannelInUse(_))));
        assert_eq!(registry.get(first.id).unwrap().status, TicketStatus::Closed);
    }

    #[test]
    fn test_insert_duplicate_id() {
        let (registry, _) = create_test_registry();
        let ticket = new_ticket(&registry, 1, 100, 500, snapshot("support", 5));
        registry.insert(ticket.clone()).unwrap();

        let mut again = ticket.clone();
        again.channel_id = ChannelId(501);
        assert!(matches!(
            registry.insert(again),
            Err(TicketError::Duplicate(id)) if id == ticket.id
        ));
    }

    #[test]
    fn test_update_illegal_transition_leaves_ticket_unchanged() {
        let (registry, _) = create_test_registry();
        let ticket = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();

        let result = registry.update(ticket.id, &Transition::Delete { at: t0() });
        assert!(matches!(result, Err(TicketError::InvalidTransition { .. })));
        assert_eq!(registry.get(ticket.id).unwrap(), ticket);
    }

    #[test]
    fn test_update_persists_every_field() {
        let (registry, _) = create_test_registry();
        let ticket = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();
        let at = t0() + Duration::milliseconds(1_234);

        let claimed = registry
            .update(ticket.id, &Transition::Claim { by: UserId(7), at })
            .unwrap();
        assert_eq!(registry.get(ticket.id).unwrap(), claimed);

        let closed = registry
            .update(ticket.id, &Transition::Close { at })
            .unwrap();
        let archived = registry
            .update(
                ticket.id,
                &Transition::Archive {
                    transcript: Some("1/1-1.txt".to_string()),
                    at,
                },
            )
            .unwrap();
        assert_eq!(closed.closed_at, Some(at));
        assert_eq!(registry.get(ticket.id).unwrap(), archived);
    }

    #[test]
    fn test_find_open_by_user() {
        let (registry, _) = create_test_registry();
        let a = registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();
        let b = registry
            .insert(new_ticket(&registry, 1, 100, 501, snapshot("bug", 1)))
            .unwrap();
        let c = registry
            .insert(new_ticket(&registry, 1, 100, 502, snapshot("feature", 1)))
            .unwrap();
        registry
            .insert(new_ticket(&registry, 1, 200, 503, snapshot("support", 1)))
            .unwrap();
        registry.update(c.id, &Transition::Close { at: t0() }).unwrap();

        let open = registry.find_open_by_user(GuildId(1), UserId(100)).unwrap();
        let ids: Vec<_> = open.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        let guild_open: Vec<_> = registry
            .list_open_in_guild(GuildId(1))
            .unwrap()
            .iter()
            .map(|t| t.owner_id)
            .collect();
        assert_eq!(guild_open, vec![UserId(100), UserId(100), UserId(200)]);
        assert!(registry.list_open_in_guild(GuildId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_due_listings_use_guild_retention() {
        let (registry, configs) = create_test_registry();
        configs
            .upsert(GuildTicketConfig::new(GuildId(1)).with_retention(60, 600))
            .unwrap();

        let closed_at = t0();
        let ticket = insert_closed(&registry, 1, 500, closed_at);

        assert!(registry
            .list_due_for_archival(closed_at + Duration::seconds(59))
            .unwrap()
            .is_empty());
        let due = registry
            .list_due_for_archival(closed_at + Duration::seconds(60))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ticket.id);

        registry
            .update(
                ticket.id,
                &Transition::Archive {
                    transcript: None,
                    at: closed_at + Duration::seconds(60),
                },
            )
            .unwrap();

        assert!(registry
            .list_due_for_archival(closed_at + Duration::seconds(600))
            .unwrap()
            .is_empty());
        assert!(registry
            .list_due_for_deletion(closed_at + Duration::seconds(599))
            .unwrap()
            .is_empty());
        assert_eq!(
            registry
                .list_due_for_deletion(closed_at + Duration::seconds(600))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_due_listings_fall_back_without_config() {
        let (registry, _) = create_test_registry();
        let registry = registry.with_fallback_retention(RetentionPolicy {
            archive_delay_secs: 10,
            delete_delay_secs: 20,
        });

        insert_closed(&registry, 7, 500, t0());

        assert!(registry
            .list_due_for_archival(t0() + Duration::seconds(9))
            .unwrap()
            .is_empty());
        assert_eq!(
            registry
                .list_due_for_archival(t0() + Duration::seconds(10))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_pending_channel_release() {
        let (registry, configs) = create_test_registry();
        configs
            .upsert(GuildTicketConfig::new(GuildId(1)).with_retention(0, 0))
            .unwrap();

        let ticket = insert_closed(&registry, 1, 500, t0());
        registry
            .update(
                ticket.id,
                &Transition::Archive {
                    transcript: None,
                    at: t0(),
                },
            )
            .unwrap();
        registry
            .update(ticket.id, &Transition::Delete { at: t0() })
            .unwrap();

        let pending = registry.list_pending_channel_release().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(registry.list_due_for_deletion(t0()).unwrap().is_empty());

        let released = registry.mark_channel_released(ticket.id).unwrap();
        assert!(released.channel_released);
        assert!(registry.list_pending_channel_release().unwrap().is_empty());
    }

    #[test]
    fn test_count_by_status() {
        let (registry, _) = create_test_registry();
        registry
            .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 1)))
            .unwrap();
        insert_closed(&registry, 1, 501, t0());
        insert_closed(&registry, 1, 502, t0());

        let counts = registry.count_by_status().unwrap();
        assert_eq!(counts.len(), 5);
        let count_of = |status| {
            counts
                .iter()
                .find(|c| c.status == status)
                .map(|c| c.count)
                .unwrap()
        };
        assert_eq!(count_of(TicketStatus::Open), 1);
        assert_eq!(count_of(TicketStatus::Closed), 2);
        assert_eq!(count_of(TicketStatus::Deleted), 0);
    }

    #[test]
    fn test_records_round_trip_byte_identical_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("warden.db");
        let configs: Arc<dyn ConfigStore> = Arc::new(SqliteConfigStore::in_memory().unwrap());

        let original = {
            let registry = SqliteTicketRegistry::new(&db_path, configs.clone()).unwrap();
            let ticket = registry
                .insert(new_ticket(&registry, 1, 100, 500, snapshot("support", 2)))
                .unwrap();
            registry
                .update(
                    ticket.id,
                    &Transition::Claim {
                        by: UserId(7),
                        at: t0() + Duration::nanoseconds(123_456_789),
                    },
                )
                .unwrap()
        };
        let original_bytes = serde_json::to_vec(&original).unwrap();

        let registry = SqliteTicketRegistry::new(&db_path, configs).unwrap();
        let reloaded = registry.get(original.id).unwrap();
        assert_eq!(serde_json::to_vec(&reloaded).unwrap(), original_bytes);

        // Sequence survives restart
        assert_eq!(registry.allocate_id(GuildId(1)).unwrap().number, 2);
    }
}
