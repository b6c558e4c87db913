use std::fmt;
use std::path::Path;

use contracts::{
    Command, CommandResult, CompletionReport, Event, SessionConfig, SessionStatus, Snapshot,
    Subscription,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCommandEntry {
    pub command: Command,
    pub result: CommandResult,
    pub effective_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSessionSummary {
    pub session_id: String,
    pub game_id: String,
    pub status: SessionStatus,
    pub completed: bool,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    NotAttached,
    SessionAlreadyExists(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
            Self::SessionAlreadyExists(session_id) => {
                write!(f, "session {session_id} already exists")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                config_json TEXT NOT NULL,
                status_json TEXT NOT NULL,
                updated_tick INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_commands (
                session_id TEXT NOT NULL,
                command_id TEXT NOT NULL,
                issued_at_tick INTEGER NOT NULL,
                effective_tick INTEGER NOT NULL,
                accepted INTEGER NOT NULL,
                command_json TEXT NOT NULL,
                result_json TEXT NOT NULL,
                PRIMARY KEY (session_id, command_id)
            );
            CREATE TABLE IF NOT EXISTS session_events (
                session_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                tick INTEGER NOT NULL,
                sequence_in_tick INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, event_id)
            );
            CREATE TABLE IF NOT EXISTS snapshots (
                session_id TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                tick INTEGER NOT NULL,
                state_hash TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, snapshot_id)
            );
            CREATE TABLE IF NOT EXISTS completions (
                session_id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                max_score INTEGER NOT NULL,
                correct_answers INTEGER NOT NULL,
                badge_earned INTEGER,
                coins INTEGER NOT NULL,
                xp INTEGER NOT NULL,
                finished_tick INTEGER NOT NULL,
                report_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id TEXT PRIMARY KEY,
                subscription_json TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn persist_delta(
        &mut self,
        config: &SessionConfig,
        status: &SessionStatus,
        commands: &[PersistedCommandEntry],
        events: &[Event],
        snapshot: Option<&Snapshot>,
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;

        let config_json = serde_json::to_string(config)?;
        let status_json = serde_json::to_string(status)?;
        tx.execute(
            "INSERT INTO sessions (session_id, game_id, config_json, status_json, updated_tick)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id)
             DO UPDATE SET status_json = excluded.status_json,
                           updated_tick = excluded.updated_tick",
            params![
                status.session_id.as_str(),
                status.game_id.as_str(),
                config_json,
                status_json,
                i64::try_from(status.current_tick).unwrap_or(i64::MAX),
            ],
        )?;

        for entry in commands {
            let command_json = serde_json::to_string(&entry.command)?;
            let result_json = serde_json::to_string(&entry.result)?;
            tx.execute(
                "INSERT OR IGNORE INTO session_commands (
                    session_id,
                    command_id,
                    issued_at_tick,
                    effective_tick,
                    accepted,
                    command_json,
                    result_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.command.session_id.as_str(),
                    entry.command.command_id.as_str(),
                    i64::try_from(entry.command.issued_at_tick).unwrap_or(i64::MAX),
                    i64::try_from(entry.effective_tick).unwrap_or(i64::MAX),
                    if entry.result.accepted { 1_i64 } else { 0_i64 },
                    command_json,
                    result_json,
                ],
            )?;
        }

        for event in events {
            let payload_json = serde_json::to_string(event)?;
            tx.execute(
                "INSERT OR IGNORE INTO session_events (
                    session_id,
                    event_id,
                    tick,
                    sequence_in_tick,
                    event_type,
                    payload_json,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.session_id.as_str(),
                    event.event_id.as_str(),
                    i64::try_from(event.tick).unwrap_or(i64::MAX),
                    i64::try_from(event.sequence_in_tick).unwrap_or(i64::MAX),
                    format!("{:?}", event.event_type),
                    payload_json,
                    event.created_at.as_str(),
                ],
            )?;
        }

        if let Some(snapshot_payload) = snapshot {
            let payload_json = serde_json::to_string(snapshot_payload)?;
            tx.execute(
                "INSERT OR IGNORE INTO snapshots (
                    session_id,
                    snapshot_id,
                    tick,
                    state_hash,
                    payload_json,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    snapshot_payload.session_id.as_str(),
                    snapshot_payload.snapshot_id.as_str(),
                    i64::try_from(snapshot_payload.tick).unwrap_or(i64::MAX),
                    snapshot_payload.state_hash.as_str(),
                    payload_json,
                    snapshot_payload.created_at.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Records a finished run at most once per session; returns whether a
    /// new row was written.
    pub fn record_completion(&mut self, report: &CompletionReport) -> Result<bool, PersistenceError> {
        let report_json = serde_json::to_string(report)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO completions (
                session_id,
                game_id,
                score,
                max_score,
                correct_answers,
                badge_earned,
                coins,
                xp,
                finished_tick,
                report_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                report.session_id.as_str(),
                report.game_id.as_str(),
                i64::from(report.score),
                i64::from(report.max_score),
                i64::from(report.correct_answers),
                report.badge_earned.map(i64::from),
                i64::from(report.reward.total_coins),
                i64::from(report.reward.total_xp),
                i64::try_from(report.finished_tick).unwrap_or(i64::MAX),
                report_json,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn session_exists(&self, session_id: &str) -> Result<bool, PersistenceError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM session_commands WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM session_events WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM snapshots WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM completions WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_sessions(
        &self,
        limit: usize,
    ) -> Result<Vec<PersistedSessionSummary>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.session_id, s.game_id, s.status_json,
                    EXISTS(SELECT 1 FROM completions c WHERE c.session_id = s.session_id)
             FROM sessions s
             ORDER BY s.updated_tick DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (session_id, game_id, status_json, completed) = row?;
            summaries.push(PersistedSessionSummary {
                session_id,
                game_id,
                status: serde_json::from_str(&status_json)?,
                completed: completed != 0,
            });
        }
        Ok(summaries)
    }

    pub fn list_completions(
        &self,
        limit: usize,
    ) -> Result<Vec<CompletionReport>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT report_json FROM completions ORDER BY finished_tick DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            row.get::<_, String>(0)
        })?;

        let mut reports = Vec::new();
        for row in rows {
            let payload = row?;
            reports.push(serde_json::from_str(&payload)?);
        }
        Ok(reports)
    }

    pub fn load_events_range(
        &self,
        session_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<Event>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json
             FROM session_events
             WHERE session_id = ?1 AND tick >= ?2 AND tick <= ?3
             ORDER BY tick ASC, sequence_in_tick ASC",
        )?;
        let rows = stmt.query_map(
            params![
                session_id,
                i64::try_from(from_tick).unwrap_or(i64::MAX),
                i64::try_from(to_tick).unwrap_or(i64::MAX)
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut events = Vec::new();
        for row in rows {
            let payload = row?;
            events.push(serde_json::from_str::<Event>(&payload)?);
        }
        Ok(events)
    }

    pub fn load_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<Subscription>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT subscription_json FROM subscriptions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn save_subscription(
        &mut self,
        user_id: &str,
        subscription: &Subscription,
    ) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(subscription)?;
        self.conn.execute(
            "INSERT INTO subscriptions (user_id, subscription_json)
             VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET subscription_json = excluded.subscription_json",
            params![user_id, payload],
        )?;
        Ok(())
    }
}
