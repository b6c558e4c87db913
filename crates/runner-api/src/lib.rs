//! In-process API facade with command validation, deterministic queueing, and SQLite persistence.

mod persistence;
mod server;
mod subscription;

use std::path::Path;

use contracts::{
    ApiError, Command, CommandPayload, CommandResult, CommandType, CompletionReport, ErrorCode,
    Event, GameSpec, RetryPolicy, SessionConfig, SessionStatus, ShellProps, Snapshot,
    SCHEMA_VERSION_V1,
};
use persistence::SqliteSessionStore;
pub use persistence::{PersistedCommandEntry, PersistedSessionSummary, PersistenceError};
pub use server::{serve, ServerError};
pub use subscription::{PlanSource, SqlitePlanSource, SubscriptionContext};
use runner_core::catalog;
use runner_core::session::GameSession;

#[derive(Debug)]
struct PersistenceState {
    store: SqliteSessionStore,
    persisted_command_count: usize,
    persisted_event_count: usize,
    last_snapshot_tick: Option<u64>,
    completion_recorded: bool,
}

#[derive(Debug)]
pub struct SessionApi {
    session: GameSession,
    command_audit: Vec<CommandResult>,
    command_log: Vec<PersistedCommandEntry>,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
    next_command_serial: u64,
}

impl SessionApi {
    pub fn from_game_id(game_id: &str, config: SessionConfig) -> Result<Self, ApiError> {
        let spec = catalog::game_by_id(game_id).ok_or_else(|| {
            ApiError::new(
                ErrorCode::GameNotFound,
                "unknown game_id",
                Some(format!("game_id={game_id}")),
            )
        })?;
        Self::from_spec(spec, config)
    }

    pub fn from_spec(spec: GameSpec, config: SessionConfig) -> Result<Self, ApiError> {
        let session = GameSession::new(spec, config).map_err(|err| {
            ApiError::new(
                ErrorCode::InvalidCommand,
                "game spec failed validation",
                Some(err.to_string()),
            )
        })?;
        Ok(Self {
            session,
            command_audit: Vec::new(),
            command_log: Vec::new(),
            persistence: None,
            last_persistence_error: None,
            next_command_serial: 0,
        })
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteSessionStore::open(path)?;
        self.persistence = Some(PersistenceState {
            store,
            persisted_command_count: 0,
            persisted_event_count: 0,
            last_snapshot_tick: None,
            completion_recorded: false,
        });
        Ok(())
    }

    pub fn initialize_session_storage(
        &mut self,
        replace_existing_session: bool,
    ) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let session_id = self.session.session_id().to_string();
        if state.store.session_exists(&session_id)? {
            if replace_existing_session {
                state.store.delete_session(&session_id)?;
                state.persisted_command_count = 0;
                state.persisted_event_count = 0;
                state.last_snapshot_tick = None;
                state.completion_recorded = false;
            } else {
                return Err(PersistenceError::SessionAlreadyExists(session_id));
            }
        }

        let bootstrap_snapshot = self.session.snapshot();
        state.store.persist_delta(
            self.session.config(),
            self.session.status(),
            &[],
            &[],
            Some(&bootstrap_snapshot),
        )?;
        state.last_snapshot_tick = Some(bootstrap_snapshot.tick);
        self.last_persistence_error = None;
        Ok(())
    }

    pub fn flush_persistence_checked(&mut self) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let new_commands = &self.command_log[state.persisted_command_count..];
        let new_events = &self.session.events()[state.persisted_event_count..];

        let current_tick = self.session.status().current_tick;
        let cadence = self.session.config().snapshot_every_ticks.max(1);
        let snapshot_due = ((current_tick == 0 && state.last_snapshot_tick.is_none())
            || (current_tick > 0
                && ((current_tick % cadence == 0) || self.session.finished())))
            && state.last_snapshot_tick != Some(current_tick);

        let snapshot = if snapshot_due {
            Some(self.session.snapshot())
        } else {
            None
        };

        state.store.persist_delta(
            self.session.config(),
            self.session.status(),
            new_commands,
            new_events,
            snapshot.as_ref(),
        )?;

        state.persisted_command_count = self.command_log.len();
        state.persisted_event_count = self.session.events().len();

        if let Some(snapshot_payload) = snapshot {
            state.last_snapshot_tick = Some(snapshot_payload.tick);
        }

        if !state.completion_recorded {
            if let Some(report) = self.session.completion_report() {
                state.store.record_completion(&report)?;
                state.completion_recorded = true;
            }
        }

        self.last_persistence_error = None;
        Ok(())
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn config(&self) -> &SessionConfig {
        self.session.config()
    }

    pub fn status(&self) -> &SessionStatus {
        self.session.status()
    }

    pub fn events(&self) -> &[Event] {
        self.session.events()
    }

    pub fn command_audit(&self) -> &[CommandResult] {
        &self.command_audit
    }

    pub fn command_log(&self) -> &[PersistedCommandEntry] {
        &self.command_log
    }

    pub fn shell_view(&self) -> ShellProps {
        self.session.shell_view()
    }

    pub fn completion_report(&self) -> Option<CompletionReport> {
        self.session.completion_report()
    }

    pub fn snapshot_for_current_tick(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn last_step_metrics(&self) -> runner_core::session::StepMetrics {
        self.session.last_step_metrics()
    }

    pub fn start(&mut self) -> &SessionStatus {
        self.session.start();
        self.flush_persistence_if_enabled();
        self.session.status()
    }

    pub fn pause(&mut self) -> &SessionStatus {
        self.session.pause();
        self.flush_persistence_if_enabled();
        self.session.status()
    }

    /// Advance by the requested number of ticks. Auto-starts a paused
    /// session so explicit step requests always advance.
    pub fn step(&mut self, steps: u64) -> (&SessionStatus, u64) {
        self.session.start();
        let committed = self.session.step_n(steps.max(1));
        self.flush_persistence_if_enabled();
        (self.session.status(), committed)
    }

    pub fn run_to_tick(&mut self, tick: u64) -> (&SessionStatus, u64) {
        self.session.start();
        let committed = self.session.run_to_tick(tick);
        self.flush_persistence_if_enabled();
        (self.session.status(), committed)
    }

    /// Submit a player answer and advance one tick so the selection is
    /// applied synchronously from the caller's point of view.
    pub fn select_option(&mut self, option_id: &str) -> CommandResult {
        let command = self.build_command(
            CommandType::SelectOption,
            CommandPayload::SelectOption {
                option_id: option_id.to_string(),
            },
        );
        let result = self.submit_command(command, None);
        if result.accepted {
            self.step(1);
        }
        result
    }

    pub fn reset(&mut self) -> CommandResult {
        let command = self.build_command(CommandType::ResetRun, CommandPayload::ResetRun);
        let result = self.submit_command(command, None);
        if result.accepted {
            self.step(1);
        }
        result
    }

    pub fn submit_command(
        &mut self,
        command: Command,
        effective_tick: Option<u64>,
    ) -> CommandResult {
        let validation_error = self.validate_command(&command, effective_tick);

        let result = match validation_error {
            Some(error) => CommandResult::rejected(&command, error),
            None => {
                match effective_tick {
                    Some(tick) => self.session.enqueue_command(command.clone(), tick),
                    None => self.session.inject_command(command.clone()),
                }
                CommandResult::accepted(&command)
            }
        };

        let scheduled_tick =
            effective_tick.unwrap_or(self.session.status().current_tick + 1);
        self.command_audit.push(result.clone());
        self.command_log.push(PersistedCommandEntry {
            command,
            result: result.clone(),
            effective_tick: scheduled_tick,
        });
        self.flush_persistence_if_enabled();
        result
    }

    fn build_command(&mut self, command_type: CommandType, payload: CommandPayload) -> Command {
        let serial = self.next_command_serial;
        self.next_command_serial += 1;
        Command::new(
            format!("cmd_{serial:06}"),
            self.session.session_id(),
            self.session.status().current_tick,
            command_type,
            payload,
        )
    }

    fn flush_persistence_if_enabled(&mut self) {
        if self.persistence.is_none() {
            return;
        }

        if let Err(err) = self.flush_persistence_checked() {
            log::warn!("persistence flush failed: {err}");
            self.last_persistence_error = Some(err.to_string());
        }
    }

    fn validate_command(&self, command: &Command, effective_tick: Option<u64>) -> Option<ApiError> {
        if command.schema_version != SCHEMA_VERSION_V1 {
            return Some(ApiError::new(
                ErrorCode::ContractVersionUnsupported,
                "Unsupported schema_version",
                Some(format!(
                    "got={} expected={}",
                    command.schema_version, SCHEMA_VERSION_V1
                )),
            ));
        }

        if command.session_id != self.session.session_id() {
            return Some(ApiError::new(
                ErrorCode::SessionNotFound,
                "command.session_id does not match active session",
                None,
            ));
        }

        if !command_type_matches_payload(command.command_type, &command.payload) {
            return Some(ApiError::new(
                ErrorCode::InvalidCommand,
                "command_type does not match payload variant",
                None,
            ));
        }

        match &command.payload {
            CommandPayload::SessionStepTick { steps } if *steps == 0 => {
                return Some(ApiError::new(
                    ErrorCode::InvalidCommand,
                    "session.step_tick requires steps >= 1",
                    None,
                ))
            }
            CommandPayload::SessionRunToTick { target_tick }
                if *target_tick <= self.session.status().current_tick =>
            {
                return Some(ApiError::new(
                    ErrorCode::TickOutOfRange,
                    "target_tick must be ahead of the current tick",
                    Some(format!(
                        "target_tick={} current_tick={}",
                        target_tick,
                        self.session.status().current_tick
                    )),
                ))
            }
            CommandPayload::SelectOption { option_id } => {
                if self.session.finished() {
                    return Some(ApiError::new(
                        ErrorCode::SessionStateConflict,
                        "session is already finished",
                        None,
                    ));
                }
                if self.session.current_question().option(option_id).is_none() {
                    return Some(ApiError::new(
                        ErrorCode::UnknownOptionId,
                        "option_id does not belong to the current question",
                        Some(format!("option_id={option_id}")),
                    ));
                }
            }
            CommandPayload::ResetRun => {
                if self.session.spec().retry == RetryPolicy::BelowBadgeThreshold
                    && self.session.badge_earned() == Some(true)
                {
                    return Some(ApiError::new(
                        ErrorCode::RetryNotAllowed,
                        "badge already earned; this game only allows retries below the threshold",
                        None,
                    ));
                }
            }
            _ => {}
        }

        if let Some(scheduled_tick) = effective_tick {
            let min_tick = self.session.status().current_tick + 1;
            if scheduled_tick < min_tick {
                return Some(ApiError::new(
                    ErrorCode::TickOutOfRange,
                    "cannot schedule command in the past",
                    Some(format!(
                        "scheduled_tick={} min_tick={}",
                        scheduled_tick, min_tick
                    )),
                ));
            }
        }

        None
    }
}

fn command_type_matches_payload(command_type: CommandType, payload: &CommandPayload) -> bool {
    matches!(
        (command_type, payload),
        (CommandType::SessionStart, CommandPayload::SessionStart)
            | (CommandType::SessionPause, CommandPayload::SessionPause)
            | (
                CommandType::SessionStepTick,
                CommandPayload::SessionStepTick { .. }
            )
            | (
                CommandType::SessionRunToTick,
                CommandPayload::SessionRunToTick { .. }
            )
            | (CommandType::SelectOption, CommandPayload::SelectOption { .. })
            | (CommandType::ResetRun, CommandPayload::ResetRun)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_api(game_id: &str) -> SessionApi {
        let config = SessionConfig::for_game("session_test", game_id);
        SessionApi::from_game_id(game_id, config).expect("builtin game should load")
    }

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();

        std::env::temp_dir().join(format!("game_runs_{name}_{nanos}.sqlite"))
    }

    fn cleanup_db(path: &std::path::Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }

    #[test]
    fn unknown_game_id_is_rejected() {
        let config = SessionConfig::for_game("session_test", "no-such-game");
        let err = SessionApi::from_game_id("no-such-game", config)
            .err()
            .expect("should reject");
        assert_eq!(err.error_code, ErrorCode::GameNotFound);
    }

    #[test]
    fn rejects_mismatched_payload_type() {
        let mut api = test_api("finance-teens-10");
        let bad = Command::new(
            "cmd_bad",
            "session_test",
            0,
            CommandType::SessionStart,
            CommandPayload::ResetRun,
        );

        let result = api.submit_command(bad, None);
        assert!(!result.accepted);
        assert_eq!(
            result.error.expect("error").error_code,
            ErrorCode::InvalidCommand
        );
    }

    #[test]
    fn rejects_unknown_option_for_current_question() {
        let mut api = test_api("finance-teens-10");
        api.start();
        let result = api.select_option("not_an_option");
        assert!(!result.accepted);
        assert_eq!(
            result.error.expect("error").error_code,
            ErrorCode::UnknownOptionId
        );
    }

    #[test]
    fn select_after_finish_is_a_state_conflict() {
        let mut api = test_api("finance-teens-10");
        api.start();
        for _ in 0..5 {
            assert!(api.select_option("save").accepted);
            api.step(12);
        }
        assert!(api.session().finished());

        let result = api.select_option("save");
        assert!(!result.accepted);
        assert_eq!(
            result.error.expect("error").error_code,
            ErrorCode::SessionStateConflict
        );
    }

    #[test]
    fn retry_is_blocked_once_badge_is_earned() {
        // ehe-kids-3 only allows retries while the badge is still missing.
        let mut api = test_api("ehe-kids-3");
        api.start();
        for option_id in ["share", "help", "cleanup", "invite", "teach"] {
            assert!(api.select_option(option_id).accepted);
            api.step(17);
        }
        assert!(api.session().finished());
        assert_eq!(api.session().badge_earned(), Some(true));

        let result = api.reset();
        assert!(!result.accepted);
        assert_eq!(
            result.error.expect("error").error_code,
            ErrorCode::RetryNotAllowed
        );
    }

    #[test]
    fn retry_below_threshold_is_allowed() {
        let mut api = test_api("ehe-kids-3");
        api.start();
        for option_id in ["share", "watch", "avoid", "stare", "rush"] {
            assert!(api.select_option(option_id).accepted);
            api.step(17);
        }
        assert!(api.session().finished());
        assert_eq!(api.session().badge_earned(), Some(false));

        let result = api.reset();
        assert!(result.accepted);
        assert!(!api.session().finished());
        assert_eq!(api.session().score(), 0);
    }

    #[test]
    fn run_to_tick_behind_current_is_out_of_range() {
        let mut api = test_api("finance-teens-10");
        api.start();
        api.step(5);

        let command = Command::new(
            "cmd_back",
            "session_test",
            api.status().current_tick,
            CommandType::SessionRunToTick,
            CommandPayload::SessionRunToTick { target_tick: 2 },
        );
        let result = api.submit_command(command, None);
        assert!(!result.accepted);
        assert_eq!(
            result.error.expect("error").error_code,
            ErrorCode::TickOutOfRange
        );
    }

    #[test]
    fn persists_session_and_records_completion_once() {
        let db_path = temp_db_path("completion");
        let mut api = test_api("finance-teens-10");
        api.attach_sqlite_store(&db_path)
            .expect("should attach sqlite store");
        api.initialize_session_storage(true)
            .expect("storage init should succeed");

        api.start();
        for _ in 0..5 {
            assert!(api.select_option("save").accepted);
            api.step(12);
        }
        assert!(api.session().finished());
        api.flush_persistence_checked().expect("flush");
        // A second flush after finish must not duplicate the completion row.
        api.step(1);

        let store = SqliteSessionStore::open(&db_path).expect("reopen");
        let completions = store.list_completions(10).expect("list");
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].score, 5);
        assert_eq!(completions[0].badge_earned, Some(true));

        drop(store);
        cleanup_db(&db_path);
    }
}
