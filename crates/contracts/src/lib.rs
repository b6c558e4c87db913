//! v1 cross-boundary contracts for the game-run kernel, API, persistence,
//! and shell consumers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod subscription;

pub use subscription::{PlanFeatures, PlanType, Subscription, SubscriptionStatus};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Clock resolution of the run kernel. One tick is 100ms, so the
/// 800-2000ms feedback delays and per-question countdowns of the game
/// catalog land on exact tick boundaries.
pub const TICKS_PER_SECOND: u64 = 10;
pub const MILLIS_PER_TICK: u64 = 1000 / TICKS_PER_SECOND;

pub fn millis_to_ticks(millis: u64) -> u64 {
    millis.div_ceil(MILLIS_PER_TICK)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Finance,
    CivicResponsibility,
    Entrepreneurship,
    Health,
    DigitalCitizenship,
    Sustainability,
    Ai,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Kids,
    Teens,
}

/// One selectable answer. Correctness is always the canonical `correct`
/// flag here; per-game duck-typed shapes (`isCorrect`, `isCompassionate`,
/// `isRespectful`) are normalized at the catalog boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub ordinal: u32,
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
}

impl Question {
    pub fn option(&self, option_id: &str) -> Option<&ChoiceOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn has_correct_option(&self) -> bool {
        self.options.iter().any(|option| option.correct)
    }
}

/// Badge is earned iff the final correct-answer count reaches the
/// threshold, evaluated only after the last question's result is in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeRule {
    pub min_correct: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownRule {
    pub seconds_per_question: u64,
}

impl CountdownRule {
    pub fn ticks_per_question(&self) -> u64 {
        self.seconds_per_question.max(1) * TICKS_PER_SECOND
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    Always,
    /// Retry is offered only when the badge threshold was missed.
    BelowBadgeThreshold,
}

/// Static reward configuration sourced from the game catalog; forwarded to
/// the shell, never computed by the runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardGrant {
    pub coins_per_level: u32,
    pub total_coins: u32,
    pub total_xp: u32,
}

impl Default for RewardGrant {
    fn default() -> Self {
        Self {
            coins_per_level: 5,
            total_coins: 5,
            total_xp: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSpec {
    pub schema_version: String,
    pub game_id: String,
    pub title: String,
    pub pillar: Pillar,
    pub audience: Audience,
    pub questions: Vec<Question>,
    pub points_per_question: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<BadgeRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<CountdownRule>,
    pub feedback_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    pub reward: RewardGrant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_game: Option<String>,
    pub total_levels: u32,
    pub current_level: u32,
}

impl GameSpec {
    pub fn question_count(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn max_score(&self) -> u32 {
        self.question_count() * self.points_per_question
    }

    pub fn feedback_delay_ticks(&self) -> u64 {
        millis_to_ticks(self.feedback_delay_ms).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub schema_version: String,
    pub session_id: String,
    pub game_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    #[serde(default)]
    pub shuffle_questions: bool,
    pub snapshot_every_ticks: u64,
    pub notes: Option<String>,
}

impl SessionConfig {
    pub fn for_game(session_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: session_id.into(),
            game_id: game_id.into(),
            seed: 1337,
            shuffle_questions: false,
            snapshot_every_ticks: TICKS_PER_SECOND * 10,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Running,
    Paused,
}

/// `Answering -> Feedback -> [Answering | Finished]`; `Finished` is
/// terminal except through an explicit reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Answering,
    Feedback,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub schema_version: String,
    pub session_id: String,
    pub game_id: String,
    pub current_tick: u64,
    pub mode: RunMode,
    pub phase: RunPhase,
    pub queue_depth: usize,
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::Finished
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session_id={} game_id={} tick={} mode={:?} phase={:?} queue_depth={}",
            self.session_id,
            self.game_id,
            self.current_tick,
            self.mode,
            self.phase,
            self.queue_depth
        )
    }
}

/// How a single question was resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerRecord {
    Selected {
        question_index: u32,
        option_id: String,
        correct: bool,
    },
    TimedOut {
        question_index: u32,
    },
}

impl AnswerRecord {
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Selected { correct: true, .. })
    }
}

/// Serializable view of the run state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRunState {
    pub schema_version: String,
    pub question_index: u32,
    pub question_count: u32,
    pub score: u32,
    pub correct_answers: u32,
    pub answered: bool,
    pub finished: bool,
    pub badge_earned: Option<bool>,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionReport {
    pub schema_version: String,
    pub session_id: String,
    pub game_id: String,
    pub score: u32,
    pub max_score: u32,
    pub correct_answers: u32,
    pub badge_earned: Option<bool>,
    pub reward: RewardGrant,
    pub next_game: Option<String>,
    pub finished_tick: u64,
}

/// Props contract of the hosting shell. The runner's only obligation is to
/// keep these consistent with its internal state on every projection; the
/// host owns all presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellProps {
    pub schema_version: String,
    pub title: String,
    pub subtitle: String,
    pub score: u32,
    pub max_score: u32,
    pub show_game_over: bool,
    pub current_level: u32,
    pub total_levels: u32,
    pub coins_per_level: u32,
    pub total_coins: u32,
    pub total_xp: u32,
    pub show_confetti: bool,
    pub flash_points: Option<u32>,
    pub show_answer_confetti: bool,
    pub progress_percent: u32,
    pub next_game: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    SessionStart,
    SessionPause,
    SessionStepTick,
    SessionRunToTick,
    SelectOption,
    ResetRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    SessionStart,
    SessionPause,
    SessionStepTick { steps: u64 },
    SessionRunToTick { target_tick: u64 },
    SelectOption { option_id: String },
    ResetRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub schema_version: String,
    pub command_id: String,
    pub session_id: String,
    pub issued_at_tick: u64,
    pub command_type: CommandType,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(
        command_id: impl Into<String>,
        session_id: impl Into<String>,
        issued_at_tick: u64,
        command_type: CommandType,
        payload: CommandPayload,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command_id.into(),
            session_id: session_id.into(),
            issued_at_tick,
            command_type,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GameNotFound,
    SessionNotFound,
    InvalidCommand,
    InvalidQuery,
    UnknownOptionId,
    RetryNotAllowed,
    TickOutOfRange,
    ContractVersionUnsupported,
    SessionStateConflict,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResult {
    pub schema_version: String,
    pub command_id: String,
    pub session_id: String,
    pub accepted: bool,
    pub error: Option<ApiError>,
}

impl CommandResult {
    pub fn accepted(command: &Command) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            session_id: command.session_id.clone(),
            accepted: true,
            error: None,
        }
    }

    pub fn rejected(command: &Command, error: ApiError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            session_id: command.session_id.clone(),
            accepted: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStarted,
    SessionPaused,
    CommandApplied,
    OptionSelected,
    AnswerScored,
    QuestionAdvanced,
    QuestionTimedOut,
    SessionFinished,
    BadgeEvaluated,
    SessionReset,
    CompletionRecorded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub session_id: String,
    pub tick: u64,
    pub created_at: String,
    pub event_id: String,
    pub sequence_in_tick: u64,
    pub event_type: EventType,
    pub question_index: Option<u32>,
    pub caused_by: Vec<String>,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub schema_version: String,
    pub session_id: String,
    pub tick: u64,
    pub created_at: String,
    pub snapshot_id: String,
    pub state_hash: String,
    pub run_state: Value,
    pub shell: Value,
    pub perf_stats: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub schema_version: String,
    pub query_type: String,
    pub session_id: String,
    pub generated_at_tick: u64,
    pub data: Value,
}

pub mod serde_u64_string {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_up_to_whole_ticks() {
        assert_eq!(millis_to_ticks(1500), 15);
        assert_eq!(millis_to_ticks(801), 9);
        assert_eq!(millis_to_ticks(0), 0);
    }

    #[test]
    fn command_round_trip_serialization() {
        let command = Command::new(
            "cmd_001",
            "session_001",
            4,
            CommandType::SelectOption,
            CommandPayload::SelectOption {
                option_id: "save".to_string(),
            },
        );
        let serialized = serde_json::to_string(&command).expect("serialize");
        let decoded: Command = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(command, decoded);
    }

    #[test]
    fn seed_serializes_as_string() {
        let config = SessionConfig::for_game("session_001", "finance-teens-10");
        let value = serde_json::to_value(&config).expect("serialize");
        assert_eq!(value["seed"], serde_json::json!("1337"));
    }
}
