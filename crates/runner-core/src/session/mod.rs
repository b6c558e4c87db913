mod commands;
mod events;
mod snapshot;
mod step;

use contracts::{
    AnswerRecord, Command, CommandPayload, Event, EventType, GameSpec, Question, RunMode, RunPhase,
    SessionConfig, SessionStatus, SCHEMA_VERSION_V1,
};
use serde_json::json;

use crate::catalog::{self, CatalogError};
use crate::feedback::FeedbackSignal;

#[derive(Debug, Clone)]
struct QueuedCommand {
    effective_tick: u64,
    insertion_sequence: u64,
    command: Command,
}

/// A delayed effect captured together with the timer generation that was
/// current when it was scheduled. If the generation moved on (reset), the
/// effect is stale and must not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledEffect {
    due_tick: u64,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMetrics {
    pub advanced_ticks: u64,
    pub applied_commands: u64,
    pub fired_timers: u64,
}

/// Single-run state machine for one quiz/choice game.
///
/// Lifecycle: `Answering(0) -> Feedback(i) -> [Answering(i+1) | Finished]`,
/// re-entered at `Answering(0)` only through an explicit reset. All inputs
/// arrive as queued commands and all delays fire during [`step`], so a
/// session is fully deterministic for a given config and command sequence.
///
/// [`step`]: GameSession::step
#[derive(Debug)]
pub struct GameSession {
    config: SessionConfig,
    spec: GameSpec,
    status: SessionStatus,
    question_order: Vec<usize>,
    question_index: usize,
    score: u32,
    correct_answers: u32,
    answered: bool,
    finished: bool,
    badge_earned: Option<bool>,
    finished_tick: Option<u64>,
    answers: Vec<AnswerRecord>,
    feedback: FeedbackSignal,
    queued_commands: Vec<QueuedCommand>,
    next_command_sequence: u64,
    event_log: Vec<Event>,
    pending_advance: Option<ScheduledEffect>,
    countdown_deadline: Option<ScheduledEffect>,
    timer_generation: u64,
    state_hash: u64,
    last_step_metrics: StepMetrics,
}

impl GameSession {
    pub fn new(spec: GameSpec, config: SessionConfig) -> Result<Self, CatalogError> {
        catalog::validate_spec(&spec)?;

        let mut question_order = (0..spec.questions.len()).collect::<Vec<_>>();
        if config.shuffle_questions {
            shuffle_in_place(&mut question_order, config.seed);
        }

        let status = SessionStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: config.session_id.clone(),
            game_id: spec.game_id.clone(),
            current_tick: 0,
            mode: RunMode::Paused,
            phase: RunPhase::Answering,
            queue_depth: 0,
        };

        let mut session = Self {
            config,
            spec,
            status,
            question_order,
            question_index: 0,
            score: 0,
            correct_answers: 0,
            answered: false,
            finished: false,
            badge_earned: None,
            finished_tick: None,
            answers: Vec::new(),
            feedback: FeedbackSignal::default(),
            queued_commands: Vec::new(),
            next_command_sequence: 0,
            event_log: Vec::new(),
            pending_advance: None,
            countdown_deadline: None,
            timer_generation: 0,
            state_hash: 0,
            last_step_metrics: StepMetrics::default(),
        };
        session.arm_countdown(0);
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.status.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn spec(&self) -> &GameSpec {
        &self.spec
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn events(&self) -> &[Event] {
        &self.event_log
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn question_index(&self) -> u32 {
        self.question_index as u32
    }

    pub fn answered(&self) -> bool {
        self.answered
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn badge_earned(&self) -> Option<bool> {
        self.badge_earned
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn feedback(&self) -> &FeedbackSignal {
        &self.feedback
    }

    pub fn state_hash(&self) -> u64 {
        self.state_hash
    }

    pub fn last_step_metrics(&self) -> StepMetrics {
        self.last_step_metrics
    }

    pub fn current_question(&self) -> &Question {
        &self.spec.questions[self.question_order[self.question_index]]
    }

    fn sync_phase(&mut self) {
        self.status.phase = if self.finished {
            RunPhase::Finished
        } else if self.answered {
            RunPhase::Feedback
        } else {
            RunPhase::Answering
        };
    }

    fn sync_queue_depth(&mut self) {
        let timers = usize::from(self.pending_advance.is_some())
            + usize::from(self.countdown_deadline.is_some());
        self.status.queue_depth = self.queued_commands.len() + timers;
    }

    fn arm_countdown(&mut self, tick: u64) {
        if let Some(rule) = self.spec.countdown {
            self.countdown_deadline = Some(ScheduledEffect {
                due_tick: tick + rule.ticks_per_question(),
                generation: self.timer_generation,
            });
        }
    }

    fn schedule_advance(&mut self, tick: u64) {
        self.pending_advance = Some(ScheduledEffect {
            due_tick: tick + self.spec.feedback_delay_ticks(),
            generation: self.timer_generation,
        });
    }

    fn is_last_question(&self) -> bool {
        self.question_index + 1 >= self.question_order.len()
    }
}

fn synthetic_timestamp(tick: u64, seq: u64) -> String {
    let millis = tick * contracts::MILLIS_PER_TICK;
    format!(
        "1970-01-01T{:02}:{:02}:{:02}.{:03}Z",
        (millis / 3_600_000) % 24,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        (millis + seq) % 1000
    )
}

fn mix_state_hash(state_hash: u64, tick: u64, sequence_in_tick: u64) -> u64 {
    let mut hash = state_hash ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    hash ^= sequence_in_tick.wrapping_mul(0x517C_C1B7_2722_0A95);
    hash.rotate_left(17)
}

fn mix_event_hash(current: u64, event_id: &str, tick: u64, sequence: u64) -> u64 {
    let mut hash = current ^ tick.wrapping_mul(0xA24B_1C62_5B93_2D47);
    hash ^= sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for byte in event_id.as_bytes() {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x517C_C1B7_2722_0A95);
    }
    hash
}

fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut value = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(29);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    value ^ (value >> 31)
}

fn shuffle_in_place(order: &mut [usize], seed: u64) {
    for index in (1..order.len()).rev() {
        let pick = (mix_seed(seed, index as u64) % (index as u64 + 1)) as usize;
        order.swap(index, pick);
    }
}

#[cfg(test)]
mod tests;
