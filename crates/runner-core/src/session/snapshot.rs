use contracts::{CompletionReport, GameRunState, ShellProps, Snapshot};

use super::*;

impl GameSession {
    pub fn run_state(&self) -> GameRunState {
        GameRunState {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            question_index: self.question_index as u32,
            question_count: self.spec.question_count(),
            score: self.score,
            correct_answers: self.correct_answers,
            answered: self.answered,
            finished: self.finished,
            badge_earned: self.badge_earned,
            answers: self.answers.clone(),
        }
    }

    /// The reward report forwarded to the hosting shell, available exactly
    /// when the run reached its terminal state.
    pub fn completion_report(&self) -> Option<CompletionReport> {
        let finished_tick = self.finished_tick?;
        Some(CompletionReport {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.status.session_id.clone(),
            game_id: self.spec.game_id.clone(),
            score: self.score,
            max_score: self.spec.max_score(),
            correct_answers: self.correct_answers,
            badge_earned: self.badge_earned,
            reward: self.spec.reward,
            next_game: self.spec.next_game.clone(),
            finished_tick,
        })
    }

    /// Projects the host-shell props from current state. Recomputed on
    /// every call so the props never drift from the state machine.
    pub fn shell_view(&self) -> ShellProps {
        let question_count = self.spec.question_count().max(1);
        let subtitle = if self.finished {
            if self.spec.badge.is_some() {
                "Achievement Complete!".to_string()
            } else {
                "Game Complete!".to_string()
            }
        } else {
            format!(
                "Question {} of {}",
                self.question_index as u32 + 1,
                question_count
            )
        };
        let show_confetti = self.finished && self.badge_earned.unwrap_or(self.score > 0);
        let progress_percent =
            ((self.question_index as u32 + 1) * 100).div_ceil(question_count).min(100);

        ShellProps {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            title: self.spec.title.clone(),
            subtitle,
            score: self.score,
            max_score: self.spec.max_score(),
            show_game_over: self.finished,
            current_level: self.spec.current_level,
            total_levels: self.spec.total_levels,
            coins_per_level: self.spec.reward.coins_per_level,
            total_coins: self.spec.reward.total_coins,
            total_xp: self.spec.reward.total_xp,
            show_confetti,
            flash_points: self.feedback.flash_points(),
            show_answer_confetti: self.feedback.answer_confetti(),
            progress_percent,
            next_game: self.spec.next_game.clone(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let tick = self.status.current_tick;
        Snapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.status.session_id.clone(),
            tick,
            created_at: synthetic_timestamp(tick, 0),
            snapshot_id: format!("snap:{}:{tick}", self.status.session_id),
            state_hash: format!("{:016x}", self.state_hash),
            run_state: serde_json::to_value(self.run_state()).unwrap_or_else(|_| json!({})),
            shell: serde_json::to_value(self.shell_view()).unwrap_or_else(|_| json!({})),
            perf_stats: Some(json!({
                "applied_commands": self.last_step_metrics.applied_commands,
                "fired_timers": self.last_step_metrics.fired_timers,
            })),
        }
    }
}
