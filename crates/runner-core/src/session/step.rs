use super::*;

impl GameSession {
    pub fn start(&mut self) {
        if !self.finished {
            self.status.mode = RunMode::Running;
        }
    }

    pub fn pause(&mut self) {
        self.status.mode = RunMode::Paused;
    }

    pub fn enqueue_command(&mut self, command: Command, effective_tick: u64) {
        self.queued_commands.push(QueuedCommand {
            effective_tick,
            insertion_sequence: self.next_command_sequence,
            command,
        });
        self.next_command_sequence = self.next_command_sequence.saturating_add(1);
        self.sync_queue_depth();
    }

    pub fn inject_command(&mut self, command: Command) {
        let effective_tick = self.status.current_tick + 1;
        self.enqueue_command(command, effective_tick);
    }

    /// Advances the clock one tick: due commands apply first, then the
    /// countdown deadline, then the pending feedback-delay advance. Returns
    /// false once the run is finished and nothing is left to process.
    pub fn step(&mut self) -> bool {
        let previous_tick = self.status.current_tick;
        self.last_step_metrics = StepMetrics::default();
        if self.finished && self.queued_commands.is_empty() {
            self.status.mode = RunMode::Paused;
            return false;
        }
        self.status.mode = RunMode::Running;
        let tick = self.status.current_tick.saturating_add(1);
        self.status.current_tick = tick;
        let mut sequence_in_tick = 0_u64;

        let applied_commands = self.process_due_commands(tick, &mut sequence_in_tick);
        let mut fired_timers = self.fire_countdown(tick, &mut sequence_in_tick);
        fired_timers += self.fire_pending_advance(tick, &mut sequence_in_tick);

        self.state_hash = mix_state_hash(self.state_hash, tick, sequence_in_tick);
        self.last_step_metrics = StepMetrics {
            advanced_ticks: tick.saturating_sub(previous_tick),
            applied_commands,
            fired_timers,
        };

        if self.finished {
            self.status.mode = RunMode::Paused;
        }
        self.sync_queue_depth();
        true
    }

    pub fn step_n(&mut self, n: u64) -> u64 {
        let mut committed = 0_u64;
        for _ in 0..n {
            if !self.step() {
                break;
            }
            committed += 1;
        }
        committed
    }

    pub fn run_to_tick(&mut self, tick: u64) -> u64 {
        let mut committed = 0_u64;
        while self.status.current_tick < tick {
            if !self.step() {
                break;
            }
            committed += 1;
        }
        committed
    }

    /// Expiry with no answer counts as a wrong answer; on the final
    /// question it goes straight to the terminal state instead of
    /// advancing past the end.
    fn fire_countdown(&mut self, tick: u64, sequence_in_tick: &mut u64) -> u64 {
        let Some(deadline) = self.countdown_deadline else {
            return 0;
        };
        if deadline.due_tick > tick {
            return 0;
        }
        self.countdown_deadline = None;
        if deadline.generation != self.timer_generation || self.answered || self.finished {
            return 0;
        }

        self.answered = true;
        self.feedback.reset();
        self.feedback.trigger_incorrect();
        self.answers.push(AnswerRecord::TimedOut {
            question_index: self.question_index as u32,
        });
        let timeout_event_id = self.push_event(
            tick,
            sequence_in_tick,
            EventType::QuestionTimedOut,
            Some(self.question_index as u32),
            Vec::new(),
            Some(json!({ "score": self.score })),
        );

        if self.is_last_question() {
            self.finalize(tick, sequence_in_tick, vec![timeout_event_id]);
        } else {
            self.schedule_advance(tick);
        }
        self.sync_phase();
        1
    }

    fn fire_pending_advance(&mut self, tick: u64, sequence_in_tick: &mut u64) -> u64 {
        let Some(pending) = self.pending_advance else {
            return 0;
        };
        if pending.due_tick > tick {
            return 0;
        }
        self.pending_advance = None;
        if pending.generation != self.timer_generation || self.finished {
            // Stale timer: a reset superseded this advance.
            return 0;
        }

        if self.is_last_question() {
            self.finalize(tick, sequence_in_tick, Vec::new());
        } else {
            self.question_index += 1;
            self.answered = false;
            self.feedback.reset();
            self.arm_countdown(tick);
            self.push_event(
                tick,
                sequence_in_tick,
                EventType::QuestionAdvanced,
                Some(self.question_index as u32),
                Vec::new(),
                Some(json!({
                    "question_count": self.spec.question_count(),
                    "score": self.score,
                })),
            );
        }
        self.sync_phase();
        1
    }

    /// Terminal transition. The badge threshold is evaluated here, after
    /// the last question's result is already part of the running score.
    fn finalize(&mut self, tick: u64, sequence_in_tick: &mut u64, caused_by: Vec<String>) {
        self.finished = true;
        self.finished_tick = Some(tick);
        self.pending_advance = None;
        self.countdown_deadline = None;
        self.badge_earned = self
            .spec
            .badge
            .map(|rule| self.correct_answers >= rule.min_correct);

        let finished_event_id = self.push_event(
            tick,
            sequence_in_tick,
            EventType::SessionFinished,
            None,
            caused_by,
            Some(json!({
                "score": self.score,
                "max_score": self.spec.max_score(),
                "correct_answers": self.correct_answers,
            })),
        );

        if let Some(rule) = self.spec.badge {
            self.push_event(
                tick,
                sequence_in_tick,
                EventType::BadgeEvaluated,
                None,
                vec![finished_event_id.clone()],
                Some(json!({
                    "earned": self.badge_earned,
                    "min_correct": rule.min_correct,
                    "correct_answers": self.correct_answers,
                })),
            );
        }

        self.push_event(
            tick,
            sequence_in_tick,
            EventType::CompletionRecorded,
            None,
            vec![finished_event_id],
            Some(json!({
                "score": self.score,
                "badge_earned": self.badge_earned,
                "coins": self.spec.reward.total_coins,
                "xp": self.spec.reward.total_xp,
            })),
        );

        self.status.mode = RunMode::Paused;
        self.sync_phase();
    }
}
