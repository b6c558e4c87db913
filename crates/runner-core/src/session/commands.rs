use super::*;

impl GameSession {
    pub(super) fn process_due_commands(&mut self, tick: u64, sequence_in_tick: &mut u64) -> u64 {
        self.queued_commands.sort_by(|a, b| {
            a.effective_tick
                .cmp(&b.effective_tick)
                .then(a.insertion_sequence.cmp(&b.insertion_sequence))
        });

        let mut future = Vec::new();
        let mut due = Vec::new();
        for queued in self.queued_commands.drain(..) {
            if queued.effective_tick <= tick {
                due.push(queued);
            } else {
                future.push(queued);
            }
        }
        self.queued_commands = future;
        self.sync_queue_depth();

        let applied = due.len() as u64;
        for queued in due {
            self.apply_command(queued.command, tick, sequence_in_tick);
        }
        applied
    }

    pub(super) fn apply_command(
        &mut self,
        command: Command,
        tick: u64,
        sequence_in_tick: &mut u64,
    ) {
        let command_ref = format!("cmd:{}", command.command_id);
        match &command.payload {
            CommandPayload::SessionStart => {
                self.start();
                self.push_event(
                    tick,
                    sequence_in_tick,
                    EventType::SessionStarted,
                    Some(self.question_index as u32),
                    vec![command_ref.clone()],
                    None,
                );
            }
            CommandPayload::SessionPause => {
                self.pause();
                self.push_event(
                    tick,
                    sequence_in_tick,
                    EventType::SessionPaused,
                    None,
                    vec![command_ref.clone()],
                    None,
                );
            }
            CommandPayload::SessionStepTick { .. } | CommandPayload::SessionRunToTick { .. } => {}
            CommandPayload::SelectOption { option_id } => {
                self.apply_select_option(option_id, tick, sequence_in_tick, &command_ref);
            }
            CommandPayload::ResetRun => {
                self.apply_reset(tick, sequence_in_tick, &command_ref);
            }
        }

        self.push_event(
            tick,
            sequence_in_tick,
            EventType::CommandApplied,
            None,
            vec![command_ref],
            Some(json!({ "command_type": command.command_type })),
        );
    }

    /// The choice handler. A second selection while feedback is showing,
    /// a selection after the run finished, and an option id that does not
    /// belong to the current question are all no-ops.
    fn apply_select_option(
        &mut self,
        option_id: &str,
        tick: u64,
        sequence_in_tick: &mut u64,
        command_ref: &str,
    ) {
        if self.answered || self.finished {
            return;
        }
        let Some(option) = self.current_question().option(option_id) else {
            return;
        };
        let correct = option.correct;
        let points = self.spec.points_per_question;

        self.answered = true;
        self.countdown_deadline = None;
        self.feedback.reset();
        if correct {
            self.score += points;
            self.correct_answers += 1;
            self.feedback.trigger_correct(points);
        } else {
            self.feedback.trigger_incorrect();
        }
        self.answers.push(AnswerRecord::Selected {
            question_index: self.question_index as u32,
            option_id: option_id.to_string(),
            correct,
        });

        let selected_event_id = self.push_event(
            tick,
            sequence_in_tick,
            EventType::OptionSelected,
            Some(self.question_index as u32),
            vec![command_ref.to_string()],
            Some(json!({ "option_id": option_id })),
        );
        self.push_event(
            tick,
            sequence_in_tick,
            EventType::AnswerScored,
            Some(self.question_index as u32),
            vec![selected_event_id],
            Some(json!({
                "correct": correct,
                "points": if correct { points } else { 0 },
                "score": self.score,
            })),
        );

        self.schedule_advance(tick);
        self.sync_phase();
    }

    /// Bumping the generation cancels every effect scheduled before the
    /// reset: a pending advance or countdown that later comes due sees a
    /// generation mismatch and is dropped.
    fn apply_reset(&mut self, tick: u64, sequence_in_tick: &mut u64, command_ref: &str) {
        self.timer_generation = self.timer_generation.saturating_add(1);
        self.pending_advance = None;
        self.countdown_deadline = None;
        self.question_index = 0;
        self.score = 0;
        self.correct_answers = 0;
        self.answered = false;
        self.finished = false;
        self.badge_earned = None;
        self.finished_tick = None;
        self.answers.clear();
        self.feedback.reset();
        self.arm_countdown(tick);
        self.status.mode = RunMode::Running;

        self.push_event(
            tick,
            sequence_in_tick,
            EventType::SessionReset,
            Some(0),
            vec![command_ref.to_string()],
            None,
        );
        self.sync_phase();
    }
}
