use contracts::{Command, CommandPayload, CommandType, RunPhase, SessionConfig};

use super::*;
use crate::catalog;

fn session_for(game_id: &str) -> GameSession {
    let spec = catalog::game_by_id(game_id).expect("known game");
    let config = SessionConfig::for_game(format!("session_{game_id}"), game_id);
    GameSession::new(spec, config).expect("valid spec")
}

fn command(session: &GameSession, seq: u64, payload: CommandPayload) -> Command {
    let command_type = match &payload {
        CommandPayload::SessionStart => CommandType::SessionStart,
        CommandPayload::SessionPause => CommandType::SessionPause,
        CommandPayload::SessionStepTick { .. } => CommandType::SessionStepTick,
        CommandPayload::SessionRunToTick { .. } => CommandType::SessionRunToTick,
        CommandPayload::SelectOption { .. } => CommandType::SelectOption,
        CommandPayload::ResetRun => CommandType::ResetRun,
    };
    Command::new(
        format!("cmd_{seq:03}"),
        session.session_id().to_string(),
        session.status().current_tick,
        command_type,
        payload,
    )
}

fn select(session: &mut GameSession, seq: u64, option_id: &str) {
    let cmd = command(
        session,
        seq,
        CommandPayload::SelectOption {
            option_id: option_id.to_string(),
        },
    );
    session.inject_command(cmd);
    session.step();
}

fn run_past_feedback_delay(session: &mut GameSession) {
    let target = session.status().current_tick + session.spec().feedback_delay_ticks();
    session.run_to_tick(target);
}

#[test]
fn scenario_three_of_five_correct_finishes_with_score_three() {
    let mut session = session_for("finance-teens-10");
    // Correct on questions 1, 2, 4; incorrect on 3 and 5.
    for (seq, option_id) in ["save", "save", "spend", "save", "spend"].iter().enumerate() {
        select(&mut session, seq as u64, option_id);
        run_past_feedback_delay(&mut session);
    }
    assert!(session.finished());
    assert_eq!(session.score(), 3);
    assert_eq!(session.status().phase, RunPhase::Finished);
}

#[test]
fn second_selection_during_feedback_is_ignored() {
    let mut session = session_for("finance-teens-10");
    select(&mut session, 0, "save");
    assert_eq!(session.score(), 1);
    assert!(session.answered());

    select(&mut session, 1, "save");
    assert_eq!(session.score(), 1);
    assert_eq!(session.answers().len(), 1);
}

#[test]
fn selection_after_finish_is_ignored() {
    let mut session = session_for("finance-teens-10");
    for seq in 0..5 {
        select(&mut session, seq, "spend");
        run_past_feedback_delay(&mut session);
    }
    assert!(session.finished());
    select(&mut session, 10, "save");
    assert_eq!(session.score(), 0);
    assert_eq!(session.answers().len(), 5);
}

#[test]
fn unknown_option_id_is_a_no_op() {
    let mut session = session_for("finance-teens-10");
    select(&mut session, 0, "not-an-option");
    assert!(!session.answered());
    assert_eq!(session.score(), 0);
    assert_eq!(session.question_index(), 0);
}

#[test]
fn reset_restores_initial_state_from_any_point() {
    let mut session = session_for("finance-teens-10");
    select(&mut session, 0, "save");
    run_past_feedback_delay(&mut session);
    select(&mut session, 1, "save");

    let cmd = command(&session, 2, CommandPayload::ResetRun);
    session.inject_command(cmd);
    session.step();

    assert_eq!(session.question_index(), 0);
    assert_eq!(session.score(), 0);
    assert!(!session.answered());
    assert!(!session.finished());
    assert!(session.answers().is_empty());
    assert_eq!(session.status().phase, RunPhase::Answering);
}

#[test]
fn reset_cancels_a_pending_advance() {
    let mut session = session_for("finance-teens-10");
    select(&mut session, 0, "save");

    // Reset while the advance is still pending, then run well past the
    // tick it was scheduled for.
    let cmd = command(&session, 1, CommandPayload::ResetRun);
    session.inject_command(cmd);
    session.step();
    run_past_feedback_delay(&mut session);
    run_past_feedback_delay(&mut session);

    assert_eq!(session.question_index(), 0);
    assert!(!session.answered());
    let advanced = session
        .events()
        .iter()
        .any(|event| event.event_type == EventType::QuestionAdvanced);
    assert!(!advanced, "stale advance must not fire after reset");
}

#[test]
fn badge_threshold_met_on_four_of_five() {
    let mut session = session_for("ehe-kids-3");
    for (seq, option_id) in ["share", "help", "cleanup", "invite", "tease"]
        .iter()
        .enumerate()
    {
        select(&mut session, seq as u64, option_id);
        run_past_feedback_delay(&mut session);
    }
    assert!(session.finished());
    assert_eq!(session.correct_answers(), 4);
    assert_eq!(session.badge_earned(), Some(true));
}

#[test]
fn badge_threshold_missed_on_three_of_five() {
    let mut session = session_for("ehe-kids-3");
    for (seq, option_id) in ["share", "watch", "avoid", "invite", "teach"]
        .iter()
        .enumerate()
    {
        select(&mut session, seq as u64, option_id);
        run_past_feedback_delay(&mut session);
    }
    assert!(session.finished());
    assert_eq!(session.correct_answers(), 3);
    assert_eq!(session.badge_earned(), Some(false));
}

#[test]
fn badge_is_evaluated_only_after_the_last_answer() {
    let mut session = session_for("ehe-kids-3");
    for (seq, option_id) in ["share", "help", "cleanup", "invite"].iter().enumerate() {
        select(&mut session, seq as u64, option_id);
        run_past_feedback_delay(&mut session);
    }
    assert_eq!(session.correct_answers(), 4);
    assert_eq!(session.badge_earned(), None, "run still in progress");

    select(&mut session, 4, "teach");
    run_past_feedback_delay(&mut session);
    assert_eq!(session.badge_earned(), Some(true));
}

#[test]
fn countdown_expiry_counts_as_incorrect_and_advances() {
    let mut session = session_for("finance-teens-16");
    select(&mut session, 0, "invest");
    run_past_feedback_delay(&mut session);
    select(&mut session, 1, "plan");
    run_past_feedback_delay(&mut session);
    assert_eq!(session.question_index(), 2);

    // Let question 3's countdown expire with no selection.
    let deadline = session.status().current_tick
        + session.spec().countdown.expect("countdown rule").ticks_per_question();
    session.run_to_tick(deadline);
    let timed_out = session
        .events()
        .iter()
        .any(|event| event.event_type == EventType::QuestionTimedOut);
    assert!(timed_out);
    assert_eq!(session.score(), 2, "expiry must not change the score");

    run_past_feedback_delay(&mut session);
    assert_eq!(session.question_index(), 3);
    assert!(!session.finished());
}

#[test]
fn countdown_expiry_on_final_question_goes_directly_to_finished() {
    let mut session = session_for("finance-teens-16");
    for (seq, option_id) in ["invest", "plan", "budget", "emergency"].iter().enumerate() {
        select(&mut session, seq as u64, option_id);
        run_past_feedback_delay(&mut session);
    }
    assert_eq!(session.question_index(), 4);

    let deadline = session.status().current_tick
        + session.spec().countdown.expect("countdown rule").ticks_per_question();
    session.run_to_tick(deadline);

    assert!(session.finished());
    assert_eq!(session.question_index(), 4, "index never leaves range");
    assert_eq!(session.score(), 4);
}

#[test]
fn answering_resets_the_countdown_for_the_next_question() {
    let mut session = session_for("finance-teens-16");
    let first_deadline = session.status().current_tick
        + session.spec().countdown.expect("countdown rule").ticks_per_question();

    // Answer just before expiry; the next question gets a fresh window.
    session.run_to_tick(first_deadline - 2);
    select(&mut session, 0, "invest");
    run_past_feedback_delay(&mut session);
    assert_eq!(session.question_index(), 1);

    session.run_to_tick(first_deadline + 2);
    assert!(!session.answered(), "old deadline must not fire");
}

#[test]
fn completion_report_carries_reward_configuration() {
    let mut session = session_for("finance-teens-10");
    assert!(session.completion_report().is_none());
    for seq in 0..5 {
        select(&mut session, seq, "save");
        run_past_feedback_delay(&mut session);
    }
    let report = session.completion_report().expect("finished run");
    assert_eq!(report.score, 5);
    assert_eq!(report.max_score, 5);
    assert_eq!(report.reward.coins_per_level, 5);
    assert_eq!(report.reward.total_xp, 10);
    assert_eq!(report.next_game.as_deref(), Some("finance-teens-11"));
}

#[test]
fn shell_props_track_the_run_state() {
    let mut session = session_for("finance-teens-10");
    let shell = session.shell_view();
    assert_eq!(shell.subtitle, "Question 1 of 5");
    assert!(!shell.show_game_over);
    assert_eq!(shell.progress_percent, 20);

    select(&mut session, 0, "save");
    let shell = session.shell_view();
    assert_eq!(shell.flash_points, Some(1));
    assert!(shell.show_answer_confetti);

    run_past_feedback_delay(&mut session);
    let shell = session.shell_view();
    assert_eq!(shell.subtitle, "Question 2 of 5");
    assert_eq!(shell.flash_points, None, "feedback cleared on advance");

    for seq in 1..5 {
        select(&mut session, seq, "save");
        run_past_feedback_delay(&mut session);
    }
    let shell = session.shell_view();
    assert!(shell.show_game_over);
    assert!(shell.show_confetti);
    assert_eq!(shell.subtitle, "Achievement Complete!");
    assert_eq!(shell.score, 5);
}

#[test]
fn identical_inputs_produce_identical_event_logs_and_hashes() {
    let drive = |session: &mut GameSession| {
        for (seq, option_id) in ["save", "spend", "save"].iter().enumerate() {
            select(session, seq as u64, option_id);
            run_past_feedback_delay(session);
        }
    };

    let mut first = session_for("finance-teens-10");
    let mut second = session_for("finance-teens-10");
    drive(&mut first);
    drive(&mut second);

    assert_eq!(first.state_hash(), second.state_hash());
    let first_types = first.events().iter().map(|e| e.event_type).collect::<Vec<_>>();
    let second_types = second.events().iter().map(|e| e.event_type).collect::<Vec<_>>();
    assert_eq!(first_types, second_types);
}

#[test]
fn shuffle_is_deterministic_per_seed() {
    let spec = catalog::game_by_id("finance-teens-10").expect("known game");
    let mut config = SessionConfig::for_game("session_a", "finance-teens-10");
    config.shuffle_questions = true;
    config.seed = 42;

    let first = GameSession::new(spec.clone(), config.clone()).expect("valid spec");
    let second = GameSession::new(spec, config).expect("valid spec");
    assert_eq!(
        first.current_question().ordinal,
        second.current_question().ordinal
    );
}
