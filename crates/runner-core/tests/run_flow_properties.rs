use contracts::{Command, CommandPayload, CommandType, EventType, SessionConfig};
use proptest::prelude::*;
use runner_core::catalog;
use runner_core::session::GameSession;

fn fresh_session() -> GameSession {
    let spec = catalog::game_by_id("finance-teens-10").expect("known game");
    let config = SessionConfig::for_game("session_prop", "finance-teens-10");
    GameSession::new(spec, config).expect("valid spec")
}

fn select_command(session: &GameSession, seq: u64, option_id: &str) -> Command {
    Command::new(
        format!("cmd_{seq:04}"),
        session.session_id().to_string(),
        session.status().current_tick,
        CommandType::SelectOption,
        CommandPayload::SelectOption {
            option_id: option_id.to_string(),
        },
    )
}

fn reset_command(session: &GameSession, seq: u64) -> Command {
    Command::new(
        format!("cmd_{seq:04}"),
        session.session_id().to_string(),
        session.status().current_tick,
        CommandType::ResetRun,
        CommandPayload::ResetRun,
    )
}

fn select_and_settle(session: &mut GameSession, seq: u64, correct: bool) {
    let option_id = if correct { "save" } else { "spend" };
    let command = select_command(session, seq, option_id);
    session.inject_command(command);
    session.step();
    let target = session.status().current_tick + session.spec().feedback_delay_ticks();
    session.run_to_tick(target);
}

proptest! {
    #[test]
    fn property_1_one_answer_per_question_always_terminates_in_bounds(
        answers in proptest::collection::vec(any::<bool>(), 5)
    ) {
        let mut session = fresh_session();
        for (seq, correct) in answers.iter().enumerate() {
            select_and_settle(&mut session, seq as u64, *correct);
        }
        let expected = answers.iter().filter(|correct| **correct).count() as u32;
        prop_assert!(session.finished());
        prop_assert_eq!(session.score(), expected);
        prop_assert!(session.score() <= session.spec().question_count());
    }

    #[test]
    fn property_2_duplicate_selections_never_inflate_the_score(
        answers in proptest::collection::vec(any::<bool>(), 5),
        duplicates in proptest::collection::vec(1_u8..4, 5)
    ) {
        let mut session = fresh_session();
        let mut seq = 0_u64;
        for (index, correct) in answers.iter().enumerate() {
            let option_id = if *correct { "save" } else { "spend" };
            let command = select_command(&session, seq, option_id);
            seq += 1;
            session.inject_command(command);
            session.step();

            // Rapid repeated clicks during the feedback-display delay.
            for _ in 0..duplicates[index] {
                let command = select_command(&session, seq, "save");
                seq += 1;
                session.inject_command(command);
                session.step();
            }

            let target = session.status().current_tick + session.spec().feedback_delay_ticks();
            session.run_to_tick(target);
        }
        let expected = answers.iter().filter(|correct| **correct).count() as u32;
        prop_assert!(session.finished());
        prop_assert_eq!(session.score(), expected);
    }

    #[test]
    fn property_3_reset_restores_initial_state_from_any_prefix(
        answers in proptest::collection::vec(any::<bool>(), 5),
        reset_after in 0_usize..5
    ) {
        let mut session = fresh_session();
        let mut seq = 0_u64;
        for correct in answers.iter().take(reset_after) {
            select_and_settle(&mut session, seq, *correct);
            seq += 1;
        }

        let command = reset_command(&session, seq);
        session.inject_command(command);
        session.step();

        prop_assert_eq!(session.question_index(), 0);
        prop_assert_eq!(session.score(), 0);
        prop_assert!(!session.answered());
        prop_assert!(!session.finished());
        prop_assert!(session.answers().is_empty());
    }

    #[test]
    fn property_4_identical_command_sequences_are_deterministic(
        answers in proptest::collection::vec(any::<bool>(), 5)
    ) {
        let mut first = fresh_session();
        let mut second = fresh_session();
        for (seq, correct) in answers.iter().enumerate() {
            select_and_settle(&mut first, seq as u64, *correct);
            select_and_settle(&mut second, seq as u64, *correct);
        }
        prop_assert_eq!(first.state_hash(), second.state_hash());
        prop_assert_eq!(first.events().len(), second.events().len());
    }
}

#[test]
fn finished_event_appears_exactly_once_per_completed_run() {
    let mut session = fresh_session();
    for seq in 0..5 {
        select_and_settle(&mut session, seq, true);
    }
    let finished_events = session
        .events()
        .iter()
        .filter(|event| event.event_type == EventType::SessionFinished)
        .count();
    assert_eq!(finished_events, 1);
}

#[test]
fn answer_scored_precedes_question_advanced_in_event_order() {
    let mut session = fresh_session();
    select_and_settle(&mut session, 0, true);

    let events = session.events();
    let scored_idx = events
        .iter()
        .position(|event| event.event_type == EventType::AnswerScored)
        .expect("answer scored");
    let advanced_idx = events
        .iter()
        .position(|event| event.event_type == EventType::QuestionAdvanced)
        .expect("question advanced");
    assert!(scored_idx < advanced_idx);
}

#[test]
fn reset_after_finish_allows_a_full_second_run() {
    let mut session = fresh_session();
    for seq in 0..5 {
        select_and_settle(&mut session, seq, false);
    }
    assert!(session.finished());
    assert_eq!(session.score(), 0);

    let command = reset_command(&session, 10);
    session.inject_command(command);
    session.step();
    assert!(!session.finished());

    for seq in 11..16 {
        select_and_settle(&mut session, seq, true);
    }
    assert!(session.finished());
    assert_eq!(session.score(), 5);
    assert_eq!(session.badge_earned(), Some(true));
}
