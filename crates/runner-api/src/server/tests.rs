use super::*;

#[test]
fn pagination_enforces_max_bounds() {
    let (start, end, next_cursor) = paginate(100, Some(10), Some(20)).expect("page should work");
    assert_eq!(start, 10);
    assert_eq!(end, 30);
    assert_eq!(next_cursor, Some(30));

    let out_of_range = paginate(5, Some(10), Some(1));
    assert!(out_of_range.is_err());
}

#[test]
fn event_type_filter_accepts_both_spellings() {
    let filter = parse_event_type_filter(&[
        "answer_scored".to_string(),
        "QuestionAdvanced".to_string(),
    ])
    .expect("filter should parse")
    .expect("filter should be present");

    assert!(filter.contains(&EventType::AnswerScored));
    assert!(filter.contains(&EventType::QuestionAdvanced));

    let invalid = parse_event_type_filter(&["not_an_event".to_string()]);
    assert!(invalid.is_err());
}

#[test]
fn delta_collection_emits_completion_once() {
    let config = SessionConfig::for_game("session_ws", "finance-teens-10");
    let api = SessionApi::from_game_id("finance-teens-10", config).expect("builtin game");

    let mut inner = ServerInner {
        api: Some(api),
        emitted_event_count: 0,
        last_snapshot_tick: None,
        completion_emitted: false,
    };

    {
        let api = inner.api.as_mut().expect("api");
        api.start();
        for _ in 0..5 {
            assert!(api.select_option("save").accepted);
            api.step(12);
        }
        assert!(api.session().finished());
    }

    let messages = collect_delta_messages(&mut inner);
    let completion_count = messages
        .iter()
        .filter(|message| message.message_type == "completion.recorded")
        .count();
    assert_eq!(completion_count, 1);

    // A later delta pass must not repeat the announcement.
    let messages = collect_delta_messages(&mut inner);
    assert!(messages
        .iter()
        .all(|message| message.message_type != "completion.recorded"));
}

#[test]
fn delta_collection_replays_only_new_events() {
    let config = SessionConfig::for_game("session_ws", "finance-teens-10");
    let api = SessionApi::from_game_id("finance-teens-10", config).expect("builtin game");

    let mut inner = ServerInner {
        api: Some(api),
        emitted_event_count: 0,
        last_snapshot_tick: None,
        completion_emitted: false,
    };

    {
        let api = inner.api.as_mut().expect("api");
        api.start();
        assert!(api.select_option("save").accepted);
    }

    let first = collect_delta_messages(&mut inner)
        .into_iter()
        .filter(|message| message.message_type == "event.appended")
        .count();
    assert!(first > 0);

    let second = collect_delta_messages(&mut inner)
        .into_iter()
        .filter(|message| message.message_type == "event.appended")
        .count();
    assert_eq!(second, 0);
}
