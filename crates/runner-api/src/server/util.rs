fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS,PUT,PATCH,DELETE"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

fn default_sqlite_path() -> String {
    std::env::var("GAMERUNS_SQLITE_PATH")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string())
}

fn paginate(
    total: usize,
    cursor: Option<usize>,
    page_size: Option<usize>,
) -> Result<(usize, usize, Option<usize>), HttpApiError> {
    let start = cursor.unwrap_or(0);
    if start > total {
        return Err(HttpApiError::invalid_query(
            "cursor is out of bounds",
            Some(format!("cursor={start} total={total}")),
        ));
    }

    let size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);
    let end = start.saturating_add(size).min(total);
    let next_cursor = if end < total { Some(end) } else { None };

    Ok((start, end, next_cursor))
}

fn parse_event_type_filter(
    requested_types: &[String],
) -> Result<Option<HashSet<EventType>>, HttpApiError> {
    if requested_types.is_empty() {
        return Ok(None);
    }

    let mut filter = HashSet::new();

    for value in requested_types {
        let normalized = value.trim().to_lowercase();
        let event_type = match normalized.as_str() {
            "session_started" | "sessionstarted" => EventType::SessionStarted,
            "session_paused" | "sessionpaused" => EventType::SessionPaused,
            "command_applied" | "commandapplied" => EventType::CommandApplied,
            "option_selected" | "optionselected" => EventType::OptionSelected,
            "answer_scored" | "answerscored" => EventType::AnswerScored,
            "question_advanced" | "questionadvanced" => EventType::QuestionAdvanced,
            "question_timed_out" | "questiontimedout" => EventType::QuestionTimedOut,
            "session_finished" | "sessionfinished" => EventType::SessionFinished,
            "badge_evaluated" | "badgeevaluated" => EventType::BadgeEvaluated,
            "session_reset" | "sessionreset" => EventType::SessionReset,
            "completion_recorded" | "completionrecorded" => EventType::CompletionRecorded,
            _ => {
                return Err(HttpApiError::invalid_query(
                    "invalid event type filter",
                    Some(format!("event_type={value}")),
                ))
            }
        };

        filter.insert(event_type);
    }

    Ok(Some(filter))
}

fn reconnect_token(tick: u64, sequence_in_tick: Option<u64>, label: &str) -> String {
    match sequence_in_tick {
        Some(sequence) => format!("{label}:{tick}:{sequence}"),
        None => format!("{label}:{tick}"),
    }
}
