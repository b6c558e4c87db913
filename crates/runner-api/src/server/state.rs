#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<ServerInner>>,
    stream_tx: broadcast::Sender<StreamMessage>,
}

impl AppState {
    fn new() -> Self {
        let (stream_tx, _) = broadcast::channel(4096);
        Self {
            inner: std::sync::Arc::new(Mutex::new(ServerInner::default())),
            stream_tx,
        }
    }
}

#[derive(Debug, Default)]
struct ServerInner {
    api: Option<SessionApi>,
    emitted_event_count: usize,
    last_snapshot_tick: Option<u64>,
    completion_emitted: bool,
}

fn require_session<'a>(
    inner: &'a ServerInner,
    session_id: &str,
) -> Result<&'a SessionApi, HttpApiError> {
    let Some(api) = inner.api.as_ref() else {
        return Err(HttpApiError::session_not_found(session_id, None));
    };

    if api.session_id() != session_id {
        return Err(HttpApiError::session_not_found(
            session_id,
            Some(api.session_id()),
        ));
    }

    Ok(api)
}

fn require_session_mut<'a>(
    inner: &'a mut ServerInner,
    session_id: &str,
) -> Result<&'a mut SessionApi, HttpApiError> {
    let active_session_id = inner.api.as_ref().map(|api| api.session_id().to_string());
    let Some(api) = inner.api.as_mut() else {
        return Err(HttpApiError::session_not_found(session_id, None));
    };

    if api.session_id() != session_id {
        return Err(HttpApiError::session_not_found(
            session_id,
            active_session_id.as_deref(),
        ));
    }

    Ok(api)
}

fn collect_delta_messages(inner: &mut ServerInner) -> Vec<StreamMessage> {
    let mut messages = Vec::new();

    let Some(api) = inner.api.as_ref() else {
        return messages;
    };

    let new_events = &api.events()[inner.emitted_event_count..];
    for event in new_events {
        messages.push(StreamMessage::event_appended(event));
    }
    inner.emitted_event_count = api.events().len();

    let status = api.status();
    let cadence = api.config().snapshot_every_ticks.max(1);
    let snapshot_due = status.current_tick > 0
        && ((status.current_tick % cadence == 0) || status.is_finished())
        && inner.last_snapshot_tick != Some(status.current_tick);

    if snapshot_due {
        let snapshot = api.snapshot_for_current_tick();
        inner.last_snapshot_tick = Some(snapshot.tick);
        messages.push(StreamMessage::snapshot_created(&snapshot));
    }

    if !inner.completion_emitted {
        if let Some(report) = api.completion_report() {
            inner.completion_emitted = true;
            messages.push(StreamMessage::completion_recorded(&report));
        }
    }

    if let Some(last_error) = api.last_persistence_error() {
        messages.push(StreamMessage::warning(
            api.session_id(),
            status.current_tick,
            last_error.to_string(),
        ));
    }

    messages
}

fn broadcast_messages(state: &AppState, messages: Vec<StreamMessage>) {
    for message in messages {
        let _ = state.stream_tx.send(message);
    }
}
