#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateSessionRequest {
    Config(SessionConfig),
    WithOptions(CreateSessionOptions),
}

#[derive(Debug, Deserialize)]
struct CreateSessionOptions {
    config: SessionConfig,
    auto_start: Option<bool>,
    sqlite_path: Option<String>,
    replace_existing: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    schema_version: String,
    session_id: String,
    status: SessionStatus,
    replaced_existing_session: bool,
    started: bool,
}

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    page_size: Option<usize>,
    sqlite_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListSessionsResponse {
    schema_version: String,
    active_session_id: Option<String>,
    sessions: Vec<crate::PersistedSessionSummary>,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, HttpApiError> {
    let page_size = query.page_size.unwrap_or(200).max(1).min(MAX_PAGE_SIZE);

    let sqlite_path = query
        .sqlite_path
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path);

    let active_session_id = {
        let inner = state.inner.lock().await;
        inner.api.as_ref().map(|api| api.session_id().to_string())
    };

    let store = crate::persistence::SqliteSessionStore::open(sqlite_path)
        .map_err(HttpApiError::from_persistence)?;
    let sessions = store
        .list_sessions(page_size)
        .map_err(HttpApiError::from_persistence)?;

    Ok(Json(ListSessionsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        active_session_id,
        sessions,
    }))
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, HttpApiError> {
    let (config, auto_start, sqlite_path, replace_existing) = match request {
        CreateSessionRequest::Config(config) => {
            (config, false, Some(default_sqlite_path()), true)
        }
        CreateSessionRequest::WithOptions(options) => (
            options.config,
            options.auto_start.unwrap_or(false),
            Some(
                options
                    .sqlite_path
                    .filter(|path| !path.trim().is_empty())
                    .unwrap_or_else(default_sqlite_path),
            ),
            options.replace_existing.unwrap_or(true),
        ),
    };

    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let replaced_existing_session = inner.api.is_some();

        let mut api = SessionApi::from_game_id(&config.game_id, config.clone())
            .map_err(HttpApiError::from_api_error)?;
        if let Some(path) = sqlite_path {
            api.attach_sqlite_store(path)
                .map_err(HttpApiError::from_persistence)?;
            api.initialize_session_storage(replace_existing)
                .map_err(HttpApiError::from_persistence)?;
        }

        if auto_start {
            api.start();
        }

        let status = api.status().clone();
        inner.api = Some(api);
        inner.emitted_event_count = 0;
        inner.last_snapshot_tick = None;
        inner.completion_emitted = false;

        let mut messages = Vec::new();
        if replaced_existing_session {
            messages.push(StreamMessage::warning(
                &status.session_id,
                status.current_tick,
                "existing session state was replaced by POST /sessions".to_string(),
            ));
        }
        messages.push(StreamMessage::session_status(&status));

        (
            CreateSessionResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                session_id: status.session_id.clone(),
                status,
                replaced_existing_session,
                started: auto_start,
            },
            messages,
        )
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct SessionControlResponse {
    schema_version: String,
    session_id: String,
    status: SessionStatus,
    committed: Option<u64>,
    advanced_ticks: Option<u64>,
    applied_commands: Option<u64>,
    fired_timers: Option<u64>,
}

impl SessionControlResponse {
    fn status_only(status: SessionStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: status.session_id.clone(),
            status,
            committed: None,
            advanced_ticks: None,
            applied_commands: None,
            fired_timers: None,
        }
    }

    fn stepped(
        status: SessionStatus,
        committed: u64,
        metrics: runner_core::session::StepMetrics,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: status.session_id.clone(),
            status,
            committed: Some(committed),
            advanced_ticks: Some(metrics.advanced_ticks),
            applied_commands: Some(metrics.applied_commands),
            fired_timers: Some(metrics.fired_timers),
        }
    }
}

async fn start_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionControlResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let status = {
            let api = require_session_mut(&mut inner, &session_id)?;
            api.start().clone()
        };

        let mut messages = collect_delta_messages(&mut inner);
        messages.push(StreamMessage::session_status(&status));

        (SessionControlResponse::status_only(status), messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

async fn pause_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionControlResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let status = {
            let api = require_session_mut(&mut inner, &session_id)?;
            api.pause().clone()
        };

        let mut messages = collect_delta_messages(&mut inner);
        messages.push(StreamMessage::session_status(&status));

        (SessionControlResponse::status_only(status), messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    steps: Option<u64>,
}

async fn step_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<SessionControlResponse>, HttpApiError> {
    let steps = request.steps.unwrap_or(1);
    if steps == 0 {
        return Err(HttpApiError::invalid_query(
            "steps must be >= 1",
            Some("steps=0".to_string()),
        ));
    }

    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let (status, committed, metrics) = {
            let api = require_session_mut(&mut inner, &session_id)?;
            let (status, committed) = api.step(steps);
            (status.clone(), committed, api.last_step_metrics())
        };

        let mut messages = collect_delta_messages(&mut inner);
        messages.push(StreamMessage::session_status(&status));

        (
            SessionControlResponse::stepped(status, committed, metrics),
            messages,
        )
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RunToTickRequest {
    target_tick: u64,
}

async fn run_to_tick(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RunToTickRequest>,
) -> Result<Json<SessionControlResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let (status, committed, metrics) = {
            let api = require_session_mut(&mut inner, &session_id)?;
            let (status, committed) = api.run_to_tick(request.target_tick);
            (status.clone(), committed, api.last_step_metrics())
        };

        let mut messages = collect_delta_messages(&mut inner);
        messages.push(StreamMessage::session_status(&status));

        (
            SessionControlResponse::stepped(status, committed, metrics),
            messages,
        )
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct SelectOptionRequest {
    option_id: String,
}

async fn select_option(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SelectOptionRequest>,
) -> Result<Json<contracts::CommandResult>, HttpApiError> {
    let (result, messages) = {
        let mut inner = state.inner.lock().await;
        let (result, entry, status) = {
            let api = require_session_mut(&mut inner, &session_id)?;
            let result = api.select_option(&request.option_id);
            let entry = api.command_log().last().cloned();
            let status = api.status().clone();
            (result, entry, status)
        };

        let mut messages = Vec::new();
        if let Some(entry) = entry {
            messages.push(StreamMessage::command_result(&entry, status.current_tick));
        }
        messages.extend(collect_delta_messages(&mut inner));
        messages.push(StreamMessage::session_status(&status));

        (result, messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(result))
}

async fn reset_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<contracts::CommandResult>, HttpApiError> {
    let (result, messages) = {
        let mut inner = state.inner.lock().await;
        let (result, entry, status) = {
            let api = require_session_mut(&mut inner, &session_id)?;
            let result = api.reset();
            let entry = api.command_log().last().cloned();
            let status = api.status().clone();
            (result, entry, status)
        };

        if result.accepted {
            // The run restarted; allow the next finish to announce again.
            inner.completion_emitted = false;
        }

        let mut messages = Vec::new();
        if let Some(entry) = entry {
            messages.push(StreamMessage::command_result(&entry, status.current_tick));
        }
        messages.extend(collect_delta_messages(&mut inner));
        messages.push(StreamMessage::session_status(&status));

        (result, messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(result))
}
