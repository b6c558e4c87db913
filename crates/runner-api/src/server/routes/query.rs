#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitCommandRequest {
    Raw(Command),
    Wrapped {
        command: Command,
        effective_tick: Option<u64>,
    },
}

impl SubmitCommandRequest {
    fn into_parts(self) -> (Command, Option<u64>) {
        match self {
            Self::Raw(command) => (command, None),
            Self::Wrapped {
                command,
                effective_tick,
            } => (command, effective_tick),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PaginationQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CommandAuditPage {
    schema_version: String,
    session_id: String,
    cursor: usize,
    next_cursor: Option<usize>,
    entries: Vec<PersistedCommandEntry>,
}

async fn get_commands(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<CommandAuditPage>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;
        let entries = api.command_log();
        let (start, end, next_cursor) = paginate(entries.len(), query.cursor, query.page_size)?;

        CommandAuditPage {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: session_id.clone(),
            cursor: start,
            next_cursor,
            entries: entries[start..end].to_vec(),
        }
    };

    Ok(Json(response))
}

async fn get_status(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;
        let status = api.status().clone();

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "session.status".to_string(),
            session_id: session_id.clone(),
            generated_at_tick: status.current_tick,
            data: json!({
                "status": status,
                "run_state": api.session().run_state(),
            }),
        }
    };

    Ok(Json(response))
}

async fn get_shell(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "shell.props".to_string(),
            session_id: session_id.clone(),
            generated_at_tick: api.status().current_tick,
            data: json!(api.shell_view()),
        }
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize, Default)]
struct TimelineQuery {
    from_tick: Option<u64>,
    to_tick: Option<u64>,
    #[serde(default)]
    event_types: Vec<String>,
    #[serde(rename = "event_types[]", default)]
    event_types_bracket: Vec<String>,
    question_index: Option<u32>,
    cursor: Option<usize>,
    page_size: Option<usize>,
}

async fn get_timeline(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;

        let current_tick = api.status().current_tick;
        let from_tick = query.from_tick.unwrap_or(1);
        let to_tick = query.to_tick.unwrap_or(current_tick);

        if to_tick < from_tick {
            return Err(HttpApiError::invalid_query(
                "to_tick must be >= from_tick",
                Some(format!("from_tick={from_tick} to_tick={to_tick}")),
            ));
        }

        let mut requested_types = query.event_types;
        requested_types.extend(query.event_types_bracket);
        let event_type_filter = parse_event_type_filter(&requested_types)?;

        let mut filtered = Vec::new();
        for event in api.events() {
            if event.tick < from_tick || event.tick > to_tick {
                continue;
            }

            if let Some(filter) = &event_type_filter {
                if !filter.contains(&event.event_type) {
                    continue;
                }
            }

            if let Some(question_index) = query.question_index {
                if event.question_index != Some(question_index) {
                    continue;
                }
            }

            filtered.push(event.clone());
        }

        let (start, end, next_cursor) = paginate(filtered.len(), query.cursor, query.page_size)?;

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "timeline.window".to_string(),
            session_id: session_id.clone(),
            generated_at_tick: current_tick,
            data: json!({
                "cursor": start,
                "next_cursor": next_cursor,
                "from_tick": from_tick,
                "to_tick": to_tick,
                "total": filtered.len(),
                "events": filtered[start..end].to_vec(),
            }),
        }
    };

    Ok(Json(response))
}

async fn get_snapshot(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Snapshot>, HttpApiError> {
    let snapshot = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;
        api.snapshot_for_current_tick()
    };

    Ok(Json(snapshot))
}

async fn get_completion(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let api = require_session(&inner, &session_id)?;

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "completion.report".to_string(),
            session_id: session_id.clone(),
            generated_at_tick: api.status().current_tick,
            data: json!({
                "finished": api.session().finished(),
                "report": api.completion_report(),
            }),
        }
    };

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct CatalogEntry {
    game_id: String,
    title: String,
    pillar: contracts::Pillar,
    audience: contracts::Audience,
    question_count: u32,
    max_score: u32,
    has_badge: bool,
    has_countdown: bool,
    next_game: Option<String>,
}

async fn get_catalog() -> Json<Value> {
    let games = runner_core::catalog::builtin_games()
        .into_iter()
        .map(|game| CatalogEntry {
            game_id: game.game_id.clone(),
            title: game.title.clone(),
            pillar: game.pillar,
            audience: game.audience,
            question_count: game.question_count(),
            max_score: game.max_score(),
            has_badge: game.badge.is_some(),
            has_countdown: game.countdown.is_some(),
            next_game: game.next_game.clone(),
        })
        .collect::<Vec<_>>();

    Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "games": games,
    }))
}

async fn get_catalog_game(
    Path(game_id): Path<String>,
) -> Result<Json<contracts::GameSpec>, HttpApiError> {
    let Some(game) = runner_core::catalog::game_by_id(&game_id) else {
        return Err(HttpApiError::game_not_found(&game_id));
    };

    Ok(Json(game))
}

#[derive(Debug, Deserialize, Default)]
struct SubscriptionQuery {
    sqlite_path: Option<String>,
}

/// Mirrors the shell's plan lookup: a failed fetch never surfaces as an
/// error, it degrades to the free plan with success still true.
async fn get_subscription(
    Path(user_id): Path<String>,
    Query(query): Query<SubscriptionQuery>,
) -> Json<Value> {
    let sqlite_path = query
        .sqlite_path
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path);

    let source = SqlitePlanSource::new(sqlite_path);
    let context = SubscriptionContext::load(&source, &user_id);

    Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "success": true,
        "user_id": user_id,
        "subscription": context.subscription,
        "degraded": context.degraded,
    }))
}

async fn submit_command(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SubmitCommandRequest>,
) -> Result<Json<contracts::CommandResult>, HttpApiError> {
    let (command, effective_tick) = request.into_parts();
    if command.session_id != session_id {
        return Err(HttpApiError::invalid_command(
            "command.session_id must match path session_id",
            Some(format!(
                "path_session_id={session_id} command_session_id={}",
                command.session_id
            )),
        ));
    }

    let (result, messages) = {
        let mut inner = state.inner.lock().await;
        let (result, entry, status) = {
            let api = require_session_mut(&mut inner, &session_id)?;
            let result = api.submit_command(command, effective_tick);
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
