use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use baywatch_core::catalog::Suggestion;
use baywatch_core::deep_link::{DeepLink, share_link};
use baywatch_core::error::ApiError;
use baywatch_core::navigator::{PlayerOverlay, Transition};
use baywatch_core::projection::Screen;
use baywatch_core::session::SuggestionUpdate;
use baywatch_core::types::{ItemRef, ItemType, Section, VideoKey};
use baywatch_core::view_state::{BookmarkOutcome, ViewState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;
use crate::state::{AppState, flush};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        // Session
        .route("/session/bootstrap", post(bootstrap_session))
        .route("/session/unload", post(unload_session))
        .route("/screen", get(get_screen))
        .route("/state", get(get_state))
        // Navigation
        .route("/nav/section", post(open_section))
        .route("/nav/detail", post(open_detail))
        .route("/nav/close", post(close_detail))
        .route("/scroll", post(record_scroll))
        // Lists
        .route("/lists/{item_type}/search", post(search_list))
        .route("/lists/{item_type}/genre", post(set_genre))
        .route("/lists/{item_type}/suggestions", get(list_suggestions))
        .route("/lists/{item_type}/suggestions/input", post(suggestion_input))
        .route("/suggestions", get(settled_suggestions))
        // Watch later
        .route("/watch-later", post(add_watch_later))
        .route("/watch-later/{item_type}/{id}", delete(remove_watch_later))
        // Player
        .route("/player/play", post(play_video))
        .route("/player/progress", post(record_progress))
        .route("/player/message", post(player_message))
        .route("/player/close", post(close_player))
        // Items
        .route("/items/{item_type}/{id}/share", get(share_item))
}

fn parse_item_type(raw: &str) -> Result<ItemType, AppError> {
    ItemType::parse_lenient(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown item type: {raw}")).into())
}

fn parse_section(raw: &str) -> Result<Section, AppError> {
    Section::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("unknown section: {raw}")).into())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BootstrapQuery {
    #[serde(rename = "type")]
    item_type: Option<String>,
    id: Option<String>,
}

async fn bootstrap_session(
    State(state): State<AppState>,
    Query(q): Query<BootstrapQuery>,
) -> Result<Json<Screen>, AppError> {
    let deep_link = DeepLink::from_params(q.item_type.as_deref(), q.id.as_deref());
    let mut session = state.session.lock().await;
    session.restart(deep_link.as_ref());
    flush(&state.db, &mut session).await?;
    info!(deep_link = deep_link.is_some(), "session bootstrapped");
    Ok(Json(session.screen()))
}

async fn unload_session(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let mut session = state.session.lock().await;
    session.unload();
    flush(&state.db, &mut session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_screen(State(state): State<AppState>) -> Json<Screen> {
    Json(state.session.lock().await.screen())
}

async fn get_state(State(state): State<AppState>) -> Json<ViewState> {
    Json(state.session.lock().await.state().clone())
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TransitionResponse {
    transition: Transition,
    screen: Screen,
}

#[derive(Deserialize)]
struct OpenSectionRequest {
    section: String,
}

async fn open_section(
    State(state): State<AppState>,
    Json(body): Json<OpenSectionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let section = parse_section(&body.section)?;
    let mut session = state.session.lock().await;
    let transition = session.open_section(section);
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

#[derive(Deserialize)]
struct OpenDetailRequest {
    #[serde(rename = "type")]
    item_type: String,
    id: String,
    /// Section the user came from, when not the item's own list.
    origin: Option<String>,
    /// Offset of the list being left.
    scroll: Option<u32>,
}

async fn open_detail(
    State(state): State<AppState>,
    Json(body): Json<OpenDetailRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let item = ItemRef::new(parse_item_type(&body.item_type)?, body.id);
    let origin = body.origin.as_deref().map(parse_section).transpose()?;
    let mut session = state.session.lock().await;
    let transition = session.open_detail(item, origin, body.scroll);
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

async fn close_detail(State(state): State<AppState>) -> Result<Json<TransitionResponse>, AppError> {
    let mut session = state.session.lock().await;
    let transition = session.close_detail()?;
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

#[derive(Deserialize)]
struct ScrollRequest {
    section: String,
    offset: u32,
}

/// Scroll offsets are coalesced; the ticker or the next action persists them.
async fn record_scroll(
    State(state): State<AppState>,
    Json(body): Json<ScrollRequest>,
) -> Result<StatusCode, AppError> {
    let section = parse_section(&body.section)?;
    let mut session = state.session.lock().await;
    session.record_scroll(section, body.offset, std::time::Instant::now());
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

async fn search_list(
    State(state): State<AppState>,
    Path(item_type): Path<String>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let item_type = parse_item_type(&item_type)?;
    let mut session = state.session.lock().await;
    let transition = session.search(item_type, &body.query);
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

#[derive(Deserialize)]
struct GenreRequest {
    genre: String,
}

async fn set_genre(
    State(state): State<AppState>,
    Path(item_type): Path<String>,
    Json(body): Json<GenreRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let item_type = parse_item_type(&item_type)?;
    let mut session = state.session.lock().await;
    let transition = session.set_genre(item_type, &body.genre)?;
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

#[derive(Deserialize)]
struct SuggestionQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SuggestionsResponse {
    query: String,
    suggestions: Vec<Suggestion>,
}

async fn list_suggestions(
    State(state): State<AppState>,
    Path(item_type): Path<String>,
    Query(q): Query<SuggestionQuery>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let item_type = parse_item_type(&item_type)?;
    let session = state.session.lock().await;
    let suggestions = session.suggest(item_type, &q.q);
    Ok(Json(SuggestionsResponse {
        query: q.q,
        suggestions,
    }))
}

/// Keystroke feed; suggestions settle once the input pauses and are read
/// back from `/suggestions`.
async fn suggestion_input(
    State(state): State<AppState>,
    Path(item_type): Path<String>,
    Json(body): Json<SearchRequest>,
) -> Result<StatusCode, AppError> {
    let item_type = parse_item_type(&item_type)?;
    let mut session = state.session.lock().await;
    session.suggestion_input(item_type, &body.query, std::time::Instant::now());
    Ok(StatusCode::ACCEPTED)
}

#[derive(Serialize)]
struct SettledSuggestionsResponse {
    pending: bool,
    update: Option<SuggestionUpdate>,
}

async fn settled_suggestions(State(state): State<AppState>) -> Json<SettledSuggestionsResponse> {
    let session = state.session.lock().await;
    Json(SettledSuggestionsResponse {
        pending: session.has_pending_suggestions(),
        update: session.settled_suggestions().cloned(),
    })
}

// ---------------------------------------------------------------------------
// Watch later
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WatchLaterRequest {
    #[serde(rename = "type")]
    item_type: String,
    id: String,
}

#[derive(Serialize)]
struct BookmarkResponse {
    outcome: BookmarkOutcome,
    screen: Screen,
}

async fn add_watch_later(
    State(state): State<AppState>,
    Json(body): Json<WatchLaterRequest>,
) -> Result<(StatusCode, Json<BookmarkResponse>), AppError> {
    let item = ItemRef::new(parse_item_type(&body.item_type)?, body.id);
    let mut session = state.session.lock().await;
    let outcome = session.add_watch_later(item.clone());
    let status = match outcome {
        BookmarkOutcome::Added => StatusCode::CREATED,
        BookmarkOutcome::NotFound => {
            return Err(ApiError::NotFound(format!("item {item} not found")).into());
        }
        _ => StatusCode::OK,
    };
    flush(&state.db, &mut session).await?;
    Ok((
        status,
        Json(BookmarkResponse {
            outcome,
            screen: session.screen(),
        }),
    ))
}

async fn remove_watch_later(
    State(state): State<AppState>,
    Path((item_type, id)): Path<(String, String)>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let item = ItemRef::new(parse_item_type(&item_type)?, id);
    let mut session = state.session.lock().await;
    let outcome = session.remove_watch_later(&item);
    flush(&state.db, &mut session).await?;
    Ok(Json(BookmarkResponse {
        outcome,
        screen: session.screen(),
    }))
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PlayRequest {
    video_key: String,
}

async fn play_video(
    State(state): State<AppState>,
    Json(body): Json<PlayRequest>,
) -> Result<Json<PlayerOverlay>, AppError> {
    let key = VideoKey::from_raw(body.video_key);
    let mut session = state.session.lock().await;
    let overlay = session
        .play(key.clone())
        .ok_or_else(|| ApiError::NotFound(format!("video {key} not found")))?;
    flush(&state.db, &mut session).await?;
    Ok(Json(overlay))
}

#[derive(Deserialize)]
struct ProgressRequest {
    video_key: String,
    position_seconds: f64,
    duration_seconds: f64,
}

#[derive(Serialize)]
struct ProgressResponse {
    applied: bool,
}

async fn record_progress(
    State(state): State<AppState>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let mut session = state.session.lock().await;
    let applied = session.record_progress(
        VideoKey::from_raw(body.video_key),
        body.position_seconds,
        body.duration_seconds,
        chrono::Utc::now(),
    )?;
    flush(&state.db, &mut session).await?;
    Ok(Json(ProgressResponse { applied }))
}

/// Raw player channel; anything that is not a progress update is ignored.
async fn player_message(
    State(state): State<AppState>,
    Json(message): Json<Value>,
) -> Result<Json<ProgressResponse>, AppError> {
    let mut session = state.session.lock().await;
    let applied = session.player_message(&message, chrono::Utc::now());
    flush(&state.db, &mut session).await?;
    Ok(Json(ProgressResponse { applied }))
}

async fn close_player(State(state): State<AppState>) -> Result<Json<TransitionResponse>, AppError> {
    let mut session = state.session.lock().await;
    let transition = session.close_player()?;
    flush(&state.db, &mut session).await?;
    Ok(Json(TransitionResponse {
        transition,
        screen: session.screen(),
    }))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ShareResponse {
    url: String,
}

async fn share_item(
    State(state): State<AppState>,
    Path((item_type, id)): Path<(String, String)>,
) -> Result<Json<ShareResponse>, AppError> {
    let item = ItemRef::new(parse_item_type(&item_type)?, id);
    if !state.session.lock().await.catalog().contains(&item) {
        return Err(ApiError::NotFound(format!("item {item} not found")).into());
    }
    let base = state
        .config
        .share_base()
        .map_err(|e| ApiError::Internal(format!("invalid base url: {e}")))?;
    Ok(Json(ShareResponse {
        url: share_link(&base, &item).into(),
    }))
}
