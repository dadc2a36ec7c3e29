use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::Point;
use crate::config::ServeConfig;
use crate::drag::{DragRejected, PointerButton};
use crate::render::{FramePatch, render_svg};
use crate::search::{HELP_TEXT, KeyAction};
use crate::session::{LeafActivation, NodeInfo, Scene, TreeSession};
use crate::source::{PathEntry, parse_entries};
use crate::viewport::Viewport;

/// Arguments for running the oxtree web server
#[derive(Debug, Clone, Parser)]
#[command(name = "oxtree serve", about = "Start the oxtree interactive session server.")]
pub struct ServeArgs {
    /// Tree listing to open as an initial session.
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Root label for the initial session. Defaults to the input file stem.
    #[arg(long)]
    pub name: Option<String>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5151)]
    pub port: u16,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color", default_value = "white")]
    pub background_color: String,
}

pub struct ServeState {
    config: ServeConfig,
    background: String,
    sessions: RwLock<HashMap<Uuid, TreeSession>>,
}

impl ServeState {
    pub fn new(config: ServeConfig, background: impl Into<String>) -> Self {
        Self {
            config,
            background: background.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, session: TreeSession) -> Result<Uuid, (StatusCode, String)> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.config.max_sessions {
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                format!("session limit of {} reached", self.config.max_sessions),
            ));
        }
        let id = Uuid::new_v4();
        tracing::info!(%id, name = session.name(), nodes = session.layout().len(), "session opened");
        sessions.insert(id, session);
        Ok(id)
    }

    async fn with_session<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut TreeSession) -> T,
    ) -> Result<T, (StatusCode, String)> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        Ok(apply(session))
    }
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    name: String,
    #[serde(default)]
    entries: Option<Vec<PathEntry>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
}

#[derive(Debug, Serialize)]
struct CreatedPayload {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct DragStartRequest {
    path: String,
    x: f32,
    y: f32,
    #[serde(default)]
    button: PointerButton,
}

#[derive(Debug, Deserialize)]
struct PointerRequest {
    x: f32,
    y: f32,
}

#[derive(Debug, Serialize)]
struct CommitPayload {
    committed: usize,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchPayload {
    matches: usize,
    blinking: bool,
}

#[derive(Debug, Deserialize)]
struct PanRequest {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Deserialize)]
struct ZoomRequest {
    x: f32,
    y: f32,
    factor: f32,
}

#[derive(Debug, Deserialize)]
struct ResizeRequest {
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize)]
struct PathRequest {
    path: String,
}

#[derive(Debug, Deserialize)]
struct KeyRequest {
    key: String,
    #[serde(default)]
    ctrl: bool,
    #[serde(default)]
    meta: bool,
}

#[derive(Debug, Serialize)]
struct KeyPayload {
    action: Option<KeyAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'static str>,
}

pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_scene).delete(delete_session))
        .route("/api/sessions/:id/svg", get(get_svg))
        .route("/api/sessions/:id/drag/start", post(drag_start))
        .route("/api/sessions/:id/drag/move", post(drag_move))
        .route("/api/sessions/:id/drag/end", post(drag_end))
        .route("/api/sessions/:id/drag/lost", post(drag_lost))
        .route("/api/sessions/:id/nodes/*path", delete(delete_node))
        .route("/api/sessions/:id/reload", post(reload))
        .route("/api/sessions/:id/search", post(search))
        .route("/api/sessions/:id/highlights", delete(clear_highlights))
        .route("/api/sessions/:id/keys", post(press_key))
        .route("/api/sessions/:id/viewport/pan", post(pan))
        .route("/api/sessions/:id/viewport/zoom", post(zoom))
        .route("/api/sessions/:id/size", put(resize))
        .route("/api/sessions/:id/select", post(select))
        .route("/api/sessions/:id/activate", post(activate))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = ServeConfig::default();
    let state = Arc::new(ServeState::new(config.clone(), args.background_color.clone()));

    if let Some(input) = &args.input {
        let contents = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read '{}'", input.display()))?;
        let entries = parse_entries(&contents)
            .with_context(|| format!("failed to decode tree listing '{}'", input.display()))?;
        let name = args.name.clone().unwrap_or_else(|| {
            input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string())
        });
        let session = TreeSession::new(&name, &entries, config.layout(None, None));
        let id = state
            .insert(session)
            .await
            .map_err(|(_, message)| anyhow::anyhow!(message))?;
        println!("Opened session {id} for '{}'", input.display());
    }

    let app = router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    tracing::info!(%addr, max_sessions = config.max_sessions, "server started");
    println!("oxtree server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn create_session(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreatedPayload>), (StatusCode, String)> {
    let entries = match (request.entries, request.source) {
        (Some(entries), _) => entries,
        (None, Some(source)) => {
            parse_entries(&source).map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?
        }
        (None, None) => Vec::new(),
    };
    let layout = state.config.layout(request.width, request.height);
    let session = TreeSession::new(&request.name, &entries, layout);
    let id = state.insert(session).await?;
    Ok((StatusCode::CREATED, Json(CreatedPayload { id })))
}

async fn get_scene(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Scene>, (StatusCode, String)> {
    state.with_session(id, |session| Json(session.scene())).await
}

async fn delete_session(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let removed = state.sessions.write().await.remove(&id);
    match removed {
        Some(_) => {
            tracing::info!(%id, "session closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(session_not_found(id)),
    }
}

async fn get_svg(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Response, (StatusCode, String)> {
    let background = state.background.clone();
    let svg = state
        .with_session(id, |session| render_svg(session, &background))
        .await?
        .map_err(internal_error)?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn drag_start(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<DragStartRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .with_session(id, |session| {
            session.start_drag(
                &request.path,
                Point::new(request.x, request.y),
                request.button,
            )
        })
        .await?
        .map_err(drag_rejected)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn drag_move(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<PointerRequest>,
) -> Result<Json<FramePatch>, (StatusCode, String)> {
    state
        .with_session(id, |session| session.move_drag(Point::new(request.x, request.y)))
        .await?
        .map(Json)
        .ok_or_else(no_active_drag)
}

async fn drag_end(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<CommitPayload>, (StatusCode, String)> {
    state
        .with_session(id, |session| session.end_drag())
        .await?
        .map(|committed| Json(CommitPayload { committed }))
        .ok_or_else(no_active_drag)
}

async fn drag_lost(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<CommitPayload>, (StatusCode, String)> {
    let committed = state
        .with_session(id, |session| session.pointer_lost())
        .await?
        .unwrap_or(0);
    Ok(Json(CommitPayload { committed }))
}

async fn delete_node(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, path)): AxumPath<(Uuid, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if path.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "the root node cannot be deleted".to_string(),
        ));
    }
    let removed = state
        .with_session(id, |session| session.delete_node(&path))
        .await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("node '{path}' not found")))
    }
}

async fn reload(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.with_session(id, |session| session.reload()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchPayload>, (StatusCode, String)> {
    state
        .with_session(id, |session| {
            let matches = session.search(&request.query);
            Json(SearchPayload {
                matches,
                blinking: session.is_blinking(),
            })
        })
        .await
}

async fn clear_highlights(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .with_session(id, |session| session.clear_highlights())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn press_key(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<KeyPayload>, (StatusCode, String)> {
    let action = state
        .with_session(id, |session| {
            session.handle_key(&request.key, request.ctrl, request.meta)
        })
        .await?;
    let help = (action == Some(KeyAction::Help)).then_some(HELP_TEXT);
    Ok(Json(KeyPayload { action, help }))
}

async fn pan(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<PanRequest>,
) -> Result<Json<Viewport>, (StatusCode, String)> {
    state
        .with_session(id, |session| {
            session.pan(request.dx, request.dy);
            Json(session.viewport())
        })
        .await
}

async fn zoom(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<ZoomRequest>,
) -> Result<Json<Viewport>, (StatusCode, String)> {
    state
        .with_session(id, |session| {
            session.zoom(Point::new(request.x, request.y), request.factor);
            Json(session.viewport())
        })
        .await
}

async fn resize(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<ResizeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .with_session(id, |session| session.resize(request.width, request.height))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn select(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<PathRequest>,
) -> Result<Json<NodeInfo>, (StatusCode, String)> {
    state
        .with_session(id, |session| session.select(&request.path))
        .await?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("no details available for '{}'", request.path),
            )
        })
}

async fn activate(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<PathRequest>,
) -> Result<Json<LeafActivation>, (StatusCode, String)> {
    state
        .with_session(id, |session| session.activate(&request.path))
        .await?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("'{}' is not a file with fetchable content", request.path),
            )
        })
}

fn session_not_found(id: Uuid) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("session '{id}' not found"))
}

fn no_active_drag() -> (StatusCode, String) {
    (StatusCode::CONFLICT, "no drag in progress".to_string())
}

fn drag_rejected(err: DragRejected) -> (StatusCode, String) {
    let status = match err {
        DragRejected::AlreadyDragging(_) => StatusCode::CONFLICT,
        DragRejected::NotPrimaryButton => StatusCode::BAD_REQUEST,
        DragRejected::UnknownNode(_) => StatusCode::NOT_FOUND,
    };
    (status, err.to_string())
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
