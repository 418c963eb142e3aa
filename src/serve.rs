use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::context::{CanvasContext, ComponentSummary, ConnectionSummary};
use crate::events::CanvasEvent;
use crate::model::Diagram;
use crate::payload::{SaveDiagramPayload, export_json, import_diagram};

/// Arguments for running the archcanvas diagram API server
#[derive(Debug, Clone, Parser)]
#[command(name = "archcanvas serve", about = "Start the archcanvas diagram API server.")]
pub struct ServeArgs {
    /// Path to the diagram file that should be served.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

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

/// The server is the single owner of the diagram file. Every request reads
/// the current file, mutates under the lock, and writes the result back, so
/// concurrent edits serialize instead of clobbering each other.
struct ServeState {
    source_path: PathBuf,
    background: String,
    source_lock: Mutex<()>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagramResponse {
    source_path: String,
    background: String,
    #[serde(flatten)]
    payload: SaveDiagramPayload,
    context: CanvasContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    context: CanvasContext,
    components: Vec<ComponentSummary>,
    connections: Vec<ConnectionSummary>,
}

impl ServeState {
    async fn read_diagram(&self) -> Result<Diagram> {
        let contents = tokio::fs::read_to_string(&self.source_path)
            .await
            .with_context(|| format!("failed to read '{}'", self.source_path.display()))?;
        let diagram = import_diagram(&contents)
            .with_context(|| format!("failed to import '{}'", self.source_path.display()))?;
        Ok(diagram)
    }

    async fn write_diagram(&self, diagram: &Diagram) -> Result<()> {
        let json = export_json(diagram);
        tokio::fs::write(&self.source_path, json.as_bytes())
            .await
            .with_context(|| format!("failed to write '{}'", self.source_path.display()))?;
        Ok(())
    }

    /// Apply a canvas event against the current file. Returns false when
    /// the event named a node or edge that no longer exists.
    async fn apply_event(&self, event: &CanvasEvent) -> Result<bool> {
        let _guard = self.source_lock.lock().await;
        let mut diagram = self.read_diagram().await?;
        if !diagram.apply(event) {
            return Ok(false);
        }
        self.write_diagram(&diagram).await?;
        Ok(true)
    }

    async fn replace(&self, payload: SaveDiagramPayload) -> Result<Diagram> {
        let diagram = payload.into_diagram()?;
        let _guard = self.source_lock.lock().await;
        self.write_diagram(&diagram).await?;
        Ok(diagram)
    }

    async fn remove_node(&self, node_id: &str) -> Result<bool> {
        let _guard = self.source_lock.lock().await;
        let mut diagram = self.read_diagram().await?;
        if !diagram.remove_node(node_id) {
            return Ok(false);
        }
        self.write_diagram(&diagram).await?;
        Ok(true)
    }

    async fn remove_edge(&self, edge_id: &str) -> Result<bool> {
        let _guard = self.source_lock.lock().await;
        let mut diagram = self.read_diagram().await?;
        if !diagram.remove_edge(edge_id) {
            return Ok(false);
        }
        self.write_diagram(&diagram).await?;
        Ok(true)
    }
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    // fail fast on an unreadable or invalid diagram before binding
    let initial = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    import_diagram(&initial)
        .with_context(|| format!("failed to import '{}'", args.input.display()))?;

    let state = Arc::new(ServeState {
        source_path: args.input.clone(),
        background: args.background_color.clone(),
        source_lock: Mutex::new(()),
    });

    let app = Router::new()
        .route("/api/diagram", get(get_diagram).put(put_diagram))
        .route("/api/diagram/svg", get(get_svg))
        .route("/api/diagram/xml", get(get_xml))
        .route("/api/diagram/context", get(get_context))
        .route("/api/diagram/events", post(post_event))
        .route("/api/diagram/nodes/:id", delete(delete_node))
        .route("/api/diagram/edges/:id", delete(delete_edge))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("archcanvas server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn get_diagram(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<DiagramResponse>, (StatusCode, String)> {
    let diagram = state.read_diagram().await.map_err(internal_error)?;
    Ok(Json(DiagramResponse {
        source_path: state.source_path.display().to_string(),
        background: state.background.clone(),
        payload: SaveDiagramPayload::from_diagram(&diagram),
        context: CanvasContext::summarize(&diagram),
    }))
}

async fn put_diagram(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<SaveDiagramPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.replace(payload).await {
        Ok(diagram) => {
            info!(
                nodes = diagram.nodes.len(),
                edges = diagram.edges.len(),
                "diagram replaced"
            );
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => match err.downcast_ref::<crate::error::ImportError>() {
            Some(_) => Err((StatusCode::BAD_REQUEST, err.to_string())),
            None => Err(internal_error(err)),
        },
    }
}

async fn get_svg(State(state): State<Arc<ServeState>>) -> Result<Response, (StatusCode, String)> {
    let diagram = state.read_diagram().await.map_err(internal_error)?;
    let svg = diagram
        .render_svg(&state.background)
        .map_err(|err| internal_error(err.into()))?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn get_xml(State(state): State<Arc<ServeState>>) -> Result<Response, (StatusCode, String)> {
    let diagram = state.read_diagram().await.map_err(internal_error)?;
    let xml = crate::payload::export_xml(&diagram);

    let mut response = Response::new(xml.into());
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/xml"));
    Ok(response)
}

async fn get_context(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<ContextResponse>, (StatusCode, String)> {
    let diagram = state.read_diagram().await.map_err(internal_error)?;
    Ok(Json(ContextResponse {
        context: CanvasContext::summarize(&diagram),
        components: crate::context::component_summaries(&diagram),
        connections: crate::context::connection_summaries(&diagram),
    }))
}

async fn post_event(
    State(state): State<Arc<ServeState>>,
    Json(event): Json<CanvasEvent>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.apply_event(&event).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            format!("'{}' target not found", event.event_name()),
        )),
        Err(err) => Err(internal_error(err)),
    }
}

async fn delete_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.remove_node(&node_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, format!("node '{node_id}' not found"))),
        Err(err) => Err(internal_error(err)),
    }
}

async fn delete_edge(
    State(state): State<Arc<ServeState>>,
    AxumPath(edge_id): AxumPath<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.remove_edge(&edge_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, format!("edge '{edge_id}' not found"))),
        Err(err) => Err(internal_error(err)),
    }
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
