//! HTTP surface of the identification engine.
//!
//! API endpoints:
//! - POST /index/add     - register a subject photo under an id
//! - POST /search        - rank registered subjects against a query photo
//! - POST /snapshot/save - write all indexes to the snapshot directory
//! - POST /snapshot/load - restore indexes from the snapshot directory
//! - POST /reset         - drop all in-memory indexes
//! - GET  /health        - liveness and per-index sizes

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use petmatch_ident::{
    BBox, BoxError, Engine, IdentError, IdentifyRequest, ImageSize, RegisterRequest, Species, View,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    index_dir: PathBuf,
}

pub async fn serve(addr: &str, engine: Engine, index_dir: PathBuf) -> Result<()> {
    let state = AppState {
        engine: Arc::new(engine),
        index_dir,
    };

    let app = Router::new()
        .route("/index/add", post(index_add))
        .route("/search", post(search))
        .route("/snapshot/save", post(snapshot_save))
        .route("/snapshot/load", post(snapshot_load))
        .route("/reset", post(reset))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Explicit subject box on the wire. `(0,0,0,0)` means "not provided".
#[derive(Deserialize, Default, Clone, Copy)]
struct WireBox {
    #[serde(default)]
    xmin: i32,
    #[serde(default)]
    ymin: i32,
    #[serde(default)]
    xmax: i32,
    #[serde(default)]
    ymax: i32,
}

impl From<WireBox> for BBox {
    fn from(b: WireBox) -> Self {
        BBox::new(b.xmin, b.ymin, b.xmax, b.ymax)
    }
}

#[derive(Deserialize)]
struct AddRequest {
    species: String,
    id: i64,
    /// Base64-encoded image bytes.
    image: String,
    width: u32,
    height: u32,
    #[serde(rename = "box")]
    bbox: Option<WireBox>,
    w_face: Option<f32>,
}

#[derive(Deserialize)]
struct SearchRequest {
    species: String,
    image: String,
    width: u32,
    height: u32,
    #[serde(rename = "box")]
    bbox: Option<WireBox>,
    #[serde(default = "default_top_k")]
    top_k: i64,
    w_face: Option<f32>,
}

fn default_top_k() -> i64 {
    20
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError(status, msg) = self;
        (status, Json(json!({"ok": false, "msg": msg}))).into_response()
    }
}

impl From<IdentError> for ApiError {
    fn from(e: IdentError) -> Self {
        let status = match &e {
            IdentError::InvalidSpecies(_)
            | IdentError::InvalidTopK(_)
            | IdentError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            IdentError::Box(b) => match b {
                BoxError::Required | BoxError::Invalid(_) | BoxError::Disabled => {
                    StatusCode::BAD_REQUEST
                }
                BoxError::NoDetection { .. } => StatusCode::NOT_FOUND,
                BoxError::Detector(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

fn decode_image(b64: &str) -> Result<Vec<u8>, ApiError> {
    B64.decode(b64)
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, format!("bad image encoding: {e}")))
}

fn parse_species(s: &str) -> Result<Species, ApiError> {
    s.parse::<Species>().map_err(ApiError::from)
}

fn explicit_box(b: Option<WireBox>) -> Option<BBox> {
    b.map(BBox::from)
}

async fn index_add(
    State(state): State<AppState>,
    Json(req): Json<AddRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let species = parse_species(&req.species)?;
    let image = decode_image(&req.image)?;

    let receipt = state
        .engine
        .register(RegisterRequest {
            species,
            id: req.id,
            image,
            image_size: ImageSize::new(req.width, req.height),
            explicit_box: explicit_box(req.bbox),
            face_weight: req.w_face,
        })
        .await?;

    info!(species = %species, id = receipt.id, "registered");
    Ok(Json(json!({"ok": true, "id": receipt.id, "w_face": receipt.face_weight})))
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let species = parse_species(&req.species)?;
    let image = decode_image(&req.image)?;

    let (matches, w_face) = state
        .engine
        .identify(IdentifyRequest {
            species,
            image,
            image_size: ImageSize::new(req.width, req.height),
            explicit_box: explicit_box(req.bbox),
            top_k: req.top_k,
            face_weight: req.w_face,
        })
        .await?;

    Ok(Json(json!({"ok": true, "w_face": w_face, "results": matches})))
}

async fn snapshot_save(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.save_snapshot(&state.index_dir)?;
    info!(dir = %state.index_dir.display(), "snapshot saved");
    Ok(Json(json!({"ok": true})))
}

async fn snapshot_load(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reports = state.engine.load_snapshot(&state.index_dir);

    let mut pairs = Vec::with_capacity(reports.len());
    for r in &reports {
        if let Some(e) = r.error() {
            warn!(species = %r.species, view = %r.view, "snapshot not restored: {e}");
        }
        pairs.push(json!({
            "species": r.species.to_string(),
            "view": r.view.to_string(),
            "outcome": format!("{:?}", r.outcome),
        }));
    }
    let ok = reports.iter().all(|r| r.error().is_none());
    Ok(Json(json!({"ok": ok, "pairs": pairs})))
}

async fn reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.engine.reset();
    info!("indexes reset");
    Json(json!({"ok": true}))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.engine.store();
    let mut sizes = serde_json::Map::new();
    for species in Species::ALL {
        for view in View::ALL {
            sizes.insert(
                format!("{species}_{view}"),
                json!(store.len(species, view)),
            );
        }
    }
    Json(json!({"ok": true, "dim": store.dim(), "sizes": sizes}))
}
