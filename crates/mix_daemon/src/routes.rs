use crate::state::{AppState, Session};
use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use mix_core::{
    apply_command, commit, load_mix, materials_for_owner, summarize, CategoryThresholds,
    Material, MaterialCatalog, MaterialId, Mix, MixCommand, MixError, RecipeOwnerId,
};
use mix_store::{MaterialRecord, MovementView, StoreConfig};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173").expect("valid test origin")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<axum::http::HeaderValue>()
        .with_context(|| format!("invalid CORS origin: {cors_origin}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/config", get(config_handler).put(update_config_handler))
        .route(
            "/api/v1/materials",
            get(materials_handler).post(add_material_handler),
        )
        .route("/api/v1/materials/:id/movements", get(movements_handler))
        .route(
            "/api/v1/materials/:id/adjustments",
            post(adjustment_handler),
        )
        .route("/api/v1/sessions", post(open_session_handler))
        .route(
            "/api/v1/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/api/v1/sessions/:id/commands", post(command_handler))
        .route("/api/v1/sessions/:id/commit", post(commit_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn error_body(status: StatusCode, kind: &str, message: String) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "error": kind, "message": message })),
    )
}

fn mix_error(err: &MixError) -> ApiError {
    let (status, kind) = match err {
        MixError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        MixError::DuplicateMaterial(_) => (StatusCode::CONFLICT, "duplicate_material"),
        MixError::Locked(_) => (StatusCode::CONFLICT, "locked"),
        MixError::OutOfRange { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "out_of_range"),
        MixError::QuantityExceeded { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "quantity_exceeded")
        }
        MixError::InsufficientRemainingProportion { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_remaining_proportion",
        ),
        MixError::CatalogUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "catalog_unavailable"),
        MixError::CommitFailed(_) => (StatusCode::BAD_GATEWAY, "commit_failed"),
    };
    error_body(status, kind, err.to_string())
}

fn session_not_found(id: &str) -> ApiError {
    error_body(
        StatusCode::NOT_FOUND,
        "session_not_found",
        format!("session '{id}' not found"),
    )
}

fn rejected(err: &anyhow::Error) -> ApiError {
    error_body(
        StatusCode::UNPROCESSABLE_ENTITY,
        "invalid",
        format!("{err:#}"),
    )
}

fn session_view(id: &str, session: &Session, config: &StoreConfig) -> serde_json::Value {
    serde_json::json!({
        "session_id": id,
        "owner": session.owner,
        "mix": session.mix,
        "summary": summarize(&session.mix, &config.thresholds, &config.target),
    })
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let materials = app_state.store.lock().data().materials.len();
    let sessions = app_state.sessions.lock().len();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "materials": materials,
        "sessions": sessions,
    }))
}

pub async fn config_handler(State(app_state): State<AppState>) -> Json<StoreConfig> {
    Json(*app_state.store.lock().config())
}

pub async fn materials_handler(State(app_state): State<AppState>) -> ApiResult<Vec<Material>> {
    let store = app_state.store.lock();
    store
        .list_available_materials()
        .map(Json)
        .map_err(|err| mix_error(&err.into()))
}

pub async fn movements_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MovementView>> {
    let id = MaterialId(id);
    let store = app_state.store.lock();
    if store.material(&id).is_none() {
        return Err(mix_error(&MixError::NotFound(id)));
    }
    store.movement_history(&id).map(Json).map_err(|err| {
        tracing::error!("movement history for {id} failed: {err:#}");
        error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("{err:#}"),
        )
    })
}

pub async fn update_config_handler(
    State(app_state): State<AppState>,
    Json(thresholds): Json<CategoryThresholds>,
) -> ApiResult<StoreConfig> {
    let mut store = app_state.store.lock();
    store.set_thresholds(thresholds).map_err(|err| rejected(&err))?;
    Ok(Json(*store.config()))
}

#[derive(Debug, Deserialize)]
pub struct NewMaterialRequest {
    pub id: String,
    pub name: String,
    pub ratio: f64,
    pub quantity: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

pub async fn add_material_handler(
    State(app_state): State<AppState>,
    Json(request): Json<NewMaterialRequest>,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    let id = MaterialId(request.id);
    let mut store = app_state.store.lock();
    if store.material(&id).is_some() {
        return Err(error_body(
            StatusCode::CONFLICT,
            "duplicate_material",
            format!("material '{id}' already exists"),
        ));
    }
    let record = MaterialRecord {
        description: request.description,
        location: request.location,
        ..MaterialRecord::new(id.clone(), request.name, request.ratio, request.quantity)
    };
    store.add_material(record).map_err(|err| rejected(&err))?;

    let material = store
        .list_available_materials()
        .map_err(|err| mix_error(&err.into()))?
        .into_iter()
        .find(|material| material.id == id)
        .ok_or_else(|| mix_error(&MixError::NotFound(id)))?;
    Ok((StatusCode::CREATED, Json(material)))
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    /// Signed; negative removes quantity.
    pub amount: f64,
}

pub async fn adjustment_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AdjustmentRequest>,
) -> ApiResult<serde_json::Value> {
    let id = MaterialId(id);
    let mut store = app_state.store.lock();
    if store.material(&id).is_none() {
        return Err(mix_error(&MixError::NotFound(id)));
    }
    store
        .record_adjustment(&id, request.amount)
        .map_err(|err| rejected(&err))?;
    Ok(Json(serde_json::json!({
        "material_id": id,
        "available_quantity": store.available_quantity(&id),
    })))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub owner: String,
    /// Skip restoring the owner's saved recipe.
    #[serde(default)]
    pub fresh: bool,
}

pub async fn open_session_handler(
    State(app_state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if request.owner.trim().is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "invalid_owner",
            "owner must not be empty".to_string(),
        ));
    }
    let owner = RecipeOwnerId(request.owner);

    let store = app_state.store.lock();
    let mix = if request.fresh {
        Mix::new()
    } else {
        load_mix(&*store, &owner).map_err(|err| mix_error(&err))?
    };
    let config = *store.config();

    let id = uuid::Uuid::new_v4().to_string();
    let session = Session { owner, mix };
    let view = session_view(&id, &session, &config);
    tracing::info!(session = %id, owner = %session.owner, entries = session.mix.len(), "session opened");
    app_state.sessions.lock().insert(id, session);
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let config = *app_state.store.lock().config();
    let sessions = app_state.sessions.lock();
    let session = sessions.get(&id).ok_or_else(|| session_not_found(&id))?;
    Ok(Json(session_view(&id, session, &config)))
}

/// Applies one command. On failure the session keeps its previous mix.
pub async fn command_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(command): Json<MixCommand>,
) -> ApiResult<serde_json::Value> {
    let store = app_state.store.lock();
    let mut sessions = app_state.sessions.lock();
    let session = sessions
        .get_mut(&id)
        .ok_or_else(|| session_not_found(&id))?;

    let materials = materials_for_owner(&*store, &session.owner).map_err(|err| mix_error(&err))?;
    let next = apply_command(&session.mix, &command, &materials).map_err(|err| {
        tracing::debug!(session = %id, "command rejected: {err}");
        mix_error(&err)
    })?;
    session.mix = next;
    Ok(Json(session_view(&id, session, store.config())))
}

/// Commits the session's mix as its owner's recipe and closes the session.
pub async fn commit_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let mut store = app_state.store.lock();
    let mut sessions = app_state.sessions.lock();
    let session = sessions.get(&id).ok_or_else(|| session_not_found(&id))?;

    let receipt = commit(&session.mix, &session.owner, &mut *store).map_err(|err| {
        tracing::warn!(session = %id, "commit rejected: {err}");
        mix_error(&err)
    })?;
    sessions.remove(&id);
    Ok(Json(serde_json::json!({
        "receipt": receipt,
        "movements": receipt.movements(),
    })))
}

pub async fn delete_session_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if app_state.sessions.lock().remove(&id).is_some() {
        tracing::info!(session = %id, "session abandoned");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
