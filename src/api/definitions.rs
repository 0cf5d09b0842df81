/// Definition REST API endpoints
///
/// Thin HTTP wrapper over `DefinitionRepository`: latest-version lookups by id
/// or by (name, tenant), and registration of raw state-language text.

use crate::definition::Definition;
use crate::error::RepositoryError;
use crate::repository::DefinitionRepository;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Definition repository (cache in front of the store)
    pub repository: Arc<DefinitionRepository>,
}

/// Query for latest-version lookups
#[derive(Debug, Deserialize)]
pub struct NameTenantQuery {
    pub name: String,
    /// Falls back to the repository's default tenant
    pub tenant_id: Option<String>,
}

/// Query for the (unsupported) version lookup
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<String>,
}

/// Request body for definition registration
#[derive(Debug, Deserialize)]
pub struct RegisterDefinitionRequest {
    /// Raw state-language text
    pub content: String,
    /// Tenant used when the text declares none
    pub tenant_id: Option<String>,
}

/// Response for registration
#[derive(Debug, Serialize)]
pub struct RegisterDefinitionResponse {
    pub id: String,
    pub message: String,
    pub definition: Definition,
}

/// Create definition routes
pub fn create_definition_routes() -> Router<AppState> {
    Router::new()
        .route("/api/definitions", get(get_latest_definition))
        .route("/api/definitions", post(register_definition))
        .route("/api/definitions/{id}", get(get_definition))
        .route("/api/definitions/{name}/versions/{version}", get(get_definition_version))
}

/// Map repository failures onto HTTP status codes
fn status_for(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::Parse(_) | RepositoryError::Encoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RepositoryError::VersionLookupUnsupported { .. } => StatusCode::NOT_IMPLEMENTED,
        RepositoryError::UnknownParser(_)
        | RepositoryError::Store(_)
        | RepositoryError::IdGeneration(_)
        | RepositoryError::ResourceLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn found(result: Result<Option<Arc<Definition>>, RepositoryError>, what: &str) -> Result<Json<Definition>, StatusCode> {
    match result {
        Ok(Some(definition)) => Ok(Json(Definition::clone(&definition))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get definition {}: {}", what, e);
            Err(status_for(&e))
        }
    }
}

/// Get a definition by id
///
/// GET /api/definitions/{id}
async fn get_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Definition>, StatusCode> {
    found(state.repository.get_by_id(&id).await, &id)
}

/// Get the latest definition for a name and tenant
///
/// GET /api/definitions?name=ship-order&tenant_id=t1
async fn get_latest_definition(
    State(state): State<AppState>,
    Query(query): Query<NameTenantQuery>,
) -> Result<Json<Definition>, StatusCode> {
    let tenant_id = query
        .tenant_id
        .unwrap_or_else(|| state.repository.default_tenant_id().to_string());
    let result = state.repository.get_by_name_tenant(&query.name, &tenant_id).await;
    found(result, &format!("{}@{}", query.name, tenant_id))
}

/// Version-specific lookup; answers 501
///
/// GET /api/definitions/{name}/versions/{version}
async fn get_definition_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Definition>, StatusCode> {
    let tenant_id = query
        .tenant_id
        .unwrap_or_else(|| state.repository.default_tenant_id().to_string());
    let result = state.repository.get_by_version(&name, &tenant_id, &version).await;
    found(result, &format!("{name}@{tenant_id} version {version}"))
}

/// Register raw definition text
///
/// POST /api/definitions
/// Body: { "content": "{ \"Name\": ... }", "tenant_id": "t1" }
async fn register_definition(
    State(state): State<AppState>,
    Json(payload): Json<RegisterDefinitionRequest>,
) -> Result<Json<RegisterDefinitionResponse>, StatusCode> {
    if payload.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let definition = state
        .repository
        .register_content(&payload.content, payload.tenant_id.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to register definition: {}", e);
            status_for(&e)
        })?;

    let id = definition.id.clone().unwrap_or_default();
    tracing::info!("Registered definition {} ({})", id, definition.key());

    Ok(Json(RegisterDefinitionResponse {
        message: format!("Definition '{}' registered", definition.name),
        id,
        definition: Definition::clone(&definition),
    }))
}
