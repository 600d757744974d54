use aps_issues::{ApsClient, ApsResult, Issue, IssueFilters, Session};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::sessions::SharedSession;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ContainerQuery {
    /// Hub do projeto, para resolver o container pelos escopos
    pub hub_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssuesQuery {
    pub hub_id: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
}

fn report(endpoint: &str, error: impl Into<AppError>) -> AppError {
    let error = error.into();
    log_aps_error(endpoint, error.status_code().as_u16(), &error.to_string());
    error
}

async fn container_for(
    client: &ApsClient,
    session: &mut Session,
    project_id: &str,
    hub_id: Option<&str>,
) -> ApsResult<String> {
    match hub_id.filter(|h| !h.trim().is_empty()) {
        Some(hub_id) => client.resolve_container(session, hub_id, project_id).await,
        None => Ok(project_id.to_string()),
    }
}

/// GET /api/session
pub async fn session_info(Extension(session): Extension<SharedSession>) -> Json<Value> {
    let web = session.lock().await;
    let loaded = web.session.loaded_issues().map(|loaded| {
        json!({
            "project_id": loaded.project_id,
            "filters": loaded.filters,
            "count": loaded.issues.len(),
            "fetched_at": loaded.fetched_at.to_rfc3339(),
        })
    });

    Json(json!({
        "session": web.session.flags(),
        "loaded": loaded,
    }))
}

/// GET /api/hubs
pub async fn list_hubs(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
) -> AppResult<Json<Value>> {
    log_request_received("/api/hubs", "GET");
    let mut web = session.lock().await;

    let hubs = state
        .client
        .list_hubs(&mut web.session)
        .await
        .map_err(|e| report("/api/hubs", e))?;

    if hubs.is_empty() {
        return Ok(Json(json!({
            "hubs": [],
            "message": "Nenhum hub encontrado para esta conta",
        })));
    }
    Ok(Json(json!({ "hubs": hubs })))
}

/// GET /api/hubs/:hub_id/projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Path(hub_id): Path<String>,
) -> AppResult<Json<Value>> {
    log_request_received("/api/hubs/:hub_id/projects", "GET");
    let mut web = session.lock().await;

    let projects = state
        .client
        .list_projects(&mut web.session, &hub_id)
        .await
        .map_err(|e| report("/api/hubs/:hub_id/projects", e))?;

    Ok(Json(json!({ "hub_id": hub_id, "projects": projects })))
}

/// GET /api/projects/:project_id/issue-types
pub async fn list_issue_types(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Path(project_id): Path<String>,
    Query(query): Query<ContainerQuery>,
) -> AppResult<Json<Value>> {
    const ENDPOINT: &str = "/api/projects/:project_id/issue-types";
    log_request_received(ENDPOINT, "GET");
    let mut web = session.lock().await;

    let container = container_for(&state.client, &mut web.session, &project_id, query.hub_id.as_deref())
        .await
        .map_err(|e| report(ENDPOINT, e))?;
    let issue_types = state
        .client
        .list_issue_types(&mut web.session, &container)
        .await
        .map_err(|e| report(ENDPOINT, e))?;

    Ok(Json(json!({ "project_id": project_id, "issue_types": issue_types })))
}

/// GET /api/projects/:project_id/issues?issue_type=..&status=..
///
/// Busca (uma requisição, até 200 issues) e guarda o lote na sessão
pub async fn load_issues(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Path(project_id): Path<String>,
    Query(query): Query<IssuesQuery>,
) -> AppResult<Json<Value>> {
    const ENDPOINT: &str = "/api/projects/:project_id/issues";
    log_request_received(ENDPOINT, "GET");
    let mut web = session.lock().await;

    let filters = IssueFilters::new(query.issue_type, query.status);
    let container = container_for(&state.client, &mut web.session, &project_id, query.hub_id.as_deref())
        .await
        .map_err(|e| report(ENDPOINT, e))?;
    let issues = state
        .client
        .list_issues(&mut web.session, &container, &filters)
        .await
        .map_err(|e| report(ENDPOINT, e))?;

    let limit_reached = web.session.loaded_issues().map_or(false, |loaded| loaded.limit_reached);

    // o lote fica associado ao id escolhido pelo usuário, não ao container
    web.session.set_issues(&project_id, filters.clone(), issues.clone(), limit_reached);

    Ok(Json(json!({
        "project_id": project_id,
        "filters": filters,
        "count": issues.len(),
        "limit_reached": limit_reached,
        "issues": issues.iter().map(Issue::to_json).collect::<Vec<_>>(),
    })))
}

/// GET /api/issues
///
/// Lote já carregado, sem nova chamada à APS (recarga da página)
pub async fn loaded_issues(Extension(session): Extension<SharedSession>) -> Json<Value> {
    let web = session.lock().await;

    match web.session.loaded_issues() {
        Some(loaded) => Json(json!({
            "loaded": true,
            "project_id": loaded.project_id,
            "filters": loaded.filters,
            "count": loaded.issues.len(),
            "limit_reached": loaded.limit_reached,
            "fetched_at": loaded.fetched_at.to_rfc3339(),
            "issues": loaded.issues.iter().map(Issue::to_json).collect::<Vec<_>>(),
        })),
        None => Json(json!({ "loaded": false, "issues": [] })),
    }
}
