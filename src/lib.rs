// Front end web para issues do Autodesk Construction Cloud
// Expõe estado e rotas para uso em testes e no binário

pub mod config;
pub mod handlers;
pub mod sessions;
pub mod utils;

use aps_issues::{ApsClient, ApsConfig, TokenManager};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::sessions::SessionStore;
use crate::utils::AppResult;

// AppState é compartilhado entre todas as sessões
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub client: ApsClient,
    pub sessions: SessionStore,
    /// Caminho local do redirect OAuth2 (derivado de APS_CALLBACK_URL)
    pub callback_path: String,
}

impl AppState {
    pub fn new(settings: config::Settings, aps_config: ApsConfig) -> AppResult<Self> {
        let callback_path = aps_config.callback_path()?;
        let client = ApsClient::new(TokenManager::new(aps_config)?)?;
        let sessions = SessionStore::new(&settings.session);

        Ok(Self {
            settings,
            client,
            sessions,
            callback_path,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut session_routes = Router::new()
        .route("/", get(handlers::index))
        .route("/api/auth/2legged", post(handlers::authenticate_two_legged))
        .route("/auth/login", get(handlers::start_login))
        .route("/auth/callback", get(handlers::handle_callback))
        .route("/auth/logout", post(handlers::logout))
        .route("/api/session", get(handlers::session_info))
        .route("/api/hubs", get(handlers::list_hubs))
        .route("/api/hubs/:hub_id/projects", get(handlers::list_projects))
        .route("/api/projects/:project_id/issue-types", get(handlers::list_issue_types))
        .route("/api/projects/:project_id/issues", get(handlers::load_issues))
        .route("/api/issues", get(handlers::loaded_issues))
        .route("/api/export", get(handlers::download_export));

    // APS_CALLBACK_URL pode apontar para outro caminho (padrão: /callback)
    if !matches!(state.callback_path.as_str(), "/auth/callback" | "/" | "/health")
        && !state.callback_path.starts_with("/api/")
    {
        session_routes = session_routes.route(&state.callback_path, get(handlers::handle_callback));
    }

    let session_routes =
        session_routes.layer(middleware::from_fn_with_state(state.clone(), sessions::attach_session));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(session_routes)
        .with_state(state)
}
