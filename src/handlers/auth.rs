//! Autenticação pelo navegador
//!
//! O login 3-legged usa o próprio servidor como redirect: `/auth/login`
//! registra o `state` na sessão e redireciona para a Autodesk, e o callback
//! confere o `state` antes de trocar o código.

use aps_issues::TokenManager;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Json, Redirect, Response},
    Extension,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::page::render_index;
use crate::sessions::SharedSession;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// POST /api/auth/2legged
///
/// Obtém o token de aplicação (client credentials) para hubs e projetos
pub async fn authenticate_two_legged(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
) -> AppResult<Json<Value>> {
    log_request_received("/api/auth/2legged", "POST");
    let mut web = session.lock().await;

    let token = state.client.token_manager().acquire_2legged().await?;
    let summary = json!({
        "kind": token.kind,
        "preview": token.preview(),
        "expires_in_secs": token.time_to_expiry(),
    });
    web.session.store_token(token);

    log_info("✅ [OAuth2] Token 2-legged armazenado na sessão");
    Ok(Json(json!({
        "session": web.session.flags(),
        "token": summary,
    })))
}

/// GET /auth/login
///
/// Inicia o fluxo 3-legged redirecionando o navegador para a Autodesk
pub async fn start_login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
) -> Redirect {
    log_info("🚀 [OAuth2] Iniciando fluxo de autorização...");

    let (url, csrf_state) = state.client.token_manager().begin_authorization();
    session.lock().await.remember_state(csrf_state);

    log_info(&format!("↗️  [OAuth2] Redirecionando para: {}", url.path()));
    Redirect::to(url.as_str())
}

/// GET /auth/callback?code=..&state=..
///
/// Confere o `state`, troca o código pelo token 3-legged e devolve a página
/// principal já autenticada
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    log_info("📥 [OAuth2] Callback recebido");
    let mut web = session.lock().await;

    // estado desconhecido nunca confere
    let expected = params
        .get("state")
        .and_then(|received| web.take_state(received))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = match TokenManager::verify_callback(&params, &expected) {
        Ok(code) => state.client.token_manager().exchange_code(&code).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(token) => {
            log_info(&format!("✅ [OAuth2] Token 3-legged obtido: {}", token.preview()));
            web.session.store_token(token);
            let flags = web.session.flags();
            Html(render_index(Some("✅ Login concluído"), &flags)).into_response()
        }
        Err(e) => {
            log_error(&format!("❌ [OAuth2] Falha no callback: {}", e));
            let error = AppError::from(e);
            let flags = web.session.flags();
            let banner = format!("❌ {}", error.user_message());
            (error.status_code(), Html(render_index(Some(&banner), &flags))).into_response()
        }
    }
}

/// POST /auth/logout
pub async fn logout(Extension(session): Extension<SharedSession>) -> Json<Value> {
    let mut web = session.lock().await;
    web.reset_auth();
    log_info("👋 Sessão desconectada");
    Json(json!({ "session": web.session.flags() }))
}

