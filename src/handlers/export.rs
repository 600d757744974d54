use aps_issues::export::{default_file_name, export_to_bytes};
use aps_issues::ExportFormat;
use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::sessions::SharedSession;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// GET /api/export?format=csv|xlsx
///
/// Baixa o lote carregado na sessão
pub async fn download_export(
    Extension(session): Extension<SharedSession>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    log_request_received("/api/export", "GET");

    let format: ExportFormat = query
        .format
        .as_deref()
        .unwrap_or("csv")
        .parse()
        .map_err(AppError::ValidationError)?;

    let web = session.lock().await;
    let loaded = web
        .session
        .loaded_issues()
        .ok_or_else(|| AppError::ValidationError("Nenhuma issue carregada para exportar".to_string()))?;

    let bytes = export_to_bytes(&loaded.issues, format)?;
    let file_name = default_file_name(&loaded.project_id, format, chrono::Utc::now());
    log_info(&format!("💾 Exportando {} issues como {}", loaded.issues.len(), file_name));

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response())
}
