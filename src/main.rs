use acc_issues_web::config::Settings;
use acc_issues_web::utils::logging::*;
use acc_issues_web::{build_router, AppState};
use anyhow::Context;
use aps_issues::ApsConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Configuração da APS ausente encerra antes de abrir a porta
    let aps_config = match ApsConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log_error(&format!("❌ {}", e));
            eprintln!("❌ Erro: {}", e);
            eprintln!("   Defina APS_CLIENT_ID e APS_CLIENT_SECRET no ambiente ou no arquivo .env");
            std::process::exit(2);
        }
    };

    let settings = Settings::new().context("Failed to load settings")?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    if aps_config.credentials.access_token.is_some() {
        log_warning("⚠️ APS_ACCESS_TOKEN é usado apenas pela CLI; no navegador cada sessão faz login");
    }

    let addr = settings.bind_addr();
    let state = Arc::new(AppState::new(settings, aps_config).context("Failed to build application state")?);
    log_info(&format!("🔁 Callback OAuth2 em {}", state.callback_path));

    let app = build_router(state).layer(TraceLayer::new_for_http());

    log_server_startup(&addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log_server_ready(&addr);

    axum::serve(listener, app).await?;
    Ok(())
}
