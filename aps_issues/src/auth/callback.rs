use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::Filter;
use crate::error::{ApsError, ApsResult, AuthFailure};

/// Servidor HTTP local para capturar o redirect do consentimento 3-legged
pub struct CallbackServer {
    addr: SocketAddr,
    path: String,
    expected_state: String,
}

/// Resultado do callback OAuth2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: String,
}

/// Servidor em execução aguardando um único redirect
///
/// O socket é liberado quando este valor é descartado.
pub struct PendingCallback {
    local_addr: SocketAddr,
    rx: oneshot::Receiver<ApsResult<CallbackResult>>,
    server_task: JoinHandle<()>,
}

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ApsResult<CallbackResult>>>>>;

impl CallbackServer {
    pub fn new(addr: SocketAddr, path: impl Into<String>, expected_state: impl Into<String>) -> Self {
        Self {
            addr,
            path: path.into(),
            expected_state: expected_state.into(),
        }
    }

    /// Abre o socket de callback e começa a escutar
    pub fn start(self) -> ApsResult<PendingCallback> {
        let (tx, rx) = oneshot::channel::<ApsResult<CallbackResult>>();
        let tx: SharedSender = Arc::new(Mutex::new(Some(tx)));
        let expected_path = self.path.clone();
        let expected_state = self.expected_state.clone();

        let callback_route = warp::get()
            .and(warp::path::full())
            .and(warp::query::<HashMap<String, String>>())
            .map(move |full: FullPath, params: HashMap<String, String>| {
                if full.as_str() != expected_path {
                    return warp::reply::with_status(warp::reply::html(WAITING_PAGE), StatusCode::NOT_FOUND);
                }

                log::info!("📥 Callback OAuth2 recebido (parâmetros: {:?})", params.keys().collect::<Vec<_>>());

                let result = Self::process_callback(&params, &expected_state);
                let page = if result.is_ok() { SUCCESS_PAGE } else { ERROR_PAGE };

                if let Ok(mut sender) = tx.lock() {
                    if let Some(tx) = sender.take() {
                        let _ = tx.send(result);
                    }
                }

                warp::reply::with_status(warp::reply::html(page), StatusCode::OK)
            });

        let (local_addr, server_future) = warp::serve(callback_route)
            .try_bind_ephemeral(self.addr)
            .map_err(|e| ApsError::callback_error(format!("Falha ao abrir {}: {}", self.addr, e)))?;

        log::info!("🛰️ Servidor de callback iniciado em: http://{}{}", local_addr, self.path);

        Ok(PendingCallback {
            local_addr,
            rx,
            server_task: tokio::spawn(server_future),
        })
    }

    /// Processa os parâmetros do callback
    pub fn process_callback(
        params: &HashMap<String, String>,
        expected_state: &str,
    ) -> ApsResult<CallbackResult> {
        if let Some(error) = params.get("error") {
            return match error.as_str() {
                "access_denied" => Err(AuthFailure::AccessDenied.into()),
                other => Err(ApsError::callback_error(format!("Erro OAuth2: {}", other))),
            };
        }

        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthFailure::InvalidCode("Código não encontrado no callback".to_string()))?;

        // Proteção CSRF
        let received_state = params.get("state").ok_or(AuthFailure::InvalidState)?;
        if received_state != expected_state {
            log::warn!("⚠️ Estado OAuth2 divergente no callback");
            return Err(AuthFailure::InvalidState.into());
        }

        log::info!("✅ Callback OAuth2 processado com sucesso");

        Ok(CallbackResult {
            code: code.clone(),
            state: received_state.clone(),
        })
    }
}

impl PendingCallback {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Aguarda o redirect, o timeout ou o cancelamento, o que vier primeiro
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> ApsResult<CallbackResult> {
        tokio::select! {
            received = &mut self.rx => match received {
                Ok(result) => result,
                Err(_) => Err(ApsError::callback_error("Canal de comunicação fechado")),
            },
            _ = tokio::time::sleep(timeout) => {
                log::warn!("⏰ Tempo de consentimento esgotado ({}s)", timeout.as_secs());
                Err(AuthFailure::Timeout.into())
            },
            _ = cancel.cancelled() => {
                log::warn!("🛑 Consentimento cancelado");
                Err(AuthFailure::Cancelled.into())
            },
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.server_task.abort();
        log::debug!("🔒 Servidor de callback encerrado ({})", self.local_addr);
    }
}

const WAITING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>APS OAuth2</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; margin-top: 80px;">
    <h1>🔐 Autodesk Platform Services</h1>
    <p>Aguardando autorização...</p>
</body>
</html>
"#;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>APS OAuth2 - Autorização Concluída</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; margin-top: 80px;">
    <div style="font-size: 64px;">✅</div>
    <h1 style="color: #28a745;">Autorização Concluída!</h1>
    <p>Você pode fechar esta janela e retornar à aplicação.</p>
    <script>setTimeout(() => { window.close(); }, 3000);</script>
</body>
</html>
"#;

const ERROR_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>APS OAuth2 - Erro na Autorização</title></head>
<body style="font-family: Arial, sans-serif; text-align: center; margin-top: 80px;">
    <div style="font-size: 64px;">❌</div>
    <h1 style="color: #dc3545;">Erro na Autorização</h1>
    <p>Ocorreu um erro durante a autorização. Tente novamente pela aplicação.</p>
</body>
</html>
"#;
