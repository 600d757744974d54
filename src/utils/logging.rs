use tracing::{info, warn, error, debug};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(addr: &str) {
    info!("🚀 ACC issues web server starting on {}", addr);
}

pub fn log_server_ready(addr: &str) {
    info!("✅ Server ready and listening on http://{}", addr);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_session_created(session_id: &str) {
    debug!("🍪 Nova sessão criada: {}", session_id);
}

pub fn log_session_evicted(session_id: &str) {
    debug!("🧹 Sessão descartada: {}", session_id);
}

pub fn log_aps_error(endpoint: &str, status: u16, error: &str) {
    error!("APS error: {} - Status: {} - Error: {}", endpoint, status, error);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}
