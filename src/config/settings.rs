use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Quantos logins pendentes (estados OAuth2) cada sessão guarda
    pub max_pending_logins: usize,
    pub max_sessions: usize,
    /// Sessões sem acesso por mais tempo que isso são descartadas
    pub idle_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            session: SessionSettings {
                cookie_name: "acc_issues_session".to_string(),
                max_pending_logins: 5,
                max_sessions: 1000,
                idle_timeout_secs: 3600,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = Settings::default();

        let builder = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("session.cookie_name", defaults.session.cookie_name)?
            .set_default("session.max_pending_logins", defaults.session.max_pending_logins as i64)?
            .set_default("session.max_sessions", defaults.session.max_sessions as i64)?
            .set_default("session.idle_timeout_secs", defaults.session.idle_timeout_secs as i64)?
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // ACC_WEB__SERVER__PORT=9000
            .add_source(Environment::with_prefix("ACC_WEB").prefix_separator("__").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files_or_env() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.session.cookie_name, "acc_issues_session");
        assert!(settings.session.max_pending_logins > 0);
        assert!(settings.session.max_sessions > 0);
        assert!(settings.session.idle_timeout_secs > 0);
        assert!(settings.bind_addr().ends_with(&format!(":{}", settings.server.port)));
    }
}
