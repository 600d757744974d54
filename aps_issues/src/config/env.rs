use dotenv::dotenv;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;
use crate::error::{ApsError, ApsResult};

pub const DEFAULT_BASE_URL: &str = "https://developer.api.autodesk.com";
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8080/callback";
pub const DEFAULT_SCOPES: &str = "data:read data:write account:read code:all";
pub const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;

/// Credenciais do aplicativo APS e tokens opcionais em cache
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            access_token: None,
            refresh_token: None,
        }
    }
}

// Segredos nunca aparecem em logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Configuração do cliente APS carregada do `.env` ou do ambiente
#[derive(Debug, Clone)]
pub struct ApsConfig {
    pub credentials: Credentials,
    pub base_url: String,
    pub callback_url: String,
    pub scopes: Vec<String>,
    pub consent_timeout: Duration,
}

impl ApsConfig {
    /// Cria uma configuração com os valores padrão
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            scopes: split_scopes(DEFAULT_SCOPES),
            consent_timeout: Duration::from_secs(DEFAULT_CONSENT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = callback_url.into();
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Carrega o `.env` (se existir) e lê as variáveis de ambiente
    pub fn load() -> ApsResult<Self> {
        if cfg!(not(test)) && Path::new(".env").exists() {
            dotenv().map_err(|e| ApsError::config_error(format!("Erro ao carregar .env: {}", e)))?;
        }

        let config = Self::from_env()?;
        config.validate()?;

        log::info!("⚙️ Configuração APS carregada (client_id: {})", config.credentials.client_id);
        Ok(config)
    }

    /// Lê a configuração apenas das variáveis de ambiente do processo
    pub fn from_env() -> ApsResult<Self> {
        let mut credentials = Credentials::new(
            Self::get_env_var("APS_CLIENT_ID")?,
            Self::get_env_var("APS_CLIENT_SECRET")?,
        );
        credentials.access_token = Self::get_optional_var("APS_ACCESS_TOKEN");
        credentials.refresh_token = Self::get_optional_var("APS_REFRESH_TOKEN");

        let mut config = Self::new(credentials);

        if let Some(base_url) = Self::get_optional_var("APS_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(callback_url) = Self::get_optional_var("APS_CALLBACK_URL") {
            config = config.with_callback_url(callback_url);
        }
        if let Some(scopes) = Self::get_optional_var("APS_SCOPES") {
            config.scopes = split_scopes(&scopes);
        }
        if let Some(timeout) = Self::get_optional_var("APS_CONSENT_TIMEOUT_SECS") {
            let secs: u64 = timeout.parse().map_err(|_| {
                ApsError::config_error(format!("APS_CONSENT_TIMEOUT_SECS inválido: {}", timeout))
            })?;
            config.consent_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Obtém variável de ambiente obrigatória
    fn get_env_var(key: &str) -> ApsResult<String> {
        Self::get_optional_var(key)
            .ok_or_else(|| ApsError::config_error(format!("{} não encontrado", key)))
    }

    fn get_optional_var(key: &str) -> Option<String> {
        env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Valida se todas as configurações obrigatórias estão presentes
    pub fn validate(&self) -> ApsResult<()> {
        if self.credentials.client_id.is_empty() {
            return Err(ApsError::config_error("APS_CLIENT_ID é obrigatório"));
        }

        if self.credentials.client_secret.is_empty() {
            return Err(ApsError::config_error("APS_CLIENT_SECRET é obrigatório"));
        }

        if self.scopes.is_empty() {
            return Err(ApsError::config_error("APS_SCOPES não pode ser vazio"));
        }

        Url::parse(&self.base_url)
            .map_err(|e| ApsError::config_error(format!("APS_BASE_URL inválida: {}", e)))?;

        let callback = Url::parse(&self.callback_url)
            .map_err(|e| ApsError::config_error(format!("APS_CALLBACK_URL inválida: {}", e)))?;
        if callback.scheme() != "http" && callback.scheme() != "https" {
            return Err(ApsError::config_error("APS_CALLBACK_URL deve ser uma URL http(s)"));
        }

        Ok(())
    }

    /// Obtém a URL completa de um endpoint da API
    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }

    /// URLs de autorização e de token do OAuth2
    pub fn oauth_urls(&self) -> (String, String) {
        (
            self.api_url("authentication/v2/authorize"),
            self.api_url("authentication/v2/token"),
        )
    }

    /// Endereço local em que o servidor de callback escuta
    pub fn callback_addr(&self) -> ApsResult<SocketAddr> {
        let url = Url::parse(&self.callback_url)?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ApsError::config_error("APS_CALLBACK_URL sem porta"))?;
        Ok(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Caminho da rota de callback (ex.: `/callback`)
    pub fn callback_path(&self) -> ApsResult<String> {
        Ok(Url::parse(&self.callback_url)?.path().to_string())
    }
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_VARS: [&str; 8] = [
        "APS_CLIENT_ID",
        "APS_CLIENT_SECRET",
        "APS_ACCESS_TOKEN",
        "APS_REFRESH_TOKEN",
        "APS_BASE_URL",
        "APS_CALLBACK_URL",
        "APS_SCOPES",
        "APS_CONSENT_TIMEOUT_SECS",
    ];

    #[test]
    fn test_from_env_with_defaults() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_vars(
                [("APS_CLIENT_ID", Some("abc")), ("APS_CLIENT_SECRET", Some("xyz"))],
                || {
                    let config = ApsConfig::from_env().unwrap();
                    assert_eq!(config.credentials.client_id, "abc");
                    assert_eq!(config.credentials.access_token, None);
                    assert_eq!(config.base_url, DEFAULT_BASE_URL);
                    assert_eq!(config.callback_url, DEFAULT_CALLBACK_URL);
                    assert_eq!(
                        config.scopes,
                        vec!["data:read", "data:write", "account:read", "code:all"]
                    );
                    assert_eq!(config.consent_timeout, Duration::from_secs(300));
                    assert!(config.validate().is_ok());
                },
            );
        });
    }

    #[test]
    fn test_missing_client_id_is_config_error() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_var("APS_CLIENT_SECRET", Some("xyz"), || {
                let err = ApsConfig::from_env().unwrap_err();
                assert_eq!(err.kind(), crate::error::ErrorKind::Config);
                assert!(err.to_string().contains("APS_CLIENT_ID"));
            });
        });
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        temp_env::with_vars_unset(ALL_VARS, || {
            temp_env::with_vars(
                [("APS_CLIENT_ID", Some("abc")), ("APS_CLIENT_SECRET", Some("   "))],
                || {
                    assert!(ApsConfig::from_env().is_err());
                },
            );
        });
    }

    #[test]
    fn test_optional_overrides() {
        temp_env::with_vars(
            [
                ("APS_CLIENT_ID", Some("abc")),
                ("APS_CLIENT_SECRET", Some("xyz")),
                ("APS_ACCESS_TOKEN", Some("cached")),
                ("APS_REFRESH_TOKEN", Some("refresh")),
                ("APS_BASE_URL", Some("http://127.0.0.1:9999/")),
                ("APS_CALLBACK_URL", Some("http://localhost:9090/aps/callback")),
                ("APS_SCOPES", Some("data:read")),
                ("APS_CONSENT_TIMEOUT_SECS", Some("30")),
            ],
            || {
                let config = ApsConfig::from_env().unwrap();
                assert_eq!(config.credentials.access_token.as_deref(), Some("cached"));
                assert_eq!(config.credentials.refresh_token.as_deref(), Some("refresh"));
                assert_eq!(config.base_url, "http://127.0.0.1:9999");
                assert_eq!(config.scopes, vec!["data:read"]);
                assert_eq!(config.consent_timeout, Duration::from_secs(30));
                assert_eq!(config.callback_addr().unwrap().port(), 9090);
                assert_eq!(config.callback_path().unwrap(), "/aps/callback");
            },
        );
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        temp_env::with_vars(
            [
                ("APS_CLIENT_ID", Some("abc")),
                ("APS_CLIENT_SECRET", Some("xyz")),
                ("APS_CONSENT_TIMEOUT_SECS", Some("cinco")),
            ],
            || {
                assert!(ApsConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_validate_rejects_bad_callback() {
        let config = ApsConfig::new(Credentials::new("abc", "xyz")).with_callback_url("ftp://host/cb");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_and_oauth_urls() {
        let config = ApsConfig::new(Credentials::new("abc", "xyz"));
        assert_eq!(
            config.api_url("/project/v1/hubs"),
            "https://developer.api.autodesk.com/project/v1/hubs"
        );
        let (auth_url, token_url) = config.oauth_urls();
        assert_eq!(auth_url, "https://developer.api.autodesk.com/authentication/v2/authorize");
        assert_eq!(token_url, "https://developer.api.autodesk.com/authentication/v2/token");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut credentials = Credentials::new("abc", "super-secret");
        credentials.access_token = Some("token-value".to_string());
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token-value"));
        assert!(debug.contains("abc"));
    }
}
