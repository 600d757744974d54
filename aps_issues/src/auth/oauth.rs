use std::collections::HashMap;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use tokio_util::sync::CancellationToken;
use url::Url;
use crate::auth::callback::CallbackServer;
use crate::auth::token::{Token, TokenKind};
use crate::config::ApsConfig;
use crate::error::{ApsError, ApsResult, AuthFailure};

type TokenRequestError = RequestTokenError<oauth2::reqwest::Error<reqwest::Error>, BasicErrorResponse>;

/// Abre a URL de consentimento para o usuário
pub trait ConsentLauncher: Send + Sync {
    fn launch(&self, consent_url: &Url) -> ApsResult<()>;
}

/// Abre o consentimento no navegador padrão do sistema
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl ConsentLauncher for SystemBrowser {
    fn launch(&self, consent_url: &Url) -> ApsResult<()> {
        if let Err(e) = webbrowser::open(consent_url.as_str()) {
            log::warn!("⚠️ Não foi possível abrir o navegador automaticamente: {}", e);
            eprintln!("🔗 Abra manualmente o link: {}", consent_url);
        } else {
            log::info!("🌐 Navegador aberto automaticamente");
        }
        Ok(())
    }
}

/// Emite e renova tokens APS (2-legged e 3-legged)
#[derive(Debug, Clone)]
pub struct TokenManager {
    config: ApsConfig,
    client: BasicClient,
}

impl TokenManager {
    pub fn new(config: ApsConfig) -> ApsResult<Self> {
        config.validate()?;
        let client = Self::create_oauth_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApsConfig {
        &self.config
    }

    /// Cria o cliente OAuth2
    fn create_oauth_client(config: &ApsConfig) -> ApsResult<BasicClient> {
        let (auth_url, token_url) = config.oauth_urls();

        let auth_url = AuthUrl::new(auth_url)
            .map_err(|e| ApsError::config_error(format!("URL de autorização inválida: {}", e)))?;
        let token_url = TokenUrl::new(token_url)
            .map_err(|e| ApsError::config_error(format!("URL de token inválida: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.callback_url.clone())
            .map_err(|e| ApsError::config_error(format!("URL de redirecionamento inválida: {}", e)))?;

        Ok(BasicClient::new(
            ClientId::new(config.credentials.client_id.clone()),
            Some(ClientSecret::new(config.credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url))
    }

    fn scopes(&self) -> Vec<Scope> {
        self.config.scopes.iter().cloned().map(Scope::new).collect()
    }

    /// Obtém um token 2-legged (client credentials), sem interação do usuário
    pub async fn acquire_2legged(&self) -> ApsResult<Token> {
        log::info!("🔑 Solicitando token 2-legged...");

        let response = self
            .client
            .exchange_client_credentials()
            .add_scopes(self.scopes())
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        let token = token_from_response(&response, TokenKind::TwoLegged);
        log::info!("✅ Token 2-legged obtido ({})", token.preview());
        Ok(token)
    }

    /// Gera a URL de consentimento e o `state` correspondente
    pub fn begin_authorization(&self) -> (Url, String) {
        let (url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes())
            .url();

        log::info!("🌐 URL de autorização gerada");
        (url, csrf_token.secret().clone())
    }

    /// Valida os parâmetros do redirect e devolve o código de autorização
    pub fn verify_callback(params: &HashMap<String, String>, expected_state: &str) -> ApsResult<String> {
        CallbackServer::process_callback(params, expected_state).map(|result| result.code)
    }

    /// Troca o código de autorização por um token 3-legged
    pub async fn exchange_code(&self, code: &str) -> ApsResult<Token> {
        log::info!("🔄 Trocando código de autorização por token...");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        let token = token_from_response(&response, TokenKind::ThreeLegged);
        log::info!("✅ Token 3-legged obtido ({})", token.preview());
        Ok(token)
    }

    /// Executa o consentimento 3-legged completo
    ///
    /// O servidor de callback é aberto imediatamente antes do consentimento e
    /// fechado logo após o redirect, o timeout ou o cancelamento. Um `state`
    /// divergente encerra o fluxo sem chamar o endpoint de token.
    pub async fn acquire_3legged(
        &self,
        launcher: &dyn ConsentLauncher,
        cancel: &CancellationToken,
    ) -> ApsResult<Token> {
        log::info!("🔑 Iniciando consentimento 3-legged...");

        let (consent_url, state) = self.begin_authorization();
        let pending = CallbackServer::new(
            self.config.callback_addr()?,
            self.config.callback_path()?,
            state,
        )
        .start()?;

        launcher.launch(&consent_url)?;
        log::info!("⏳ Aguardando autorização do usuário...");

        let callback = pending.wait(self.config.consent_timeout, cancel).await?;
        self.exchange_code(&callback.code).await
    }

    /// Renova um token 3-legged usando o refresh token
    ///
    /// Qualquer falha é terminal e exige nova autenticação.
    pub async fn refresh(&self, token: &Token) -> ApsResult<Token> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(AuthFailure::RefreshFailed)?;

        log::info!("🔄 Renovando token {}...", token.kind);

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                log::warn!("❌ Falha ao renovar token: {}", map_token_error(e));
                ApsError::from(AuthFailure::RefreshFailed)
            })?;

        let mut renewed = token_from_response(&response, token.kind);
        if renewed.refresh_token.is_none() {
            renewed.refresh_token = Some(refresh_token);
        }

        log::info!("✅ Token renovado ({})", renewed.preview());
        Ok(renewed)
    }
}

fn token_from_response(response: &BasicTokenResponse, kind: TokenKind) -> Token {
    Token::new(response.access_token().secret().clone(), kind, response.expires_in())
        .with_refresh_token(response.refresh_token().map(|t| t.secret().clone()))
}

fn map_token_error(err: TokenRequestError) -> ApsError {
    match err {
        RequestTokenError::ServerResponse(response) => {
            AuthFailure::CredentialsRejected(response.to_string()).into()
        }
        RequestTokenError::Request(e) => {
            ApsError::provider_error(None, format!("Falha na requisição de token: {}", e))
        }
        // O provedor responde erros de credencial em JSON próprio (errorCode/developerMessage)
        RequestTokenError::Parse(e, body) => match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) if value.get("errorCode").is_some() || value.get("developerMessage").is_some() => {
                let message = value
                    .get("developerMessage")
                    .and_then(|m| m.as_str())
                    .unwrap_or("credenciais rejeitadas");
                AuthFailure::CredentialsRejected(message.to_string()).into()
            }
            _ => ApsError::parse_error(e.to_string()),
        },
        RequestTokenError::Other(message) => ApsError::provider_error(None, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn manager_for(server: &MockServer) -> TokenManager {
        let config = ApsConfig::new(Credentials::new("client-id", "client-secret"))
            .with_base_url(server.uri())
            .with_callback_url(format!("http://127.0.0.1:{}/callback", free_port()))
            .with_consent_timeout(Duration::from_secs(5));
        TokenManager::new(config).unwrap()
    }

    /// Simula o navegador: segue o redirect com o `state` informado
    struct RedirectingLauncher {
        state_override: Option<String>,
        params: Vec<(String, String)>,
    }

    impl RedirectingLauncher {
        fn approving() -> Self {
            Self { state_override: None, params: vec![("code".into(), "auth-code".into())] }
        }
    }

    impl ConsentLauncher for RedirectingLauncher {
        fn launch(&self, consent_url: &Url) -> ApsResult<()> {
            let query: HashMap<String, String> = consent_url.query_pairs().into_owned().collect();
            let mut redirect = Url::parse(&query["redirect_uri"]).unwrap();
            let state = self.state_override.clone().unwrap_or_else(|| query["state"].clone());
            {
                let mut pairs = redirect.query_pairs_mut();
                for (k, v) in &self.params {
                    pairs.append_pair(k, v);
                }
                pairs.append_pair("state", &state);
            }
            tokio::spawn(async move {
                let _ = reqwest::get(redirect).await;
            });
            Ok(())
        }
    }

    struct IgnoringLauncher;

    impl ConsentLauncher for IgnoringLauncher {
        fn launch(&self, _consent_url: &Url) -> ApsResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_acquire_2legged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "two-legged-token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = manager_for(&server).acquire_2legged().await.unwrap();
        assert_eq!(token.value, "two-legged-token");
        assert_eq!(token.kind, TokenKind::TwoLegged);
        assert!(token.expires_at.is_some());
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_acquire_2legged_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "developerMessage": "The client_id specified does not have access to the api product",
                "errorCode": "AUTH-001"
            })))
            .mount(&server)
            .await;

        let err = manager_for(&server).acquire_2legged().await.unwrap_err();
        assert!(matches!(err, ApsError::Auth(AuthFailure::CredentialsRejected(_))));
    }

    #[tokio::test]
    async fn test_acquire_2legged_oauth_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "bad secret"
            })))
            .mount(&server)
            .await;

        let err = manager_for(&server).acquire_2legged().await.unwrap_err();
        assert!(matches!(err, ApsError::Auth(AuthFailure::CredentialsRejected(_))));
    }

    #[tokio::test]
    async fn test_begin_authorization_url() {
        let server = MockServer::start().await;
        let manager = manager_for(&server);
        let (url, state) = manager.begin_authorization();

        assert_eq!(url.path(), "/authentication/v2/authorize");
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["state"], state);
        assert_eq!(query["scope"], "data:read data:write account:read code:all");
        assert_eq!(query["redirect_uri"], manager.config().callback_url);
    }

    #[tokio::test]
    async fn test_acquire_3legged_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "three-legged-token",
                "token_type": "Bearer",
                "expires_in": 3599,
                "refresh_token": "refresh-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let token = manager
            .acquire_3legged(&RedirectingLauncher::approving(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(token.kind, TokenKind::ThreeLegged);
        assert_eq!(token.value, "three-legged-token");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_acquire_3legged_state_mismatch_never_exchanges() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "should-not-happen",
                "token_type": "Bearer"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let launcher = RedirectingLauncher {
            state_override: Some("forged-state".to_string()),
            ..RedirectingLauncher::approving()
        };

        let err = manager_for(&server)
            .acquire_3legged(&launcher, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApsError::Auth(AuthFailure::InvalidState)));
    }

    #[tokio::test]
    async fn test_acquire_3legged_access_denied() {
        let server = MockServer::start().await;
        let launcher = RedirectingLauncher {
            state_override: None,
            params: vec![("error".into(), "access_denied".into())],
        };

        let err = manager_for(&server)
            .acquire_3legged(&launcher, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApsError::Auth(AuthFailure::AccessDenied)));
    }

    #[tokio::test]
    async fn test_acquire_3legged_timeout() {
        let server = MockServer::start().await;
        let config = manager_for(&server)
            .config()
            .clone()
            .with_consent_timeout(Duration::from_millis(100));
        let manager = TokenManager::new(config).unwrap();

        let err = manager
            .acquire_3legged(&IgnoringLauncher, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApsError::Auth(AuthFailure::Timeout)));
    }

    #[tokio::test]
    async fn test_acquire_3legged_cancelled() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = manager_for(&server)
            .acquire_3legged(&IgnoringLauncher, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ApsError::Auth(AuthFailure::Cancelled)));
    }

    #[tokio::test]
    async fn test_refresh_success_keeps_refresh_token_when_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "renewed",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let old = Token::new("old", TokenKind::ThreeLegged, None)
            .with_refresh_token(Some("refresh-1".to_string()));
        let renewed = manager_for(&server).refresh(&old).await.unwrap();

        assert_eq!(renewed.value, "renewed");
        assert_eq!(renewed.kind, TokenKind::ThreeLegged);
        assert_eq!(renewed.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_refresh_failure_requires_reauthentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/v2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let old = Token::new("old", TokenKind::ThreeLegged, None)
            .with_refresh_token(Some("revoked".to_string()));
        let err = manager_for(&server).refresh(&old).await.unwrap_err();
        assert!(matches!(err, ApsError::Auth(AuthFailure::RefreshFailed)));

        let without_refresh = Token::new("old", TokenKind::ThreeLegged, None);
        let err = manager_for(&server).refresh(&without_refresh).await.unwrap_err();
        assert!(matches!(err, ApsError::Auth(AuthFailure::RefreshFailed)));
    }
}
