use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use crate::auth::oauth::TokenManager;
use crate::auth::token::{Token, TokenKind};
use crate::client::types::{
    container_id_for, Hub, HubData, Issue, IssueFilters, IssueType, JsonApiItem, JsonApiList,
    Project, ProjectData, ISSUE_LIMIT,
};
use crate::error::{ApsError, ApsResult, AuthFailure};
use crate::session::Session;

/// Tipo de token que um endpoint aceita
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenRequirement {
    /// 2-legged preferido, 3-legged aceito
    Any,
    ThreeLegged,
}

/// Cliente HTTP para os endpoints de hubs, projetos e issues da APS
#[derive(Debug, Clone)]
pub struct ApsClient {
    client: Client,
    base_url: String,
    tokens: TokenManager,
}

impl ApsClient {
    pub fn new(tokens: TokenManager) -> ApsResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: tokens.config().base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Constrói URL completa para um endpoint
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Seleciona (e renova, se expirado) o token exigido pelo endpoint
    async fn ensure_token(&self, session: &mut Session, requirement: TokenRequirement) -> ApsResult<Token> {
        let candidate = match requirement {
            TokenRequirement::Any => session
                .token(TokenKind::TwoLegged)
                .or_else(|| session.token(TokenKind::ThreeLegged))
                .cloned(),
            TokenRequirement::ThreeLegged => match session.token(TokenKind::ThreeLegged) {
                Some(token) => Some(token.clone()),
                None => {
                    log::warn!("🚫 Endpoint exige token 3-legged; nenhuma requisição enviada");
                    return Err(AuthFailure::ThreeLeggedRequired.into());
                }
            },
        };

        match candidate {
            Some(token) if !token.is_expired() => Ok(token),
            Some(token) => {
                log::info!("⏰ Token {} expirado, renovando...", token.kind);
                self.renew(session, &token).await
            }
            None => {
                let token = self.tokens.acquire_2legged().await?;
                session.store_token(token.clone());
                Ok(token)
            }
        }
    }

    /// Substitui o token da sessão por um novo do mesmo tipo
    async fn renew(&self, session: &mut Session, token: &Token) -> ApsResult<Token> {
        let renewed = match token.kind {
            TokenKind::TwoLegged => self.tokens.acquire_2legged().await,
            TokenKind::ThreeLegged => self.tokens.refresh(token).await,
        };

        match renewed {
            Ok(renewed) => {
                session.store_token(renewed.clone());
                Ok(renewed)
            }
            Err(e) => {
                session.clear_token(token.kind);
                Err(e)
            }
        }
    }

    async fn send_get(&self, url: &str, query: &[(&str, String)], token: &Token) -> ApsResult<(StatusCode, String)> {
        log::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .header(AUTHORIZATION, token.authorization_header())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        log::debug!("Response status: {}, {} bytes", status, body.len());
        Ok((status, body))
    }

    /// Executa um GET autenticado
    ///
    /// Um 401 com token 3-legged renovável dispara uma única renovação e o
    /// reenvio da mesma requisição.
    async fn get(
        &self,
        session: &mut Session,
        endpoint: &str,
        query: &[(&str, String)],
        requirement: TokenRequirement,
    ) -> ApsResult<Value> {
        let url = self.build_url(endpoint);
        let token = self.ensure_token(session, requirement).await?;
        let (mut status, mut body) = self.send_get(&url, query, &token).await?;

        if status == StatusCode::UNAUTHORIZED && token.kind == TokenKind::ThreeLegged && token.can_refresh() {
            log::info!("🔄 401 recebido, renovando token 3-legged...");
            let renewed = self.renew(session, &token).await?;
            (status, body) = self.send_get(&url, query, &renewed).await?;
        }

        if !status.is_success() {
            return Err(Self::handle_error_response(status.as_u16(), endpoint, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApsError::parse_error(format!("{}: {}", endpoint, e)))
    }

    /// Trata respostas de erro da API
    fn handle_error_response(status: u16, endpoint: &str, body: &str) -> ApsError {
        let detail: String = body.chars().take(200).collect();
        match status {
            401 => AuthFailure::Unauthorized.into(),
            403 => ApsError::provider_error(Some(403), format!("Acesso negado a {}", endpoint)),
            404 => ApsError::not_found(format!("{} ({})", endpoint, detail)),
            429 => ApsError::provider_error(Some(429), "Limite de requisições excedido"),
            500..=599 => ApsError::provider_error(Some(status), format!("Erro interno da APS: {}", detail)),
            _ => ApsError::provider_error(Some(status), format!("Erro na API: {}", detail)),
        }
    }

    /// Lista os hubs acessíveis
    pub async fn list_hubs(&self, session: &mut Session) -> ApsResult<Vec<Hub>> {
        log::info!("🏢 Obtendo hubs...");

        let body = self.get(session, "project/v1/hubs", &[], TokenRequirement::Any).await?;
        let raw: JsonApiList<HubData> = serde_json::from_value(body)?;
        let hubs: Vec<Hub> = raw.data.into_iter().map(Hub::from).collect();

        log::info!("✅ {} hubs encontrados", hubs.len());
        session.hubs = hubs.clone();
        Ok(hubs)
    }

    /// Lista os projetos de um hub
    pub async fn list_projects(&self, session: &mut Session, hub_id: &str) -> ApsResult<Vec<Project>> {
        log::info!("📁 Obtendo projetos do hub: {}", hub_id);

        let endpoint = format!("project/v1/hubs/{}/projects", urlencoding::encode(hub_id));
        let body = self.get(session, &endpoint, &[], TokenRequirement::Any).await?;
        let raw: JsonApiList<ProjectData> = serde_json::from_value(body)?;
        let projects: Vec<Project> = raw.data.into_iter().map(Project::from).collect();

        log::info!("✅ {} projetos encontrados", projects.len());
        session.projects = projects.clone();
        Ok(projects)
    }

    /// Detalhes de um projeto
    pub async fn get_project(&self, session: &mut Session, hub_id: &str, project_id: &str) -> ApsResult<Project> {
        let endpoint = format!(
            "project/v1/hubs/{}/projects/{}",
            urlencoding::encode(hub_id),
            urlencoding::encode(project_id)
        );
        let body = self.get(session, &endpoint, &[], TokenRequirement::Any).await?;
        let raw: JsonApiItem<ProjectData> = serde_json::from_value(body)?;

        raw.data
            .map(Project::from)
            .ok_or_else(|| ApsError::not_found(format!("projeto {}", project_id)))
    }

    /// Resolve o container de issues a partir dos escopos do projeto
    ///
    /// Sem detalhes disponíveis, usa o mapeamento permissivo (remove `b.`).
    pub async fn resolve_container(&self, session: &mut Session, hub_id: &str, project_id: &str) -> ApsResult<String> {
        match self.get_project(session, hub_id, project_id).await {
            Ok(project) => Ok(project.container_id()),
            Err(ApsError::Auth(failure)) => Err(failure.into()),
            Err(e) => {
                log::warn!("⚠️ Detalhes do projeto indisponíveis ({}), usando ID derivado", e);
                Ok(container_id_for(project_id))
            }
        }
    }

    /// Lista os tipos de issue ativos de um projeto (exige 3-legged)
    pub async fn list_issue_types(&self, session: &mut Session, project_id: &str) -> ApsResult<Vec<IssueType>> {
        log::info!("🏷️ Obtendo tipos de issue do projeto: {}", project_id);

        let endpoint = format!(
            "construction/issues/v1/projects/{}/issue-types",
            urlencoding::encode(&container_id_for(project_id))
        );
        let body = self.get(session, &endpoint, &[], TokenRequirement::ThreeLegged).await?;

        let issue_types: Vec<IssueType> = extract_results(body)?
            .into_iter()
            .map(serde_json::from_value::<IssueType>)
            .collect::<Result<_, _>>()?;
        let issue_types: Vec<IssueType> = issue_types.into_iter().filter(|t| t.is_active).collect();

        log::info!("✅ {} tipos de issue ativos", issue_types.len());
        session.issue_types = issue_types.clone();
        Ok(issue_types)
    }

    /// Lista as issues de um projeto (exige 3-legged)
    ///
    /// Uma única requisição com `limit=200`; o resultado sempre satisfaz
    /// todos os filtros não vazios.
    pub async fn list_issues(
        &self,
        session: &mut Session,
        project_id: &str,
        filters: &IssueFilters,
    ) -> ApsResult<Vec<Issue>> {
        log::info!("📋 Obtendo issues do projeto: {} (filtros: {:?})", project_id, filters);

        let endpoint = format!(
            "construction/issues/v1/projects/{}/issues",
            urlencoding::encode(&container_id_for(project_id))
        );
        let mut query = vec![("limit", ISSUE_LIMIT.to_string())];
        query.extend(filters.query_pairs());

        let body = self.get(session, &endpoint, &query, TokenRequirement::ThreeLegged).await?;
        let items = extract_results(body)?;

        let limit_reached = items.len() >= ISSUE_LIMIT;
        if limit_reached {
            log::warn!("⚠️ {} issues retornadas: limite atingido, o resultado pode estar incompleto", items.len());
        }

        let issues: Vec<Issue> = items
            .into_iter()
            .map(Issue::from_json)
            .collect::<ApsResult<Vec<_>>>()?
            .into_iter()
            .filter(|issue| filters.matches(issue))
            .collect();

        log::info!("✅ {} issues carregadas", issues.len());
        session.set_issues(project_id, filters.clone(), issues.clone(), limit_reached);
        Ok(issues)
    }
}

/// Extrai a lista de `results` (ou `data`) da resposta da API de Issues
fn extract_results(body: Value) -> ApsResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("results").or_else(|| object.remove("data")) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(ApsError::parse_error("campo results não é uma lista")),
        },
        _ => Err(ApsError::parse_error("resposta inesperada da API de Issues")),
    }
}
