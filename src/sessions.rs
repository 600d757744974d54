//! Sessões web identificadas por cookie.
//!
//! Cada navegador recebe um id (uuid v4) e uma [`WebSession`] protegida por
//! um mutex próprio: no máximo uma chamada à APS por sessão fica em voo, e
//! sessões diferentes não compartilham estado.

use aps_issues::Session;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::settings::SessionSettings;
use crate::utils::logging::*;
use crate::AppState;

/// Estado de um navegador: a sessão APS e os logins 3-legged pendentes
#[derive(Debug)]
pub struct WebSession {
    pub session: Session,
    pending_states: VecDeque<String>,
    max_pending: usize,
}

impl WebSession {
    pub fn new(max_pending: usize) -> Self {
        Self {
            session: Session::new(),
            pending_states: VecDeque::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Registra o `state` de um login iniciado, descartando o mais antigo
    pub fn remember_state(&mut self, state: String) {
        if self.pending_states.len() >= self.max_pending {
            self.pending_states.pop_front();
        }
        self.pending_states.push_back(state);
    }

    /// Consome o `state` recebido no callback; cada um vale uma única vez
    pub fn take_state(&mut self, state: &str) -> Option<String> {
        if state.is_empty() {
            return None;
        }
        let index = self.pending_states.iter().position(|s| s == state)?;
        self.pending_states.remove(index)
    }

    /// Carregamento completo da página: tokens vivos e logins pendentes caem,
    /// os dados carregados ficam
    pub fn reset_auth(&mut self) {
        self.session.clear_tokens();
        self.pending_states.clear();
    }
}

pub type SharedSession = Arc<Mutex<WebSession>>;

#[derive(Debug)]
struct StoredSession {
    session: SharedSession,
    last_seen: Instant,
}

/// Sessões em memória, limitadas por ociosidade e por quantidade
///
/// Sessões ociosas além de `idle_timeout` são descartadas; acima de
/// `max_sessions`, a usada há mais tempo sai primeiro.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    max_pending: usize,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_pending: settings.max_pending_logins,
            max_sessions: settings.max_sessions.max(1),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
        }
    }

    /// Sessão ativa do id, renovando o último acesso
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let stored = sessions.get_mut(id)?;
        if now.saturating_duration_since(stored.last_seen) > self.idle_timeout {
            sessions.remove(id);
            return None;
        }
        stored.last_seen = now;
        Some(stored.session.clone())
    }

    /// Retorna a sessão do id informado, ou cria uma nova (`true` no terceiro campo)
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, SharedSession, bool) {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await {
                return (id.to_string(), session, false);
            }
        }

        let now = Instant::now();
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(WebSession::new(self.max_pending)));

        let mut sessions = self.sessions.write().await;
        self.evict(&mut sessions, now);
        sessions.insert(id.clone(), StoredSession { session: session.clone(), last_seen: now });
        (id, session, true)
    }

    /// Remove as sessões ociosas em `now`; retorna quantas saíram
    pub async fn sweep_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| now.saturating_duration_since(stored.last_seen) <= self.idle_timeout);
        before - sessions.len()
    }

    /// Abre espaço para uma sessão nova
    fn evict(&self, sessions: &mut HashMap<String, StoredSession>, now: Instant) {
        sessions.retain(|_, stored| now.saturating_duration_since(stored.last_seen) <= self.idle_timeout);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, stored)| stored.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    log_session_evicted(&id);
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Id de sessão presente nos cookies da requisição
pub fn session_id(jar: &CookieJar, cookie_name: &str) -> Option<String> {
    jar.get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(cookie_name: &str, id: &str) -> Cookie<'static> {
    Cookie::build((cookie_name.to_string(), id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Middleware que anexa a sessão do navegador à requisição
///
/// Handlers recebem a sessão via `Extension<SharedSession>`; sessões novas
/// saem com `Set-Cookie` na resposta.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = state.settings.session.cookie_name.as_str();
    let existing = session_id(&jar, cookie_name);
    let (id, session, created) = state.sessions.get_or_create(existing.as_deref()).await;

    if created {
        log_session_created(&id);
    }

    request.extensions_mut().insert(session);
    let response = next.run(request).await;

    if created {
        return (jar.add(session_cookie(cookie_name, &id)), response).into_response();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use aps_issues::{Issue, IssueFilters, Token, TokenKind};
    use axum::http::{header, HeaderMap, HeaderValue};
    use pretty_assertions::assert_eq;

    fn limits(max_sessions: usize, idle_timeout_secs: u64) -> SessionSettings {
        SessionSettings {
            cookie_name: "acc".to_string(),
            max_pending_logins: 5,
            max_sessions,
            idle_timeout_secs,
        }
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; acc=abc-123; other=1"));
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(session_id(&jar, "acc").as_deref(), Some("abc-123"));
        assert_eq!(session_id(&jar, "missing"), None);
        assert_eq!(session_id(&CookieJar::new(), "acc"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("acc", "abc-123");
        assert_eq!(cookie.name(), "acc");
        assert_eq!(cookie.value(), "abc-123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn test_pending_states_are_bounded_and_single_use() {
        let mut web = WebSession::new(2);
        web.remember_state("s1".into());
        web.remember_state("s2".into());
        web.remember_state("s3".into());

        assert_eq!(web.take_state("s1"), None);
        assert_eq!(web.take_state("s3").as_deref(), Some("s3"));
        assert_eq!(web.take_state("s3"), None);
        assert_eq!(web.take_state(""), None);
    }

    #[test]
    fn test_reset_auth_keeps_loaded_issues() {
        let mut web = WebSession::new(5);
        web.session.store_token(Token::new("t", TokenKind::ThreeLegged, None));
        web.session.set_issues("b.p1", IssueFilters::default(), vec![Issue::new("1")], false);
        web.remember_state("s".into());

        web.reset_auth();

        let flags = web.session.flags();
        assert!(!flags.authenticated);
        assert!(flags.issues_loaded);
        assert_eq!(web.session.issues().len(), 1);
        assert_eq!(web.take_state("s"), None);
    }

    #[tokio::test]
    async fn test_store_reuses_known_ids() {
        let store = SessionStore::new(&limits(10, 3600));
        let (id, _, created) = store.get_or_create(None).await;
        assert!(created);

        let (same, _, created) = store.get_or_create(Some(&id)).await;
        assert!(!created);
        assert_eq!(same, id);

        let (_, _, created) = store.get_or_create(Some("desconhecido")).await;
        assert!(created);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_store_is_bounded_by_capacity() {
        let store = SessionStore::new(&limits(10, 3600));
        let mut ids = Vec::new();
        for _ in 0..1000 {
            let (id, _, created) = store.get_or_create(None).await;
            assert!(created);
            ids.push(id);
        }

        assert_eq!(store.len().await, 10);
        assert!(store.get(&ids[999]).await.is_some());
    }

    #[tokio::test]
    async fn test_least_recently_used_session_is_evicted_first() {
        let store = SessionStore::new(&limits(2, 3600));
        let (first, _, _) = store.get_or_create(None).await;
        let (second, _, _) = store.get_or_create(None).await;

        // acesso renova a primeira, a segunda vira a mais antiga
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get(&first).await.is_some());
        store.get_or_create(None).await;

        assert!(store.get(&first).await.is_some());
        assert!(store.get(&second).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_swept() {
        let store = SessionStore::new(&limits(100, 60));
        for _ in 0..3 {
            store.get_or_create(None).await;
        }

        assert_eq!(store.sweep_idle(Instant::now()).await, 0);
        assert_eq!(store.sweep_idle(Instant::now() + Duration::from_secs(120)).await, 3);
        assert!(store.is_empty().await);
    }
}
