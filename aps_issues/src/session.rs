//! Contexto explícito de uma sessão de usuário.
//!
//! Guarda no máximo um token de cada tipo (substituído por inteiro na
//! renovação) e os dados carregados no ciclo atual. Tokens vivem só em
//! memória.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::auth::token::{Token, TokenKind};
use crate::client::types::{Hub, Issue, IssueFilters, IssueType, Project};
use crate::config::Credentials;

/// Lote de issues carregado por último
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedIssues {
    pub project_id: String,
    pub filters: IssueFilters,
    pub issues: Vec<Issue>,
    /// A resposta bruta atingiu `ISSUE_LIMIT` (antes do filtro local)
    pub limit_reached: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Estado visível para a camada de apresentação
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    pub authenticated: bool,
    pub three_legged: bool,
    pub issues_loaded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    two_legged: Option<Token>,
    three_legged: Option<Token>,
    pub hubs: Vec<Hub>,
    pub projects: Vec<Project>,
    pub issue_types: Vec<IssueType>,
    issues: Option<LoadedIssues>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessão inicial com os tokens em cache do ambiente, se houver
    ///
    /// Tokens em cache são tratados como 3-legged com expiração desconhecida.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let mut session = Self::new();
        if let Some(access_token) = &credentials.access_token {
            log::info!("🔑 Usando token em cache do ambiente");
            session.store_token(
                Token::new(access_token.clone(), TokenKind::ThreeLegged, None)
                    .with_refresh_token(credentials.refresh_token.clone()),
            );
        }
        session
    }

    pub fn token(&self, kind: TokenKind) -> Option<&Token> {
        match kind {
            TokenKind::TwoLegged => self.two_legged.as_ref(),
            TokenKind::ThreeLegged => self.three_legged.as_ref(),
        }
    }

    /// Armazena o token no slot do seu tipo, descartando o anterior
    pub fn store_token(&mut self, token: Token) {
        log::debug!("💾 Token {} armazenado na sessão ({})", token.kind, token.preview());
        match token.kind {
            TokenKind::TwoLegged => self.two_legged = Some(token),
            TokenKind::ThreeLegged => self.three_legged = Some(token),
        }
    }

    pub fn clear_token(&mut self, kind: TokenKind) {
        match kind {
            TokenKind::TwoLegged => self.two_legged = None,
            TokenKind::ThreeLegged => self.three_legged = None,
        }
    }

    pub fn clear_tokens(&mut self) {
        self.two_legged = None;
        self.three_legged = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.two_legged.is_some() || self.three_legged.is_some()
    }

    pub fn has_three_legged(&self) -> bool {
        self.three_legged.is_some()
    }

    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            authenticated: self.is_authenticated(),
            three_legged: self.has_three_legged(),
            issues_loaded: self.issues.is_some(),
        }
    }

    pub fn set_issues(&mut self, project_id: &str, filters: IssueFilters, issues: Vec<Issue>, limit_reached: bool) {
        self.issues = Some(LoadedIssues {
            project_id: project_id.to_string(),
            filters,
            issues,
            limit_reached,
            fetched_at: Utc::now(),
        });
    }

    pub fn loaded_issues(&self) -> Option<&LoadedIssues> {
        self.issues.as_ref()
    }

    /// Issues carregadas (vazio se nada foi carregado)
    pub fn issues(&self) -> &[Issue] {
        self.issues.as_ref().map(|l| l.issues.as_slice()).unwrap_or(&[])
    }
}
