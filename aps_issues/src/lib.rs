//! # APS Issues
//!
//! Cliente Rust para a Autodesk Platform Services (APS): autenticação OAuth2
//! 2-legged e 3-legged, listagem de hubs, projetos, tipos de issue e issues,
//! e exportação para CSV ou XLSX.
//!
//! ## Exemplo
//!
//! ```no_run
//! use aps_issues::{ApsClient, ApsConfig, IssueFilters, Session, TokenManager};
//! use aps_issues::auth::SystemBrowser;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApsConfig::load()?;
//!     let client = ApsClient::new(TokenManager::new(config)?)?;
//!     let mut session = Session::new();
//!
//!     let token = client
//!         .token_manager()
//!         .acquire_3legged(&SystemBrowser, &CancellationToken::new())
//!         .await?;
//!     session.store_token(token);
//!
//!     let issues = client
//!         .list_issues(&mut session, "b.project-id", &IssueFilters::default())
//!         .await?;
//!     println!("{} issues", issues.len());
//!     Ok(())
//! }
//! ```

/// Módulo de autenticação OAuth2
pub mod auth;

/// Módulo de cliente API
pub mod client;

/// Módulo de configuração
pub mod config;

/// Módulo de tratamento de erros
pub mod error;

/// Exportação CSV/XLSX
pub mod export;

pub mod session;

// Re-exportações para conveniência
pub use auth::{Token, TokenKind, TokenManager};
pub use client::{ApsClient, Hub, Issue, IssueFilters, IssueType, Project};
pub use config::{ApsConfig, Credentials};
pub use error::{ApsError, ApsResult, AuthFailure, ErrorKind};
pub use export::ExportFormat;
pub use session::{Session, SessionFlags};
