use thiserror::Error;

/// Categoria de erro exposta para a camada de apresentação
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Auth,
    NotFound,
    Provider,
    Export,
}

/// Motivos de falha de autenticação
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Token de acesso inválido ou expirado")]
    Unauthorized,

    #[error("Este endpoint exige autenticação 3-legged (login do usuário)")]
    ThreeLeggedRequired,

    #[error("Credenciais rejeitadas pelo provedor: {0}")]
    CredentialsRejected(String),

    #[error("Acesso negado pelo usuário")]
    AccessDenied,

    #[error("Estado OAuth2 inválido")]
    InvalidState,

    #[error("Código de autorização inválido: {0}")]
    InvalidCode(String),

    #[error("Timeout durante autenticação")]
    Timeout,

    #[error("Autenticação cancelada")]
    Cancelled,

    #[error("Falha ao renovar o token, autentique-se novamente")]
    RefreshFailed,

    #[error("Erro do servidor de callback: {0}")]
    Callback(String),
}

/// Tipos de erro do cliente APS
#[derive(Error, Debug)]
pub enum ApsError {
    #[error("Configuração inválida: {0}")]
    Config(String),

    #[error("Erro de autenticação: {0}")]
    Auth(#[from] AuthFailure),

    #[error("Recurso não encontrado: {0}")]
    NotFound(String),

    #[error("Erro do provedor{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Erro de exportação: {0}")]
    Export(String),
}

impl ApsError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn provider_error(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: msg.into(),
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::provider_error(None, format!("resposta malformada: {}", msg.into()))
    }

    pub fn export_error(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn callback_error(msg: impl Into<String>) -> Self {
        Self::Auth(AuthFailure::Callback(msg.into()))
    }

    /// Categoria do erro
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Auth(_) => ErrorKind::Auth,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Export(_) => ErrorKind::Export,
        }
    }

    /// Status HTTP equivalente, quando houver
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Mensagem apresentada ao usuário final
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(AuthFailure::ThreeLeggedRequired) => {
                "A API de Issues exige login 3-legged. Faça login com sua conta Autodesk.".to_string()
            }
            Self::Auth(AuthFailure::RefreshFailed) => {
                "Sessão expirada. Faça login novamente.".to_string()
            }
            Self::Provider { status: Some(403), .. } => {
                "Acesso negado. Verifique se sua conta tem acesso ao projeto.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::provider_error(None, format!("timeout na requisição: {}", err))
        } else {
            Self::provider_error(err.status().map(|s| s.as_u16()), format!("erro de rede: {}", err))
        }
    }
}

impl From<serde_json::Error> for ApsError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<url::ParseError> for ApsError {
    fn from(err: url::ParseError) -> Self {
        Self::config_error(format!("URL inválida: {}", err))
    }
}

impl From<std::io::Error> for ApsError {
    fn from(err: std::io::Error) -> Self {
        Self::export_error(err.to_string())
    }
}

impl From<csv::Error> for ApsError {
    fn from(err: csv::Error) -> Self {
        Self::export_error(format!("CSV: {}", err))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ApsError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::export_error(format!("XLSX: {}", err))
    }
}

/// Tipo de resultado padrão do cliente APS
pub type ApsResult<T> = Result<T, ApsError>;
