use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Margem de renovação antecipada (5 minutos)
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Tipo de token APS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Client credentials, sem usuário
    TwoLegged,
    /// Authorization code, em nome do usuário
    ThreeLegged,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::TwoLegged => write!(f, "2-legged"),
            TokenKind::ThreeLegged => write!(f, "3-legged"),
        }
    }
}

/// Token de acesso mantido apenas em memória
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl Token {
    pub fn new(value: impl Into<String>, kind: TokenKind, expires_in: Option<std::time::Duration>) -> Self {
        let expires_at = expires_in
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        Self {
            value: value.into(),
            kind,
            token_type: "Bearer".to_string(),
            expires_at,
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Verifica se o token está expirado (com margem de 5 minutos)
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_MARGIN_SECS),
            // Tokens em cache sem expiração conhecida são usados até o provedor recusar
            None => false,
        }
    }

    /// Segundos restantes até a expiração
    pub fn time_to_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - Utc::now()).num_seconds().max(0))
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Retorna o token no formato de autorização para requisições HTTP
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }

    /// Prévia segura do token para logs
    pub fn preview(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.preview())
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = Token::new("abc", TokenKind::ThreeLegged, None);
        assert!(!token.is_expired());
        assert_eq!(token.time_to_expiry(), None);
    }

    #[test]
    fn test_expiry_margin() {
        let token = Token::new("abc", TokenKind::TwoLegged, Some(std::time::Duration::from_secs(3600)));
        assert!(!token.is_expired());

        let expires_at = token.expires_at.unwrap();
        assert!(token.is_expired_at(expires_at - Duration::seconds(299)));
        assert!(!token.is_expired_at(expires_at - Duration::seconds(301)));
    }

    #[test]
    fn test_short_lived_token_counts_as_expired() {
        let token = Token::new("abc", TokenKind::TwoLegged, Some(std::time::Duration::from_secs(60)));
        assert!(token.is_expired());
    }

    #[test]
    fn test_authorization_header() {
        let token = Token::new("abc123", TokenKind::TwoLegged, None);
        assert_eq!(token.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn test_debug_does_not_leak_value() {
        let token = Token::new("eyJhbGciOiJSUzI1NiJ9.secret", TokenKind::ThreeLegged, None)
            .with_refresh_token(Some("refresh-secret".to_string()));
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("eyJh...cret"));
        assert!(token.can_refresh());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TokenKind::TwoLegged.to_string(), "2-legged");
        assert_eq!(TokenKind::ThreeLegged.to_string(), "3-legged");
    }
}
