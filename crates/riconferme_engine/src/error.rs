use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::InvalidUrl => write!(f, "invalid url"),
            TransportErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

/// Failures of a request against the action API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("missing page: {0}")]
    MissingPage(String),
    #[error("section {section} of `{title}` does not exist")]
    MissingSection { title: String, section: u32 },
    #[error("protected page: {0}")]
    ProtectedPage(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("already blocked: {0}")]
    AlreadyBlocked(String),
    #[error("{code} - {info}")]
    Api { code: String, info: String },
    #[error("API warning: {0}")]
    Warning(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("login failed: {0}")]
    Login(String),
    #[error("edit of `{0}` requires a captcha")]
    EditCaptcha(String),
    #[error("edit of `{title}` failed: {result}")]
    Edit { title: String, result: String },
    #[error("action `{0}` cannot be run as a query")]
    NotAQuery(String),
}

impl ApiError {
    /// Maps an `error` object of a response to its kind.
    pub fn from_code(code: &str, info: &str) -> Self {
        let info = info.to_string();
        match code {
            "missingtitle" => ApiError::MissingPage(info),
            "protectedpage" => ApiError::ProtectedPage(info),
            "permissiondenied" => ApiError::PermissionDenied(info),
            "blocked" => ApiError::Blocked(info),
            "alreadyblocked" => ApiError::AlreadyBlocked(info),
            _ => ApiError::Api {
                code: code.to_string(),
                info,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(err) if err.is_timeout())
    }
}
