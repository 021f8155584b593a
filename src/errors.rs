use thiserror::Error;

#[derive(Debug, Error)]
pub enum ODataError {
    #[error("odata syntax error: {0}")]
    InvalidFilterSyntax(String),

    #[error("backend execution error: {0}")]
    BackendExecution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ODataError {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        Self::InvalidFilterSyntax(msg.into())
    }

    pub(crate) fn backend(msg: impl Into<String>) -> Self {
        Self::BackendExecution(msg.into())
    }

    /// True for errors raised while translating the request, before any backend call.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidFilterSyntax(_))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for ODataError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::BackendExecution(e.to_string())
    }
}

impl From<std::io::Error> for ODataError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
