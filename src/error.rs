use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden target: {0}")]
    Forbidden(String),

    /// No upstream credential is configured. Carries no detail on purpose.
    #[error("Server misconfiguration")]
    Misconfigured,

    #[error("Upstream rejected credentials")]
    UpstreamAuth,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Content extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::UpstreamUnavailable(err.to_string())
        }
    }
}

impl Error {
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_) | Error::Timeout(_) | Error::Io(_)
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::Forbidden(_) | Error::PayloadTooLarge(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Misconfigured => "MISCONFIGURED",
            Error::UpstreamAuth => "UPSTREAM_AUTH",
            Error::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Error::Timeout(_) => "TIMEOUT",
            Error::ExtractionFailed(_) => "EXTRACTION_FAILED",
            Error::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO_ERROR",
        }
    }
}
