use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Outcome classes of a single bearer authenticated request
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Timeout")]
    Timeout,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("Unexpected response: {0}")]
    Unexpected(StatusCode),
    #[error("Transport failed: {0}")]
    Transport(String),
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// 4xx class responses, the request itself was at fault
    pub fn is_client(&self) -> bool {
        match self {
            ClientError::Unauthorized | ClientError::NotFound => true,
            ClientError::Unexpected(status) => status.is_client_error(),
            _ => false,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_builder() {
            ClientError::InvalidUrl(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("Create response did not contain an identifier")]
    MissingIdentifier,
    #[error("Device {0} has no sink identifier")]
    NotCreated(String),
    #[error("Requested {0} things, at most {1} are allowed")]
    TooManyThings(usize, usize),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum DBError {
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Failure while indexing a single identity or device
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Source: {0}")]
    Source(#[from] SourceError),
    #[error("Sink: {0}")]
    Sink(#[from] SinkError),
    #[error("Store: {0}")]
    Store(#[from] DBError),
}

impl IndexError {
    /// Errors caused by the request (4xx) rather than by either backend
    pub fn is_client(&self) -> bool {
        match self {
            IndexError::Source(SourceError::Client(e)) | IndexError::Sink(SinkError::Client(e)) => {
                e.is_client()
            }
            _ => false,
        }
    }

    /// Timeouts and broken connections, retried with the next tick
    pub fn is_transport(&self) -> bool {
        match self {
            IndexError::Source(SourceError::Client(e)) | IndexError::Sink(SinkError::Client(e)) => {
                e.is_transport()
            }
            _ => false,
        }
    }

    /// Failures that are expected every now and then and are logged as warnings
    pub fn is_recoverable(&self) -> bool {
        self.is_client() || self.is_transport()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid arguments: {0}")]
    ArgumentError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Upstream(#[from] SinkError),
    #[error("Source: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] DBError),
}

/// Whether an api failure is reported back as the caller's fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    User,
    Internal,
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::ArgumentError(_) | ApiError::NotFound(_) => ApiErrorKind::User,
            ApiError::Upstream(SinkError::TooManyThings(..)) => ApiErrorKind::User,
            _ => ApiErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_index_error_classes() {
        let unauthorized = IndexError::from(SourceError::from(ClientError::Unauthorized));
        let timeout = IndexError::from(SinkError::from(ClientError::Timeout));
        let broken = IndexError::from(SinkError::from(ClientError::Unexpected(
            StatusCode::INTERNAL_SERVER_ERROR,
        )));
        let missing = IndexError::from(SinkError::MissingIdentifier);

        assert!(unauthorized.is_client() && unauthorized.is_recoverable());
        assert!(!timeout.is_client() && timeout.is_recoverable());
        assert!(!broken.is_recoverable());
        assert!(!missing.is_recoverable());
    }

    #[test]
    fn test_api_error_kind() {
        assert_eq!(
            ApiErrorKind::User,
            ApiError::from(SinkError::TooManyThings(11, 10)).kind()
        );
        assert_eq!(
            ApiErrorKind::User,
            ApiError::NotFound("identity 1".to_owned()).kind()
        );
        assert_eq!(
            ApiErrorKind::Internal,
            ApiError::from(SinkError::Cancelled).kind()
        );
    }
}
