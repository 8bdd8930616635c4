use std::fmt;

/// Errors surfaced by the grammars, the id generators and the transports.
///
/// Every error reaches the immediate caller unchanged. Nothing here is
/// retried and a failed multi-row insert is not rolled back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The statement shape cannot be expressed by the store. Raised at
    /// compile time, the statement is never sent.
    #[error("{0} not supported in ClickHouse")]
    Unsupported(Unsupported),

    /// A transport client was rebuilt from persisted state.
    #[error("cannot deserialize a transport client; clients only exist on a live connection")]
    InvalidLifecycle,

    /// A queued statement was discarded with its client before it ran.
    #[error("statement was discarded before it was sent: {0}")]
    NotExecuted(String),

    /// A raw fragment carried a different number of `?` placeholders than bindings.
    #[error("raw fragment has {placeholders} placeholder(s) but {bindings} binding(s): {sql}")]
    PlaceholderMismatch {
        sql: String,
        placeholders: usize,
        bindings: usize,
    },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ping failed for {url}: {reason}")]
    Ping { url: String, reason: String },

    /// The store answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Statement shapes rejected by [`Error::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    UpdateWithJoins,
    UpdateWithLimit,
    DeleteWithJoins,
    DeleteWithLimit,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsupported::UpdateWithJoins => write!(f, "update with joins"),
            Unsupported::UpdateWithLimit => write!(f, "update with limit"),
            Unsupported::DeleteWithJoins => write!(f, "delete with joins"),
            Unsupported::DeleteWithLimit => write!(f, "delete with limit"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedResponse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let err = Error::Unsupported(Unsupported::UpdateWithJoins);
        assert_eq!(err.to_string(), "update with joins not supported in ClickHouse");
        let err = Error::Unsupported(Unsupported::DeleteWithLimit);
        assert_eq!(err.to_string(), "delete with limit not supported in ClickHouse");
    }

    #[test]
    fn test_placeholder_mismatch_display() {
        let err = Error::PlaceholderMismatch {
            sql: "a = ? and b = ?".into(),
            placeholders: 2,
            bindings: 1,
        };
        assert!(err.to_string().contains("2 placeholder(s) but 1 binding(s)"));
    }

    #[test]
    fn test_not_executed_display() {
        let err = Error::NotExecuted("select 1".into());
        assert_eq!(err.to_string(), "statement was discarded before it was sent: select 1");
    }

    #[test]
    fn test_json_error_is_malformed_response() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
