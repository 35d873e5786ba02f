use failure::{Backtrace, Context, Fail};
use std::fmt;

/// A type alias for handling errors throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while translating, executing or normalizing a
/// federated query.
#[derive(Debug)]
pub struct Error {
    ctx: Context<ErrorKind>,
}

impl Error {
    /// the [`ErrorKind`] this error wraps
    pub fn kind(&self) -> &ErrorKind {
        self.ctx.get_context()
    }

    /// renders this error the way it is surfaced in an envelope's `error`
    /// field (spec §7's error taxonomy).
    pub fn envelope_message(&self) -> String {
        self.kind().to_string()
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.ctx.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.ctx.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ctx.fmt(f)
    }
}

/// The error taxonomy from spec §7. Every variant renders into the
/// envelope's `error` string rather than escaping as a panic.
#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// illegal result format or collection for a wrapper
    #[fail(display = "Bad config: {}", msg)]
    BadConfig {
        /// what was wrong with the configuration
        msg: String,
    },
    /// unsupported field, unsupported OR-NOT, empty group, empty value
    #[fail(display = "Bad query: {}", msg)]
    BadQuery {
        /// what was wrong with the query
        msg: String,
    },
    /// non-2xx response, not retried
    #[fail(display = "HTTP error: {}", msg)]
    Http {
        /// status + message as returned by the provider
        msg: String,
    },
    /// DNS/refusal style transport failure, not retried
    #[fail(display = "Connection error: {}", msg)]
    Connection {
        /// transport failure detail
        msg: String,
    },
    /// transport timeout, retried up to `max_retries`
    #[fail(display = "Connection error: {} Timeout.", msg)]
    Timeout {
        /// which attempt/context timed out
        msg: String,
    },
    /// reqwest-level request construction/send error that isn't a timeout
    #[fail(display = "Request error: {}", msg)]
    Request {
        /// the underlying detail
        msg: String,
    },
    /// collection is recognized but has no wrapper implementation
    #[fail(display = "Unimplemented collection")]
    Unimplemented,
    /// collection name isn't recognized by the wrapper at all
    #[fail(display = "Unknown collection")]
    UnknownCollection,
    /// catch-all fallback
    #[fail(display = "Unknown error: {}", msg)]
    Unknown {
        /// free-form detail
        msg: String,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::from(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { ctx }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        ErrorKind::Unknown {
            msg: error.to_string(),
        }
        .into()
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Error {
        if error.is_timeout() {
            ErrorKind::Timeout {
                msg: error.to_string(),
            }
            .into()
        } else if error.is_connect() {
            ErrorKind::Connection {
                msg: error.to_string(),
            }
            .into()
        } else if let Some(status) = error.status() {
            ErrorKind::Http {
                msg: format!("{} {}", status, error),
            }
            .into()
        } else {
            ErrorKind::Request {
                msg: error.to_string(),
            }
            .into()
        }
    }
}
