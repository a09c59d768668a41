//! Error types for chatrelay.
//!
//! Every failure the client can produce is a variant of [`Error`].  Transport failures (the
//! network, the endpoint, or the shape of what it returned) are distinguished from startup
//! configuration problems and from user interruption so that the session loop can decide
//! whether a failure ends a turn, ends the session, or ends the process.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

type Source = Arc<dyn error::Error + Send + Sync>;

/// The main error type for chatrelay.
#[derive(Clone, Debug)]
pub enum Error {
    /// The endpoint rejected the request with a status that has no dedicated variant.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// `type` (or `code`) from the error body.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
        /// `x-request-id` or `apim-request-id` of the failed request.
        request_id: Option<String>,
    },

    /// The credential was rejected (401).
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The credential may not use this resource (403).
    Permission {
        /// Human-readable error message.
        message: String,
    },

    /// The model or deployment does not exist (404).
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Too many requests (429).
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Seconds to wait, from `retry-after`.
        retry_after: Option<u64>,
    },

    /// The request body was refused (400).
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// The offending parameter.
        param: Option<String>,
    },

    /// The request or the endpoint timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// The timeout that expired, in seconds.
        duration: Option<f64>,
    },

    /// The user interrupted the turn.
    Abort {
        /// Human-readable error message.
        message: String,
    },

    /// The endpoint could not be reached.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The endpoint failed (500).
    InternalServer {
        /// Human-readable error message.
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// A gateway in front of the endpoint failed (502, 503, 504).
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Seconds to wait, from `retry-after`.
        retry_after: Option<u64>,
    },

    /// A body could not be encoded or decoded, or had the wrong shape.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// Terminal I/O failed.
    Io {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Arc<io::Error>,
    },

    /// reqwest failed for a reason other than timeout or connection.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// An endpoint URL could not be built.
    Url {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<url::ParseError>,
    },

    /// A streamed reply failed part way or reported an error event.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// A streamed reply was not valid UTF-8.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// Required configuration is missing or invalid.
    Configuration {
        /// Human-readable error message.
        message: String,
        /// The environment variable or flag at fault, if any.
        variable: Option<String>,
    },

    /// The selected backend cannot run in this setup.
    BackendUnavailable {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        error_type: Option<String>,
        message: String,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            error_type,
            message,
            request_id,
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>, request_id: Option<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
            request_id,
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>, variable: Option<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            variable,
        }
    }

    /// Creates a new backend-unavailable error.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Returns true if the endpoint rejected the credential.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if the user interrupted the turn.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if the endpoint could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if this error is a startup configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error came from talking to the endpoint.
    ///
    /// Configuration problems, an unavailable backend, user interruption and local terminal I/O
    /// are not transport errors.
    pub fn is_transport(&self) -> bool {
        !matches!(
            self,
            Error::Configuration { .. }
                | Error::BackendUnavailable { .. }
                | Error::Abort { .. }
                | Error::Io { .. }
        )
    }

    /// The request ID the endpoint reported for the failed request, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api { request_id, .. } | Error::InternalServer { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }

    /// The HTTP status of an [`Error::Api`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// The process exit status this error maps to.
    ///
    /// Missing configuration and an unavailable backend exit with 2, a user interruption is a
    /// clean exit, and everything else is a generic failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration { .. } | Error::BackendUnavailable { .. } => 2,
            Error::Abort { .. } => 0,
            _ => 1,
        }
    }
}

fn request_suffix(f: &mut fmt::Formatter<'_>, request_id: &Option<String>) -> fmt::Result {
    match request_id {
        Some(request_id) => write!(f, " (Request ID: {request_id})"),
        None => Ok(()),
    }
}

fn retry_suffix(f: &mut fmt::Formatter<'_>, retry_after: &Option<u64>) -> fmt::Result {
    match retry_after {
        Some(retry_after) => write!(f, " (retry after {retry_after} seconds)"),
        None => Ok(()),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                message,
                error_type,
                request_id,
                ..
            } => {
                match error_type {
                    Some(error_type) => write!(f, "{error_type}: {message}")?,
                    None => write!(f, "API error: {message}")?,
                }
                request_suffix(f, request_id)
            }
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission error: {message}"),
            Error::NotFound { message } => write!(f, "Resource not found: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => {
                write!(f, "Rate limit exceeded: {message}")?;
                retry_suffix(f, retry_after)
            }
            Error::BadRequest { message, param } => {
                write!(f, "Bad request: {message}")?;
                match param {
                    Some(param) => write!(f, " (parameter: {param})"),
                    None => Ok(()),
                }
            }
            Error::Timeout { message, duration } => {
                write!(f, "Timeout error: {message}")?;
                match duration {
                    Some(duration) => write!(f, " ({duration} seconds)"),
                    None => Ok(()),
                }
            }
            Error::Abort { message } => write!(f, "Request aborted: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer {
                message,
                request_id,
            } => {
                write!(f, "Internal server error: {message}")?;
                request_suffix(f, request_id)
            }
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => {
                write!(f, "Service unavailable: {message}")?;
                retry_suffix(f, retry_after)
            }
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            // These are shown to the user verbatim before exiting.
            Error::Configuration { message, .. } | Error::BackendUnavailable { message } => {
                write!(f, "{message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_deref()
                .map(|e| e as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(&**source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Url {
            message: format!("URL parse error: {err}"),
            source: Some(err),
        }
    }
}

/// A specialized Result type for chatrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exit_codes() {
        assert_eq!(
            Error::configuration("missing", Some("OPENAI_API_KEY".to_string())).exit_code(),
            2
        );
        assert_eq!(Error::backend_unavailable("no agents").exit_code(), 2);
        assert_eq!(Error::abort("ctrl-c").exit_code(), 0);
        assert_eq!(Error::streaming("dropped", None).exit_code(), 1);
    }

    #[test]
    fn transport_classification() {
        assert!(Error::connection("refused", None).is_transport());
        assert!(Error::rate_limit("slow down", Some(3)).is_transport());
        assert!(Error::serialization("no choices", None).is_transport());
        assert!(!Error::configuration("missing", None).is_transport());
        assert!(!Error::abort("ctrl-c").is_transport());
    }

    #[test]
    fn configuration_display_is_bare_message() {
        let err = Error::configuration(
            "Missing required environment variable: OPENAI_BASE_URL",
            Some("OPENAI_BASE_URL".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: OPENAI_BASE_URL"
        );
    }

    #[test]
    fn api_display_includes_request_id() {
        let err = Error::api(
            418,
            Some("teapot".to_string()),
            "short and stout".to_string(),
            Some("req_1".to_string()),
        );
        assert_eq!(err.to_string(), "teapot: short and stout (Request ID: req_1)");
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.request_id(), Some("req_1"));
    }

    #[test]
    fn suffixes() {
        assert_eq!(
            Error::rate_limit("slow down", Some(7)).to_string(),
            "Rate limit exceeded: slow down (retry after 7 seconds)"
        );
        assert_eq!(
            Error::bad_request("bad", Some("messages".to_string())).to_string(),
            "Bad request: bad (parameter: messages)"
        );
        assert_eq!(
            Error::internal_server("boom", None).to_string(),
            "Internal server error: boom"
        );
    }

    #[test]
    fn sources_are_kept() {
        let err = Error::streaming(
            "dropped",
            Some(Box::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))),
        );
        assert_eq!(err.source().unwrap().to_string(), "reset");
        assert!(Error::abort("ctrl-c").source().is_none());

        let err = Error::from(url::Url::parse("not a url").unwrap_err());
        assert!(matches!(err, Error::Url { .. }));
        assert!(err.source().is_some());
    }
}
