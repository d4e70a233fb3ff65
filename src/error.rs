//! Authenticator error types plus the normalized [`ApiError`] shape handed to calling code.

// self
use crate::{_prelude::*, refresh::RefreshError, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message surfaced when the network cannot be reached.
pub const NETWORK_UNAVAILABLE_MESSAGE: &str =
	"Network connection error. Please check your internet.";
/// Message surfaced when an authentication failure cannot be recovered without a refresh token.
pub const NO_REFRESH_TOKEN_MESSAGE: &str = "Unauthorized: No refresh token available.";
/// Message surfaced when a forbidden response invalidates the refresh token.
pub const INVALID_REFRESH_TOKEN_MESSAGE: &str = "Forbidden: Invalid refresh token.";
/// Message used when neither the server nor the transport supplied one.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure that is not a plain connectivity problem.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The refresh call failed; the session cannot be recovered.
	#[error(transparent)]
	Refresh(#[from] RefreshError),

	/// Network unreachable (DNS, refused connection, timeout).
	#[error("{message}")]
	ServiceUnavailable {
		/// Human-readable message.
		message: String,
	},
	/// Authentication failed and no refresh token is available.
	#[error("{message}")]
	Unauthorized {
		/// Human-readable message.
		message: String,
	},
	/// Server refused the request outright; the refresh token was discarded.
	#[error("{message}")]
	Forbidden {
		/// Human-readable message.
		message: String,
	},
	/// The task driving the refresh was dropped before the refresh settled.
	#[error("Token refresh was abandoned before it completed.")]
	RefreshAbandoned,
	/// Any other failed response, propagated without recovery.
	#[error("{message}")]
	Api {
		/// HTTP status code of the failed response.
		status: u16,
		/// Server-supplied message, or the status reason when absent.
		message: String,
		/// Parsed JSON body, when the server returned one.
		body: Option<serde_json::Value>,
	},
	/// A response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response that failed to decode.
		status: u16,
	},
}
impl Error {
	/// Builds the error returned for unreachable networks.
	pub fn service_unavailable() -> Self {
		Self::ServiceUnavailable { message: NETWORK_UNAVAILABLE_MESSAGE.into() }
	}

	/// Builds the error returned when no refresh token can rescue an expired session.
	pub fn missing_refresh_token() -> Self {
		Self::Unauthorized { message: NO_REFRESH_TOKEN_MESSAGE.into() }
	}

	/// Builds the error returned after a forbidden response discarded the refresh token.
	pub fn invalid_refresh_token() -> Self {
		Self::Forbidden { message: INVALID_REFRESH_TOKEN_MESSAGE.into() }
	}

	/// Returns the HTTP-like status code carried by the error.
	pub fn status(&self) -> u16 {
		match self {
			Self::Storage(_) | Self::Config(_) | Self::Transport(_) | Self::Decode { .. } => 500,
			Self::Refresh(err) => err.status(),
			Self::ServiceUnavailable { .. } => 503,
			Self::Unauthorized { .. } | Self::RefreshAbandoned => 401,
			Self::Forbidden { .. } => 403,
			Self::Api { status, .. } => *status,
		}
	}

	/// Returns `true` when the failure stems from connectivity rather than the server.
	pub fn is_network(&self) -> bool {
		matches!(self, Self::ServiceUnavailable { .. })
	}
}

/// Normalized error shape carrying an HTTP-like status code and a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ThisError)]
#[error("{status}: {message}")]
pub struct ApiError {
	/// HTTP-like status code.
	pub status: u16,
	/// Human-readable message.
	pub message: String,
	/// Structured payload returned by the server, if any.
	pub details: Option<serde_json::Value>,
}
impl ApiError {
	/// Creates a normalized error, falling back to a generic message when `message` is blank.
	pub fn new(status: u16, message: impl Into<String>) -> Self {
		let message = message.into();
		let message = if message.trim().is_empty() { FALLBACK_MESSAGE.into() } else { message };

		Self { status, message, details: None }
	}

	/// Attaches the structured payload.
	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);

		self
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let status = err.status();

		match err {
			Error::Api { message, body: Some(body), .. } =>
				ApiError::new(status, message).with_details(body),
			other => ApiError::new(status, other.to_string()),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A header value contains characters that cannot be sent.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: String,
		/// Underlying validation failure.
		#[source]
		source: ::http::header::InvalidHeaderValue,
	},
	/// A URL could not be parsed or joined onto the base URL.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("The base URL must be an absolute http(s) URL: {url}.")]
	UnsupportedBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// HTTPS was required but the endpoint uses plain HTTP.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A configured path is empty.
	#[error("The {field} must not be empty.")]
	EmptyPath {
		/// Configuration field name.
		field: &'static str,
	},
	/// Toast capacity must allow at least one notification.
	#[error("Toast capacity must be at least 1.")]
	ZeroToastCapacity,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestEncode(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures that are not connectivity problems.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a failure.
	#[error("HTTP transport failed.")]
	Network {
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
