//! Transport primitives shared by the interceptors, the refresh client, and the file importer.
//!
//! The module exposes [`ApiRequest`] and [`ApiResponse`] as the crate's owned request and
//! response model, [`HttpTransport`] as the only dependency on an HTTP stack, and
//! [`TransportErrorMapper`] to fold transport-specific failures into the crate taxonomy.
//! Requests are plain cloneable values so a failed request can be resubmitted with a new
//! bearer header once fresh credentials exist.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, E> = Pin<Box<dyn Future<Output = Result<ApiResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute an [`ApiRequest`].
///
/// Implementations must be `Send + Sync + 'static` so they can be shared behind `Arc`
/// between the authenticator, the refresh client, and the importer.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and collects the full response body.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Maps transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts a transport error; connectivity problems must become
	/// [`Error::ServiceUnavailable`].
	fn map_transport_error(&self, error: E) -> Error;
}

/// Owned, cloneable outgoing request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Serializes `body` as JSON and sets the content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Sets a header, replacing any previous value.
	pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ConfigError> {
		let value = HeaderValue::from_str(value)
			.map_err(|source| ConfigError::InvalidHeader { name: name.to_string(), source })?;

		self.headers.insert(name, value);

		Ok(self)
	}

	/// Returns the bearer token currently attached, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "))
	}

	/// Attaches `token` as a sensitive bearer `Authorization` header.
	pub fn set_bearer(&mut self, token: &TokenSecret) -> Result<(), ConfigError> {
		let mut value = HeaderValue::from_str(&token.bearer()).map_err(|source| {
			ConfigError::InvalidHeader { name: AUTHORIZATION.to_string(), source }
		})?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	/// Returns a copy carrying `token` as its bearer header.
	pub fn with_bearer(mut self, token: &TokenSecret) -> Result<Self, ConfigError> {
		self.set_bearer(token)?;

		Ok(self)
	}
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON with path-aware errors.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Parses the body as an arbitrary JSON value, if it is JSON at all.
	pub fn json_value(&self) -> Option<serde_json::Value> {
		serde_json::from_slice(&self.body).ok()
	}

	/// Returns the server-supplied `message` field of a JSON body.
	pub fn message(&self) -> Option<String> {
		match self.json_value()? {
			serde_json::Value::Object(mut map) => match map.remove("message")? {
				serde_json::Value::String(message) => Some(message),
				_ => None,
			},
			_ => None,
		}
	}

	/// Returns the body decoded as lossy UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns the media type without parameters.
	pub fn content_type(&self) -> Option<&str> {
		self.headers
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.split(';').next())
			.map(str::trim)
	}

	/// Converts a failed response into [`Error::Api`] without any recovery.
	pub fn into_error(self) -> Error {
		let body = self.json_value();
		let message = self
			.message()
			.or_else(|| self.status.canonical_reason().map(str::to_owned))
			.unwrap_or_else(|| crate::error::FALLBACK_MESSAGE.into());

		Error::Api { status: self.status.as_u16(), message, body }
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, err: ReqwestError) -> Error {
		if err.is_connect() || err.is_timeout() || err.is_request() {
			Error::service_unavailable()
		} else if err.is_builder() {
			ConfigError::from(err).into()
		} else {
			TransportError::from(err).into()
		}
	}
}
