//! Refresh endpoint wire contract and client.
//!
//! The endpoint receives `{ "refreshToken": "..." }` and answers either
//! `{ "data": { "token": "...", "refreshToken": "..." } }` or a failure body shaped like
//! `{ "errors": { "message": "..." }, "statusCode": 403 }`. The call is sent straight through
//! the transport, bypassing the interceptors, so a failing refresh never recurses.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	http::{ApiRequest, ApiResponse, HttpTransport, TransportErrorMapper},
};

/// Message shown when the refresh endpoint gives no reason of its own.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please login again";

/// Request body sent to the refresh endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
	/// Refresh token being exchanged.
	#[serde(rename = "refreshToken")]
	pub refresh_token: TokenSecret,
}

/// Successful refresh response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
	/// Newly minted credential pair.
	pub data: CredentialPair,
}

/// Failure body returned by the refresh endpoint. Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RefreshFailureBody {
	/// Nested error details.
	#[serde(default)]
	pub errors: Option<RefreshFailureDetail>,
	/// Application-level status code; `403` marks the refresh token as invalid.
	#[serde(default, rename = "statusCode")]
	pub status_code: Option<u16>,
}

/// Nested error details of a [`RefreshFailureBody`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RefreshFailureDetail {
	/// Human-readable reason.
	#[serde(default)]
	pub message: Option<String>,
}

/// Refresh failures. Cloneable so one failure can be handed to every queued request.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// The endpoint answered with a non-success status.
	#[error("{message}")]
	Rejected {
		/// HTTP status of the response.
		status: u16,
		/// `statusCode` field of the failure body.
		status_code: Option<u16>,
		/// Reason reported by the endpoint, or [`SESSION_EXPIRED_MESSAGE`].
		message: String,
	},
	/// The call never produced a response.
	#[error("{message}")]
	Unreachable {
		/// Normalized status of the transport failure.
		status: u16,
		/// Human-readable reason.
		message: String,
	},
	/// The endpoint answered 2xx with a body that does not carry a usable pair.
	#[error("Refresh endpoint returned a malformed response: {message}.")]
	MalformedResponse {
		/// HTTP status of the response.
		status: u16,
		/// Parsing failure description.
		message: String,
	},
}
impl RefreshError {
	/// Returns `true` when the refresh token itself was rejected as invalid.
	pub fn is_forbidden(&self) -> bool {
		match self {
			Self::Rejected { status_code: Some(code), .. } => *code == 403,
			Self::Rejected { status, status_code: None, .. } => *status == 403,
			_ => false,
		}
	}

	/// Normalized status code.
	pub fn status(&self) -> u16 {
		match self {
			Self::Rejected { status, .. }
			| Self::Unreachable { status, .. }
			| Self::MalformedResponse { status, .. } => *status,
		}
	}

	/// Message suitable for the session-expired notification.
	pub fn notice(&self) -> &str {
		match self {
			Self::Rejected { message, .. } => message,
			_ => SESSION_EXPIRED_MESSAGE,
		}
	}

	fn rejected(response: &ApiResponse) -> Self {
		let body = serde_json::from_slice::<RefreshFailureBody>(&response.body).unwrap_or_default();
		let message = body
			.errors
			.and_then(|detail| detail.message)
			.filter(|message| !message.trim().is_empty())
			.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.into());

		Self::Rejected { status: response.status.as_u16(), status_code: body.status_code, message }
	}
}

/// Client for the refresh endpoint.
pub struct RefreshClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoint: Url,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
}
impl<C, M> RefreshClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client posting to `endpoint`.
	pub fn new(endpoint: Url, http_client: Arc<C>, transport_mapper: Arc<M>) -> Self {
		Self { endpoint, http_client, transport_mapper }
	}

	/// Absolute URL of the refresh endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Exchanges `refresh_token` for a new credential pair.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<CredentialPair, RefreshError> {
		let body = RefreshRequest { refresh_token: refresh_token.clone() };
		let request = ApiRequest::post(self.endpoint.clone()).json(&body).map_err(|err| {
			RefreshError::Unreachable { status: 500, message: err.to_string() }
		})?;
		let response = self.http_client.execute(request).await.map_err(|err| {
			let err = self.transport_mapper.map_transport_error(err);

			RefreshError::Unreachable { status: err.status(), message: err.to_string() }
		})?;

		if !response.is_success() {
			return Err(RefreshError::rejected(&response));
		}

		let status = response.status.as_u16();
		let parsed = response.json::<RefreshResponse>().map_err(|err| {
			let message = match &err {
				Error::Decode { source, .. } => format!("{} at `{}`", source.inner(), source.path()),
				other => other.to_string(),
			};

			RefreshError::MalformedResponse { status, message }
		})?;

		if parsed.data.access_token.is_blank() || parsed.data.refresh_token.is_blank() {
			return Err(RefreshError::MalformedResponse {
				status,
				message: "the response carried an empty token".into(),
			});
		}

		Ok(parsed.data)
	}
}
impl<C, M> Clone for RefreshClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			endpoint: self.endpoint.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
		}
	}
}
impl<C, M> Debug for RefreshClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshClient").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;

	#[test]
	fn request_body_uses_camel_case_field() {
		let body = RefreshRequest { refresh_token: TokenSecret::new("R1") };

		assert_eq!(
			serde_json::to_string(&body).expect("Refresh request should serialize."),
			r#"{"refreshToken":"R1"}"#
		);
	}

	#[test]
	fn rejected_reads_nested_message_and_status_code() {
		let response = ApiResponse::new(
			StatusCode::UNAUTHORIZED,
			r#"{"errors":{"message":"Refresh token revoked"},"statusCode":403}"#,
		);
		let err = RefreshError::rejected(&response);

		assert!(err.is_forbidden());
		assert_eq!(err.status(), 401);
		assert_eq!(err.notice(), "Refresh token revoked");
	}

	#[test]
	fn rejected_falls_back_to_http_status_and_default_message() {
		let forbidden = RefreshError::rejected(&ApiResponse::new(StatusCode::FORBIDDEN, "nope"));

		assert!(forbidden.is_forbidden());
		assert_eq!(forbidden.notice(), SESSION_EXPIRED_MESSAGE);

		let explicit = RefreshError::rejected(&ApiResponse::new(
			StatusCode::FORBIDDEN,
			r#"{"statusCode":401}"#,
		));

		assert!(!explicit.is_forbidden());

		let unavailable = RefreshError::Unreachable { status: 503, message: "offline".into() };

		assert!(!unavailable.is_forbidden());
		assert_eq!(unavailable.notice(), SESSION_EXPIRED_MESSAGE);
	}
}
