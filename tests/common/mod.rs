#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
use request_authenticator::{
	config::AuthenticatorConfig,
	error::Error,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportErrorMapper, TransportFuture},
	http_types::{Method, StatusCode},
	interceptor::Authenticator,
	navigate::PendingNavigation,
	notify::ToastQueue,
	store::MemoryStore,
	url::Url,
};
use tokio::sync::Semaphore;

pub const REFRESHED_ACCESS: &str = "T2";
pub const REFRESHED_REFRESH: &str = "R2";

pub fn config(base: &str) -> AuthenticatorConfig {
	AuthenticatorConfig::builder(Url::parse(base).expect("Fixture base URL should parse."))
		.build()
		.expect("Fixture config should be valid.")
}

/// How the scripted refresh endpoint answers once its gate opens.
#[derive(Clone, Copy, Debug)]
pub enum RefreshScript {
	Rotate,
	Forbidden,
}

#[derive(Debug, thiserror::Error)]
#[error("scripted transport failure")]
pub struct ScriptedFailure;

/// In-process API: bearer `T2` succeeds, anything else fails with `jwt expired`. The refresh
/// endpoint blocks until [`ScriptedApi::open_gate`] is called.
pub struct ScriptedApi {
	pub script: RefreshScript,
	pub gate: Semaphore,
	pub log: Mutex<Vec<(Method, String, Option<String>)>>,
}
impl ScriptedApi {
	pub fn new(script: RefreshScript) -> Self {
		Self { script, gate: Semaphore::new(0), log: Mutex::new(Vec::new()) }
	}

	pub fn open_gate(&self) {
		self.gate.add_permits(1);
	}

	pub fn refresh_calls(&self) -> usize {
		self.log.lock().iter().filter(|(method, _, _)| *method == Method::POST).count()
	}

	pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
		self.log
			.lock()
			.iter()
			.filter(|(_, logged, _)| logged == path)
			.map(|(_, _, bearer)| bearer.clone())
			.collect()
	}

	/// Paths resubmitted with the refreshed token, in the order they reached the transport.
	pub fn replayed_paths(&self) -> Vec<String> {
		self.log
			.lock()
			.iter()
			.filter(|(method, _, bearer)| {
				*method == Method::GET && bearer.as_deref() == Some(REFRESHED_ACCESS)
			})
			.map(|(_, path, _)| path.clone())
			.collect()
	}
}
impl HttpTransport for ScriptedApi {
	type TransportError = ScriptedFailure;

	fn execute(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
		Box::pin(async move {
			let bearer = request.bearer_token().map(str::to_owned);

			self.log.lock().push((request.method.clone(), request.url.path().to_owned(), bearer.clone()));

			if request.method == Method::POST {
				let Ok(_permit) = self.gate.acquire().await else {
					return Err(ScriptedFailure);
				};

				return Ok(match self.script {
					RefreshScript::Rotate => ApiResponse::new(
						StatusCode::OK,
						format!(
							r#"{{"data":{{"token":"{REFRESHED_ACCESS}","refreshToken":"{REFRESHED_REFRESH}"}}}}"#
						),
					),
					RefreshScript::Forbidden => ApiResponse::new(
						StatusCode::FORBIDDEN,
						r#"{"errors":{"message":"Refresh token expired"},"statusCode":403}"#,
					),
				});
			}

			Ok(match bearer.as_deref() {
				Some(REFRESHED_ACCESS) => ApiResponse::new(StatusCode::OK, r#"{"ok":true}"#),
				_ => ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"message":"jwt expired"}"#),
			})
		})
	}
}

pub struct ScriptedMapper;
impl TransportErrorMapper<ScriptedFailure> for ScriptedMapper {
	fn map_transport_error(&self, _: ScriptedFailure) -> Error {
		Error::service_unavailable()
	}
}

pub struct Harness {
	pub auth: Authenticator<ScriptedApi, ScriptedMapper>,
	pub api: Arc<ScriptedApi>,
	pub store: Arc<MemoryStore>,
	pub toasts: Arc<ToastQueue>,
	pub navigation: Arc<PendingNavigation>,
}

pub fn scripted(script: RefreshScript) -> Harness {
	let api = Arc::new(ScriptedApi::new(script));
	let store = Arc::new(MemoryStore::default());
	let toasts = Arc::new(ToastQueue::default());
	let navigation = Arc::new(PendingNavigation::default());
	let auth = <Authenticator<ScriptedApi, ScriptedMapper>>::with_http_client(
		config("https://api.example.com"),
		store.clone(),
		api.clone(),
		Arc::new(ScriptedMapper),
	)
	.expect("Authenticator should build.")
	.with_notifier(toasts.clone())
	.with_navigator(navigation.clone());

	Harness { auth, api, store, toasts, navigation }
}

/// Polls `condition` until it holds, failing the test after about two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
	for _ in 0..400 {
		if condition() {
			return;
		}

		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	}

	panic!("Condition was not reached in time.");
}
