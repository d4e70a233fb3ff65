//! Request authenticator wrapping an HTTP transport with outbound and inbound interceptors.
//!
//! [`Authenticator::send`] attaches the stored access token to the request, executes it, and
//! hands the outcome to the inbound interceptor, which classifies failures and recovers from
//! expired credentials through a single-flight refresh. Requests that fail while a refresh is in
//! flight are parked and replayed, oldest first, once the new pair is stored.

mod inbound;
mod metrics;
mod queue;

pub use metrics::RefreshMetrics;

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, CredentialPair},
	config::AuthenticatorConfig,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportErrorMapper},
	navigate::{Navigator, PendingNavigation},
	notify::{NotificationSink, ToastQueue},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	policy::{FailureClassifier, PhraseClassifier},
	refresh::RefreshClient,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};
use queue::RefreshCoordinator;

#[cfg(feature = "reqwest")]
/// Authenticator specialized for the crate's default reqwest transport stack.
pub type ReqwestAuthenticator = Authenticator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Attaches credentials to outgoing requests and recovers from expired ones.
///
/// Clones share the same store, refresh queue, and session flags, so one refresh serves every
/// clone. Independent instances (for example one per API) never share refresh state.
pub struct Authenticator<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for API calls, replays, and the refresh call.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Store holding the credential pair.
	pub store: Arc<dyn CredentialStore>,
	/// Validated configuration.
	pub config: AuthenticatorConfig,
	/// Policy deciding which failed responses trigger a refresh.
	pub classifier: Arc<dyn FailureClassifier>,
	/// Sink receiving session notices.
	pub notifier: Arc<dyn NotificationSink>,
	/// Navigation boundary used after unrecoverable refresh failures.
	pub navigator: Arc<dyn Navigator>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_client: RefreshClient<C, M>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<C, M> Authenticator<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an authenticator that reuses the caller-provided transport + mapper pair.
	///
	/// Notices go to a [`ToastQueue`] sized by the configuration and navigation requests are
	/// recorded in a [`PendingNavigation`] until replaced through the `with_*` setters.
	pub fn with_http_client(
		config: AuthenticatorConfig,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let refresh_client = RefreshClient::new(
			config.refresh_url()?,
			http_client.clone(),
			transport_mapper.clone(),
		);
		let notifier = Arc::new(ToastQueue::new(config.toast_capacity)?);
		let refresh_metrics = Arc::new(RefreshMetrics::default());
		let coordinator = Arc::new(RefreshCoordinator::with_metrics(refresh_metrics.clone()));

		Ok(Self {
			http_client,
			transport_mapper,
			store,
			config,
			classifier: Arc::new(PhraseClassifier::default()),
			notifier,
			navigator: Arc::new(PendingNavigation::default()),
			refresh_metrics,
			refresh_client,
			coordinator,
		})
	}

	/// Replaces the failure classification policy.
	pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
		self.classifier = classifier;

		self
	}

	/// Replaces the notification sink.
	pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
		self.notifier = notifier;

		self
	}

	/// Replaces the navigator.
	pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
		self.navigator = navigator;

		self
	}

	/// Builds a request for `path` relative to the configured base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest, ConfigError> {
		Ok(ApiRequest::new(method, self.config.resolve(path)?))
	}

	/// Stores a freshly issued pair and starts a new session.
	pub async fn login(&self, pair: CredentialPair) -> Result<()> {
		self.store.save_pair(&pair, self.config.cookie_attributes()).await?;
		self.coordinator.reset_session(Some(pair.access_token));

		Ok(())
	}

	/// Removes both credentials and ends the session without showing a notice.
	pub async fn logout(&self) -> Result<()> {
		self.store.clear().await?;
		self.coordinator.end_session();

		Ok(())
	}

	/// Reads the stored pair; `None` unless both credentials are present.
	pub async fn credentials(&self) -> Result<Option<CredentialPair>> {
		Ok(self.store.load_pair().await?)
	}

	/// Number of requests waiting for the refresh in flight.
	pub fn pending_replays(&self) -> usize {
		self.coordinator.pending()
	}

	/// Returns `true` while a refresh call is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.coordinator.is_refreshing()
	}

	/// Outbound interceptor: attaches the stored access token as a bearer header.
	///
	/// Never fails. A store read failure is logged and the request goes out unauthenticated.
	pub async fn authorize(&self, mut request: ApiRequest) -> ApiRequest {
		let span = FlowSpan::new(FlowKind::Dispatch, "authorize");

		match self.store.get(CredentialKey::AccessToken).await {
			Ok(Some(token)) if !token.is_blank() =>
				if let Err(err) = request.set_bearer(&token) {
					span.warn("Stored access token cannot be sent as a header.", &err);
				},
			Ok(_) => {},
			Err(err) => span.warn("Credential store read failed; sending without a token.", &err),
		}

		request
	}

	/// Sends `request` through the outbound interceptor, the transport, and the inbound
	/// interceptor.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = self.authorize(request).await;
				let outcome = self.dispatch(request.clone()).await;

				self.intercept(request, outcome).await
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Executes `request` as-is, mapping transport failures into the crate taxonomy.
	pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.http_client
			.execute(request)
			.await
			.map_err(|err| self.transport_mapper.map_transport_error(err))
	}
}
#[cfg(feature = "reqwest")]
impl Authenticator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an authenticator that provisions its own reqwest-backed transport.
	pub fn new(
		config: AuthenticatorConfig,
		store: Arc<dyn CredentialStore>,
	) -> Result<Self, ConfigError> {
		Self::with_http_client(
			config,
			store,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for Authenticator<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			classifier: self.classifier.clone(),
			notifier: self.notifier.clone(),
			navigator: self.navigator.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh_client: self.refresh_client.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<C, M> Debug for Authenticator<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("config", &self.config)
			.field("refresh_client", &self.refresh_client)
			.field("is_refreshing", &self.is_refreshing())
			.field("pending_replays", &self.pending_replays())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;
	use crate::{
		auth::TokenSecret,
		http::TransportFuture,
		store::{MemoryStore, StoreError, StoreFuture},
	};

	#[derive(Debug, ThisError)]
	#[error("unreachable")]
	struct Offline;

	#[derive(Default)]
	struct Echo {
		seen: Mutex<Vec<Option<String>>>,
	}
	impl HttpTransport for Echo {
		type TransportError = Offline;

		fn execute(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
			self.seen.lock().push(request.bearer_token().map(str::to_owned));

			Box::pin(async { Ok(ApiResponse::new(StatusCode::OK, "{}")) })
		}
	}

	struct Passthrough;
	impl TransportErrorMapper<Offline> for Passthrough {
		fn map_transport_error(&self, _: Offline) -> Error {
			Error::service_unavailable()
		}
	}

	struct Broken;
	impl CredentialStore for Broken {
		fn get(&self, _: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
			Box::pin(async { Err(StoreError::Backend { message: "locked".into() }) })
		}

		fn set(
			&self,
			_: CredentialKey,
			_: TokenSecret,
			_: crate::store::CookieAttributes,
		) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "locked".into() }) })
		}

		fn remove(&self, _: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
			Box::pin(async { Err(StoreError::Backend { message: "locked".into() }) })
		}
	}

	fn config() -> AuthenticatorConfig {
		AuthenticatorConfig::builder(
			Url::parse("https://api.example.com/v1").expect("Fixture URL should parse."),
		)
		.build()
		.expect("Fixture config should be valid.")
	}

	#[tokio::test]
	async fn outbound_attaches_stored_token_or_passes_through() {
		let store = Arc::new(MemoryStore::default());
		let echo = Arc::new(Echo::default());
		let auth = <Authenticator<Echo, Passthrough>>::with_http_client(
			config(),
			store,
			echo.clone(),
			Arc::new(Passthrough),
		)
		.expect("Authenticator should build.");
		let request = auth.request(Method::GET, "/users/me").expect("Path should resolve.");

		assert_eq!(request.url.as_str(), "https://api.example.com/v1/users/me");

		auth.send(request.clone()).await.expect("Unauthenticated call should pass through.");
		auth.login(CredentialPair::new("T1", "R1")).await.expect("Login should succeed.");
		auth.send(request).await.expect("Authenticated call should succeed.");

		assert_eq!(*echo.seen.lock(), vec![None, Some("T1".to_owned())]);
	}

	#[tokio::test]
	async fn outbound_ignores_store_failures() {
		let echo = Arc::new(Echo::default());
		let auth = <Authenticator<Echo, Passthrough>>::with_http_client(
			config(),
			Arc::new(Broken),
			echo.clone(),
			Arc::new(Passthrough),
		)
		.expect("Authenticator should build.");
		let request = auth.request(Method::GET, "health").expect("Path should resolve.");
		let request = auth.authorize(request).await;

		assert_eq!(request.bearer_token(), None);
		assert!(auth.login(CredentialPair::new("T1", "R1")).await.is_err());
	}

	#[tokio::test]
	async fn logout_clears_both_credentials() {
		let store = Arc::new(MemoryStore::default());
		let auth = <Authenticator<Echo, Passthrough>>::with_http_client(
			config(),
			store.clone(),
			Arc::new(Echo::default()),
			Arc::new(Passthrough),
		)
		.expect("Authenticator should build.");

		auth.login(CredentialPair::new("T1", "R1")).await.expect("Login should succeed.");

		assert!(auth.credentials().await.expect("Read should succeed.").is_some());
		assert!(store.entry(CredentialKey::AccessToken).is_some_and(|entry| entry.secure));

		auth.logout().await.expect("Logout should succeed.");

		assert!(auth.credentials().await.expect("Read should succeed.").is_none());
		assert!(store.entry(CredentialKey::RefreshToken).is_none());
	}
}
