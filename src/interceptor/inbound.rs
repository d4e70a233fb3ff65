//! Inbound interceptor: failure classification and refresh recovery.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenSecret},
	http::{ApiRequest, ApiResponse, HttpTransport, TransportErrorMapper},
	interceptor::{
		Authenticator,
		queue::{Admission, RefreshLease, Turn},
	},
	notify::Notification,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	policy::{FailureContext, FailureKind},
	store::CredentialStore,
};

const SESSION_EXPIRED_TITLE: &str = "Session Expired";
const MISSING_REFRESH_TOKEN_NOTICE: &str = "Your session has expired. Please log in again.";
const INVALID_REFRESH_TOKEN_NOTICE: &str =
	"Refresh token is invalid or expired. Please log in again.";

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Inbound interceptor for a request that has already been dispatched.
	///
	/// Successful responses pass through. Transport failures are returned as-is. Authentication
	/// failures are recovered through the refresh flow and the request is resubmitted once;
	/// forbidden responses discard the refresh token. Everything else becomes [`Error::Api`].
	pub async fn intercept(
		&self,
		request: ApiRequest,
		outcome: Result<ApiResponse>,
	) -> Result<ApiResponse> {
		let response = outcome?;

		if response.is_success() {
			return Ok(response);
		}

		match self.classifier.classify(&FailureContext::from_response(&response)) {
			FailureKind::Authentication => self.recover(request).await,
			FailureKind::Forbidden => {
				let span = FlowSpan::new(FlowKind::Dispatch, "forbidden");

				self.discard(CredentialKey::RefreshToken, &span).await;
				self.notify_session_expired(INVALID_REFRESH_TOKEN_NOTICE);

				Err(Error::invalid_refresh_token())
			},
			FailureKind::Other => Err(response.into_error()),
		}
	}

	async fn recover(&self, request: ApiRequest) -> Result<ApiResponse> {
		let Some(refresh_token) =
			self.store.get(CredentialKey::RefreshToken).await?.filter(|token| !token.is_blank())
		else {
			self.notify_session_expired(MISSING_REFRESH_TOKEN_NOTICE);

			return Err(Error::missing_refresh_token());
		};

		match self.coordinator.admit(request.bearer_token()) {
			Admission::Lead(lease) => {
				let turn = self.lead_refresh(lease, refresh_token).await?;

				self.replay(request, turn).await
			},
			Admission::Wait(rx) => {
				self.refresh_metrics.record_queued();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Queued);

				match rx.await {
					Ok(Ok(turn)) => self.replay(request, turn).await,
					Ok(Err(err)) => Err(err.into()),
					Err(_) => Err(Error::RefreshAbandoned),
				}
			},
			Admission::Replay(token) => self.replay(request, Turn::immediate(token)).await,
		}
	}

	async fn lead_refresh(
		&self,
		lease: RefreshLease<'_>,
		refresh_token: TokenSecret,
	) -> Result<Turn> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async {
				self.discard(CredentialKey::AccessToken, &span).await;

				match self.refresh_client.refresh(&refresh_token).await {
					Ok(pair) => {
						// Replays still use the rotated token if persisting fails.
						if let Err(err) =
							self.store.save_pair(&pair, self.config.cookie_attributes()).await
						{
							span.warn("Refreshed credentials could not be stored.", &err);
						}

						self.refresh_metrics.record_success();

						let (turn, resumed) = lease.succeed(pair.access_token);

						span.info(&format!("Token refreshed; resuming {resumed} queued request(s)."));

						Ok(turn)
					},
					Err(err) => {
						self.refresh_metrics.record_failure();
						self.navigator.navigate(&self.config.login_path);
						span.info(&format!("Redirecting to {}.", self.config.login_path));

						if err.is_forbidden() {
							self.discard(CredentialKey::RefreshToken, &span).await;
						}

						self.notify_session_expired(err.notice());
						span.warn("Token refresh failed.", &err);

						let rejected = lease.fail(err.clone());

						span.info(&format!("Rejected {rejected} queued request(s)."));

						Err(Error::Refresh(err))
					},
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Resubmits `request` once `turn` comes up. The outcome is final: no second recovery.
	async fn replay(&self, mut request: ApiRequest, turn: Turn) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		let (token, submission) = turn.ready().await;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_replay();
		request.set_bearer(&token)?;

		let result = submission
			.track(self.http_client.execute(request))
			.await
			.map_err(|err| self.transport_mapper.map_transport_error(err))
			.and_then(settle);

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn discard(&self, key: CredentialKey, span: &FlowSpan) {
		if let Err(err) = self.store.remove(key).await {
			span.warn("Stored credential could not be removed.", &err);
		}
	}

	fn notify_session_expired(&self, message: &str) {
		if self.coordinator.mark_logged_out() {
			self.notifier.notify(Notification::error(SESSION_EXPIRED_TITLE, message));
		}
	}
}

fn settle(response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() { Ok(response) } else { Err(response.into_error()) }
}
