//! Single-flight refresh coordination.
//!
//! Every piece of per-session state lives in one [`RefreshState`] behind a synchronous mutex that
//! is never held across `.await`. A failed request calls [`RefreshCoordinator::admit`], which in
//! one critical section decides whether the caller leads a refresh, waits behind the refresh in
//! flight, or can replay immediately with a token rotated after the caller's request left.
//!
//! After a successful refresh every waiter receives a [`Turn`]. Turns are chained so each
//! request reaches the transport only after the one queued ahead of it has.

// std
use std::task::{Context, Poll};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*, auth::TokenSecret, interceptor::metrics::RefreshMetrics, refresh::RefreshError,
};

/// Outcome delivered to a queued request once the refresh settles.
pub(crate) type RefreshOutcome = std::result::Result<Turn, RefreshError>;

type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Debug, Default)]
struct RefreshState {
	refreshing: bool,
	waiters: VecDeque<Waiter>,
	logged_out: bool,
	rotated: Option<TokenSecret>,
}

/// Decision returned by [`RefreshCoordinator::admit`].
#[derive(Debug)]
pub(crate) enum Admission<'a> {
	/// The caller performs the refresh and must settle the lease.
	Lead(RefreshLease<'a>),
	/// A refresh is in flight; the receiver resolves once it settles.
	Wait(oneshot::Receiver<RefreshOutcome>),
	/// A newer token than the one the request carried already exists.
	Replay(TokenSecret),
}

/// Per-authenticator refresh state.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	/// Creates a coordinator that records abandoned refreshes in `metrics`.
	pub fn with_metrics(metrics: Arc<RefreshMetrics>) -> Self {
		Self { state: Default::default(), metrics }
	}

	/// Returns `true` while a refresh call is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of requests waiting for the refresh in flight.
	pub fn pending(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Decides how a request that failed with `sent` as its bearer token recovers.
	pub(crate) fn admit(&self, sent: Option<&str>) -> Admission<'_> {
		let mut state = self.state.lock();

		if state.refreshing {
			let (tx, rx) = oneshot::channel();

			state.waiters.push_back(tx);

			return Admission::Wait(rx);
		}
		if let Some(rotated) = state.rotated.as_ref().filter(|rotated| Some(rotated.expose()) != sent)
		{
			return Admission::Replay(rotated.clone());
		}

		state.refreshing = true;

		Admission::Lead(RefreshLease { coordinator: self, settled: false })
	}

	/// Sets the logged-out flag, returning `true` only for the call that flipped it.
	pub(crate) fn mark_logged_out(&self) -> bool {
		!std::mem::replace(&mut self.state.lock().logged_out, true)
	}

	/// Starts a new session: clears the logged-out flag and records the current access token.
	pub(crate) fn reset_session(&self, rotated: Option<TokenSecret>) {
		let mut state = self.state.lock();

		state.logged_out = false;
		state.rotated = rotated;
	}

	/// Ends the session: forgets the rotated token and suppresses further session notices.
	pub(crate) fn end_session(&self) {
		let mut state = self.state.lock();

		state.logged_out = true;
		state.rotated = None;
	}

	fn drain(&self, rotated: Option<TokenSecret>) -> VecDeque<Waiter> {
		let mut state = self.state.lock();

		state.refreshing = false;

		if rotated.is_some() {
			state.logged_out = false;
		}

		state.rotated = rotated;

		std::mem::take(&mut state.waiters)
	}

	fn resolve(&self, token: TokenSecret) -> (Turn, usize) {
		let waiters = self.drain(Some(token.clone()));
		let count = waiters.len();
		let (done, mut previous) = oneshot::channel();
		let leader = Turn { token: token.clone(), after: None, done: Some(done) };

		// Each waiter is released once the request ahead of it reaches the transport.
		for waiter in waiters {
			let (done, next) = oneshot::channel();
			let turn = Turn { token: token.clone(), after: Some(previous), done: Some(done) };

			// A closed receiver drops its turn, which releases the next waiter.
			let _ = waiter.send(Ok(turn));

			previous = next;
		}

		(leader, count)
	}

	fn reject(&self, err: RefreshError) -> usize {
		let waiters = self.drain(None);
		let count = waiters.len();

		for waiter in waiters {
			let _ = waiter.send(Err(err.clone()));
		}

		count
	}

	fn abandon(&self) {
		let waiters = {
			let mut state = self.state.lock();

			state.refreshing = false;

			std::mem::take(&mut state.waiters)
		};

		self.metrics.record_failure();
		drop(waiters);
	}
}

/// Exclusive right to perform the refresh. Dropping it unsettled abandons the refresh.
#[derive(Debug)]
pub(crate) struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	/// Records the rotated token and hands every waiter its turn, oldest first.
	///
	/// Returns the leader's own turn, which goes first, and the number of resumed waiters.
	pub(crate) fn succeed(mut self, token: TokenSecret) -> (Turn, usize) {
		self.settled = true;

		self.coordinator.resolve(token)
	}

	/// Rejects every waiter with `err`, oldest first.
	pub(crate) fn fail(mut self, err: RefreshError) -> usize {
		self.settled = true;

		self.coordinator.reject(err)
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.abandon();
		}
	}
}

/// Slot in the replay order after a successful refresh.
#[derive(Debug)]
pub(crate) struct Turn {
	token: TokenSecret,
	after: Option<oneshot::Receiver<()>>,
	done: Option<oneshot::Sender<()>>,
}
impl Turn {
	/// Turn that is not ordered against any other request.
	pub(crate) fn immediate(token: TokenSecret) -> Self {
		Self { token, after: None, done: None }
	}

	/// Waits until the request ahead has been submitted, then yields the token to send with.
	pub(crate) async fn ready(mut self) -> (TokenSecret, Submission) {
		if let Some(after) = self.after.take() {
			// A dropped predecessor counts as submitted.
			let _ = after.await;
		}

		(self.token, Submission { done: self.done })
	}
}

/// Releases the next turn once the tracked transport future is first polled.
#[derive(Debug)]
pub(crate) struct Submission {
	done: Option<oneshot::Sender<()>>,
}
impl Submission {
	pub(crate) fn track<F>(self, inner: F) -> Submitted<F>
	where
		F: Future + Unpin,
	{
		Submitted { inner, done: self.done }
	}
}

/// Transport future that signals the next turn after its first poll.
#[derive(Debug)]
pub(crate) struct Submitted<F> {
	inner: F,
	done: Option<oneshot::Sender<()>>,
}
impl<F> Future for Submitted<F>
where
	F: Future + Unpin,
{
	type Output = F::Output;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let polled = Pin::new(&mut self.inner).poll(cx);

		if let Some(done) = self.done.take() {
			let _ = done.send(());
		}

		polled
	}
}
