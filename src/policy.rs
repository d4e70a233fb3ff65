//! Failure classification policy for failed responses.
//!
//! The inbound interceptor never inspects status codes or messages itself; it builds a
//! [`FailureContext`] and asks a [`FailureClassifier`] which recovery path applies.
//! [`PhraseClassifier`] matches the server's `message` field against a fixed vocabulary of
//! authentication failures, while [`StatusClassifier`] relies purely on status codes for
//! servers that do not emit stable messages.

// self
use crate::{_prelude::*, http::ApiResponse};

/// Classifies failed responses into recovery categories.
pub trait FailureClassifier
where
	Self: Send + Sync,
{
	/// Maps a failed response into the recovery taxonomy.
	fn classify(&self, ctx: &FailureContext) -> FailureKind;
}

/// Recovery categories for failed responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// Credential invalid, expired, or malformed; refresh and retry.
	Authentication,
	/// Request forbidden; the refresh token is considered invalid.
	Forbidden,
	/// Anything else; propagate without recovery.
	Other,
}

/// Primitive data describing a failed response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureContext {
	/// HTTP status code.
	pub status: u16,
	/// Server-supplied `message` field of a JSON body.
	pub message: Option<String>,
	/// Preview of the response body.
	pub body_preview: Option<String>,
}
impl FailureContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a context for the provided status code.
	pub fn new(status: u16) -> Self {
		Self { status, message: None, body_preview: None }
	}

	/// Builds a context from a buffered response.
	pub fn from_response(response: &ApiResponse) -> Self {
		let mut ctx = Self::new(response.status.as_u16());

		ctx.message = response.message();

		if !response.body.is_empty() {
			ctx = ctx.with_body_preview(response.text());
		}

		ctx
	}

	/// Adds the server message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Adds a body preview, truncated to a fixed number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default classifier matching the server message against a phrase vocabulary.
///
/// Matching is exact and case-sensitive. Responses outside the vocabulary fall back to the
/// status code: 403 is [`FailureKind::Forbidden`], everything else is
/// [`FailureKind::Other`].
#[derive(Clone, Debug)]
pub struct PhraseClassifier {
	phrases: Vec<String>,
}
impl PhraseClassifier {
	/// Messages the API emits for invalid, expired, or malformed credentials.
	pub const DEFAULT_PHRASES: [&'static str; 6] = [
		"invalid token",
		"jwt expired",
		"jwt malformed",
		"Not authorized",
		"Not authorized, token failed",
		"Not authorized as an admin",
	];

	/// Creates a classifier with a custom vocabulary.
	pub fn new<I, S>(phrases: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { phrases: phrases.into_iter().map(Into::into).collect() }
	}

	/// Adds a phrase to the vocabulary.
	pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
		self.phrases.push(phrase.into());

		self
	}

	/// Returns `true` when `message` belongs to the vocabulary.
	pub fn matches(&self, message: &str) -> bool {
		self.phrases.iter().any(|phrase| phrase == message)
	}
}
impl Default for PhraseClassifier {
	fn default() -> Self {
		Self::new(Self::DEFAULT_PHRASES)
	}
}
impl FailureClassifier for PhraseClassifier {
	fn classify(&self, ctx: &FailureContext) -> FailureKind {
		if ctx.message.as_deref().is_some_and(|message| self.matches(message)) {
			return FailureKind::Authentication;
		}

		match ctx.status {
			403 => FailureKind::Forbidden,
			_ => FailureKind::Other,
		}
	}
}

/// Classifier that ignores messages: 401 refreshes, 403 is forbidden.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusClassifier;
impl FailureClassifier for StatusClassifier {
	fn classify(&self, ctx: &FailureContext) -> FailureKind {
		match ctx.status {
			401 => FailureKind::Authentication,
			403 => FailureKind::Forbidden,
			_ => FailureKind::Other,
		}
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= FailureContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(FailureContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
