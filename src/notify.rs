//! User-facing notifications and the bounded toast queue.
//!
//! The authenticator reports session problems through a [`NotificationSink`]. Delivery is
//! fire-and-forget: sinks never fail and never block the request path. [`ToastQueue`] is the
//! built-in sink; it keeps a bounded list of active toasts for the host UI to render.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, error::ConfigError};

/// Receives user-facing notifications.
pub trait NotificationSink
where
	Self: Send + Sync,
{
	/// Shows `notification`; must not block.
	fn notify(&self, notification: Notification);
}

/// Icon rendered next to a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationIcon {
	#[default]
	/// Check mark.
	Success,
	/// Pencil.
	Edit,
	/// Error badge.
	Error,
	/// Cross.
	Cancel,
	/// Warning triangle.
	Warning,
	/// Logout arrow.
	Logout,
	/// Spinner; toasts with this icon stay until dismissed.
	Loading,
	/// Trash can.
	Delete,
	/// Information badge.
	Info,
}

/// Background tone of a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTone {
	/// Red background.
	Red,
	#[default]
	/// Green background.
	Green,
	/// Yellow background.
	Yellow,
	/// Blue background.
	Blue,
	/// Amber background.
	Amber,
}
impl NotificationTone {
	/// CSS class applied to the toast container.
	pub const fn class_name(self) -> &'static str {
		match self {
			NotificationTone::Red => "bg-red-50",
			NotificationTone::Green => "bg-green-50",
			NotificationTone::Yellow => "bg-yellow-50",
			NotificationTone::Blue => "bg-blue-50",
			NotificationTone::Amber => "bg-amber-50",
		}
	}
}

/// A single user-facing message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	/// Body text.
	pub message: String,
	/// Optional heading.
	pub title: Option<String>,
	/// Icon variant.
	pub icon: NotificationIcon,
	/// Background tone.
	pub tone: NotificationTone,
}
impl Notification {
	/// How long a toast stays visible unless it is a loading toast.
	pub const DISPLAY_DURATION: Duration = Duration::seconds(10);

	/// Creates a notification with the default icon and tone.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			title: None,
			icon: NotificationIcon::default(),
			tone: NotificationTone::default(),
		}
	}

	/// Creates a red error notification.
	pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(message)
			.with_title(title)
			.with_icon(NotificationIcon::Error)
			.with_tone(NotificationTone::Red)
	}

	/// Sets the heading.
	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());

		self
	}

	/// Sets the icon.
	pub fn with_icon(mut self, icon: NotificationIcon) -> Self {
		self.icon = icon;

		self
	}

	/// Sets the tone.
	pub fn with_tone(mut self, tone: NotificationTone) -> Self {
		self.tone = tone;

		self
	}

	/// Visible duration; `None` means the toast stays until dismissed.
	pub fn display_duration(&self) -> Option<Duration> {
		match self.icon {
			NotificationIcon::Loading => None,
			_ => Some(Self::DISPLAY_DURATION),
		}
	}
}

/// Identifier handed out by [`ToastQueue::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToastId(u64);

/// A notification currently on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
	/// Queue-assigned identifier.
	pub id: ToastId,
	/// Displayed notification.
	pub notification: Notification,
	/// Instant the toast was pushed.
	pub shown_at: OffsetDateTime,
}
impl Toast {
	/// Instant after which the toast should disappear, if it expires at all.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.notification.display_duration().map(|duration| self.shown_at + duration)
	}
}

/// Bounded queue of active toasts; the oldest toast is dismissed first once full.
#[derive(Debug)]
pub struct ToastQueue {
	capacity: usize,
	next_id: AtomicU64,
	active: Mutex<VecDeque<Toast>>,
}
impl ToastQueue {
	/// Creates a queue retaining at most `capacity` toasts.
	pub fn new(capacity: usize) -> Result<Self, ConfigError> {
		if capacity == 0 {
			return Err(ConfigError::ZeroToastCapacity);
		}

		Ok(Self { capacity, next_id: AtomicU64::new(1), active: Mutex::new(VecDeque::new()) })
	}

	/// Maximum number of retained toasts.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Shows `notification`, evicting the oldest toasts beyond capacity.
	pub fn push(&self, notification: Notification) -> ToastId {
		let id = ToastId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let mut active = self.active.lock();

		while active.len() >= self.capacity {
			active.pop_front();
		}

		active.push_back(Toast { id, notification, shown_at: OffsetDateTime::now_utc() });

		id
	}

	/// Removes the toast with `id`; returns `false` when it was already gone.
	pub fn dismiss(&self, id: ToastId) -> bool {
		let mut active = self.active.lock();
		let before = active.len();

		active.retain(|toast| toast.id != id);

		active.len() != before
	}

	/// Drops toasts whose display duration elapsed before `now`, returning how many went.
	pub fn prune_expired(&self, now: OffsetDateTime) -> usize {
		let mut active = self.active.lock();
		let before = active.len();

		active.retain(|toast| toast.expires_at().is_none_or(|expires_at| expires_at > now));

		before - active.len()
	}

	/// Snapshot of the active toasts, oldest first.
	pub fn active(&self) -> Vec<Toast> {
		self.active.lock().iter().cloned().collect()
	}
}
impl Default for ToastQueue {
	fn default() -> Self {
		Self {
			capacity: 3,
			next_id: AtomicU64::new(1),
			active: Mutex::new(VecDeque::new()),
		}
	}
}
impl NotificationSink for ToastQueue {
	fn notify(&self, notification: Notification) {
		self.push(notification);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn queue_evicts_oldest_beyond_capacity() {
		let queue = ToastQueue::default();
		let ids = (1..=4)
			.map(|n| queue.push(Notification::new(format!("toast {n}"))))
			.collect::<Vec<_>>();
		let active = queue.active();

		assert_eq!(active.len(), 3);
		assert_eq!(active.iter().map(|toast| toast.id).collect::<Vec<_>>(), ids[1..].to_vec());
		assert!(!queue.dismiss(ids[0]));
		assert!(queue.dismiss(ids[2]));
		assert_eq!(queue.active().len(), 2);
	}

	#[test]
	fn zero_capacity_is_rejected() {
		assert!(matches!(ToastQueue::new(0), Err(ConfigError::ZeroToastCapacity)));
	}

	#[test]
	fn loading_toasts_never_expire() {
		let queue = ToastQueue::new(5).expect("Capacity should be valid.");

		queue.push(Notification::new("Uploading").with_icon(NotificationIcon::Loading));
		queue.push(Notification::new("Saved"));

		let later = OffsetDateTime::now_utc() + Duration::seconds(11);

		assert_eq!(queue.prune_expired(later), 1);

		let remaining = queue.active();

		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].notification.message, "Uploading");
		assert_eq!(remaining[0].expires_at(), None);
	}

	#[test]
	fn error_preset_uses_red_tone() {
		let notification = Notification::error("Error", "Failed to process file: a.pdf");

		assert_eq!(notification.icon, NotificationIcon::Error);
		assert_eq!(notification.tone.class_name(), "bg-red-50");
		assert_eq!(notification.title.as_deref(), Some("Error"));
		assert_eq!(
			serde_json::to_value(&notification).expect("Notification should serialize.")["icon"],
			"error"
		);
		assert_eq!(Notification::new("ok").display_duration(), Some(Duration::seconds(10)));
	}
}
