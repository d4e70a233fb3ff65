//! Navigation boundary used to send the user back to the login entry point.

// self
use crate::_prelude::*;

/// Moves the host application to another route.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `path`. Implementations ignore empty paths.
	fn navigate(&self, path: &str);
}

/// Records the latest requested path for the host application to consume.
#[derive(Debug, Default)]
pub struct PendingNavigation {
	latest: Mutex<Option<String>>,
}
impl PendingNavigation {
	/// Returns and clears the pending path.
	pub fn take(&self) -> Option<String> {
		self.latest.lock().take()
	}

	/// Returns the pending path without clearing it.
	pub fn peek(&self) -> Option<String> {
		self.latest.lock().clone()
	}
}
impl Navigator for PendingNavigation {
	fn navigate(&self, path: &str) {
		if path.trim().is_empty() {
			return;
		}

		*self.latest.lock() = Some(path.to_owned());
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn keeps_latest_path_and_ignores_empty_ones() {
		let navigation = PendingNavigation::default();

		navigation.navigate("/dashboard");
		navigation.navigate("/auth/login");
		navigation.navigate("  ");

		assert_eq!(navigation.peek().as_deref(), Some("/auth/login"));
		assert_eq!(navigation.take().as_deref(), Some("/auth/login"));
		assert_eq!(navigation.take(), None);
	}
}
