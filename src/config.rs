//! Validated authenticator configuration.
//!
//! [`AuthenticatorConfig`] pins the API base URL every relative request is resolved against,
//! the refresh endpoint path, the login entry point used after unrecoverable refresh failures,
//! and the persistence attributes applied to stored credentials. Build it through
//! [`AuthenticatorConfig::builder`] so validation runs once up front. The struct also
//! (de)serializes so host applications can keep it in their own config files; deserialization
//! goes through the same builder, so omitted fields take their defaults.

// self
use crate::{_prelude::*, error::ConfigError, store::CookieAttributes};

/// Runtime settings for an [`Authenticator`](crate::interceptor::Authenticator).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigFile")]
pub struct AuthenticatorConfig {
	/// Base URL that relative request paths and the refresh path are joined onto.
	pub base_url: Url,
	/// Path of the refresh endpoint relative to `base_url`.
	pub refresh_path: String,
	/// Path the navigator is sent to after an unrecoverable refresh failure.
	pub login_path: String,
	/// Whether stored credentials carry the `secure` attribute.
	pub secure_cookies: bool,
	/// Maximum number of notifications retained by the default toast queue.
	pub toast_capacity: usize,
}
impl AuthenticatorConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh-token";
	/// Default login entry point.
	pub const DEFAULT_LOGIN_PATH: &'static str = "/auth/login";
	/// Default number of retained notifications.
	pub const DEFAULT_TOAST_CAPACITY: usize = 3;

	/// Returns a builder seeded with defaults for the provided base URL.
	pub fn builder(base_url: Url) -> AuthenticatorConfigBuilder {
		AuthenticatorConfigBuilder::new(base_url)
	}

	/// Resolves `path` against the base URL, ignoring any leading slash.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidUrl { source })
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}

	/// Persistence attributes applied when credentials are written.
	pub fn cookie_attributes(&self) -> CookieAttributes {
		CookieAttributes { secure: self.secure_cookies }
	}
}

#[derive(Deserialize)]
struct ConfigFile {
	base_url: Url,
	refresh_path: Option<String>,
	login_path: Option<String>,
	secure_cookies: Option<bool>,
	#[serde(default)]
	require_https: bool,
	toast_capacity: Option<usize>,
}
impl TryFrom<ConfigFile> for AuthenticatorConfig {
	type Error = ConfigError;

	fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
		let mut builder = Self::builder(file.base_url).require_https(file.require_https);

		if let Some(path) = file.refresh_path {
			builder = builder.refresh_path(path);
		}
		if let Some(path) = file.login_path {
			builder = builder.login_path(path);
		}
		if let Some(secure) = file.secure_cookies {
			builder = builder.secure_cookies(secure);
		}
		if let Some(capacity) = file.toast_capacity {
			builder = builder.toast_capacity(capacity);
		}

		builder.build()
	}
}

/// Builder for [`AuthenticatorConfig`] values.
#[derive(Debug)]
pub struct AuthenticatorConfigBuilder {
	base_url: Url,
	refresh_path: String,
	login_path: String,
	secure_cookies: bool,
	require_https: bool,
	toast_capacity: usize,
}
impl AuthenticatorConfigBuilder {
	fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: AuthenticatorConfig::DEFAULT_REFRESH_PATH.into(),
			login_path: AuthenticatorConfig::DEFAULT_LOGIN_PATH.into(),
			secure_cookies: true,
			require_https: false,
			toast_capacity: AuthenticatorConfig::DEFAULT_TOAST_CAPACITY,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login entry point.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Toggles the `secure` attribute on stored credentials.
	pub fn secure_cookies(mut self, secure: bool) -> Self {
		self.secure_cookies = secure;

		self
	}

	/// Rejects plain-HTTP base URLs when enabled.
	pub fn require_https(mut self, require: bool) -> Self {
		self.require_https = require;

		self
	}

	/// Overrides how many notifications the default toast queue retains.
	pub fn toast_capacity(mut self, capacity: usize) -> Self {
		self.toast_capacity = capacity;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<AuthenticatorConfig, ConfigError> {
		let mut base_url = self.base_url;

		if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedBaseUrl { url: base_url.to_string() });
		}
		if self.require_https && base_url.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint { endpoint: "base", url: base_url.to_string() });
		}
		if self.refresh_path.trim().trim_matches('/').is_empty() {
			return Err(ConfigError::EmptyPath { field: "refresh path" });
		}
		if self.login_path.trim().is_empty() {
			return Err(ConfigError::EmptyPath { field: "login path" });
		}
		if self.toast_capacity == 0 {
			return Err(ConfigError::ZeroToastCapacity);
		}
		// Url::join replaces the last segment unless the base ends with a slash.
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let config = AuthenticatorConfig {
			base_url,
			refresh_path: self.refresh_path,
			login_path: self.login_path,
			secure_cookies: self.secure_cookies,
			toast_capacity: self.toast_capacity,
		};

		config.refresh_url()?;

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	#[test]
	fn defaults_resolve_refresh_endpoint_under_base_path() {
		let config = AuthenticatorConfig::builder(url("https://api.example.com/v1"))
			.build()
			.expect("Default configuration should build.");

		assert_eq!(config.base_url.as_str(), "https://api.example.com/v1/");
		assert_eq!(
			config.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"https://api.example.com/v1/auth/refresh-token"
		);
		assert_eq!(
			config.resolve("/users/me").expect("Relative path should resolve.").as_str(),
			"https://api.example.com/v1/users/me"
		);
		assert_eq!(config.login_path, "/auth/login");
		assert!(config.cookie_attributes().secure);
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let err = AuthenticatorConfig::builder(url("mailto:ops@example.com"))
			.build()
			.expect_err("Non-hierarchical base URLs should be rejected.");

		assert!(matches!(err, ConfigError::UnsupportedBaseUrl { .. }));

		let err = AuthenticatorConfig::builder(url("http://api.example.com"))
			.require_https(true)
			.build()
			.expect_err("Plain HTTP should be rejected when HTTPS is required.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "base", .. }));

		let err = AuthenticatorConfig::builder(url("https://api.example.com"))
			.refresh_path("/")
			.build()
			.expect_err("Empty refresh paths should be rejected.");

		assert!(matches!(err, ConfigError::EmptyPath { field: "refresh path" }));

		let err = AuthenticatorConfig::builder(url("https://api.example.com"))
			.toast_capacity(0)
			.build()
			.expect_err("Zero toast capacity should be rejected.");

		assert!(matches!(err, ConfigError::ZeroToastCapacity));
	}

	#[test]
	fn config_round_trips_through_json() {
		let config = AuthenticatorConfig::builder(url("https://api.example.com/v1"))
			.login_path("/signin")
			.secure_cookies(false)
			.build()
			.expect("Configuration should build.");
		let raw = serde_json::to_string(&config).expect("Configuration should serialize.");
		let parsed: AuthenticatorConfig =
			serde_json::from_str(&raw).expect("Configuration should deserialize.");

		assert_eq!(parsed, config);
	}

	#[test]
	fn deserialization_runs_the_builder() {
		let config: AuthenticatorConfig =
			serde_json::from_str(r#"{ "base_url": "https://api.example.com/v1" }"#)
				.expect("Minimal configuration should deserialize.");

		assert_eq!(
			config.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"https://api.example.com/v1/auth/refresh-token"
		);
		assert_eq!(config.login_path, AuthenticatorConfig::DEFAULT_LOGIN_PATH);
		assert_eq!(config.toast_capacity, AuthenticatorConfig::DEFAULT_TOAST_CAPACITY);
		assert!(config.secure_cookies);

		let err = serde_json::from_str::<AuthenticatorConfig>(
			r#"{ "base_url": "https://api.example.com/v1", "toast_capacity": 0 }"#,
		)
		.expect_err("Zero toast capacity should be rejected.");

		assert!(err.to_string().contains("capacity"), "unexpected error: {err}");

		serde_json::from_str::<AuthenticatorConfig>(
			r#"{ "base_url": "http://api.example.com", "require_https": true }"#,
		)
		.expect_err("Plain HTTP should be rejected when HTTPS is required.");
	}
}
