//! Credential names and the access/refresh pair minted at login and by refreshes.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Named slot inside a credential store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CredentialKey {
	/// Short-lived credential attached to every request.
	#[serde(rename = "accessToken")]
	AccessToken,
	/// Longer-lived credential used only to mint a new pair.
	#[serde(rename = "refreshToken")]
	RefreshToken,
}
impl CredentialKey {
	/// Both keys, access token first.
	pub const ALL: [Self; 2] = [Self::AccessToken, Self::RefreshToken];

	/// Returns the persisted name (cookie name) of the slot.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "accessToken",
			Self::RefreshToken => "refreshToken",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Access and refresh token issued together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Access token secret.
	#[serde(rename = "token")]
	pub access_token: TokenSecret,
	/// Refresh token secret.
	#[serde(rename = "refreshToken")]
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}

	/// Returns the secret stored under `key`.
	pub fn get(&self, key: CredentialKey) -> &TokenSecret {
		match key {
			CredentialKey::AccessToken => &self.access_token,
			CredentialKey::RefreshToken => &self.refresh_token,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pair_uses_refresh_endpoint_field_names() {
		let pair: CredentialPair =
			serde_json::from_str(r#"{"token":"T2","refreshToken":"R2"}"#)
				.expect("Credential pair should deserialize from the refresh payload.");

		assert_eq!(pair.get(CredentialKey::AccessToken).expose(), "T2");
		assert_eq!(pair.get(CredentialKey::RefreshToken).expose(), "R2");
		assert!(!format!("{pair:?}").contains("T2"));
	}

	#[test]
	fn keys_render_cookie_names() {
		assert_eq!(CredentialKey::AccessToken.to_string(), "accessToken");
		assert_eq!(
			serde_json::to_string(&CredentialKey::RefreshToken)
				.expect("Credential key should serialize."),
			"\"refreshToken\""
		);
	}
}
