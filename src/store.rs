//! Credential store boundary and the built-in stores.
//!
//! Stores hold two named values (see [`CredentialKey`]) together with the persistence
//! attributes they were written with. [`MemoryStore`] keeps them in-process; [`FileStore`]
//! survives restarts and is scoped to a single domain, mirroring cookie semantics.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, CredentialPair, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the credential pair.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if present.
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Writes (or replaces) the value stored under `key`.
	fn set(
		&self,
		key: CredentialKey,
		value: TokenSecret,
		attributes: CookieAttributes,
	) -> StoreFuture<'_, ()>;

	/// Removes the value stored under `key`, returning the previous value.
	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>>;
}
impl dyn CredentialStore + '_ {
	/// Reads both credentials; returns `None` unless both are present.
	pub async fn load_pair(&self) -> Result<Option<CredentialPair>, StoreError> {
		let access = self.get(CredentialKey::AccessToken).await?;
		let refresh = self.get(CredentialKey::RefreshToken).await?;

		Ok(access.zip(refresh).map(|(access_token, refresh_token)| CredentialPair {
			access_token,
			refresh_token,
		}))
	}

	/// Writes both credentials, access token first.
	pub async fn save_pair(
		&self,
		pair: &CredentialPair,
		attributes: CookieAttributes,
	) -> Result<(), StoreError> {
		for key in CredentialKey::ALL {
			self.set(key, pair.get(key).clone(), attributes).await?;
		}

		Ok(())
	}

	/// Removes both credentials.
	pub async fn clear(&self) -> Result<(), StoreError> {
		for key in CredentialKey::ALL {
			self.remove(key).await?;
		}

		Ok(())
	}
}

/// Persistence attributes applied when a credential is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieAttributes {
	/// Restricts the credential to secure channels and owner-only storage.
	pub secure: bool,
}
impl Default for CookieAttributes {
	fn default() -> Self {
		Self { secure: true }
	}
}

/// Credential value plus the attributes it was written with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
	/// Secret value.
	pub value: TokenSecret,
	/// Whether the value was written with the `secure` attribute.
	pub secure: bool,
	/// Instant of the last write.
	pub updated_at: OffsetDateTime,
}
impl StoredCredential {
	/// Stamps a new entry with the current instant.
	pub fn new(value: TokenSecret, attributes: CookieAttributes) -> Self {
		Self { value, secure: attributes.secure, updated_at: OffsetDateTime::now_utc() }
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
