//! Thread-safe in-memory [`CredentialStore`] for tests, demos, and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, CredentialPair, TokenSecret},
	store::{CookieAttributes, CredentialStore, StoreFuture, StoredCredential},
};

type StoreMap = Arc<RwLock<HashMap<CredentialKey, StoredCredential>>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Creates a store seeded with `pair`, written with `attributes`.
	pub fn with_pair(pair: &CredentialPair, attributes: CookieAttributes) -> Self {
		let store = Self::default();

		for key in CredentialKey::ALL {
			Self::set_now(&store.0, key, pair.get(key).clone(), attributes);
		}

		store
	}

	/// Returns the stored entry, attributes included.
	pub fn entry(&self, key: CredentialKey) -> Option<StoredCredential> {
		self.0.read().get(&key).cloned()
	}

	fn set_now(
		map: &StoreMap,
		key: CredentialKey,
		value: TokenSecret,
		attributes: CookieAttributes,
	) {
		map.write().insert(key, StoredCredential::new(value, attributes));
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		let value = self.0.read().get(&key).map(|entry| entry.value.clone());

		Box::pin(async move { Ok(value) })
	}

	fn set(
		&self,
		key: CredentialKey,
		value: TokenSecret,
		attributes: CookieAttributes,
	) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::set_now(&map, key, value, attributes);

			Ok(())
		})
	}

	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(&key).map(|entry| entry.value)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_records_attributes_and_remove_returns_previous_value() {
		let store = MemoryStore::default();

		store
			.set(
				CredentialKey::RefreshToken,
				TokenSecret::new("R1"),
				CookieAttributes { secure: false },
			)
			.await
			.expect("Refresh token write should succeed.");

		let entry =
			store.entry(CredentialKey::RefreshToken).expect("Refresh token entry should exist.");

		assert_eq!(entry.value.expose(), "R1");
		assert!(!entry.secure);

		let removed = store
			.remove(CredentialKey::RefreshToken)
			.await
			.expect("Refresh token removal should succeed.");

		assert_eq!(removed.as_ref().map(TokenSecret::expose), Some("R1"));
		assert!(
			store
				.get(CredentialKey::RefreshToken)
				.await
				.expect("Refresh token read should succeed.")
				.is_none()
		);
	}

	#[test]
	fn seeded_store_exposes_both_credentials() {
		let store =
			MemoryStore::with_pair(&CredentialPair::new("T1", "R1"), CookieAttributes::default());

		assert_eq!(
			store.entry(CredentialKey::AccessToken).map(|entry| entry.value.expose().to_owned()),
			Some("T1".into())
		);
		assert!(store.entry(CredentialKey::RefreshToken).is_some_and(|entry| entry.secure));
	}
}
