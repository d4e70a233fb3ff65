//! File-backed [`CredentialStore`] that survives restarts and is scoped to one domain.
//!
//! Several domains may share a snapshot file; each [`FileStore`] only reads and writes the
//! entries of the domain it was opened for. Every write re-reads the file and replaces only its
//! own domain, so live stores for other domains on the same path keep their entries. Snapshots
//! are written to a uniquely named temporary sibling and renamed into place. On unix the file is restricted to its owner whenever it holds an entry
//! written with the `secure` attribute.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenSecret},
	store::{CookieAttributes, CredentialStore, StoreError, StoreFuture, StoredCredential},
};

type DomainEntries = BTreeMap<String, StoredCredential>;
type Snapshot = BTreeMap<String, DomainEntries>;

/// Persists credentials to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	domain: String,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at `path` scoped to `domain`, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>, domain: impl Into<String>) -> Result<Self, StoreError> {
		let path = path.into();
		let domain = domain.into();

		if domain.trim().is_empty() {
			return Err(StoreError::Backend { message: "Store domain must not be empty".into() });
		}

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, domain, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Domain this store is scoped to.
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the stored entry, attributes included.
	pub fn entry(&self, key: CredentialKey) -> Option<StoredCredential> {
		self.inner.read().get(&self.domain).and_then(|entries| entries.get(key.as_str())).cloned()
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	/// Merges this store's domain into the snapshot on disk and adopts the merged result.
	fn persist_domain(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
		let mut merged = Self::load_snapshot(&self.path)?;

		match snapshot.get(&self.domain).filter(|entries| !entries.is_empty()) {
			Some(entries) => {
				merged.insert(self.domain.clone(), entries.clone());
			},
			None => {
				merged.remove(&self.domain);
			},
		}

		self.persist_locked(&merged)?;

		*snapshot = merged;

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let secure = contents.values().flat_map(BTreeMap::values).any(|entry| entry.secure);
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension(format!("{}.tmp", OffsetDateTime::now_utc().unix_timestamp_nanos()));

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			if secure {
				restrict_to_owner(&file).map_err(|e| StoreError::Backend {
					message: format!("Failed to restrict {}: {e}", tmp_path.display()),
				})?;
			}

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.entry(key).map(|entry| entry.value)) })
	}

	fn set(
		&self,
		key: CredentialKey,
		value: TokenSecret,
		attributes: CookieAttributes,
	) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard
				.entry(self.domain.clone())
				.or_default()
				.insert(key.as_str().to_owned(), StoredCredential::new(value, attributes));
			self.persist_domain(&mut guard)?;

			Ok(())
		})
	}

	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let removed =
				guard.get_mut(&self.domain).and_then(|entries| entries.remove(key.as_str()));

			if removed.is_some() {
				self.persist_domain(&mut guard)?;
			}

			Ok(removed.map(|entry| entry.value))
		})
	}
}

#[cfg(unix)]
fn restrict_to_owner(file: &File) -> std::io::Result<()> {
	// std
	use std::os::unix::fs::PermissionsExt;

	file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &File) -> std::io::Result<()> {
	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"request_authenticator_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn credentials_survive_reopen() {
		let path = temp_path("reopen");
		let store =
			FileStore::open(&path, "app.example.com").expect("Failed to open file store snapshot.");

		store
			.set(CredentialKey::AccessToken, TokenSecret::new("T1"), CookieAttributes::default())
			.await
			.expect("Failed to save access token to file store.");
		drop(store);

		let reopened = FileStore::open(&path, "app.example.com")
			.expect("Failed to reopen file store snapshot.");
		let value = reopened
			.get(CredentialKey::AccessToken)
			.await
			.expect("Failed to read access token from file store.")
			.expect("File store lost the access token after reopen.");

		assert_eq!(value.expose(), "T1");

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;

			let mode = fs::metadata(&path)
				.expect("Snapshot metadata should be readable.")
				.permissions()
				.mode();

			assert_eq!(mode & 0o777, 0o600);
		}

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn domains_sharing_a_file_stay_isolated() {
		let path = temp_path("domains");
		let app = FileStore::open(&path, "app.example.com").expect("Failed to open app store.");

		app.set(CredentialKey::RefreshToken, TokenSecret::new("R-app"), CookieAttributes::default())
			.await
			.expect("Failed to save app refresh token.");

		let admin =
			FileStore::open(&path, "admin.example.com").expect("Failed to open admin store.");

		assert!(
			admin
				.get(CredentialKey::RefreshToken)
				.await
				.expect("Admin read should succeed.")
				.is_none()
		);

		admin
			.set(
				CredentialKey::RefreshToken,
				TokenSecret::new("R-admin"),
				CookieAttributes { secure: false },
			)
			.await
			.expect("Failed to save admin refresh token.");

		let reloaded = FileStore::open(&path, "app.example.com").expect("Failed to reload store.");

		assert_eq!(
			reloaded.entry(CredentialKey::RefreshToken).map(|entry| entry.value),
			Some(TokenSecret::new("R-app"))
		);

		let removed = reloaded
			.remove(CredentialKey::RefreshToken)
			.await
			.expect("Removal should succeed.");

		assert!(removed.is_some());

		let _ = fs::remove_file(&path);
	}

	#[tokio::test]
	async fn live_stores_sharing_a_file_keep_each_others_domains() {
		let path = temp_path("live");
		let app = FileStore::open(&path, "app.example.com").expect("Failed to open app store.");
		let admin =
			FileStore::open(&path, "admin.example.com").expect("Failed to open admin store.");

		app.set(CredentialKey::RefreshToken, TokenSecret::new("R-app"), CookieAttributes::default())
			.await
			.expect("Failed to save app refresh token.");
		admin
			.set(CredentialKey::RefreshToken, TokenSecret::new("R-admin"), CookieAttributes::default())
			.await
			.expect("Failed to save admin refresh token.");
		app.remove(CredentialKey::AccessToken).await.expect("Removing a missing key should succeed.");

		let app = FileStore::open(&path, "app.example.com").expect("Failed to reopen app store.");
		let admin =
			FileStore::open(&path, "admin.example.com").expect("Failed to reopen admin store.");

		assert_eq!(
			app.get(CredentialKey::RefreshToken).await.expect("App read should succeed."),
			Some(TokenSecret::new("R-app"))
		);
		assert_eq!(
			admin.get(CredentialKey::RefreshToken).await.expect("Admin read should succeed."),
			Some(TokenSecret::new("R-admin"))
		);

		app.remove(CredentialKey::RefreshToken).await.expect("Removal should succeed.");

		let admin =
			FileStore::open(&path, "admin.example.com").expect("Failed to reopen admin store.");

		assert!(admin.entry(CredentialKey::RefreshToken).is_some());
		assert!(FileStore::open(&path, "app.example.com")
			.expect("Failed to reopen app store.")
			.entry(CredentialKey::RefreshToken)
			.is_none());

		let _ = fs::remove_file(&path);
	}

	#[test]
	fn blank_domains_are_rejected() {
		let err = FileStore::open(temp_path("blank"), " ")
			.expect_err("Blank domains should be rejected.");

		assert!(matches!(err, StoreError::Backend { .. }));
	}
}
