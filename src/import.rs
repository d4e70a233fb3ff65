//! Downloads files picked from cloud-storage choosers.
//!
//! Choosers hand back either a direct download link or a Drive file identifier plus the OAuth
//! token the chooser obtained. [`FileImporter`] downloads each pick in order, hands successful
//! downloads to a callback, and reports every failure as one error notification without stopping
//! the batch.

// crates.io
use ::http::header::CONTENT_TYPE;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{ApiRequest, HttpTransport, TransportErrorMapper},
	notify::{Notification, NotificationSink},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Default Drive API base that file identifiers are resolved against.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/";

const FAILED_FILE_TITLE: &str = "Error";
const FALLBACK_FILE_NAME: &str = "document";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Where a picked file can be downloaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickedSource {
	/// Publicly reachable download link.
	Direct(Url),
	/// Drive file fetched through the files API with the chooser's token.
	Drive {
		/// Drive file identifier.
		file_id: String,
		/// OAuth token issued to the chooser.
		access_token: TokenSecret,
	},
}

/// A file selected in a chooser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedFile {
	/// Name shown in the chooser; may be empty.
	pub name: String,
	/// Download location.
	pub source: PickedSource,
}
impl PickedFile {
	/// Creates a pick for a direct link.
	pub fn direct(name: impl Into<String>, url: Url) -> Self {
		Self { name: name.into(), source: PickedSource::Direct(url) }
	}

	/// Creates a pick for a Drive file.
	pub fn drive(
		name: impl Into<String>,
		file_id: impl Into<String>,
		access_token: impl Into<TokenSecret>,
	) -> Self {
		Self {
			name: name.into(),
			source: PickedSource::Drive {
				file_id: file_id.into(),
				access_token: access_token.into(),
			},
		}
	}

	/// Name used for the imported file and in failure notices.
	pub fn display_name(&self) -> &str {
		if self.name.trim().is_empty() { FALLBACK_FILE_NAME } else { &self.name }
	}
}

/// Chooser settings derived from the document being collected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerOptions {
	/// Whether more than one file may be picked.
	pub multiselect: bool,
	/// Accepted file extensions, lowercase, dot included.
	pub extensions: Vec<String>,
}
impl PickerOptions {
	/// Extensions accepted by default.
	pub const DEFAULT_EXTENSIONS: [&'static str; 5] = [".pdf", ".jpg", ".jpeg", ".png", ".webp"];

	/// Options for collecting a document of `kind`; passport photos are single-select.
	pub fn for_document(kind: &str) -> Self {
		Self {
			multiselect: kind != "passport_photo",
			extensions: Self::DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect(),
		}
	}

	/// Returns `true` when `name` ends with an accepted extension (case-insensitive).
	pub fn accepts(&self, name: &str) -> bool {
		let name = name.to_ascii_lowercase();

		self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
	}
}

/// A downloaded file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedFile {
	/// File name.
	pub name: String,
	/// Media type reported by the server.
	pub content_type: String,
	/// File contents.
	pub bytes: Vec<u8>,
}

/// Reasons a single pick could not be imported.
#[derive(Debug, ThisError)]
pub enum ImportError {
	/// The file type is not accepted by the chooser options.
	#[error("File type of `{name}` is not accepted.")]
	UnsupportedExtension {
		/// Offending file name.
		name: String,
	},
	/// The download URL could not be built.
	#[error("Download URL for file `{file_id}` could not be built.")]
	InvalidSource {
		/// Drive file identifier.
		file_id: String,
	},
	/// The server refused the download.
	#[error("Failed to download file: {status}.")]
	Download {
		/// HTTP status code.
		status: u16,
	},
	/// The download never produced a response.
	#[error(transparent)]
	Transport(#[from] Error),
}

/// A pick that could not be imported.
#[derive(Debug)]
pub struct ImportFailure {
	/// Display name of the pick.
	pub name: String,
	/// Failure reason.
	pub error: ImportError,
}

/// Summary of an import batch.
#[derive(Debug, Default)]
pub struct ImportReport {
	/// Names of imported files, in order.
	pub imported: Vec<String>,
	/// Failed picks, in order.
	pub failed: Vec<ImportFailure>,
}
impl ImportReport {
	/// Returns `true` when every pick was imported.
	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Downloads picked files through an [`HttpTransport`].
pub struct FileImporter<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	notifier: Arc<dyn NotificationSink>,
	options: PickerOptions,
	drive_base: Url,
}
impl<C, M> FileImporter<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an importer for `options` that reports failures to `notifier`.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
		notifier: Arc<dyn NotificationSink>,
		options: PickerOptions,
	) -> Result<Self, ConfigError> {
		let drive_base =
			Url::parse(DRIVE_API_BASE).map_err(|source| ConfigError::InvalidUrl { source })?;

		Ok(Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			notifier,
			options,
			drive_base,
		})
	}

	/// Overrides the Drive API base URL.
	pub fn with_drive_base(mut self, base: Url) -> Result<Self, ConfigError> {
		if base.cannot_be_a_base() {
			return Err(ConfigError::UnsupportedBaseUrl { url: base.to_string() });
		}

		self.drive_base = base;

		Ok(self)
	}

	/// Chooser options in effect.
	pub fn options(&self) -> &PickerOptions {
		&self.options
	}

	/// Downloads `files` one after another, passing each success to `on_file`.
	///
	/// Each failure shows a "Failed to process file" notice and the batch continues.
	pub async fn import<I, F>(&self, files: I, mut on_file: F) -> ImportReport
	where
		I: IntoIterator<Item = PickedFile>,
		F: FnMut(ImportedFile),
	{
		const KIND: FlowKind = FlowKind::Import;

		let span = FlowSpan::new(KIND, "import");
		let mut report = ImportReport::default();

		for file in files {
			let name = file.display_name().to_owned();

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span.instrument(self.download(&file)).await;

			obs::record_flow_result(KIND, &result);

			match result {
				Ok(imported) => {
					report.imported.push(imported.name.clone());
					on_file(imported);
				},
				Err(error) => {
					span.warn("Picked file could not be imported.", &error);
					self.notifier.notify(Notification::error(
						FAILED_FILE_TITLE,
						format!("Failed to process file: {name}"),
					));
					report.failed.push(ImportFailure { name, error });
				},
			}
		}

		report
	}

	async fn download(&self, file: &PickedFile) -> Result<ImportedFile, ImportError> {
		let name = file.display_name();

		// Unnamed picks were already filtered by the chooser.
		if !file.name.trim().is_empty() && !self.options.accepts(name) {
			return Err(ImportError::UnsupportedExtension { name: name.to_owned() });
		}

		let request = match &file.source {
			PickedSource::Direct(url) => ApiRequest::get(url.clone()),
			PickedSource::Drive { file_id, access_token } => ApiRequest::get(self.drive_url(file_id)?)
				.with_bearer(access_token)
				.map_err(Error::from)?,
		};
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|err| self.transport_mapper.map_transport_error(err))?;

		if !response.is_success() {
			return Err(ImportError::Download { status: response.status.as_u16() });
		}

		let content_type = response
			.headers
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned)
			.unwrap_or_else(|| FALLBACK_CONTENT_TYPE.into());

		Ok(ImportedFile { name: name.to_owned(), content_type, bytes: response.body })
	}

	fn drive_url(&self, file_id: &str) -> Result<Url, ImportError> {
		let mut url = self.drive_base.clone();

		url.path_segments_mut()
			.map_err(|_| ImportError::InvalidSource { file_id: file_id.to_owned() })?
			.pop_if_empty()
			.push("files")
			.push(file_id);
		url.set_query(Some("alt=media"));

		Ok(url)
	}
}
impl<C, M> Debug for FileImporter<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileImporter")
			.field("options", &self.options)
			.field("drive_base", &self.drive_base.as_str())
			.finish()
	}
}
