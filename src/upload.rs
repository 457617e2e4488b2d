use crate::backend::ObjectStorage;
use crate::error::{BlogError, ErrorKind};
use crate::session::Identity;

/// Prefix of every uploaded object key.
pub const UPLOAD_PREFIX: &str = "uploads";
/// Extension used when the selected file has none worth keeping.
pub const DEFAULT_EXTENSION: &str = "png";

/// A file picked by the user, fully read into memory.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: mime::Mime,
    pub data: Vec<u8>,
}

/// Lifecycle of one upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Done(String),
    Failed(BlogError),
}

/// Returns the extension of `filename`, case preserved, or the default.
pub fn file_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => DEFAULT_EXTENSION,
    }
}

/// Builds a unique key: `uploads/{owner}-{uuid}.{ext}`.
pub fn object_key(owner: Option<&Identity>, filename: &str) -> String {
    let owner = owner.map(|i| i.id.as_str()).unwrap_or("guest");
    format!(
        "{}/{}-{}.{}",
        UPLOAD_PREFIX,
        owner,
        uuid::Uuid::new_v4(),
        file_extension(filename)
    )
}

/// Uploads one selected image at a time to object storage.
pub struct ImageUploader<'a> {
    storage: &'a dyn ObjectStorage,
    owner: Option<&'a Identity>,
    state: UploadState,
    last_file_name: Option<String>,
}

impl<'a> ImageUploader<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, owner: Option<&'a Identity>) -> Self {
        Self {
            storage,
            owner,
            state: UploadState::Idle,
            last_file_name: None,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn last_file_name(&self) -> Option<&str> {
        self.last_file_name.as_deref()
    }

    /// Clears the selection so a file may be picked again.
    /// Also releases an upload whose future was dropped before it finished.
    pub fn reset(&mut self) {
        self.state = UploadState::Idle;
    }

    /// Stores `file` and hands its public URL to `on_uploaded`.
    /// The callback is not invoked when the upload fails.
    pub async fn upload<F>(&mut self, file: SelectedFile, on_uploaded: F) -> Result<String, BlogError>
    where
        F: FnOnce(&str),
    {
        // A dropped upload future leaves the state here; `reset` releases it.
        if self.state == UploadState::Uploading {
            return Err(BlogError::validation("An upload is already in progress."));
        }

        if file.content_type.type_() != mime::IMAGE {
            return Err(self.fail(BlogError::validation("Only image files can be uploaded.")));
        }
        if file.data.is_empty() {
            return Err(self.fail(BlogError::validation("The selected file is empty.")));
        }

        self.state = UploadState::Uploading;
        self.last_file_name = Some(file.name.to_owned());

        let key = object_key(self.owner, &file.name);
        log::debug!("ImageUploader: uploading {} as {}", file.name, key);

        if let Err(e) = self.storage.upload(&key, &file, true).await {
            log::error!("ImageUploader: upload of {} failed: {}", key, e);
            let e = if e.is(ErrorKind::Remote) {
                BlogError::remote(format!("Upload failed: {}", e.message))
            } else {
                e
            };
            return Err(self.fail(e));
        }

        let url = self.storage.public_url(&key);
        on_uploaded(&url);
        self.state = UploadState::Done(url.to_owned());
        Ok(url)
    }

    fn fail(&mut self, e: BlogError) -> BlogError {
        self.state = UploadState::Failed(e.clone());
        e
    }
}
