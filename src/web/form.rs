use crate::backend::ObjectStorage;
use crate::error::BlogError;
use crate::session::Identity;
use crate::ugc::ImageChange;
use crate::upload::{ImageUploader, SelectedFile, UPLOAD_PREFIX};
use actix_multipart::Multipart;
use actix_web::{error, Error};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;

/// Largest accepted image upload.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
/// Largest accepted text field.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

/// Name of the file input on every post and comment form.
pub const IMAGE_FIELD: &str = "image";

/// Text fields and the optional image of a submitted multipart form.
#[derive(Debug, Default)]
pub struct UgcForm {
    fields: HashMap<String, String>,
    pub file: Option<SelectedFile>,
}

impl UgcForm {
    /// Returns the value of a text field, or an empty string.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn is_checked(&self, name: &str) -> bool {
        matches!(self.fields.get(name).map(String::as_str), Some("on" | "true" | "1"))
    }

    /// Resolves what should happen to the attached image.
    ///
    /// A newly selected file is uploaded right away. Otherwise an image uploaded by an earlier,
    /// rejected submission is carried over through the `uploaded_image` field, as long as it
    /// points into our own storage.
    pub async fn image_change(
        &mut self,
        storage: &dyn ObjectStorage,
        owner: Option<&Identity>,
    ) -> Result<ImageChange, BlogError> {
        if let Some(file) = self.file.take() {
            let mut uploader = ImageUploader::new(storage, owner);
            let url = uploader
                .upload(file, |url| log::debug!("UgcForm: attached {}", url))
                .await?;
            self.fields.insert("uploaded_image".to_owned(), url.to_owned());
            return Ok(ImageChange::Replace(url));
        }

        if self.is_checked("remove_image") {
            return Ok(ImageChange::Remove);
        }

        let carried = self.text("uploaded_image");
        if !carried.is_empty() && carried.starts_with(&storage.public_url(UPLOAD_PREFIX)) {
            return Ok(ImageChange::Replace(carried));
        }

        Ok(ImageChange::Keep)
    }
}

/// Reads every field of a multipart submission into memory.
pub async fn read_ugc_form(mut multipart: Multipart) -> Result<UgcForm, Error> {
    let mut form = UgcForm::default();

    while let Some(mut field) = multipart.try_next().await.map_err(error::ErrorBadRequest)? {
        let disposition = field.content_disposition();
        let name = match disposition.get_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let filename = disposition.get_filename().map(str::to_owned);
        let content_type = field.content_type().clone();
        let limit = if name == IMAGE_FIELD {
            MAX_FILE_BYTES
        } else {
            MAX_TEXT_BYTES
        };

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk.map_err(error::ErrorBadRequest)?;
            if data.len() + bytes.len() > limit {
                return Err(error::ErrorPayloadTooLarge(format!(
                    "Field '{}' is too large.",
                    name
                )));
            }
            data.extend_from_slice(&bytes);
        }

        if name == IMAGE_FIELD {
            // Browsers send an empty, unnamed part when no file was chosen.
            match filename {
                Some(filename) if !filename.is_empty() && !data.is_empty() => {
                    form.file = Some(SelectedFile {
                        name: filename,
                        content_type,
                        data,
                    });
                }
                _ => {}
            }
        } else {
            let value = String::from_utf8(data).map_err(|_| {
                error::ErrorBadRequest(format!("Field '{}' is not valid text.", name))
            })?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStorage;

    fn form_with(fields: &[(&str, &str)]) -> UgcForm {
        UgcForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file: None,
        }
    }

    #[actix_rt::test]
    async fn test_image_change_from_fields() {
        let storage = MemoryStorage::new("https://cdn.example.com");

        let mut form = form_with(&[("content", "hi")]);
        assert_eq!(
            form.image_change(&storage, None).await.unwrap(),
            ImageChange::Keep
        );

        let mut form = form_with(&[("remove_image", "on")]);
        assert_eq!(
            form.image_change(&storage, None).await.unwrap(),
            ImageChange::Remove
        );

        let mut form = form_with(&[("uploaded_image", "https://cdn.example.com/uploads/a.png")]);
        assert_eq!(
            form.image_change(&storage, None).await.unwrap(),
            ImageChange::Replace("https://cdn.example.com/uploads/a.png".to_owned())
        );

        // Foreign URLs are not carried over.
        let mut form = form_with(&[("uploaded_image", "https://evil.example.com/x.png")]);
        assert_eq!(
            form.image_change(&storage, None).await.unwrap(),
            ImageChange::Keep
        );
    }

    #[actix_rt::test]
    async fn test_selected_file_is_uploaded() {
        let storage = MemoryStorage::new("https://cdn.example.com");
        let mut form = form_with(&[("remove_image", "on")]);
        form.file = Some(SelectedFile {
            name: "cat.gif".to_owned(),
            content_type: mime::IMAGE_GIF,
            data: vec![0x47, 0x49, 0x46],
        });

        let change = form.image_change(&storage, None).await.unwrap();
        let url = match change {
            ImageChange::Replace(url) => url,
            other => panic!("unexpected change {:?}", other),
        };
        assert!(url.ends_with(".gif"));
        assert_eq!(form.text("uploaded_image"), url);
        assert_eq!(storage.object_count(), 1);
    }
}
