use futures::future::try_join_all;
use lilac_contracts::images::extension_for_mime;
use lilac_contracts::ImageRef;

use crate::error::{RelayError, Result};

/// A decoded context image, ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextImage {
    pub index: usize,
    pub image: ImageRef,
}

impl ContextImage {
    pub fn from_data_url(index: usize, raw: &str) -> Result<Self> {
        let decoded = ImageRef::from_data_url(raw).map_err(|err| {
            RelayError::Conversion(format!("Failed to read context image {index}: {err}"))
        })?;
        let image = match image::guess_format(decoded.bytes()) {
            Ok(format) => {
                let sniffed = format.to_mime_type();
                if sniffed != decoded.mime_type() {
                    tracing::debug!(
                        index,
                        declared = decoded.mime_type(),
                        sniffed,
                        "context image MIME type corrected from content"
                    );
                    ImageRef::new(sniffed, decoded.bytes().to_vec())
                } else {
                    decoded
                }
            }
            Err(_) if decoded.is_image() => decoded,
            Err(_) => {
                return Err(RelayError::Conversion(format!(
                    "Context image {index} is not an image (type '{}').",
                    decoded.mime_type()
                )))
            }
        };
        Ok(Self { index, image })
    }

    pub fn mime_type(&self) -> &str {
        self.image.mime_type()
    }

    /// Upload name for multipart providers, e.g. `context-image-0.png`.
    pub fn file_name(&self) -> String {
        format!(
            "context-image-{}.{}",
            self.index,
            extension_for_mime(self.image.mime_type())
        )
    }
}

/// Decodes every data URL concurrently and keeps the input order.
///
/// One failure fails the whole set, so a provider never sees a partial context.
pub async fn decode_context_images(urls: &[String]) -> Result<Vec<ContextImage>> {
    let tasks = urls.iter().cloned().enumerate().map(|(index, url)| async move {
        tokio::task::spawn_blocking(move || ContextImage::from_data_url(index, &url))
            .await
            .map_err(|err| {
                RelayError::Internal(format!("context image {index} conversion aborted: {err}"))
            })?
    });
    try_join_all(tasks).await
}
