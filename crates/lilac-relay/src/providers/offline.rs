use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lilac_contracts::ImageRef;
use sha2::{Digest, Sha256};

use super::{ImageProvider, ProviderOutput, ProviderRequest};
use crate::error::{RelayError, Result};

const OFFLINE_IMAGE_SIDE: u32 = 256;

/// Credential-free stand-in: renders a solid PNG whose colour is derived from
/// the prompt and context, so identical requests give identical images.
pub struct OfflineProvider {
    name: &'static str,
    label: &'static str,
}

impl OfflineProvider {
    pub fn new(name: &'static str, label: &'static str) -> Self {
        Self { name, label }
    }
}

#[async_trait]
impl ImageProvider for OfflineProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn label(&self) -> &str {
        self.label
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput> {
        let (r, g, b) = color_from_request(request);
        let mut canvas = RgbImage::new(OFFLINE_IMAGE_SIDE, OFFLINE_IMAGE_SIDE);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| RelayError::Internal(format!("offline render failed: {err}")))?;
        tracing::debug!(provider = self.name, "rendered offline image");
        Ok(ProviderOutput {
            text: None,
            image: Some(ImageRef::new("image/png", bytes)),
            block_reason: None,
        })
    }
}

fn color_from_request(request: &ProviderRequest) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(request.prompt_text().as_bytes());
    for context in &request.context {
        hasher.update(context.image.bytes());
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;
    use lilac_contracts::Quality;

    use super::*;

    fn request(prompt: &str) -> ProviderRequest {
        ProviderRequest {
            prompt: Some(prompt.to_string()),
            context: Vec::new(),
            quality: Quality::Auto,
        }
    }

    #[tokio::test]
    async fn renders_deterministic_png() -> anyhow::Result<()> {
        let provider = OfflineProvider::new("openai", "OpenAI");
        let first = provider.generate(&request("boat")).await?;
        let second = provider.generate(&request("boat")).await?;
        let other = provider.generate(&request("car")).await?;

        let image = first.image.clone().unwrap_or_else(|| panic!("missing image"));
        assert_eq!(image::guess_format(image.bytes())?, ImageFormat::Png);
        let decoded = image::load_from_memory(image.bytes())?;
        assert_eq!(decoded.width(), OFFLINE_IMAGE_SIDE);
        assert_eq!(first, second);
        assert_ne!(first.image, other.image);
        Ok(())
    }
}
