use std::collections::VecDeque;

use crate::images::ImageRef;
use crate::requests::{GenerationRequest, ProviderSelector, Quality};

pub const MAX_CONTEXT_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("nothing to send: prompt is empty and no context images are attached")]
    NothingToSend,
}

/// Rolling window of the most recent context images, oldest first.
///
/// Uploads and generated images are appended; once the window is full the
/// oldest entry is evicted. Only an explicit [`ContextBuffer::clear`] empties it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBuffer {
    images: VecDeque<ImageRef>,
    capacity: usize,
}

impl Default for ContextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CONTEXT_IMAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            images: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends to the tail and returns the evicted head, if the window overflowed.
    pub fn append(&mut self, image: ImageRef) -> Option<ImageRef> {
        if image.is_empty() {
            tracing::warn!("attempted to add an empty image to the context");
            return None;
        }
        self.images.push_back(image);
        tracing::debug!(len = self.images.len(), "added image to context");
        if self.images.len() > self.capacity {
            tracing::debug!(
                capacity = self.capacity,
                "context limit reached; removed oldest image"
            );
            return self.images.pop_front();
        }
        None
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn snapshot_for_send(&self) -> Vec<ImageRef> {
        self.images.iter().cloned().collect()
    }

    pub fn build_request(
        &self,
        prompt_text: &str,
        provider: ProviderSelector,
        quality: Quality,
    ) -> Result<GenerationRequest, ComposeError> {
        let prompt_text = prompt_text.trim();
        let snapshot = self.snapshot_for_send();
        if prompt_text.is_empty() && snapshot.is_empty() {
            return Err(ComposeError::NothingToSend);
        }
        Ok(GenerationRequest::new(
            prompt_text.to_string(),
            snapshot,
            quality,
            provider,
        ))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRef> {
        self.images.iter()
    }

    /// Label for the context counter; empty when there is nothing to show.
    pub fn counter_label(&self) -> String {
        match self.images.len() {
            0 => String::new(),
            1 => "1 Image".to_string(),
            count => format!("{count} Images"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> ImageRef {
        ImageRef::new("image/png", vec![tag])
    }

    #[test]
    fn append_keeps_last_ten_in_order() {
        let mut buffer = ContextBuffer::new();
        let mut evicted = Vec::new();
        for tag in 0..25u8 {
            if let Some(old) = buffer.append(image(tag)) {
                evicted.push(old.bytes()[0]);
            }
            assert!(buffer.len() <= MAX_CONTEXT_IMAGES);
        }
        let kept: Vec<u8> = buffer.iter().map(|image| image.bytes()[0]).collect();
        assert_eq!(kept, (15..25u8).collect::<Vec<_>>());
        assert_eq!(evicted, (0..15u8).collect::<Vec<_>>());
    }

    #[test]
    fn append_ignores_empty_images() {
        let mut buffer = ContextBuffer::new();
        assert_eq!(buffer.append(ImageRef::new("image/png", Vec::<u8>::new())), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_always_empties() {
        let mut buffer = ContextBuffer::new();
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        for tag in 0..13u8 {
            buffer.append(image(tag));
        }
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.counter_label(), "");
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let mut buffer = ContextBuffer::new();
        buffer.append(image(1));
        let request = buffer
            .build_request("edit this", ProviderSelector::OpenAi, Quality::Low)
            .unwrap_or_else(|err| panic!("unexpected compose error: {err}"));
        buffer.append(image(2));
        buffer.clear();
        assert_eq!(request.context_images().len(), 1);
        assert_eq!(request.context_images()[0].bytes(), &[1]);
        assert_eq!(request.quality(), Quality::Low);
    }

    #[test]
    fn empty_prompt_requires_context() {
        let mut buffer = ContextBuffer::new();
        assert_eq!(
            buffer.build_request("   ", ProviderSelector::Gemini, Quality::Auto),
            Err(ComposeError::NothingToSend)
        );

        for tag in 0..3u8 {
            buffer.append(image(tag));
        }
        let request = buffer
            .build_request("", ProviderSelector::Gemini, Quality::Auto)
            .unwrap_or_else(|err| panic!("unexpected compose error: {err}"));
        assert_eq!(request.prompt_text(), "");
        assert_eq!(request.context_images().len(), 3);
        assert_eq!(request.endpoint_path(), "/api/generate-gemini");
    }

    #[test]
    fn counter_label_pluralizes() {
        let mut buffer = ContextBuffer::new();
        buffer.append(image(1));
        assert_eq!(buffer.counter_label(), "1 Image");
        buffer.append(image(2));
        assert_eq!(buffer.counter_label(), "2 Images");
    }
}
