use crate::context::{ComposeError, ContextBuffer};
use crate::images::ImageRef;
use crate::requests::{GenerationRequest, GenerationResult, ProviderSelector, Quality};

pub const DEFAULT_ASSISTANT_CAPTION: &str = "Here is the generated image:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Composing,
    AwaitingResponse,
    Rendered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a request is already in flight")]
    Busy,
    #[error("no request is in flight")]
    NotAwaiting,
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    User {
        text: String,
        image: Option<ImageRef>,
    },
    Assistant {
        text: String,
        image: Option<ImageRef>,
    },
    Error {
        message: String,
    },
}

/// State for one chat: context window, selections, transcript and request phase.
#[derive(Debug, Clone)]
pub struct ChatSession {
    buffer: ContextBuffer,
    quality: Quality,
    provider: ProviderSelector,
    pending_upload: Option<ImageRef>,
    transcript: Vec<Turn>,
    phase: SessionPhase,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(ProviderSelector::default(), Quality::default())
    }
}

impl ChatSession {
    pub fn new(provider: ProviderSelector, quality: Quality) -> Self {
        Self {
            buffer: ContextBuffer::new(),
            quality,
            provider,
            pending_upload: None,
            transcript: Vec::new(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn context(&self) -> &ContextBuffer {
        &self.buffer
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn provider(&self) -> ProviderSelector {
        self.provider
    }

    pub fn set_provider(&mut self, provider: ProviderSelector) {
        self.provider = provider;
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn pending_upload(&self) -> Option<&ImageRef> {
        self.pending_upload.as_ref()
    }

    /// Uploads join the context right away, before anything is sent.
    pub fn attach_upload(&mut self, image: ImageRef) {
        if image.is_empty() {
            tracing::warn!("ignoring empty upload");
            return;
        }
        self.buffer.append(image.clone());
        self.pending_upload = Some(image);
        self.enter_composing();
    }

    /// Drops the preview only; the image stays in the context window.
    pub fn discard_upload(&mut self) {
        self.pending_upload = None;
    }

    pub fn clear_context(&mut self) {
        tracing::info!("resetting image context");
        self.buffer.clear();
    }

    pub fn can_send(&self, prompt: &str) -> bool {
        self.phase != SessionPhase::AwaitingResponse
            && (!prompt.trim().is_empty() || self.pending_upload.is_some())
    }

    pub fn begin_send(&mut self, prompt: &str) -> Result<GenerationRequest, SessionError> {
        if self.phase == SessionPhase::AwaitingResponse {
            return Err(SessionError::Busy);
        }
        let request = self
            .buffer
            .build_request(prompt, self.provider, self.quality)?;
        self.transcript.push(Turn::User {
            text: request.prompt_text().to_string(),
            image: self.pending_upload.take(),
        });
        self.phase = SessionPhase::AwaitingResponse;
        Ok(request)
    }

    /// Records the outcome of the in-flight request. Successful images become context.
    pub fn complete(&mut self, result: GenerationResult) -> Result<&Turn, SessionError> {
        if self.phase != SessionPhase::AwaitingResponse {
            return Err(SessionError::NotAwaiting);
        }
        let turn = match result {
            GenerationResult {
                success: true,
                text,
                image,
                ..
            } if text.is_some() || image.is_some() => {
                if let Some(image) = image.as_ref() {
                    self.buffer.append(image.clone());
                }
                self.phase = SessionPhase::Rendered;
                Turn::Assistant {
                    text: text
                        .filter(|value| !value.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_ASSISTANT_CAPTION.to_string()),
                    image,
                }
            }
            other => {
                let message = other
                    .error_message
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "The backend failed to process the request.".to_string());
                self.phase = SessionPhase::Failed(message.clone());
                Turn::Error {
                    message: format!("Oops! {message}"),
                }
            }
        };
        self.transcript.push(turn);
        self.transcript
            .last()
            .ok_or(SessionError::NotAwaiting)
    }

    /// Starts a new chat.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending_upload = None;
        self.transcript.clear();
        self.phase = SessionPhase::Idle;
    }

    fn enter_composing(&mut self) {
        if self.phase != SessionPhase::AwaitingResponse {
            self.phase = SessionPhase::Composing;
        }
    }
}
