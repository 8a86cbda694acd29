//! Shared data model for the Lilac image chat: context images, requests and
//! results, the client session state machine and its event log.

pub mod chat;
pub mod context;
pub mod events;
pub mod images;
pub mod requests;
pub mod session;

pub use context::{ComposeError, ContextBuffer, MAX_CONTEXT_IMAGES};
pub use images::{ImageRef, ImageRefError};
pub use requests::{
    GenerateBody, GenerationRequest, GenerationResult, ProviderSelector, Quality, RelayResponse,
};
pub use session::{ChatSession, SessionError, SessionPhase, Turn};
