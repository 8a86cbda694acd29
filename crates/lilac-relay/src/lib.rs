//! HTTP relay between the chat client and the image providers.
//!
//! Requests are validated into [`RelayRequest`], their context images decoded
//! concurrently, dispatched to OpenAI or Gemini and folded back into one
//! response shape.

pub mod config;
pub mod convert;
pub mod error;
pub mod normalize;
pub mod providers;
pub mod relay;
pub mod request;
pub mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::Relay;
pub use request::RelayRequest;
pub use server::{router, serve};
