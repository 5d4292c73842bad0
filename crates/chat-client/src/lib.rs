//! Chat completion client for OpenAI-compatible APIs, with tool calling and streaming.

mod client;
mod error;
mod stream;
mod types;

pub use client::ChatClient;
pub use error::ChatError;
pub use stream::decode_sse;
pub use types::*;
