//! Tool Relay - lets a chat model call OpenAPI-described HTTP services as tools.
//!
//! One request runs a fixed exchange:
//! - build a function registry from the supplied OpenAPI documents
//! - ask the model once, offering those functions
//! - execute the requested calls in order and append their results
//! - stream the model's final answer back to the caller

pub mod api;
pub mod config;
pub mod error;
pub mod invoker;
pub mod pipeline;
pub mod profile;

pub use config::Config;
pub use error::{ErrorKind, RelayError};
pub use invoker::{RequestMode, ToolFailurePolicy, ToolInvoker};
pub use pipeline::{ToolChat, ToolChatRequest};
pub use profile::{ConfigProfileSource, Profile, ProfileSource};
