//! Chat completion and embedding capability for Quarry.
//!
//! Every backend implements [`LlmProvider`]; callers that need runtime
//! selection hold an [`AnyProvider`].

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
