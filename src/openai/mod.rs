//! OpenAI-compatible text generation and embedding provider.

pub mod client;
pub mod types;

pub use client::{AiError, Embedder, OpenAiClient, TextGenerator};
pub use types::GenerationRequest;
