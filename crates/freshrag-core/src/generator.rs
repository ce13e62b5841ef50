//! Generative-model capability trait.

use async_trait::async_trait;

use crate::error::GenerationError;

/// How the retrieved context is combined with the user's question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Persona as a system message, context and question as a single
    /// user-role message (chat endpoint, streamed).
    Chat,
    /// A single completion prompt embedding the context textually
    /// (generate endpoint, batched).
    Completion,
}

impl GenerationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "completion" => Some(Self::Completion),
            _ => None,
        }
    }
}

/// One generation call: retrieved context plus the original question.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub context: String,
    pub question: String,
    pub mode: GenerationMode,
}

/// Capability that produces an answer from a [`GenerationRequest`].
///
/// Implementations must surface network and timeout failures as
/// [`GenerationError`] rather than retrying; the caller decides whether
/// to retry.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
