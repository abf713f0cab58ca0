//! LlmClient trait

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// A chat-completion backend
///
/// Implementations make no structured-output guarantee; callers must parse
/// the returned text defensively.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a completion request to completion, suspending the caller until a
    /// response or error arrives
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
