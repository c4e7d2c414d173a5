use crate::completion::CompletionError;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Reference data could not be fetched. Fatal before the first parse.
    #[error("reference vocabulary unavailable: {0:#}")]
    VocabularyUnavailable(#[source] anyhow::Error),

    /// The completion reply was not the expected flat object.
    #[error("malformed fallback response: {0}")]
    MalformedFallbackResponse(String),

    #[error("completion service failure: {0}")]
    CompletionServiceFailure(#[from] CompletionError),
}
