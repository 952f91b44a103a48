//! Error taxonomy for provider calls and pipeline runs.
//!
//! Provider and network failures abort the current run and surface verbatim.
//! Parse failures (plan extraction, review fields) are not errors at all;
//! they are normal `None` outcomes handled at the call site.

use thiserror::Error;

/// Failure modes of a single provider completion call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key stored for a provider that requires one (or the vendor
    /// returned 401 for the key we sent).
    #[error("API key not set for {0}. Add one in settings.")]
    MissingCredential(String),

    /// Provider id has no entry in the registry.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// Vendor reply was missing expected fields (content text).
    #[error("unexpected response from AI provider")]
    InvalidResponse,

    #[error("rate limit reached. Please wait and try again.")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("server error ({0}). Please try again.")]
    Server(u16),

    /// Transport-level failure, carrying a human-readable cause.
    #[error("network error: {0}")]
    Network(String),
}

/// Terminal outcome of a pipeline run that did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The user rejected a completed stage. Deliberate, not an infrastructure
    /// failure.
    #[error("Pipeline stopped by user.")]
    Rejected,

    /// An earlier stage already failed; later stages must not run until the
    /// pipeline is re-planned.
    #[error("Pipeline has a failed stage and cannot continue.")]
    Blocked,
}
