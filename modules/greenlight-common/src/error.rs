use thiserror::Error;

#[derive(Error, Debug)]
pub enum GreenlightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Fingerprint store error: {0}")]
    Store(String),

    #[error("Draft error: {0}")]
    Draft(String),

    #[error("Image sourcing error: {0}")]
    Imagery(String),

    /// A state the pipeline is defined to make unreachable (e.g. an image
    /// slot left empty after the generated fallback). Aborts the run.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
