use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{label} source error: {cause}")]
    Source { label: String, cause: anyhow::Error },

    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}
