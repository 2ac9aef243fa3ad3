use thiserror::Error;

/// Failure taxonomy shared by every crate in the workspace.
///
/// - `Data`: missing/malformed corpus or a degenerate fit input
/// - `Artifact`: missing, unreadable or mismatched model/index files
/// - `Config`: an invalid parameter, rejected before reaching the core
#[derive(Debug, Error)]
pub enum Error {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn data(msg: impl Into<String>) -> Self { Self::Data(msg.into()) }
    pub fn artifact(msg: impl Into<String>) -> Self { Self::Artifact(msg.into()) }
    pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
}

pub type Result<T> = std::result::Result<T, Error>;
