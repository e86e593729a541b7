use thiserror::Error;

/// Why a URL could not be turned into a document
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed URL, or a well-formed URL missing the id its source needs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote answered but access is restricted
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Extraction finished without producing any text
    #[error("no content: {0}")]
    NoContent(String),

    /// Anything else a collaborator raised
    #[error("external failure: {0:#}")]
    ExternalFailure(eyre::Report),
}

impl ExtractError {
    pub fn external(msg: impl std::fmt::Display) -> Self {
        ExtractError::ExternalFailure(eyre::eyre!("{msg}"))
    }
}

impl From<eyre::Report> for ExtractError {
    fn from(report: eyre::Report) -> Self {
        ExtractError::ExternalFailure(report)
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::ExternalFailure(eyre::Report::new(err))
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::ExternalFailure(eyre::Report::new(err))
    }
}
