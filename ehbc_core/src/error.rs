use thiserror::Error;

/// Everything that can go wrong while looking up a collection date.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not find the form token in {url}")]
    TokenMissing { url: String },

    /// Either the address is unknown or the search page changed, the response can't tell.
    #[error("could not find results identifier")]
    ResultsNotFound,

    #[error("unexpected search response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("could not find element {id} in the results")]
    MissingElement { id: &'static str },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("invalid lookup request: {0}")]
    InvalidRequest(String),
}
