use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request rejected as malformed: {0}")]
    Parameter(Value),

    #[error("access token invalid or expired")]
    AccessToken,

    /// Control-flow signal, not a failure: the account requires a second
    /// factor and the caller should prompt for a verification code.
    #[error("two-factor authentication required")]
    TwoFactorRequired,

    #[error("two-factor completion requested without a pending challenge")]
    NoPendingTwoFactor,

    #[error("username and password or an existing token are required")]
    MissingCredentials,

    /// Carries the raw response for diagnostics; the backend returned
    /// something no classifier recognizes.
    #[error("unrecognized API response: {0}")]
    UnknownApi(Value),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
}

pub type Result<T> = std::result::Result<T, ApiError>;
