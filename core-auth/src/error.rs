use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Malformed user profile: {0}")]
    MalformedProfile(String),

    #[error("Access token is empty")]
    EmptyToken,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        AuthError::StorageUnavailable(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
