use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authentication cancelled")]
    Cancelled,

    #[error("no such key: SAMLResponse")]
    MissingSamlResponse,

    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),

    #[error("no such role: {0}")]
    NoSuchRole(String),

    #[error("malformed role attribute value: {0}")]
    MalformedRoleValue(String),

    #[error("sign-in token request failed: {0}")]
    SigninStatus(String),

    #[error("default session duration hours must be between 1 and 12: {0}")]
    InvalidSessionDuration(String),
}
