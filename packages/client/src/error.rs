//! Client-side errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("user id '{0}' is already connected to this session")]
    DuplicateUser(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}
