use opw_model::{Token, TokenError};
use thiserror::Error;

/// Errors surfaced by the registry, slots and proxies.
///
/// `Clone` is required: a settled failure is stored inside the slot and
/// re-signaled to every accessor, present and future.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("token `{0}` is already bound to a different result type")]
    TypeMismatch(Token),

    #[error("no computation registered for token `{0}`")]
    NotRegistered(Token),

    /// The one permitted execution of a computation body failed. The
    /// slot stays settled with this failure; there is no retry.
    #[error("computation `{token}` failed: {message}")]
    Failed { token: Token, message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
