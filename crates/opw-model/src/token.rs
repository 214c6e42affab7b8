use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key identifying one deferred computation within a worker process.
///
/// Two proxies resolve to the same slot exactly when their tokens are
/// equal. The policy is deliberately narrow: a token is either supplied
/// by the caller ([`Token::new`]) or derived from the in-process
/// address of the wrapped callable ([`Token::derived`]). Computations
/// that are merely equal by value do **not** dedupe.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TokenError {
    /// The caller-supplied name was empty or whitespace-only.
    #[error("token name is empty")]
    Empty,
}

impl Token {
    /// Caller-supplied token.
    ///
    /// Rejected before any proxy exists, so a bad name can never leave
    /// a half-registered computation behind.
    pub fn new(name: impl Into<String>) -> Result<Self, TokenError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self(name))
    }

    /// Token derived from the address of a computation body held in
    /// this process's memory.
    ///
    /// Stable for as long as the body allocation lives; distinct live
    /// bodies always map to distinct tokens.
    pub fn derived(addr: usize) -> Self {
        Self(format!("body@{addr:#x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_regular_names() {
        let token = Token::new("model-weights").unwrap();
        assert_eq!(token.as_str(), "model-weights");
        assert_eq!(token.to_string(), "model-weights");
    }

    #[test]
    fn new_rejects_empty_names() {
        assert_eq!(Token::new(""), Err(TokenError::Empty));
        assert_eq!(Token::new("   "), Err(TokenError::Empty));
    }

    #[test]
    fn derived_tokens_encode_the_address() {
        let token = Token::derived(0x1000);
        assert_eq!(token.as_str(), "body@0x1000");
    }

    #[test]
    fn equal_tokens_hash_alike() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Token::new("a").unwrap());
        assert!(set.contains(&Token::new("a").unwrap()));
        assert!(!set.contains(&Token::new("b").unwrap()));
    }
}
