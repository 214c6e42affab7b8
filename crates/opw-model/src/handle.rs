use serde::{Deserialize, Serialize};

use crate::Token;

/// Opaque, transmissible form of a deferred proxy.
///
/// A handle carries identity only. It can be copied into any number of
/// downstream task inputs, serialized across process boundaries and
/// handed back to a catalog for rehydration — none of which triggers
/// execution. The settled result itself never travels.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredHandle {
    pub token: Token,
}

impl DeferredHandle {
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

impl From<Token> for DeferredHandle {
    fn from(token: Token) -> Self {
        Self { token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_through_json() {
        let handle = DeferredHandle::new(Token::new("shared-loader").unwrap());

        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"token":"shared-loader"}"#);

        let back: DeferredHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }
}
