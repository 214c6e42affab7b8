//! Shared model types for the once-per-worker crates.
//!
//! This crate carries the identity and handle types that cross crate
//! (and wire) boundaries. It deliberately knows nothing about slots,
//! registries or execution — those live in `opw-core`.

mod token;
pub use token::{Token, TokenError};

mod handle;
pub use handle::DeferredHandle;

mod state;
pub use state::SettleState;
