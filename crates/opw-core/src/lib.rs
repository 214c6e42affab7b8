//! Process-local memoization core.
//!
//! Guarantees that a zero-argument computation runs at most once per
//! worker process, no matter how many tasks or threads inside that
//! process ask for its result. Three pieces:
//!
//! - [`Registry`]: the per-process table mapping a [`Token`] to its
//!   singleton slot.
//! - [`Slot`]: the `Empty → Running → Settled` state machine shared by
//!   every accessor of one token.
//! - [`Deferred`]: the cheap, clonable proxy handed to tasks; nothing
//!   runs until the first [`Deferred::force`].
//!
//! [`Token`]: opw_model::Token

mod error;
pub use error::{CoreError, CoreResult};

mod slot;
pub use slot::Slot;

mod registry;
pub use registry::Registry;

mod deferred;
pub use deferred::{Body, BodyError, Deferred, once_per_worker};

mod catalog;
pub use catalog::Catalog;

pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::{Catalog, Deferred, Registry, once_per_worker};
    pub use opw_model::{DeferredHandle, SettleState, Token};
}
