use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

use opw_model::{SettleState, Token};
use tracing::{debug, trace};

use crate::error::{CoreError, CoreResult};

/// Shared state machine for one computation.
///
/// A slot moves `Empty → Running → Settled` exactly once and never
/// back. The settled outcome (an `Arc` to the produced value, or the
/// captured failure) is owned by the slot for the rest of the process
/// lifetime; accessors only ever get clones of it.
#[derive(Debug)]
pub struct Slot<T> {
    state: Mutex<SlotState<T>>,
    settled: Condvar,
}

#[derive(Debug)]
enum SlotState<T> {
    Empty,
    Running,
    Settled(CoreResult<Arc<T>>),
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            settled: Condvar::new(),
        }
    }

    /// Current lifecycle state. Never blocks.
    pub fn state(&self) -> SettleState {
        match &*self.state.lock().unwrap() {
            SlotState::Empty => SettleState::Empty,
            SlotState::Running => SettleState::Running,
            SlotState::Settled(_) => SettleState::Settled,
        }
    }

    /// Settled outcome, if settlement already happened. Never blocks.
    pub fn try_get(&self) -> Option<CoreResult<Arc<T>>> {
        match &*self.state.lock().unwrap() {
            SlotState::Settled(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    /// Ensure the slot is settled, running `body` if this caller wins
    /// the `Empty → Running` race.
    ///
    /// Exactly one caller ever runs a body for this slot. The body runs
    /// with the slot lock released, so unrelated slots are never
    /// serialized behind it. Losers and late arrivals block until
    /// settlement and then observe the same outcome as the winner,
    /// including a captured failure.
    pub fn force_with<F>(&self, token: &Token, body: F) -> CoreResult<Arc<T>>
    where
        F: FnOnce() -> Result<T, crate::BodyError>,
    {
        let mut state = self.state.lock().unwrap();
        loop {
            match &*state {
                SlotState::Settled(outcome) => return outcome.clone(),
                SlotState::Running => {
                    trace!(token = %token, "waiting on in-flight computation");
                    state = self.settled.wait(state).unwrap();
                }
                SlotState::Empty => {
                    *state = SlotState::Running;
                    drop(state);
                    return self.run(token, body);
                }
            }
        }
    }

    /// Winner path: run the body, settle, wake every waiter.
    fn run<F>(&self, token: &Token, body: F) -> CoreResult<Arc<T>>
    where
        F: FnOnce() -> Result<T, crate::BodyError>,
    {
        debug!(token = %token, "running computation body");

        // A panicking body must still settle the slot, otherwise every
        // waiter is stranded in Running forever.
        let outcome = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => Ok(Arc::new(value)),
            Ok(Err(err)) => Err(CoreError::Failed {
                token: token.clone(),
                message: err.to_string(),
            }),
            Err(payload) => Err(CoreError::Failed {
                token: token.clone(),
                message: panic_message(payload),
            }),
        };

        let mut state = self.state.lock().unwrap();
        *state = SlotState::Settled(outcome.clone());
        self.settled.notify_all();
        drop(state);

        match &outcome {
            Ok(_) => debug!(token = %token, "computation settled"),
            Err(err) => debug!(token = %token, error = %err, "computation settled with failure"),
        }
        outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "computation body panicked".to_string()
    }
}
