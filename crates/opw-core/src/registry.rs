use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, OnceLock};

use opw_model::Token;
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::slot::Slot;

/// Per-process table mapping a [`Token`] to its singleton [`Slot`].
///
/// The registry is the only shared mutable structure in the system.
/// Its mutex guards the lookup-or-insert of slots and nothing else; a
/// computation body never runs under it, so unrelated tokens cannot
/// block each other here.
///
/// Cloning is cheap and every clone sees the same table. Most callers
/// want [`Registry::global`]; tests and embedders can hold isolated
/// instances instead of sharing one process-wide table.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Slots are stored type-erased so one table can hold computations
    /// with heterogeneous result types.
    slots: Mutex<HashMap<Token, Arc<dyn Any + Send + Sync>>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Create an isolated, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker-wide registry.
    ///
    /// Created on first use, lives for the rest of the process, never
    /// evicts a slot. This scoping is the whole point: the guarantee is
    /// "once per worker process".
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Look up the slot for `token`, inserting a fresh empty one if the
    /// token has never been seen by this registry.
    ///
    /// Lookup and insert happen under one lock acquisition, so two
    /// slots can never exist for the same token however many threads
    /// race here. Reusing a token at a different result type is
    /// reported as [`CoreError::TypeMismatch`] rather than silently
    /// shadowing the existing slot.
    pub fn get_or_create<T>(&self, token: &Token) -> CoreResult<Arc<Slot<T>>>
    where
        T: Send + Sync + 'static,
    {
        let mut slots = self.inner.slots.lock().unwrap();
        match slots.entry(token.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get())
                .downcast::<Slot<T>>()
                .map_err(|_| CoreError::TypeMismatch(token.clone())),
            Entry::Vacant(entry) => {
                let slot = Arc::new(Slot::<T>::new());
                entry.insert(slot.clone());
                trace!(token = %token, "slot created");
                Ok(slot)
            }
        }
    }

    /// Look up the slot for `token` without creating one.
    pub fn lookup<T>(&self, token: &Token) -> CoreResult<Option<Arc<Slot<T>>>>
    where
        T: Send + Sync + 'static,
    {
        let slots = self.inner.slots.lock().unwrap();
        match slots.get(token) {
            Some(slot) => Arc::clone(slot)
                .downcast::<Slot<T>>()
                .map(Some)
                .map_err(|_| CoreError::TypeMismatch(token.clone())),
            None => Ok(None),
        }
    }

    /// Whether a slot exists for `token` (at any result type).
    pub fn contains(&self, token: &Token) -> bool {
        self.inner.slots.lock().unwrap().contains_key(token)
    }

    /// Number of slots ever created in this registry.
    pub fn len(&self) -> usize {
        self.inner.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
