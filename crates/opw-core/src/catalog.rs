use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use opw_model::{DeferredHandle, Token};
use tracing::trace;

use crate::deferred::{Body, BodyError, Deferred};
use crate::error::{CoreError, CoreResult};
use crate::registry::Registry;

/// Registry of computation bodies, looked up by token.
///
/// A [`DeferredHandle`] crossing a task or process boundary carries
/// identity only; the receiving side turns it back into a runnable
/// proxy by registering the body under the same token ahead of time and
/// calling [`Catalog::hydrate`]. Hydration in a process where the token
/// already settled resolves to the existing slot, so the body still
/// runs at most once.
pub struct Catalog<T> {
    bodies: Arc<RwLock<HashMap<Token, Arc<Body<T>>>>>,
}

impl<T> Catalog<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            bodies: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a body under `token`, replacing any previous entry.
    pub fn register<F>(&self, token: Token, body: F) -> &Self
    where
        F: Fn() -> Result<T, BodyError> + Send + Sync + 'static,
    {
        let mut bodies = self.bodies.write().unwrap();
        bodies.insert(token.clone(), Arc::new(body));
        trace!(token = %token, "body registered");
        self
    }

    /// Register an existing proxy's body under its own token, so that
    /// handles produced from it can be rehydrated here.
    pub fn register_deferred(&self, deferred: &Deferred<T>) -> &Self {
        let mut bodies = self.bodies.write().unwrap();
        bodies.insert(deferred.token().clone(), Arc::clone(deferred.body()));
        trace!(token = %deferred.token(), "proxy body registered");
        self
    }

    /// Remove the body registered under `token`.
    pub fn unregister(&self, token: &Token) -> bool {
        let mut bodies = self.bodies.write().unwrap();
        bodies.remove(token).is_some()
    }

    pub fn is_registered(&self, token: &Token) -> bool {
        let bodies = self.bodies.read().unwrap();
        bodies.contains_key(token)
    }

    pub fn count(&self) -> usize {
        let bodies = self.bodies.read().unwrap();
        bodies.len()
    }

    /// Rebuild a proxy from a received handle.
    ///
    /// Fails with [`CoreError::NotRegistered`] when no body was
    /// registered under the handle's token in this catalog.
    pub fn hydrate(
        &self,
        registry: &Registry,
        handle: &DeferredHandle,
    ) -> CoreResult<Deferred<T>> {
        let bodies = self.bodies.read().unwrap();
        let body = bodies
            .get(&handle.token)
            .cloned()
            .ok_or_else(|| CoreError::NotRegistered(handle.token.clone()))?;

        trace!(token = %handle.token, "handle hydrated");
        Ok(Deferred::from_parts(
            handle.token.clone(),
            registry.clone(),
            body,
        ))
    }
}

impl<T> Clone for Catalog<T> {
    fn clone(&self) -> Self {
        Self {
            bodies: Arc::clone(&self.bodies),
        }
    }
}

impl<T> Default for Catalog<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
