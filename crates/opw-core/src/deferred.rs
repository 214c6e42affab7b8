use std::fmt;
use std::sync::Arc;

use opw_model::{DeferredHandle, SettleState, Token};

use crate::error::CoreResult;
use crate::registry::Registry;

/// Error type a computation body may return. Converted into the
/// permanent settled failure of the slot.
pub type BodyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A zero-argument computation body.
pub type Body<T> = dyn Fn() -> Result<T, BodyError> + Send + Sync;

/// Cheap, clonable proxy for a computation that runs at most once per
/// worker process.
///
/// Construction never executes the body. The first [`Deferred::force`]
/// anywhere in the process (on this proxy, a clone of it, or an
/// independently built proxy carrying the same token) triggers exactly
/// one execution; every accessor converges on the same `Arc`'d value
/// or the same captured failure.
pub struct Deferred<T> {
    token: Token,
    registry: Registry,
    body: Arc<Body<T>>,
}

impl<T> Deferred<T>
where
    T: Send + Sync + 'static,
{
    /// Proxy keyed by the in-process address of `body`.
    ///
    /// Clones of the returned proxy share one token and therefore one
    /// execution. A second `Deferred::new` over a behaviorally
    /// identical but separately constructed closure gets a different
    /// token and runs independently — dedupe is by reference, not by
    /// value.
    pub fn new<F>(registry: &Registry, body: F) -> Self
    where
        F: Fn() -> Result<T, BodyError> + Send + Sync + 'static,
    {
        let body: Arc<Body<T>> = Arc::new(body);
        let token = Token::derived(Arc::as_ptr(&body) as *const () as usize);
        Self {
            token,
            registry: registry.clone(),
            body,
        }
    }

    /// Proxy keyed by a caller-supplied token.
    ///
    /// Independently constructed proxies with the same name resolve to
    /// the same slot. The only construction-time failure in the system
    /// is an invalid name, reported here before any proxy exists.
    pub fn named<F>(
        registry: &Registry,
        name: impl Into<String>,
        body: F,
    ) -> CoreResult<Self>
    where
        F: Fn() -> Result<T, BodyError> + Send + Sync + 'static,
    {
        let token = Token::new(name)?;
        Ok(Self::from_parts(token, registry.clone(), Arc::new(body)))
    }

    pub(crate) fn from_parts(token: Token, registry: Registry, body: Arc<Body<T>>) -> Self {
        Self {
            token,
            registry,
            body,
        }
    }

    /// Resolve the slot and return the settled value, triggering the
    /// single execution if nobody has yet.
    ///
    /// Blocks while another accessor is mid-execution for this token.
    /// A settled failure is re-signaled here on every call, without the
    /// body ever running again. Calls on the returned `Arc<T>` are the
    /// caller's own; any fault in them propagates untouched.
    pub fn force(&self) -> CoreResult<Arc<T>> {
        let slot = self.registry.get_or_create::<T>(&self.token)?;
        slot.force_with(&self.token, || (self.body)())
    }

    /// Settled outcome if settlement already happened; never triggers
    /// or blocks.
    pub fn try_get(&self) -> Option<CoreResult<Arc<T>>> {
        match self.registry.lookup::<T>(&self.token) {
            Ok(Some(slot)) => slot.try_get(),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }

    /// Lifecycle state of the underlying slot. A token this registry
    /// has never resolved reads as [`SettleState::Empty`].
    pub fn state(&self) -> SettleState {
        match self.registry.lookup::<T>(&self.token) {
            Ok(Some(slot)) => slot.state(),
            _ => SettleState::Empty,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state() == SettleState::Settled
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub(crate) fn body(&self) -> &Arc<Body<T>> {
        &self.body
    }

    /// Identity-only handle, safe to serialize and route to downstream
    /// tasks. See [`crate::Catalog`] for turning a received handle back
    /// into a proxy.
    pub fn handle(&self) -> DeferredHandle {
        DeferredHandle::new(self.token.clone())
    }
}

// Manual impl: cloning a proxy must not require `T: Clone`. A clone
// shares the token, registry and body, never the computation.
impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            registry: self.registry.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("token", &self.token)
            .field("state", &self.state().kind())
            .finish()
    }
}

/// Proxy over the worker-wide [`Registry::global`] table, keyed by the
/// body's in-process address. The conventional entry point.
pub fn once_per_worker<T, F>(body: F) -> Deferred<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Result<T, BodyError> + Send + Sync + 'static,
{
    Deferred::new(Registry::global(), body)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use opw_model::TokenError;

    use super::*;
    use crate::error::CoreError;

    #[test]
    fn construction_does_not_execute() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred = Deferred::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42u32)
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(deferred.state(), SettleState::Empty);
        assert!(deferred.try_get().is_none());

        let value = deferred.force().unwrap();
        assert_eq!(*value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_force_shares_one_value() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred = Deferred::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("loaded".to_string())
        });

        let first = deferred.force().unwrap();
        let second = deferred.force().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(deferred.is_settled());
    }

    #[test]
    fn clones_share_the_computation() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred = Deferred::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1u8)
        });
        let copy = deferred.clone();

        assert_eq!(deferred.token(), copy.token());
        let a = deferred.force().unwrap();
        let b = copy.force().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_proxies_dedupe_by_name() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        let a = Deferred::named(&registry, "weights", move || {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok(7u32)
        })
        .unwrap();
        let c2 = Arc::clone(&calls);
        let b = Deferred::named(&registry, "weights", move || {
            c2.fetch_add(1, Ordering::SeqCst);
            Ok(8u32)
        })
        .unwrap();

        let va = a.force().unwrap();
        let vb = b.force().unwrap();

        assert!(Arc::ptr_eq(&va, &vb));
        assert_eq!(*va, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_name_is_a_construction_error() {
        let registry = Registry::new();
        let err = Deferred::named(&registry, "  ", || Ok(0u8)).unwrap_err();
        assert!(matches!(err, CoreError::Token(TokenError::Empty)));
        assert!(registry.is_empty());
    }

    #[test]
    fn separately_built_bodies_do_not_dedupe() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        let a = Deferred::new(&registry, move || {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok(0u32)
        });
        let c2 = Arc::clone(&calls);
        let b = Deferred::new(&registry, move || {
            c2.fetch_add(1, Ordering::SeqCst);
            Ok(0u32)
        });

        assert_ne!(a.token(), b.token());
        a.force().unwrap();
        b.force().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failure_is_resignaled_to_every_accessor() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred: Deferred<u32> = Deferred::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("no such shard".into())
        });
        let late = deferred.clone();

        let first = deferred.force();
        let second = deferred.force();
        let third = late.force();

        for outcome in [first, second, third] {
            assert!(
                matches!(outcome, Err(CoreError::Failed { ref message, .. }) if message == "no such shard")
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn racing_forces_execute_once() {
        const THREADS: usize = 10;

        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let counter = Arc::clone(&calls);
        let deferred = Deferred::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(25));
            Ok("singleton".to_string())
        });

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let deferred = deferred.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    deferred.force().unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for value in &values[1..] {
            assert!(Arc::ptr_eq(&values[0], value));
        }
    }

    #[test]
    fn once_per_worker_settles_in_the_global_registry() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred = once_per_worker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(5u32)
        });

        // The slot appears in the worker-wide table only on first force.
        assert!(!Registry::global().contains(deferred.token()));
        assert_eq!(*deferred.force().unwrap(), 5);
        assert!(Registry::global().contains(deferred.token()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_carries_the_token_only() {
        let registry = Registry::new();
        let deferred = Deferred::named(&registry, "shared-loader", || Ok(1u8)).unwrap();

        let handle = deferred.handle();
        assert_eq!(&handle.token, deferred.token());

        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"token":"shared-loader"}"#);
    }

    #[test]
    fn debug_shows_token_and_state() {
        let registry = Registry::new();
        let deferred = Deferred::named(&registry, "dbg", || Ok(1u8)).unwrap();

        let repr = format!("{deferred:?}");
        assert!(repr.contains("dbg"));
        assert!(repr.contains("empty"));

        deferred.force().unwrap();
        assert!(format!("{deferred:?}").contains("settled"));
    }
}
