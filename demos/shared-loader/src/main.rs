//! Ten "tasks" (threads) inside one worker process share a single slow
//! resource load through deferred proxies, then the same handle is
//! rehydrated from its serialized form as a downstream task would
//! receive it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use opw_core::prelude::*;
use opw_observe::{LoggerConfig, logger_init};

/// Stand-in for per-worker state that is expensive to build and cannot
/// be serialized: model weights, a connection pool, a mapped index.
struct EmbeddingIndex {
    dimensions: usize,
}

impl EmbeddingIndex {
    fn lookup(&self, key: &str) -> usize {
        key.len() * self.dimensions
    }
}

fn main() -> anyhow::Result<()> {
    let cfg = LoggerConfig {
        level: "debug".to_string(),
        ..Default::default()
    };
    logger_init(&cfg)?;

    let registry = Registry::new();
    let catalog: Catalog<EmbeddingIndex> = Catalog::new();
    let loads = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&loads);
    let index = Deferred::named(&registry, "embedding-index", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        info!("loading embedding index (slow)...");
        thread::sleep(Duration::from_millis(800));
        Ok(EmbeddingIndex { dimensions: 384 })
    })?;
    catalog.register_deferred(&index);

    info!(proxy = ?index, "proxy constructed, nothing loaded yet");

    // An unrelated fast computation must settle while the slow load is
    // in flight.
    let motd = Deferred::named(&registry, "motd", || Ok("worker ready".to_string()))?;

    let started = Instant::now();
    let workers: Vec<_> = (0..10)
        .map(|task| {
            let index = index.clone();
            thread::spawn(move || {
                let waited = Instant::now();
                let idx = index.force().expect("index load failed");
                info!(
                    task,
                    waited_ms = waited.elapsed().as_millis() as u64,
                    sample = idx.lookup("hello"),
                    "task got the shared index"
                );
            })
        })
        .collect();

    info!(motd = %motd.force()?, "fast token settled independently");

    for worker in workers {
        worker.join().expect("task panicked");
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        loads = loads.load(Ordering::SeqCst),
        "ten tasks, one load"
    );

    // Scheduler boundary: only the identity travels.
    let wire = serde_json::to_string(&index.handle())?;
    info!(wire = %wire, "handle as routed to downstream tasks");

    let received: DeferredHandle = serde_json::from_str(&wire)?;
    let downstream = catalog.hydrate(&registry, &received)?;
    let idx = downstream.force()?;
    info!(
        loads = loads.load(Ordering::SeqCst),
        dimensions = idx.dimensions,
        "rehydrated handle joined the settled slot"
    );

    Ok(())
}
