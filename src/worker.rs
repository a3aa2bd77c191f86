//! Fixed-size worker pool: the threads that actually pop work and reply.
//!
//! Each worker runs the same loop: pop, classify, and either own the
//! computation (creating the cache entry) or wait on someone else's. The
//! owner/waiter split is what makes duplicate suppression work without a
//! separate coordinator thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cache::{DigestCache, Terminal};
use crate::diagnostics::{self, DiagnosticSink};
use crate::digest::DigestFn;
use crate::queue::{PriorityQueue, WorkItem};
use crate::wire::{Request, RequestKind, Response};

/// A fixed pool of worker threads draining a shared [`PriorityQueue`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` threads, each running [`worker_loop`].
    pub fn spawn(
        worker_count: usize,
        queue: Arc<PriorityQueue>,
        cache: Arc<DigestCache>,
        digest_fn: Arc<dyn DigestFn>,
        transport: Arc<dyn crate::transport::Transport>,
        diagnostic_sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let handles = (0..worker_count)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let cache = Arc::clone(&cache);
                let digest_fn = Arc::clone(&digest_fn);
                let transport = Arc::clone(&transport);
                let diagnostic_sink = Arc::clone(&diagnostic_sink);
                thread::Builder::new()
                    .name(format!("digestd-worker-{id}"))
                    .spawn(move || worker_loop(&queue, &cache, &*digest_fn, &*transport, &*diagnostic_sink))
                    .expect("resource error: failed to spawn worker thread")
            })
            .collect();
        WorkerPool { handles }
    }

    /// Push one shutdown sentinel per worker and join every thread.
    /// Blocks until all in-flight work drains ahead of the sentinels.
    pub fn shutdown(self, queue: &PriorityQueue) {
        for _ in 0..self.handles.len() {
            // Maximal cost so every queued `Compute`/`CacheDump` item (cost
            // is a file size or zero) drains ahead of the sentinel.
            queue.push(crate::queue::QueueItem {
                item: WorkItem::Shutdown,
                cost: u64::MAX,
            });
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    queue: &PriorityQueue,
    cache: &DigestCache,
    digest_fn: &dyn DigestFn,
    transport: &dyn crate::transport::Transport,
    diagnostic_sink: &dyn DiagnosticSink,
) {
    loop {
        let queued = queue.pop();
        let request = match queued.item {
            WorkItem::Shutdown => return,
            WorkItem::Dispatch(request) => request,
        };

        match request.kind {
            RequestKind::CacheDump => handle_cache_dump(cache, diagnostic_sink),
            RequestKind::Compute => handle_compute(&request, cache, digest_fn, transport),
        }
    }
}

fn handle_cache_dump(cache: &DigestCache, diagnostic_sink: &dyn DiagnosticSink) {
    let snapshot = cache.snapshot();
    diagnostic_sink.emit(&diagnostics::render(&snapshot));
}

fn handle_compute(
    request: &Request,
    cache: &DigestCache,
    digest_fn: &dyn DigestFn,
    transport: &dyn crate::transport::Transport,
) {
    let (entry, created) = cache.lookup_or_insert(&request.path);

    let response = if created {
        let (hex, ok) = digest_fn.digest(&request.path);
        let outcome = if ok {
            Terminal::Ready(hex)
        } else {
            Terminal::Failed
        };
        cache.complete(&entry, outcome.clone());
        match outcome {
            Terminal::Ready(hex) => Response::ok(hex),
            Terminal::Failed => Response::error(),
        }
    } else {
        match cache.await_result(&entry) {
            Terminal::Ready(hex) => Response::cache_hit(hex),
            Terminal::Failed => Response::error(),
        }
    };

    if let Err(e) = transport.send_response(request.client_id, response) {
        log::warn!(
            "failed to deliver response to client {}: {e}",
            request.client_id
        );
    }
}
