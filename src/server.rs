//! Wires the dispatcher, queue, cache, and worker pool into one running
//! server, and owns its orderly shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::DigestCache;
use crate::config::ServerConfig;
use crate::diagnostics::DiagnosticSink;
use crate::digest::DigestFn;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::queue::PriorityQueue;
use crate::transport::{FifoTransport, Transport};
use crate::worker::WorkerPool;

/// A running digest server: one dispatcher thread, a fixed worker pool,
/// and the queue and cache they share.
pub struct Server {
    queue: Arc<PriorityQueue>,
    cache: Arc<DigestCache>,
    transport: Arc<dyn Transport>,
    dispatcher: Option<Dispatcher>,
    worker_pool: Option<WorkerPool>,
}

impl Server {
    /// Build the reference server over a POSIX named-pipe transport.
    pub fn bootstrap(
        config: &ServerConfig,
        digest_fn: Arc<dyn DigestFn>,
        diagnostic_sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ServerError> {
        let transport = Arc::new(FifoTransport::new(
            config.request_fifo.clone(),
            config.response_fifo_prefix.clone(),
            Duration::from_millis(config.idle_poll_interval_ms),
        )?);
        Ok(Self::start(
            config,
            transport as Arc<dyn Transport>,
            digest_fn,
            diagnostic_sink,
        ))
    }

    /// Start the dispatcher and worker pool over an arbitrary transport.
    /// Used directly by tests with [`crate::transport::LoopbackTransport`].
    pub fn start(
        config: &ServerConfig,
        transport: Arc<dyn Transport>,
        digest_fn: Arc<dyn DigestFn>,
        diagnostic_sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let queue = Arc::new(PriorityQueue::new());
        let cache = Arc::new(DigestCache::new());

        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), Arc::clone(&queue));
        let worker_pool = WorkerPool::spawn(
            config.workers,
            Arc::clone(&queue),
            Arc::clone(&cache),
            digest_fn,
            Arc::clone(&transport),
            diagnostic_sink,
        );

        Server {
            queue,
            cache,
            transport,
            dispatcher: Some(dispatcher),
            worker_pool: Some(worker_pool),
        }
    }

    /// The shared cache, for out-of-band inspection (e.g. `try_get` in
    /// tests without a round trip through the transport).
    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// Stop the dispatcher, drain and stop every worker, then return.
    /// See `Dispatcher::shutdown` for the FIFO-transport caveat.
    pub fn shutdown(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown(&*self.transport);
        }
        if let Some(pool) = self.worker_pool.take() {
            pool.shutdown(&self.queue);
        }
    }
}
