//! Single ingress thread: reads requests off the transport, assigns each
//! a scheduling cost, and pushes it onto the priority queue.
//!
//! Cost is the file's byte size — the cheapest proxy for "how long will
//! this take to hash" without actually reading it. `CACHE?` requests and
//! files whose size can't be determined get cost zero, so they never
//! starve behind a large backlog.

use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::queue::{PriorityQueue, QueueItem, WorkItem};
use crate::transport::Transport;
use crate::wire::RequestKind;

/// The thread that feeds the [`PriorityQueue`] from a [`Transport`].
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the ingress thread.
    pub fn spawn(transport: Arc<dyn Transport>, queue: Arc<PriorityQueue>) -> Self {
        let handle = thread::Builder::new()
            .name("digestd-dispatcher".to_string())
            .spawn(move || dispatch_loop(&*transport, &queue))
            .expect("resource error: failed to spawn dispatcher thread");
        Dispatcher { handle }
    }

    /// Ask the transport to unblock the dispatcher, then join it.
    /// `FifoTransport` polls its shutdown flag between non-blocking reads
    /// so this always returns promptly; see `DESIGN.md`.
    pub fn shutdown(self, transport: &dyn Transport) {
        transport.request_shutdown();
        let _ = self.handle.join();
    }
}

fn dispatch_loop(transport: &dyn Transport, queue: &PriorityQueue) {
    loop {
        let request = match transport.recv_request() {
            Ok(request) => request,
            Err(e) => {
                log::info!("dispatcher stopping: {e}");
                return;
            }
        };

        let cost = match request.kind {
            RequestKind::CacheDump => 0,
            RequestKind::Compute => fs::metadata(&request.path).map(|m| m.len()).unwrap_or(0),
        };

        queue.push(QueueItem {
            item: WorkItem::Dispatch(request),
            cost,
        });
    }
}
