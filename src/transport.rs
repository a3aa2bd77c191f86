//! Client/server transport, abstracted behind the [`Transport`] trait.
//!
//! The reference implementation is [`FifoTransport`], a pair of POSIX named
//! pipes: one shared request pipe the dispatcher reads, and one
//! per-client response pipe the worker that serves a request writes to.
//! [`LoopbackTransport`] is an in-process stand-in with the same framing
//! and blocking semantics, used by the integration tests so they don't
//! depend on a filesystem FIFO.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use parking_lot::Mutex;

use crate::error::ServerError;
use crate::wire::{Request, Response, REQUEST_WIRE_SIZE, RESPONSE_WIRE_SIZE};

/// Default path of the shared request FIFO, matching the reference server.
pub const DEFAULT_REQUEST_FIFO: &str = "/tmp/sha256_req_fifo";

/// Default prefix for per-client response FIFOs; the full path is
/// `"{prefix}_{client_id}_fifo"`.
pub const DEFAULT_RESPONSE_FIFO_PREFIX: &str = "/tmp/sha256_resp";

/// Something that can receive requests and reply to individual clients.
///
/// `recv_request` is called by a single dispatcher thread; `send_response`
/// may be called concurrently by any worker thread, once per request.
pub trait Transport: Send + Sync {
    /// Block until the next request arrives.
    fn recv_request(&self) -> Result<Request, ServerError>;

    /// Deliver `response` to the client identified by `client_id`.
    ///
    /// Failure here (an unreachable client) must never poison cache state;
    /// callers log it and move on (§5, reply-failure scenario).
    fn send_response(&self, client_id: i32, response: Response) -> Result<(), ServerError>;

    /// Best-effort nudge to make a blocked `recv_request` return, so the
    /// dispatcher thread can exit during an orderly shutdown. The default
    /// no-op suits a transport whose `recv_request` already polls a stop
    /// condition on its own (as [`FifoTransport`] does); see `DESIGN.md`.
    fn request_shutdown(&self) {}
}

/// A POSIX-named-pipe transport matching the reference protocol exactly.
///
/// The request end is opened non-blocking, the same way the reference C
/// server opens it (`O_RDONLY | O_NONBLOCK`): `recv_request` polls for a
/// full frame every `idle_poll_interval`, checking `shutdown` between
/// attempts so `request_shutdown` can make it return promptly instead of
/// parking forever in a blocking `read`.
pub struct FifoTransport {
    request_fifo_path: PathBuf,
    response_fifo_prefix: String,
    request_reader: Mutex<File>,
    idle_poll_interval: Duration,
    shutdown: AtomicBool,
}

impl FifoTransport {
    /// Create both ends, creating the request FIFO if it doesn't exist.
    /// Response FIFOs are created lazily per client_id on first write, to
    /// match the reference: the client creates its own reply pipe.
    pub fn new(
        request_fifo_path: impl Into<PathBuf>,
        response_fifo_prefix: impl Into<String>,
        idle_poll_interval: Duration,
    ) -> Result<Self, ServerError> {
        let request_fifo_path = request_fifo_path.into();
        ensure_fifo(&request_fifo_path)?;
        let fd = open(
            &request_fifo_path,
            OFlag::O_RDONLY | OFlag::O_NONBLOCK,
            Mode::empty(),
        )
        .map_err(|e| ServerError::Resource(format!("opening request fifo: {e}")))?;
        // SAFETY: `open` just returned this fd; nothing else owns it yet.
        let request_reader = unsafe { File::from_raw_fd(fd) };
        Ok(FifoTransport {
            request_fifo_path,
            response_fifo_prefix: response_fifo_prefix.into(),
            request_reader: Mutex::new(request_reader),
            idle_poll_interval,
            shutdown: AtomicBool::new(false),
        })
    }

    fn response_fifo_path(&self, client_id: i32) -> PathBuf {
        PathBuf::from(format!("{}_{}_fifo", self.response_fifo_prefix, client_id))
    }
}

fn ensure_fifo(path: &Path) -> Result<(), ServerError> {
    if path.exists() {
        return Ok(());
    }
    mkfifo(path, Mode::from_bits_truncate(0o666))
        .map_err(|e| ServerError::Resource(format!("mkfifo {}: {e}", path.display())))
}

impl Transport for FifoTransport {
    fn recv_request(&self) -> Result<Request, ServerError> {
        let mut buf = [0u8; REQUEST_WIRE_SIZE];
        let mut reader = self.request_reader.lock();
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(ServerError::Input(
                    "request fifo: shutdown requested".to_string(),
                ));
            }
            match reader.read(&mut buf) {
                Ok(n) if n == REQUEST_WIRE_SIZE => return Request::decode(&buf),
                // Short read (including 0, meaning no writer is currently
                // open) or EAGAIN: no complete frame yet, same as the
                // reference server's `n != sizeof(req)` branch.
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ServerError::Input(format!("reading request fifo: {e}"))),
            }
            thread::sleep(self.idle_poll_interval);
        }
    }

    fn send_response(&self, client_id: i32, response: Response) -> Result<(), ServerError> {
        let path = self.response_fifo_path(client_id);
        ensure_fifo(&path)?;
        let mut writer = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| ServerError::Reply(format!("opening response fifo for client {client_id}: {e}")))?;
        let buf = response.encode()?;
        writer
            .write_all(&buf)
            .map_err(|e| ServerError::Reply(format!("writing response fifo for client {client_id}: {e}")))
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for FifoTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.request_fifo_path);
    }
}

/// In-process transport over channels, for tests. Each "client" is a
/// channel pair registered with [`LoopbackTransport::register_client`].
pub struct LoopbackTransport {
    requests: Receiver<Request>,
    request_sender: Mutex<Option<Sender<Request>>>,
    reply_senders: Mutex<HashMap<i32, Sender<Response>>>,
}

impl LoopbackTransport {
    /// Create an empty loopback transport.
    pub fn new() -> Self {
        let (request_sender, requests) = mpsc::channel();
        LoopbackTransport {
            requests,
            request_sender: Mutex::new(Some(request_sender)),
            reply_senders: Mutex::new(HashMap::new()),
        }
    }

    /// Register a client, returning a handle used to submit requests and
    /// receive its responses. Panics if called after `request_shutdown`.
    pub fn register_client(&self, client_id: i32) -> LoopbackClient {
        let (reply_sender, replies) = mpsc::channel();
        self.reply_senders.lock().insert(client_id, reply_sender);
        let request_sender = self
            .request_sender
            .lock()
            .as_ref()
            .expect("register_client called after request_shutdown")
            .clone();
        LoopbackClient {
            client_id,
            request_sender,
            replies,
        }
    }

    /// Drop a client's reply channel, simulating an unreachable client
    /// (the reply-failure scenario).
    pub fn disconnect_client(&self, client_id: i32) {
        self.reply_senders.lock().remove(&client_id);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn recv_request(&self) -> Result<Request, ServerError> {
        self.requests
            .recv()
            .map_err(|_| ServerError::Input("loopback transport: no producers remain".to_string()))
    }

    fn send_response(&self, client_id: i32, response: Response) -> Result<(), ServerError> {
        let senders = self.reply_senders.lock();
        let sender = senders
            .get(&client_id)
            .ok_or_else(|| ServerError::Reply(format!("client {client_id} is not reachable")))?;
        sender
            .send(response)
            .map_err(|_| ServerError::Reply(format!("client {client_id} is not reachable")))
    }

    fn request_shutdown(&self) {
        self.request_sender.lock().take();
    }
}

/// A test handle for one client registered with a [`LoopbackTransport`].
pub struct LoopbackClient {
    client_id: i32,
    request_sender: Sender<Request>,
    replies: Receiver<Response>,
}

impl LoopbackClient {
    /// Submit a request on behalf of this client.
    pub fn send(&self, path: impl Into<String>) -> Result<(), ServerError> {
        let request = Request::new(self.client_id, path)?;
        self.request_sender
            .send(request)
            .map_err(|_| ServerError::Input("loopback transport: dispatcher is gone".to_string()))
    }

    /// Block for this client's next response.
    pub fn recv(&self) -> Response {
        self.replies
            .recv()
            .expect("worker pool dropped without replying")
    }
}
