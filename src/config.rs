//! Process configuration: CLI flags via `clap`, with the same defaults as
//! the reference server.

use clap::Parser;

use crate::transport::{DEFAULT_REQUEST_FIFO, DEFAULT_RESPONSE_FIFO_PREFIX};

/// Concurrent SHA-256 digest server: shortest-job-first scheduling over a
/// fixed worker pool, with per-path duplicate-suppression caching.
#[derive(Parser, Debug, Clone)]
#[command(name = "digestd", version, about)]
pub struct Cli {
    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Backoff between empty non-blocking reads of the request fifo,
    /// matching the reference server's `usleep(SERVER_IDLE_SLEEP_US)`.
    #[arg(long, default_value_t = 10)]
    pub idle_poll_interval_ms: u64,

    /// Path of the shared request FIFO. Must match `transport::DEFAULT_REQUEST_FIFO`.
    #[arg(long, default_value = "/tmp/sha256_req_fifo")]
    pub request_fifo: String,

    /// Prefix for per-client response FIFOs; full path is
    /// `"{prefix}_{client_id}_fifo"`.
    #[arg(long, default_value = "/tmp/sha256_resp")]
    pub response_fifo_prefix: String,
}

impl Cli {
    /// Validate and convert into a [`ServerConfig`].
    pub fn into_config(self) -> Result<ServerConfig, String> {
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        Ok(ServerConfig {
            workers: self.workers,
            idle_poll_interval_ms: self.idle_poll_interval_ms,
            request_fifo: self.request_fifo,
            response_fifo_prefix: self.response_fifo_prefix,
        })
    }
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub workers: usize,
    pub idle_poll_interval_ms: u64,
    pub request_fifo: String,
    pub response_fifo_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            workers: 4,
            idle_poll_interval_ms: 10,
            request_fifo: DEFAULT_REQUEST_FIFO.to_string(),
            response_fifo_prefix: DEFAULT_RESPONSE_FIFO_PREFIX.to_string(),
        }
    }
}
