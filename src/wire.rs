//! Fixed-layout wire records shared with the reference (named-pipe)
//! transport.
//!
//! The record sizes are pinned so that `read`/`write` on the pipes can
//! detect partial frames: a read that doesn't return exactly
//! [`REQUEST_WIRE_SIZE`] (or [`RESPONSE_WIRE_SIZE`]) bytes is a malformed
//! frame, not a short read to retry.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::ServerError;

/// Capacity of the `path` field, including the null terminator.
pub const PATH_CAPACITY: usize = 256;

/// Capacity of the `digest` field, including the null terminator.
pub const DIGEST_CAPACITY: usize = 65;

/// Reserved sentinel path that requests a cache dump instead of a digest.
pub const CACHE_QUERY_CMD: &str = "CACHE?";

/// `client_id` (4 bytes) + `path` (`PATH_CAPACITY` bytes).
pub const REQUEST_WIRE_SIZE: usize = 4 + PATH_CAPACITY;

/// `digest` (`DIGEST_CAPACITY` bytes) + `status` (4 bytes).
pub const RESPONSE_WIRE_SIZE: usize = DIGEST_CAPACITY + 4;

/// Response status codes. `CacheMiss` is defined by the wire protocol but
/// intentionally never constructed by this server — see `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResponseStatus {
    /// Fresh computation, served by the owning worker.
    Ok = 0,
    /// The file could not be hashed.
    Error = 1,
    /// Reserved; never emitted.
    #[allow(dead_code)]
    CacheMiss = 2,
    /// Served from a previously completed cache entry.
    CacheHit = 3,
}

impl ResponseStatus {
    fn from_i32(value: i32) -> Result<Self, ServerError> {
        match value {
            0 => Ok(ResponseStatus::Ok),
            1 => Ok(ResponseStatus::Error),
            2 => Ok(ResponseStatus::CacheMiss),
            3 => Ok(ResponseStatus::CacheHit),
            other => Err(ServerError::Input(format!(
                "unrecognized response status {other}"
            ))),
        }
    }
}

/// What a dispatched request is asking the core to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Compute (or fetch from cache) the digest of a file path.
    Compute,
    /// Render the cache's contents to the diagnostic sink; no reply is sent.
    CacheDump,
}

/// A request as read off the transport, with its control/compute kind
/// already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Identifies the client's reply channel.
    pub client_id: i32,
    /// The file path to hash, or the literal `"CACHE?"` sentinel.
    pub path: String,
    /// Derived from `path` at construction time.
    pub kind: RequestKind,
}

impl Request {
    /// Build a request, classifying `CACHE?` as a [`RequestKind::CacheDump`].
    ///
    /// Returns `Err` if `path` (plus its null terminator) would not fit in
    /// [`PATH_CAPACITY`] bytes.
    pub fn new(client_id: i32, path: impl Into<String>) -> Result<Self, ServerError> {
        let path = path.into();
        if path.len() + 1 > PATH_CAPACITY {
            return Err(ServerError::Input(format!(
                "path of {} bytes exceeds capacity {}",
                path.len(),
                PATH_CAPACITY - 1
            )));
        }
        let kind = if path == CACHE_QUERY_CMD {
            RequestKind::CacheDump
        } else {
            RequestKind::Compute
        };
        Ok(Request {
            client_id,
            path,
            kind,
        })
    }

    /// Encode into the fixed-size wire layout.
    pub fn encode(&self) -> [u8; REQUEST_WIRE_SIZE] {
        let mut buf = [0u8; REQUEST_WIRE_SIZE];
        NativeEndian::write_i32(&mut buf[0..4], self.client_id);
        let path_bytes = self.path.as_bytes();
        buf[4..4 + path_bytes.len()].copy_from_slice(path_bytes);
        // Remaining bytes are already zeroed, which null-terminates the string.
        buf
    }

    /// Decode from the fixed-size wire layout.
    pub fn decode(buf: &[u8; REQUEST_WIRE_SIZE]) -> Result<Self, ServerError> {
        let client_id = NativeEndian::read_i32(&buf[0..4]);
        let path = decode_nul_terminated(&buf[4..])?;
        Request::new(client_id, path)
    }
}

/// A response as written to the client's reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Hex digest, or empty on error.
    pub digest: String,
    /// Outcome of the request.
    pub status: ResponseStatus,
}

impl Response {
    /// A fresh-compute success response.
    pub fn ok(digest: String) -> Self {
        Response {
            digest,
            status: ResponseStatus::Ok,
        }
    }

    /// A cache-hit success response.
    pub fn cache_hit(digest: String) -> Self {
        Response {
            digest,
            status: ResponseStatus::CacheHit,
        }
    }

    /// An error response; `digest` is left empty.
    pub fn error() -> Self {
        Response {
            digest: String::new(),
            status: ResponseStatus::Error,
        }
    }

    /// Encode into the fixed-size wire layout.
    pub fn encode(&self) -> Result<[u8; RESPONSE_WIRE_SIZE], ServerError> {
        if self.digest.len() + 1 > DIGEST_CAPACITY {
            return Err(ServerError::Input(format!(
                "digest of {} bytes exceeds capacity {}",
                self.digest.len(),
                DIGEST_CAPACITY - 1
            )));
        }
        let mut buf = [0u8; RESPONSE_WIRE_SIZE];
        let digest_bytes = self.digest.as_bytes();
        buf[0..digest_bytes.len()].copy_from_slice(digest_bytes);
        NativeEndian::write_i32(&mut buf[DIGEST_CAPACITY..], self.status as i32);
        Ok(buf)
    }

    /// Decode from the fixed-size wire layout.
    pub fn decode(buf: &[u8; RESPONSE_WIRE_SIZE]) -> Result<Self, ServerError> {
        let digest = decode_nul_terminated(&buf[0..DIGEST_CAPACITY])?;
        let status = ResponseStatus::from_i32(NativeEndian::read_i32(&buf[DIGEST_CAPACITY..]))?;
        Ok(Response { digest, status })
    }
}

fn decode_nul_terminated(buf: &[u8]) -> Result<String, ServerError> {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..len])
        .map(str::to_owned)
        .map_err(|e| ServerError::Input(format!("path/digest was not valid utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_the_wire() {
        let req = Request::new(1234, "/tmp/x").unwrap();
        let decoded = Request::decode(&req.encode()).unwrap();
        assert_eq!(req, decoded);
        assert_eq!(decoded.kind, RequestKind::Compute);
    }

    #[test]
    fn cache_query_sentinel_is_classified_as_cache_dump() {
        let req = Request::new(1, CACHE_QUERY_CMD).unwrap();
        assert_eq!(req.kind, RequestKind::CacheDump);
    }

    #[test]
    fn path_at_capacity_boundary_is_accepted_and_longer_is_rejected() {
        let max_path = "a".repeat(PATH_CAPACITY - 1);
        assert!(Request::new(1, max_path.clone()).is_ok());

        let too_long = "a".repeat(PATH_CAPACITY);
        assert!(Request::new(1, too_long).is_err());
    }

    #[test]
    fn response_round_trips_through_the_wire() {
        let resp = Response::ok("e".repeat(64));
        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn error_response_carries_empty_digest() {
        let resp = Response::error();
        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded.status, ResponseStatus::Error);
        assert_eq!(decoded.digest, "");
    }
}
