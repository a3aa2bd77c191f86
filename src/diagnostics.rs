//! Rendering for the `CACHE?` diagnostic command.
//!
//! The reference server prints this straight to stdout; we route it
//! through a [`DiagnosticSink`] so production logs through `log` like
//! everything else, and tests can capture the exact text.

use crate::cache::SnapshotState;

/// Receives the rendered cache dump. No transport reply is ever sent for
/// a `CACHE?` request — delivery is purely through this sink.
pub trait DiagnosticSink: Send + Sync {
    /// Emit one already-formatted dump, newline-free at the edges.
    fn emit(&self, rendered: &str);
}

/// Default sink: logs the dump at `info` level, one `log::info!` call per
/// line so it interleaves sanely with other log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, rendered: &str) {
        for line in rendered.lines() {
            log::info!("{line}");
        }
    }
}

/// Render a cache snapshot in the reference format:
/// ```text
/// --- CACHE ---
/// <path> : <digest-or-empty> [READY|PENDING|FAILED]
/// --------------
/// ```
pub fn render(snapshot: &[(String, SnapshotState)]) -> String {
    let mut out = String::from("--- CACHE ---\n");
    for (path, state) in snapshot {
        let (digest, tag) = match state {
            SnapshotState::Ready(hex) => (hex.as_str(), "READY"),
            SnapshotState::Pending => ("", "PENDING"),
            SnapshotState::Failed => ("", "FAILED"),
        };
        out.push_str(&format!("{path} : {digest} [{tag}]\n"));
    }
    out.push_str("--------------");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_reference_dump_format() {
        let snapshot = vec![
            (
                "/tmp/a".to_string(),
                SnapshotState::Ready("f".repeat(64)),
            ),
            ("/tmp/b".to_string(), SnapshotState::Pending),
            ("/tmp/c".to_string(), SnapshotState::Failed),
        ];
        let rendered = render(&snapshot);
        assert_eq!(
            rendered,
            format!(
                "--- CACHE ---\n/tmp/a : {} [READY]\n/tmp/b :  [PENDING]\n/tmp/c :  [FAILED]\n--------------",
                "f".repeat(64)
            )
        );
    }

    #[test]
    fn empty_cache_renders_just_the_banners() {
        assert_eq!(render(&[]), "--- CACHE ---\n--------------");
    }
}
