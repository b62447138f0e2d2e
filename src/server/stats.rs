//! Per-session statistics and the reporter capability.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide source of connection handles. Only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_connection_id() -> u64 {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Counters for one connection, handed to the reporter once the session ends.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub id: u64,
    pub peer: Option<SocketAddr>,
    pub start: Instant,
    pub end: Option<Instant>,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub requests: u64,
}

impl SessionStats {
    pub fn new(id: u64, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            start: Instant::now(),
            end: None,
            bytes_read: 0,
            bytes_written: 0,
            requests: 0,
        }
    }

    pub(crate) fn record_read(&mut self, n: usize) {
        self.bytes_read += n as u64;
    }

    pub(crate) fn record_response(&mut self, written: usize) {
        self.requests += 1;
        self.bytes_written += written as u64;
    }

    pub(crate) fn finish(&mut self) {
        self.end = Some(Instant::now());
    }

    /// Session lifetime, or time elapsed so far if it has not ended.
    pub fn duration(&self) -> Duration {
        self.end.unwrap_or_else(Instant::now) - self.start
    }
}

/// Receives the finalized statistics of each session, exactly once.
///
/// Sessions only collect statistics when `ENABLED` is true, which is
/// decided by the reporter type rather than checked per field.
pub trait Reporter: Send + Sync + 'static {
    const ENABLED: bool = true;

    fn report(&self, stats: &SessionStats);
}

/// Reporter that turns statistics collection off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReporter;

impl Reporter for NoReporter {
    const ENABLED: bool = false;

    fn report(&self, _stats: &SessionStats) {}
}

impl<F> Reporter for F
where
    F: Fn(&SessionStats) + Send + Sync + 'static,
{
    fn report(&self, stats: &SessionStats) {
        self(stats)
    }
}
