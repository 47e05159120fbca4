use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bytes moved in each direction over the lifetime of the process.
///
/// Only complete wire units are counted. Both flows update their own
/// counter while a status report may read both at any time.
#[derive(Debug, Default)]
pub struct SessionCounters {
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "* Total received bytes: {}, total sent bytes: {}",
            self.bytes_received, self.bytes_sent
        )
    }
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            bytes_received: self.bytes_received(),
            bytes_sent: self.bytes_sent(),
        }
    }
}
