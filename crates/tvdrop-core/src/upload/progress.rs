//! Rate limiting for upload progress notifications.

use std::time::{Duration, Instant};

const MIB: f64 = 1024.0 * 1024.0;

/// Average throughput in MB/s (MiB per second).
#[must_use]
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / MIB) / secs
    } else {
        0.0
    }
}

/// Decides when a progress notification is due.
///
/// A notification fires once `interval` has passed or `bytes_step` more
/// bytes arrived since the previous one, whichever comes first.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    started_at: Instant,
    interval: Duration,
    bytes_step: u64,
    last_emit_at: Instant,
    last_emit_bytes: u64,
    emitted: u64,
}

impl ProgressThrottle {
    /// Create a throttle for a transfer that started at `started_at`.
    #[must_use]
    pub fn new(started_at: Instant, interval: Duration, bytes_step: u64) -> Self {
        Self {
            started_at,
            interval,
            bytes_step: bytes_step.max(1),
            last_emit_at: started_at,
            last_emit_bytes: 0,
            emitted: 0,
        }
    }

    /// Record that `total_bytes` have been written as of `now`.
    ///
    /// Returns the throughput to report if a notification is due.
    pub fn observe(&mut self, total_bytes: u64, now: Instant) -> Option<f64> {
        let by_bytes = total_bytes.saturating_sub(self.last_emit_bytes) >= self.bytes_step;
        let by_time = now.saturating_duration_since(self.last_emit_at) >= self.interval;

        if !(by_bytes || by_time) {
            return None;
        }

        self.last_emit_at = now;
        self.last_emit_bytes = total_bytes;
        self.emitted += 1;
        Some(throughput_mbps(
            total_bytes,
            now.saturating_duration_since(self.started_at),
        ))
    }

    /// Number of notifications let through so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let mbps = throughput_mbps(10 * 1024 * 1024, Duration::from_secs(2));
        assert!((mbps - 5.0).abs() < f64::EPSILON);
        assert!(throughput_mbps(1, Duration::ZERO).abs() < f64::EPSILON);
    }

    #[test]
    fn test_byte_step_limits_notifications() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(start, Duration::from_secs(3600), 1024 * 1024);

        let chunk = 64 * 1024;
        let mut total = 0;
        let mut fired = 0;
        for i in 0..800u64 {
            total += chunk;
            if throttle
                .observe(total, start + Duration::from_millis(i))
                .is_some()
            {
                fired += 1;
            }
        }

        assert_eq!(fired, 50);
        assert_eq!(throttle.emitted(), 50);
    }

    #[test]
    fn test_interval_fires_for_slow_uploads() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(start, Duration::from_secs(1), 1024 * 1024);

        assert!(throttle
            .observe(10, start + Duration::from_millis(500))
            .is_none());
        let mbps = throttle
            .observe(20, start + Duration::from_millis(1000))
            .expect("interval elapsed");
        assert!(mbps > 0.0);
        assert!(throttle
            .observe(30, start + Duration::from_millis(1500))
            .is_none());
    }
}
