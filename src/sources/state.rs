use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::descriptor::SourceDescriptor;
use crate::error::{ErrorClass, SourceError};

/// Rolling request budget for one source.
///
/// The window opens on the first request and resets once `window` has
/// elapsed. Uses `tokio::time::Instant` so a paused test clock drives it.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitWindow {
    pub limit: u32,
    pub count: u32,
    #[serde(skip)]
    window: Duration,
    #[serde(skip)]
    reset_at: Option<Instant>,
}

impl RateLimitWindow {
    pub const HOUR: Duration = Duration::from_secs(3600);

    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimitWindow {
            limit,
            count: 0,
            window,
            reset_at: None,
        }
    }

    fn roll(&mut self, now: Instant) {
        match self.reset_at {
            Some(reset) if now < reset => {}
            _ => {
                self.count = 0;
                self.reset_at = Some(now + self.window);
            }
        }
    }

    /// Consume one request from the budget. Returns `false` (and consumes
    /// nothing) when the window is exhausted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.roll(now);
        if self.count >= self.limit {
            return false;
        }
        self.count += 1;
        true
    }

    pub fn remaining(&self, now: Instant) -> u32 {
        match self.reset_at {
            Some(reset) if now < reset => self.limit.saturating_sub(self.count),
            _ => self.limit,
        }
    }

    pub fn resets_in(&self, now: Instant) -> Duration {
        self.reset_at
            .map(|r| r.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

/// Mutable per-source record. Only the registry stores it; connectors work
/// on their own copy and hand it back on completion.
#[derive(Debug, Clone, Serialize)]
pub struct SourceState {
    pub id: String,
    pub connected: bool,
    pub quality: f64,
    pub reliability: f64,
    pub last_update: Option<DateTime<Utc>>,
    /// Opaque payload from the last successful fetch
    #[serde(skip)]
    pub last_payload: Option<Arc<serde_json::Value>>,
    pub last_error: Option<String>,
    pub last_error_class: Option<ErrorClass>,
    /// Failures over the lifetime of this registration; never decreases
    pub retry_count: u32,
    /// The most recent request was skipped because the budget was exhausted
    pub rate_limited: bool,
    /// When the last refresh of this source started
    #[serde(skip)]
    pub last_polled: Option<Instant>,
    /// Payloads are synthetic (demo mode)
    pub demo: bool,
}

impl SourceState {
    pub fn new(descriptor: &SourceDescriptor) -> Self {
        SourceState {
            id: descriptor.id.clone(),
            connected: false,
            quality: 0.0,
            reliability: 0.0,
            last_update: None,
            last_payload: None,
            last_error: None,
            last_error_class: None,
            retry_count: 0,
            rate_limited: false,
            last_polled: None,
            demo: false,
        }
    }

    pub(crate) fn record_error(&mut self, err: &SourceError) {
        self.connected = false;
        self.last_error = Some(err.to_string());
        self.last_error_class = Some(err.class());
    }
}

/// Descriptor plus state, the read-only view handed to the normalizer.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub descriptor: SourceDescriptor,
    pub state: SourceState,
}

impl SourceSnapshot {
    /// Payload of a connected source, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        if self.state.connected {
            self.state.last_payload.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn window_blocks_then_resets() {
        let mut w = RateLimitWindow::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(w.try_acquire(t0));
        assert!(w.try_acquire(t0));
        assert!(!w.try_acquire(t0));
        assert_eq!(w.count, 2);
        assert_eq!(w.remaining(t0), 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        let t1 = Instant::now();
        assert_eq!(w.remaining(t1), 2);
        assert!(w.try_acquire(t1));
        assert_eq!(w.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_request_consumes_nothing() {
        let mut w = RateLimitWindow::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(w.try_acquire(now));
        for _ in 0..5 {
            assert!(!w.try_acquire(now));
        }
        assert_eq!(w.count, 1);
        assert_eq!(w.resets_in(now), Duration::from_secs(60));
    }
}
