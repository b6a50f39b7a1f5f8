use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::backoff::BackoffPolicy;
use super::descriptor::{ProviderKind, SourceDescriptor};
use super::fetcher::SourceFetcher;
use super::state::{RateLimitWindow, SourceState};
use crate::config::Config;
use crate::error::SourceError;

/// Knobs shared by every connector in a registry.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Half-width of the uniform jitter added to reliability baselines
    pub jitter: f64,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        ConnectorSettings {
            timeout: Duration::from_secs(12),
            backoff: BackoffPolicy::default(),
            jitter: 0.02,
        }
    }
}

impl ConnectorSettings {
    pub fn from_config(config: &Config) -> Self {
        ConnectorSettings {
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            backoff: BackoffPolicy::default().with_max_retries(config.max_retries),
            jitter: config.reliability_jitter,
        }
    }
}

/// Manages fetches for one named source.
///
/// The connector takes the registry's `SourceState` by value, works on it and
/// hands it back, so two in-flight fetches never share a record. The request
/// budget is the exception: it lives here, shared by every fetch of this
/// source, so requests made by a refresh whose results are later discarded
/// still count against the window.
pub struct SourceConnector {
    descriptor: SourceDescriptor,
    fetcher: Arc<dyn SourceFetcher>,
    settings: ConnectorSettings,
    rate_limit: Mutex<RateLimitWindow>,
}

impl SourceConnector {
    pub fn new(
        descriptor: SourceDescriptor,
        fetcher: Arc<dyn SourceFetcher>,
        settings: ConnectorSettings,
    ) -> Self {
        let rate_limit = Mutex::new(RateLimitWindow::new(descriptor.hourly_limit, RateLimitWindow::HOUR));
        SourceConnector {
            descriptor,
            fetcher,
            settings,
            rate_limit,
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub async fn rate_limit_remaining(&self) -> u32 {
        self.rate_limit.lock().await.remaining(Instant::now())
    }

    /// Fetch with delayed retries; always resolves.
    ///
    /// Every failure bumps `retry_count`. A delayed retry follows only for
    /// transient errors and only while the count before this failure is
    /// below the policy cap. Rate-limited requests are skipped without
    /// touching the count.
    pub async fn connect(&self, mut state: SourceState) -> SourceState {
        state.last_polled = Some(Instant::now());
        loop {
            let err = match self.attempt(&mut state).await {
                Ok(()) => return state,
                Err(SourceError::RateLimited(reason)) => {
                    debug!("Source '{}' skipped: {}", self.descriptor.id, reason);
                    return state;
                }
                Err(err) => err,
            };

            let spent = state.retry_count;
            state.retry_count = state.retry_count.saturating_add(1);

            if !err.is_transient() || !self.settings.backoff.allows_retry(spent) {
                warn!(
                    "Source '{}' failed ({:?}): {} (no retry, failures={})",
                    self.descriptor.id,
                    err.class(),
                    err,
                    state.retry_count
                );
                return state;
            }

            let delay = self.settings.backoff.delay_for(state.retry_count);
            warn!(
                "Source '{}' failed ({:?}): {}, retrying in {:?}",
                self.descriptor.id,
                err.class(),
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One fetch under the timeout and rate budget. Updates `state` in place.
    pub async fn attempt(&self, state: &mut SourceState) -> Result<(), SourceError> {
        let now = Instant::now();
        let blocked = {
            let mut window = self.rate_limit.lock().await;
            (!window.try_acquire(now)).then(|| (window.limit, window.resets_in(now)))
        };
        if let Some((limit, resets_in)) = blocked {
            let err = SourceError::RateLimited(format!(
                "{} requests/hour budget exhausted, resets in {:?}",
                limit, resets_in
            ));
            // The last good payload stays usable until the window reopens.
            state.rate_limited = true;
            state.last_error = Some(err.to_string());
            state.last_error_class = Some(err.class());
            return Err(err);
        }
        state.rate_limited = false;

        let result = tokio::time::timeout(self.settings.timeout, self.fetcher.fetch(&self.descriptor))
            .await
            .unwrap_or(Err(SourceError::ConnectionTimeout(self.settings.timeout)))
            .and_then(|payload| match payload {
                Value::Object(_) | Value::Array(_) => Ok(payload),
                other => Err(SourceError::MalformedPayload(format!(
                    "expected object or array, got {}",
                    json_type(&other)
                ))),
            });

        match result {
            Ok(payload) => {
                state.connected = true;
                state.quality = payload_quality(self.descriptor.provider, &payload);
                state.reliability = jittered_reliability(self.descriptor.provider, self.settings.jitter);
                state.last_update = Some(Utc::now());
                state.last_payload = Some(Arc::new(payload));
                state.last_error = None;
                state.last_error_class = None;
                state.demo = self.fetcher.is_demo();
                debug!(
                    "Source '{}' connected (quality={:.2}, reliability={:.2})",
                    self.descriptor.id, state.quality, state.reliability
                );
                Ok(())
            }
            Err(err) => {
                state.record_error(&err);
                Err(err)
            }
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn depth(v: &Value) -> usize {
    match v {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Size of the largest record list: the root array, or the longest array
/// directly under the root object.
fn record_count(v: &Value) -> usize {
    match v {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .values()
            .map(|child| match child {
                Value::Array(items) => items.len(),
                Value::Object(inner) => inner
                    .values()
                    .filter_map(Value::as_array)
                    .map(Vec::len)
                    .max()
                    .unwrap_or(0),
                _ => 0,
            })
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}

/// Shape heuristic in [0, 1]: expected keys dominate, nesting depth and
/// record count add a little, capped at 1.0.
pub fn payload_quality(kind: ProviderKind, payload: &Value) -> f64 {
    let root = match payload {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    let expected = kind.expected_keys();
    let key_score = match root.and_then(Value::as_object) {
        Some(obj) if !expected.is_empty() => {
            expected.iter().filter(|k| obj.contains_key(**k)).count() as f64
                / expected.len() as f64
        }
        _ => 0.0,
    };
    let depth_score = depth(payload).min(6) as f64 / 6.0;
    let record_score = record_count(payload).min(20) as f64 / 20.0;
    (0.6 * key_score + 0.2 * depth_score + 0.2 * record_score).min(1.0)
}

pub fn jittered_reliability(kind: ProviderKind, jitter: f64) -> f64 {
    let base = kind.reliability_baseline();
    let offset = if jitter > 0.0 {
        rand::thread_rng().gen_range(-jitter..=jitter)
    } else {
        0.0
    };
    (base + offset).clamp(0.0, 1.0)
}
