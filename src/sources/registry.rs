use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::connector::{ConnectorSettings, SourceConnector};
use super::descriptor::{ProviderKind, SourceCategory, SourceDescriptor};
use super::fetcher::{FetcherFactory, SourceFetcher};
use super::state::{SourceSnapshot, SourceState};
use crate::error::ErrorClass;
use crate::models::Sport;

/// Per-source view for the output surface. Never exposes payloads.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMetrics {
    pub name: String,
    pub category: SourceCategory,
    pub provider: ProviderKind,
    pub sport: Option<Sport>,
    pub connected: bool,
    pub quality: f64,
    pub reliability: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_class: Option<ErrorClass>,
    pub retry_count: u32,
    pub rate_limited: bool,
    pub rate_limit_remaining: u32,
    pub demo: bool,
}

/// Cancels a background refresh loop. Dropping it aborts the task.
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RefreshHandle {
    /// Signal the loop and wait for it to finish its current refresh.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Owns every connector and the only copy of each `SourceState`.
///
/// Bulk operations fan out concurrently and always resolve. Each bulk refresh
/// takes a token from a monotonically increasing counter; a refresh whose
/// token is no longer the latest when its fetches complete drops its results.
pub struct Registry {
    settings: ConnectorSettings,
    factory: Arc<dyn FetcherFactory>,
    connectors: RwLock<HashMap<String, Arc<SourceConnector>>>,
    descriptors: RwLock<HashMap<String, SourceDescriptor>>,
    states: RwLock<HashMap<String, SourceState>>,
    refresh_token: AtomicU64,
    background: Mutex<Option<RefreshHandle>>,
    updates: watch::Sender<u64>,
}

impl Registry {
    pub fn new(settings: ConnectorSettings, factory: Arc<dyn FetcherFactory>) -> Self {
        let (updates, _) = watch::channel(0);
        Registry {
            settings,
            factory,
            connectors: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            refresh_token: AtomicU64::new(0),
            background: Mutex::new(None),
            updates,
        }
    }

    /// Register a source with a fresh state. Re-registering an id resets its
    /// state, including `retry_count`.
    pub async fn register(&self, descriptor: SourceDescriptor) {
        let fetcher = self.factory.fetcher_for(&descriptor);
        self.register_with(descriptor, fetcher).await;
    }

    pub async fn register_with(&self, descriptor: SourceDescriptor, fetcher: Arc<dyn SourceFetcher>) {
        let id = descriptor.id.clone();
        let connector = SourceConnector::new(descriptor.clone(), fetcher, self.settings.clone());
        self.states
            .write()
            .await
            .insert(id.clone(), SourceState::new(&descriptor));
        self.descriptors.write().await.insert(id.clone(), descriptor);
        self.connectors.write().await.insert(id, Arc::new(connector));
    }

    /// Register every descriptor and run the first refresh.
    pub async fn initialize_all(&self, descriptors: Vec<SourceDescriptor>) -> HashMap<String, SourceState> {
        let count = descriptors.len();
        for d in descriptors {
            self.register(d).await;
        }
        self.refresh_all().await;
        let states = self.states.read().await.clone();
        let connected = states.values().filter(|s| s.connected).count();
        info!("Initialized {} sources ({} connected)", count, connected);
        states
    }

    /// Refresh every source concurrently. Returns `false` when a newer
    /// refresh superseded this one and its results were discarded.
    pub async fn refresh_all(&self) -> bool {
        self.refresh_where(|_, _| true).await
    }

    /// Refresh only the sources whose own poll interval has elapsed since
    /// their last refresh. Returns `false` when nothing was due or the
    /// results were superseded.
    pub async fn refresh_due(&self) -> bool {
        let now = tokio::time::Instant::now();
        self.refresh_where(|d, s| {
            s.last_polled
                .map_or(true, |at| now.saturating_duration_since(at) >= d.poll_interval())
        })
        .await
    }

    async fn refresh_where<F>(&self, due: F) -> bool
    where
        F: Fn(&SourceDescriptor, &SourceState) -> bool,
    {
        let connectors: Vec<Arc<SourceConnector>> =
            self.connectors.read().await.values().cloned().collect();
        let current = self.states.read().await.clone();

        let futures: Vec<_> = connectors
            .into_iter()
            .filter_map(|c| {
                let state = current.get(&c.descriptor().id)?.clone();
                due(c.descriptor(), &state).then(|| async move { c.connect(state).await })
            })
            .collect();
        if futures.is_empty() {
            return false;
        }
        let token = self.refresh_token.fetch_add(1, Ordering::SeqCst) + 1;
        let results = futures_util::future::join_all(futures).await;

        let mut states = self.states.write().await;
        if self.refresh_token.load(Ordering::SeqCst) != token {
            debug!("Discarding results of superseded refresh #{}", token);
            return false;
        }
        for state in results {
            // A source disposed mid-flight stays gone.
            if let Some(slot) = states.get_mut(&state.id) {
                *slot = state;
            }
        }
        drop(states);
        self.updates.send_replace(token);
        true
    }

    /// Refresh one source. Results are dropped if a bulk refresh started
    /// in the meantime; the registry's current state is returned either way.
    pub async fn refresh(&self, id: &str) -> Option<SourceState> {
        let connector = self.connectors.read().await.get(id).cloned()?;
        let state = self.states.read().await.get(id).cloned()?;
        let token = self.refresh_token.load(Ordering::SeqCst);

        let state = connector.connect(state).await;

        let mut states = self.states.write().await;
        if self.refresh_token.load(Ordering::SeqCst) == token {
            if let Some(slot) = states.get_mut(id) {
                *slot = state;
            }
        } else {
            debug!("Discarding single refresh of '{}' superseded by a bulk refresh", id);
        }
        states.get(id).cloned()
    }

    async fn snapshots_where<F>(&self, keep: F) -> Vec<SourceSnapshot>
    where
        F: Fn(&SourceDescriptor, &SourceState) -> bool,
    {
        let descriptors = self.descriptors.read().await;
        let states = self.states.read().await;
        let mut out: Vec<SourceSnapshot> = descriptors
            .iter()
            .filter_map(|(id, d)| {
                let s = states.get(id)?;
                keep(d, s).then(|| SourceSnapshot {
                    descriptor: d.clone(),
                    state: s.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        out
    }

    /// Immutable copy of every registered source, ordered by id.
    pub async fn snapshot(&self) -> Vec<SourceSnapshot> {
        self.snapshots_where(|_, _| true).await
    }

    pub async fn get_by_category(&self, category: SourceCategory) -> Vec<SourceSnapshot> {
        self.snapshots_where(|d, _| d.category == category).await
    }

    pub async fn get_by_sport(&self, sport: Sport) -> Vec<SourceSnapshot> {
        self.snapshots_where(|d, _| d.sport == Some(sport)).await
    }

    pub async fn get_connected(&self) -> Vec<SourceSnapshot> {
        self.snapshots_where(|_, s| s.connected).await
    }

    pub async fn state(&self, id: &str) -> Option<SourceState> {
        self.states.read().await.get(id).cloned()
    }

    /// Mean quality over connected sources; exactly 0.0 when none are.
    pub async fn overall_quality(&self) -> f64 {
        let states = self.states.read().await;
        mean_over_connected(states.values(), |s| s.quality)
    }

    pub async fn overall_reliability(&self) -> f64 {
        let states = self.states.read().await;
        mean_over_connected(states.values(), |s| s.reliability)
    }

    pub async fn metrics(&self) -> BTreeMap<String, SourceMetrics> {
        let connectors = self.connectors.read().await;
        let descriptors = self.descriptors.read().await;
        let states = self.states.read().await;
        let mut out = BTreeMap::new();
        for (id, d) in descriptors.iter() {
            let Some(s) = states.get(id) else { continue };
            let rate_limit_remaining = match connectors.get(id) {
                Some(c) => c.rate_limit_remaining().await,
                None => 0,
            };
            out.insert(
                id.clone(),
                SourceMetrics {
                    name: d.name.clone(),
                    category: d.category,
                    provider: d.provider,
                    sport: d.sport,
                    connected: s.connected,
                    quality: s.quality,
                    reliability: s.reliability,
                    last_update: s.last_update,
                    last_error: s.last_error.clone(),
                    last_error_class: s.last_error_class,
                    retry_count: s.retry_count,
                    rate_limited: s.rate_limited,
                    rate_limit_remaining,
                    demo: s.demo,
                },
            );
        }
        out
    }

    /// Receiver notified with the refresh token after every applied bulk refresh.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Start periodic `refresh_due`, replacing any running loop. The loop
    /// ticks at `interval` or at the shortest poll interval among registered
    /// sources, whichever is shorter; each source is fetched only once its
    /// own interval has elapsed. The task holds only a weak reference, so it
    /// ends on its own once the registry is dropped.
    pub async fn start_background_refresh(self: &Arc<Self>, interval: Duration) {
        let (tx, mut rx) = oneshot::channel::<()>();
        let weak: Weak<Registry> = Arc::downgrade(self);
        let interval = self
            .descriptors
            .read()
            .await
            .values()
            .map(SourceDescriptor::poll_interval)
            .fold(interval, Duration::min)
            .max(Duration::from_secs(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; the caller has just initialized.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        let Some(registry) = weak.upgrade() else { break };
                        registry.refresh_due().await;
                    }
                }
            }
            debug!("Background refresh loop stopped");
        });

        let previous = self.background.lock().await.replace(RefreshHandle {
            task: Some(task),
            shutdown: Some(tx),
        });
        if let Some(handle) = previous {
            handle.stop().await;
        }
        info!("Background refresh every {:?}", interval);
    }

    pub async fn stop_background_refresh(&self) {
        let handle = self.background.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub async fn background_running(&self) -> bool {
        self.background
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Tear down: cancel the refresh loop, invalidate in-flight refreshes and
    /// forget every source.
    pub async fn dispose_all(&self) {
        self.stop_background_refresh().await;
        self.refresh_token.fetch_add(1, Ordering::SeqCst);
        self.connectors.write().await.clear();
        self.descriptors.write().await.clear();
        self.states.write().await.clear();
        info!("Registry disposed");
    }
}

fn mean_over_connected<'a, I, F>(states: I, field: F) -> f64
where
    I: Iterator<Item = &'a SourceState>,
    F: Fn(&SourceState) -> f64,
{
    let (sum, n) = states
        .filter(|s| s.connected)
        .fold((0.0, 0usize), |(sum, n), s| (sum + field(s), n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::backoff::BackoffPolicy;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicU32;

    struct CountingFetcher {
        calls: AtomicU32,
        fail: bool,
        /// Delay applied to the first call only
        first_delay: Duration,
    }

    impl CountingFetcher {
        fn ok() -> Arc<Self> {
            Arc::new(CountingFetcher {
                calls: AtomicU32::new(0),
                fail: false,
                first_delay: Duration::ZERO,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(CountingFetcher {
                calls: AtomicU32::new(0),
                fail: true,
                first_delay: Duration::ZERO,
            })
        }

        fn slow_first(delay: Duration) -> Arc<Self> {
            Arc::new(CountingFetcher {
                calls: AtomicU32::new(0),
                fail: false,
                first_delay: delay,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for CountingFetcher {
        async fn fetch(&self, _d: &SourceDescriptor) -> Result<Value, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 && !self.first_delay.is_zero() {
                tokio::time::sleep(self.first_delay).await;
            }
            if self.fail {
                return Err(SourceError::Forbidden("denied".into()));
            }
            Ok(json!({ "leagues": [], "events": [], "call": n }))
        }
    }

    struct NoFactory;

    impl FetcherFactory for NoFactory {
        fn fetcher_for(&self, _d: &SourceDescriptor) -> Arc<dyn SourceFetcher> {
            CountingFetcher::failing()
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new(
            ConnectorSettings {
                timeout: Duration::from_secs(5),
                backoff: BackoffPolicy::default(),
                jitter: 0.0,
            },
            Arc::new(NoFactory),
        ))
    }

    fn espn(id: &str, sport: Sport) -> SourceDescriptor {
        SourceDescriptor::new(id, id, ProviderKind::EspnScoreboard, "https://x").with_sport(sport)
    }

    #[tokio::test]
    async fn zero_connected_sources_yield_zero_quality() {
        let reg = registry();
        assert_eq!(reg.overall_quality().await, 0.0);

        let states = reg
            .initialize_all(vec![espn("a", Sport::Nba), espn("b", Sport::Nfl)])
            .await;
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|s| !s.connected));
        assert_eq!(reg.overall_quality().await, 0.0);
        assert_eq!(reg.overall_reliability().await, 0.0);
        assert!(reg.get_connected().await.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_others() {
        let reg = registry();
        reg.register_with(espn("good", Sport::Nba), CountingFetcher::ok()).await;
        reg.register_with(espn("bad", Sport::Nba), CountingFetcher::failing()).await;

        assert!(reg.refresh_all().await);
        let connected = reg.get_connected().await;
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].descriptor.id, "good");
        assert_relative_eq!(reg.overall_reliability().await, 0.92);

        let metrics = reg.metrics().await;
        assert_eq!(metrics["bad"].last_error_class, Some(ErrorClass::Forbidden));
        assert_eq!(metrics["bad"].retry_count, 1);
        assert!(metrics["good"].connected);
    }

    #[tokio::test]
    async fn filters_by_category_and_sport() {
        let reg = registry();
        reg.register_with(espn("espn-nba", Sport::Nba), CountingFetcher::ok()).await;
        reg.register_with(
            SourceDescriptor::new("odds-nfl", "Odds", ProviderKind::OddsApi, "https://x")
                .with_sport(Sport::Nfl),
            CountingFetcher::ok(),
        )
        .await;

        assert_eq!(reg.get_by_category(SourceCategory::Odds).await.len(), 1);
        assert_eq!(reg.get_by_sport(Sport::Nba).await[0].descriptor.id, "espn-nba");
        assert!(reg.get_by_sport(Sport::Mlb).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_refresh_is_discarded() {
        let reg = registry();
        let fetcher = CountingFetcher::slow_first(Duration::from_secs(3));
        reg.register_with(espn("a", Sport::Nba), fetcher.clone()).await;

        let older = {
            let reg = reg.clone();
            tokio::spawn(async move { reg.refresh_all().await })
        };
        while fetcher.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(reg.refresh_all().await);
        assert!(!older.await.unwrap());

        let state = reg.state("a").await.unwrap();
        assert_eq!(state.last_payload.unwrap()["call"], 2);
    }

    #[tokio::test]
    async fn single_refresh_updates_one_source() {
        let reg = registry();
        let a = CountingFetcher::ok();
        let b = CountingFetcher::ok();
        reg.register_with(espn("a", Sport::Nba), a.clone()).await;
        reg.register_with(espn("b", Sport::Nba), b.clone()).await;

        let state = reg.refresh("a").await.unwrap();
        assert!(state.connected);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert!(reg.refresh("missing").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_share_one_request_budget() {
        let reg = registry();
        let fetcher = CountingFetcher::slow_first(Duration::from_secs(3));
        reg.register_with(espn("a", Sport::Nba).with_hourly_limit(1), fetcher.clone()).await;

        let older = {
            let reg = reg.clone();
            tokio::spawn(async move { reg.refresh_all().await })
        };
        while fetcher.calls() == 0 {
            tokio::task::yield_now().await;
        }

        // The discarded refresh already spent the only request this hour.
        assert!(reg.refresh_all().await);
        assert!(!older.await.unwrap());
        assert_eq!(fetcher.calls(), 1);

        let state = reg.state("a").await.unwrap();
        assert!(state.rate_limited);
        assert_eq!(state.retry_count, 0);
        assert_eq!(reg.metrics().await["a"].rate_limit_remaining, 0);

        reg.refresh("a").await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_honours_per_source_poll_interval() {
        let reg = registry();
        let fast = CountingFetcher::ok();
        let slow = CountingFetcher::ok();
        reg.register_with(espn("fast", Sport::Nba).with_poll_interval(Duration::from_secs(30)), fast.clone())
            .await;
        reg.register_with(espn("slow", Sport::Nba).with_poll_interval(Duration::from_secs(300)), slow.clone())
            .await;

        reg.start_background_refresh(Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_secs(125)).await;
        // Ticks every 30s: at 30, 60, 90 and 120.
        assert_eq!(fast.calls(), 4);
        assert_eq!(slow.calls(), 1);

        tokio::time::sleep(Duration::from_secs(210)).await;
        assert_eq!(slow.calls(), 2);
        reg.stop_background_refresh().await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_due_means_no_refresh() {
        let reg = registry();
        let fetcher = CountingFetcher::ok();
        reg.register_with(espn("a", Sport::Nba), fetcher.clone()).await;

        assert!(reg.refresh_due().await);
        assert!(!reg.refresh_due().await);
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(reg.refresh_due().await);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn background_refresh_runs_until_stopped() {
        let reg = registry();
        let fetcher = CountingFetcher::ok();
        reg.register_with(espn("a", Sport::Nba).with_poll_interval(Duration::from_secs(60)), fetcher.clone())
            .await;
        let mut updates = reg.subscribe();

        reg.start_background_refresh(Duration::from_secs(60)).await;
        assert!(reg.background_running().await);
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(fetcher.calls(), 2);
        assert!(updates.has_changed().unwrap());
        let _ = updates.borrow_and_update();

        reg.stop_background_refresh().await;
        assert!(!reg.background_running().await);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn dispose_clears_everything() {
        let reg = registry();
        reg.register_with(espn("a", Sport::Nba), CountingFetcher::ok()).await;
        reg.refresh_all().await;
        reg.start_background_refresh(Duration::from_secs(60)).await;

        reg.dispose_all().await;
        assert!(reg.snapshot().await.is_empty());
        assert!(!reg.background_running().await);
        assert_eq!(reg.overall_quality().await, 0.0);
    }

    #[tokio::test]
    async fn reregistration_resets_retry_count() {
        let reg = registry();
        reg.register_with(espn("a", Sport::Nba), CountingFetcher::failing()).await;
        reg.refresh_all().await;
        assert_eq!(reg.state("a").await.unwrap().retry_count, 1);

        reg.register_with(espn("a", Sport::Nba), CountingFetcher::ok()).await;
        assert_eq!(reg.state("a").await.unwrap().retry_count, 0);
    }
}
