use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::config::DataMode;
use crate::engine::EngineOutput;

/// Latest engine output, swapped in whole after every cycle.
pub type SharedOutput = Arc<RwLock<Option<EngineOutput>>>;

#[derive(Clone)]
pub struct AppState {
    pub output: SharedOutput,
    pub mode: DataMode,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub mode: DataMode,
    pub connected_sources: usize,
    pub overall_quality: f64,
    pub opportunities: usize,
    pub last_cycle: Option<DateTime<Utc>>,
}

/// Build the Axum router for the read-only output API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/output", get(output_handler))
        .route("/api/portfolio", get(portfolio_handler))
        .route("/api/opportunities", get(opportunities_handler))
        .route("/api/sources", get(sources_handler))
        .route("/api/quotes", get(quotes_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Project a view out of the latest output, or 503 before the first cycle.
async fn latest<T, F>(state: &AppState, view: F) -> ApiResult<T>
where
    F: FnOnce(&EngineOutput) -> T,
{
    state
        .output
        .read()
        .await
        .as_ref()
        .map(|o| Json(view(o)))
        .ok_or((
            StatusCode::SERVICE_UNAVAILABLE,
            "No engine cycle has completed yet".to_string(),
        ))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mode = serde_json::to_string(&state.mode).unwrap_or_default();
    Html(DASHBOARD_HTML.replace("{{MODE}}", mode.trim_matches('"')))
}

/// GET /api/output
async fn output_handler(State(state): State<Arc<AppState>>) -> ApiResult<EngineOutput> {
    latest(&state, EngineOutput::clone).await
}

/// GET /api/portfolio
async fn portfolio_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<crate::portfolio::Portfolio> {
    latest(&state, |o| o.portfolio.clone()).await
}

/// GET /api/opportunities
async fn opportunities_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<crate::ranking::Opportunity>> {
    latest(&state, |o| o.opportunities.clone()).await
}

/// GET /api/sources
async fn sources_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<std::collections::BTreeMap<String, crate::sources::SourceMetrics>> {
    latest(&state, |o| o.sources.clone()).await
}

/// GET /api/quotes
async fn quotes_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<crate::normalize::MarketQuote>> {
    latest(&state, |o| o.market_quotes.clone()).await
}

/// GET /api/health. Always 200; `status` says whether data is usable.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    let guard = state.output.read().await;
    let health = match guard.as_ref() {
        None => Health {
            status: "starting",
            mode: state.mode,
            connected_sources: 0,
            overall_quality: 0.0,
            opportunities: 0,
            last_cycle: None,
        },
        Some(o) => Health {
            status: if o.degraded { "degraded" } else { "ok" },
            mode: state.mode,
            connected_sources: o.sources.values().filter(|s| s.connected).count(),
            overall_quality: o.overall_quality,
            opportunities: o.opportunities.len(),
            last_cycle: Some(o.generated_at),
        },
    };
    Json(health)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>SportsEdge</title>
<style>
  body { font-family: system-ui, sans-serif; background: #0f1115; color: #e6e6e6; margin: 2rem; }
  table { border-collapse: collapse; width: 100%; margin-bottom: 2rem; }
  th, td { padding: .4rem .6rem; border-bottom: 1px solid #2a2d35; text-align: left; }
  .badge { padding: .2rem .5rem; border-radius: 4px; background: #2a2d35; }
  .degraded { color: #f0a04b; }
</style>
</head>
<body>
<h1>SportsEdge <span class="badge">{{MODE}}</span></h1>
<p id="status">Waiting for the first cycle...</p>
<h2>Portfolio</h2>
<table id="portfolio"><thead><tr><th>Pick</th><th>Grade</th><th>Conf</th><th>EV%</th><th>Stake</th></tr></thead><tbody></tbody></table>
<h2>Sources</h2>
<table id="sources"><thead><tr><th>Source</th><th>Connected</th><th>Quality</th><th>Reliability</th><th>Error</th></tr></thead><tbody></tbody></table>
<h2>Market</h2>
<table id="quotes"><thead><tr><th>Symbol</th><th>Price</th><th>Change %</th></tr></thead><tbody></tbody></table>
<script>
async function refresh() {
  const res = await fetch('/api/output');
  if (!res.ok) return;
  const out = await res.json();
  const status = document.getElementById('status');
  status.textContent = out.degraded
    ? 'No sources connected'
    : `${out.opportunities.length} opportunities, quality ${out.overall_quality.toFixed(2)}, updated ${out.generated_at}`;
  status.className = out.degraded ? 'degraded' : '';
  document.querySelector('#portfolio tbody').innerHTML = out.portfolio.picks.map(p =>
    `<tr><td>${p.description}</td><td>${p.value_grade}</td><td>${p.confidence.toFixed(1)}</td>` +
    `<td>${p.expected_value.toFixed(1)}</td><td>${p.stake.toFixed(2)}</td></tr>`).join('');
  document.querySelector('#sources tbody').innerHTML = Object.entries(out.sources).map(([id, s]) =>
    `<tr><td>${id}</td><td>${s.connected}</td><td>${s.quality.toFixed(2)}</td>` +
    `<td>${s.reliability.toFixed(2)}</td><td>${s.last_error ?? ''}</td></tr>`).join('');
  document.querySelector('#quotes tbody').innerHTML = out.market_quotes.map(q =>
    `<tr><td>${q.symbol}</td><td>${q.price.toFixed(2)}</td><td>${q.change_pct.toFixed(2)}</td></tr>`).join('');
}
refresh();
setInterval(refresh, 15000);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::engine::Engine;
    use crate::sources::{ConnectorSettings, DemoFetcher, FetcherFactory, Registry, SourceDescriptor, SourceFetcher};

    struct DemoFactory;

    impl FetcherFactory for DemoFactory {
        fn fetcher_for(&self, _d: &SourceDescriptor) -> Arc<dyn SourceFetcher> {
            Arc::new(DemoFetcher::today())
        }
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            output: Arc::new(RwLock::new(None)),
            mode: DataMode::Demo,
        })
    }

    #[tokio::test]
    async fn views_are_unavailable_before_first_cycle() {
        let s = state();
        let err = output_handler(State(s.clone())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert!(portfolio_handler(State(s.clone())).await.is_err());

        let Json(health) = health_handler(State(s)).await;
        assert_eq!(health.status, "starting");
        assert!(health.last_cycle.is_none());
    }

    #[tokio::test]
    async fn degraded_output_is_served_not_hidden() {
        let s = state();
        let registry = Registry::new(ConnectorSettings::default(), Arc::new(DemoFactory));
        let out = Engine::new(EngineSettings::default()).run_cycle(&registry).await;
        *s.output.write().await = Some(out);

        let Json(opps) = opportunities_handler(State(s.clone())).await.unwrap();
        assert!(opps.is_empty());
        let Json(sources) = sources_handler(State(s.clone())).await.unwrap();
        assert!(sources.is_empty());
        let Json(health) = health_handler(State(s)).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.overall_quality, 0.0);
    }

    #[tokio::test]
    async fn market_quotes_are_served_after_a_cycle() {
        let s = state();
        assert!(quotes_handler(State(s.clone())).await.is_err());

        let registry = Registry::new(ConnectorSettings::default(), Arc::new(DemoFactory));
        registry
            .initialize_all(crate::sources::catalog::default_descriptors(crate::config::SportFilter::All))
            .await;
        let out = Engine::new(EngineSettings::default()).run_cycle(&registry).await;
        *s.output.write().await = Some(out);

        let Json(quotes) = quotes_handler(State(s)).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "DKNG");
    }

    #[tokio::test]
    async fn index_shows_data_mode() {
        let html = index_handler(State(state())).await.into_response();
        assert_eq!(html.status(), StatusCode::OK);
    }
}
