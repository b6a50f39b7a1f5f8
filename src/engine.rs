use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::EngineSettings;
use crate::ensemble::{build_candidates, Ensemble};
use crate::normalize::{normalize, MarketQuote};
use crate::portfolio::{select, Portfolio};
use crate::ranking::{rank, Opportunity, ScoredCandidate};
use crate::sources::{Registry, SourceMetrics, SourceSnapshot};

/// Counts from one cycle, for logs and the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleStats {
    pub sources: usize,
    pub connected: usize,
    pub games: usize,
    pub players: usize,
    pub props: usize,
    pub candidates: usize,
    pub synthesized_odds: usize,
    pub model_fallbacks: usize,
}

/// One snapshot scored, ranked and selected.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub opportunities: Vec<Opportunity>,
    pub portfolio: Portfolio,
    pub stats: CycleStats,
    pub market_quotes: Vec<MarketQuote>,
}

/// Everything the presentation layer may read. Nothing here reaches back
/// into connectors or payloads.
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutput {
    pub portfolio: Portfolio,
    /// Full ranked list, best first
    pub opportunities: Vec<Opportunity>,
    pub sources: BTreeMap<String, SourceMetrics>,
    /// Betting-operator equities, context for the market backdrop
    pub market_quotes: Vec<MarketQuote>,
    pub overall_quality: f64,
    pub overall_reliability: f64,
    /// No source connected; the output is empty by construction
    pub degraded: bool,
    pub settings: EngineSettings,
    pub stats: CycleStats,
    pub generated_at: DateTime<Utc>,
}

/// snapshot → normalize → score → rank → select.
pub struct Engine {
    settings: EngineSettings,
    ensemble: Ensemble,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        let ensemble = Ensemble::with_defaults(settings.model_timeout);
        Engine { settings, ensemble }
    }

    pub fn with_ensemble(settings: EngineSettings, ensemble: Ensemble) -> Self {
        Engine { settings, ensemble }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Score and rank one immutable snapshot.
    pub async fn evaluate(&self, snapshot: &[SourceSnapshot]) -> Evaluation {
        let data = normalize(snapshot);
        let candidates: Vec<Arc<_>> = build_candidates(&data, self.settings.sports)
            .into_iter()
            .map(Arc::new)
            .collect();
        let outputs = self.ensemble.score_all(candidates.clone()).await;

        let stats = CycleStats {
            sources: snapshot.len(),
            connected: snapshot.iter().filter(|s| s.state.connected).count(),
            games: data.games.len(),
            players: data.players.len(),
            props: data.props.len(),
            candidates: candidates.len(),
            synthesized_odds: data.synthesized_odds,
            model_fallbacks: outputs.iter().map(|o| o.fallback_count()).sum(),
        };

        let scored: Vec<ScoredCandidate> = candidates
            .iter()
            .zip(outputs)
            .map(|(c, output)| ScoredCandidate {
                candidate: c.as_ref().clone(),
                output,
            })
            .collect();

        let opportunities = rank(&scored, &self.settings);
        let top = opportunities.iter().filter(|o| o.value_grade.is_top()).count();
        let target = self.settings.portfolio_size.target(top);
        let portfolio = select(
            &opportunities,
            target,
            self.settings.correlation_cap,
            self.settings.investment,
        );
        Evaluation {
            opportunities,
            portfolio,
            stats,
            market_quotes: data.quotes,
        }
    }

    pub async fn run_cycle(&self, registry: &Registry) -> EngineOutput {
        let snapshot = registry.snapshot().await;
        let Evaluation {
            opportunities,
            portfolio,
            stats,
            market_quotes,
        } = self.evaluate(&snapshot).await;
        let degraded = stats.connected == 0;

        if degraded {
            warn!("No sources connected: output is empty");
        }
        if stats.model_fallbacks > 0 {
            warn!("{} scoring functions fell back to neutral votes this cycle", stats.model_fallbacks);
        }
        info!(
            "Cycle: {}/{} sources, {} games, {} players, {} props -> {} opportunities, {} picks",
            stats.connected,
            stats.sources,
            stats.games,
            stats.players,
            stats.props,
            opportunities.len(),
            portfolio.len()
        );

        EngineOutput {
            portfolio,
            opportunities,
            sources: registry.metrics().await,
            market_quotes,
            overall_quality: registry.overall_quality().await,
            overall_reliability: registry.overall_reliability().await,
            degraded,
            settings: self.settings.clone(),
            stats,
            generated_at: Utc::now(),
        }
    }
}
