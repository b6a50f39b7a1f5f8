use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::correlation::pairwise_correlation;
use crate::ranking::Opportunity;

/// A selected opportunity with its recommended stake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pick {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    /// Kelly fraction × investment
    pub stake: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    /// Mean EV%, per unit staked
    pub expected_return: f64,
    /// Mean EV% over the EV spread (floored at 1)
    pub risk_adjusted_return: f64,
    /// Mean per-pick win probability
    pub win_probability: f64,
    /// Probability that every pick wins, assuming independence
    pub parlay_probability: f64,
    pub max_drawdown: f64,
    /// Distinct sports + platforms + bet types over 3 × size
    pub diversification: f64,
    pub max_pairwise_correlation: f64,
    pub total_stake: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Portfolio {
    /// In ranking order
    pub picks: Vec<Pick>,
    pub target_size: usize,
    pub correlation_cap: f64,
    /// Candidates passed over because they correlated with a pick
    pub skipped_correlated: usize,
    pub metrics: PortfolioMetrics,
}

impl Portfolio {
    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

fn metrics(picks: &[Pick]) -> PortfolioMetrics {
    if picks.is_empty() {
        return PortfolioMetrics::default();
    }
    let n = picks.len() as f64;
    let evs: Vec<f64> = picks.iter().map(|p| p.opportunity.expected_value).collect();
    let mean_ev = evs.iter().sum::<f64>() / n;
    let std_ev = (evs.iter().map(|e| (e - mean_ev).powi(2)).sum::<f64>() / n).sqrt();

    let sports: HashSet<_> = picks.iter().map(|p| p.opportunity.sport).collect();
    let platforms: HashSet<_> = picks.iter().map(|p| p.opportunity.platform.as_str()).collect();
    let markets: HashSet<_> = picks.iter().map(|p| p.opportunity.market.as_str()).collect();

    let mut max_corr: f64 = 0.0;
    for (i, a) in picks.iter().enumerate() {
        for b in &picks[i + 1..] {
            max_corr = max_corr.max(pairwise_correlation(&a.opportunity, &b.opportunity));
        }
    }

    PortfolioMetrics {
        expected_return: mean_ev,
        risk_adjusted_return: mean_ev / std_ev.max(1.0),
        win_probability: picks.iter().map(|p| p.opportunity.confidence / 100.0).sum::<f64>() / n,
        parlay_probability: picks.iter().map(|p| p.opportunity.confidence / 100.0).product(),
        max_drawdown: picks
            .iter()
            .map(|p| p.opportunity.historical_drawdown)
            .fold(0.0, f64::max),
        diversification: (sports.len() + platforms.len() + markets.len()) as f64 / (3.0 * n),
        max_pairwise_correlation: max_corr,
        total_stake: picks.iter().map(|p| p.stake).sum(),
    }
}

/// Greedy walk down the ranked list. A candidate joins only if its
/// correlation with every pick so far is strictly below `correlation_cap`;
/// the walk stops at `target_size` picks or when the list runs out.
pub fn select(ranked: &[Opportunity], target_size: usize, correlation_cap: f64, investment: f64) -> Portfolio {
    let mut picks: Vec<Pick> = Vec::with_capacity(target_size);
    let mut skipped = 0;

    for candidate in ranked {
        if picks.len() >= target_size {
            break;
        }
        let blocker = picks
            .iter()
            .map(|p| (p, pairwise_correlation(&p.opportunity, candidate)))
            .find(|(_, corr)| *corr >= correlation_cap);
        if let Some((p, corr)) = blocker {
            debug!(
                "Skipping {}: correlation {:.2} with {}",
                candidate.description, corr, p.opportunity.description
            );
            skipped += 1;
            continue;
        }
        picks.push(Pick {
            opportunity: candidate.clone(),
            stake: candidate.kelly_fraction * investment,
        });
    }

    let metrics = metrics(&picks);
    info!(
        "Portfolio: {}/{} picks from {} ranked ({} skipped for correlation), EV {:.1}%, stake {:.2}",
        picks.len(),
        target_size,
        ranked.len(),
        skipped,
        metrics.expected_return,
        metrics.total_stake
    );

    Portfolio {
        picks,
        target_size,
        correlation_cap,
        skipped_correlated: skipped,
        metrics,
    }
}
