use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::models::default_functions;
use super::scoring::{Candidate, ModelVote, ScoringFunction, Vote};
use crate::error::SourceError;

/// Smallest denominator used anywhere a mean or weight sum could vanish.
pub const EPSILON: f64 = 1e-9;

/// Confidence of the neutral vote substituted for a function that missed
/// its budget or produced garbage.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Spread of the logistic mapping from consensus value to over probability.
pub fn line_scale(line: f64) -> f64 {
    (0.15 * line.abs()).max(0.75)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Consensus {
    pub value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleOutput {
    pub consensus: Consensus,
    /// Dispersion-based agreement in [0, 1]
    pub agreement: f64,
    pub votes: Vec<ModelVote>,
}

impl EnsembleOutput {
    /// Probability the outcome lands over `line`, read off the consensus value.
    pub fn over_probability(&self, line: f64) -> f64 {
        let z = (self.consensus.value - line) / line_scale(line);
        1.0 / (1.0 + (-z).exp())
    }

    pub fn fallback_count(&self) -> usize {
        self.votes.iter().filter(|v| v.fallback).count()
    }
}

/// Weighted consensus over a set of votes.
///
/// value = Σ(w·c·v) / Σ(w·c), confidence = Σ(w·c) / Σw,
/// agreement = max(0, 1 − stddev(v) / max(|mean(v)|, ε)).
pub fn combine(votes: Vec<ModelVote>) -> EnsembleOutput {
    if votes.is_empty() {
        return EnsembleOutput {
            consensus: Consensus {
                value: 0.0,
                confidence: 0.0,
            },
            agreement: 0.0,
            votes,
        };
    }

    let n = votes.len() as f64;
    let weight_sum: f64 = votes.iter().map(|v| v.weight).sum();
    let wc_sum: f64 = votes.iter().map(|v| v.weight * v.confidence).sum();
    let mean = votes.iter().map(|v| v.predicted_value).sum::<f64>() / n;

    let value = if wc_sum > EPSILON {
        votes
            .iter()
            .map(|v| v.weight * v.confidence * v.predicted_value)
            .sum::<f64>()
            / wc_sum
    } else {
        mean
    };
    let confidence = (wc_sum / weight_sum.max(EPSILON)).clamp(0.0, 1.0);

    let variance = votes
        .iter()
        .map(|v| (v.predicted_value - mean).powi(2))
        .sum::<f64>()
        / n;
    let agreement = (1.0 - variance.sqrt() / mean.abs().max(EPSILON)).max(0.0);

    EnsembleOutput {
        consensus: Consensus { value, confidence },
        agreement,
        votes,
    }
}

/// Runs every registered scoring function against a candidate, each on a
/// blocking thread under its own time budget.
pub struct Ensemble {
    functions: Vec<Arc<dyn ScoringFunction>>,
    budget: Duration,
}

impl Ensemble {
    pub fn new(budget: Duration) -> Self {
        Ensemble {
            functions: Vec::new(),
            budget,
        }
    }

    pub fn with_defaults(budget: Duration) -> Self {
        let mut e = Self::new(budget);
        for f in default_functions() {
            e.register(f);
        }
        e
    }

    pub fn register(&mut self, function: Arc<dyn ScoringFunction>) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn vote(function: &dyn ScoringFunction, vote: Vote, fallback: bool) -> ModelVote {
        ModelVote {
            name: function.name().to_string(),
            category: function.category(),
            weight: function.weight(),
            accuracy: function.accuracy(),
            predicted_value: vote.value,
            confidence: vote.confidence,
            fallback,
        }
    }

    pub async fn score(&self, candidate: Arc<Candidate>) -> EnsembleOutput {
        let budget = self.budget;
        let futures: Vec<_> = self
            .functions
            .iter()
            .map(|f| {
                let f = Arc::clone(f);
                let c = Arc::clone(&candidate);
                async move {
                    let worker = {
                        let f = Arc::clone(&f);
                        let c = Arc::clone(&c);
                        tokio::task::spawn_blocking(move || f.evaluate(&c))
                    };
                    let neutral = Vote::new(c.baseline(), FALLBACK_CONFIDENCE);
                    match tokio::time::timeout(budget, worker).await {
                        Ok(Ok(v)) if v.value.is_finite() && v.confidence.is_finite() => {
                            Self::vote(f.as_ref(), v, false)
                        }
                        Ok(Ok(v)) => {
                            warn!("Scoring function '{}' returned non-finite vote {:?}", f.name(), v);
                            Self::vote(f.as_ref(), neutral, true)
                        }
                        Ok(Err(e)) => {
                            warn!("Scoring function '{}' panicked: {}", f.name(), e);
                            Self::vote(f.as_ref(), neutral, true)
                        }
                        Err(_) => {
                            let err = SourceError::ModelTimeout {
                                model: f.name().to_string(),
                                budget,
                            };
                            warn!("{} on prop {}", err, c.prop.id);
                            Self::vote(f.as_ref(), neutral, true)
                        }
                    }
                }
            })
            .collect();

        combine(futures_util::future::join_all(futures).await)
    }

    /// Score many candidates concurrently; output order matches input.
    pub async fn score_all(&self, candidates: Vec<Arc<Candidate>>) -> Vec<EnsembleOutput> {
        let futures: Vec<_> = candidates.into_iter().map(|c| self.score(c)).collect();
        futures_util::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::scoring::{ModelCategory, Subject};
    use crate::models::{Game, GameStatus, Prop, PropSubject, Sport};
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn vote(value: f64, confidence: f64, weight: f64) -> ModelVote {
        ModelVote {
            name: "m".into(),
            category: ModelCategory::Statistical,
            weight,
            accuracy: 0.5,
            predicted_value: value,
            confidence,
            fallback: false,
        }
    }

    struct Constant(f64);

    impl ScoringFunction for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn category(&self) -> ModelCategory {
            ModelCategory::Market
        }
        fn accuracy(&self) -> f64 {
            0.7
        }
        fn evaluate(&self, _c: &Candidate) -> Vote {
            Vote::new(self.0, 0.8)
        }
    }

    struct Sleepy;

    impl ScoringFunction for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn category(&self) -> ModelCategory {
            ModelCategory::MlStyle
        }
        fn accuracy(&self) -> f64 {
            0.9
        }
        fn evaluate(&self, _c: &Candidate) -> Vote {
            std::thread::sleep(Duration::from_millis(500));
            Vote::new(1000.0, 1.0)
        }
    }

    fn game_candidate() -> Arc<Candidate> {
        let game = Game {
            id: "g".into(),
            sport: Sport::Nba,
            home_team: "Boston Celtics".into(),
            away_team: "Los Angeles Lakers".into(),
            start_time: Utc::now(),
            status: GameStatus::Scheduled,
            venue: None,
            city: None,
            weather: None,
            odds: None,
            props: vec![],
            sources: vec![],
        };
        Arc::new(Candidate {
            prop: Prop {
                id: "total".into(),
                subject: PropSubject::Game { game_id: "g".into() },
                sport: Sport::Nba,
                market: "total".into(),
                line: 229.5,
                game_id: Some("g".into()),
                over_price: Some(-110),
                under_price: Some(-110),
                platform: "Book".into(),
                source_id: "odds".into(),
            },
            subject: Subject::Game(game.clone()),
            game: Some(game),
            team_sentiment: None,
            opponent_sentiment: None,
        })
    }

    #[test]
    fn consensus_follows_weighted_formulas() {
        let out = combine(vec![vote(10.0, 1.0, 1.0), vote(20.0, 0.5, 2.0)]);
        // Σwcv = 10 + 20 = 30, Σwc = 1 + 1 = 2
        assert_relative_eq!(out.consensus.value, 15.0);
        // Σwc / Σw = 2 / 3
        assert_relative_eq!(out.consensus.confidence, 2.0 / 3.0);
        // mean 15, population std 5
        assert_relative_eq!(out.agreement, 1.0 - 5.0 / 15.0);
    }

    #[test]
    fn zero_mean_does_not_divide_by_zero() {
        let out = combine(vec![vote(-5.0, 0.5, 1.0), vote(5.0, 0.5, 1.0)]);
        assert!(out.agreement.is_finite());
        assert_eq!(out.agreement, 0.0);
        assert!(out.consensus.confidence.is_finite());
    }

    #[test]
    fn zero_confidence_votes_fall_back_to_plain_mean() {
        let out = combine(vec![vote(4.0, 0.0, 1.0), vote(6.0, 0.0, 1.0)]);
        assert_relative_eq!(out.consensus.value, 5.0);
        assert_eq!(out.consensus.confidence, 0.0);
    }

    #[test]
    fn empty_vote_set_is_neutral() {
        let out = combine(vec![]);
        assert_eq!(out.consensus.confidence, 0.0);
        assert_eq!(out.agreement, 0.0);
    }

    #[test]
    fn over_probability_is_half_at_the_line() {
        let out = combine(vec![vote(229.5, 1.0, 1.0)]);
        assert_relative_eq!(out.over_probability(229.5), 0.5);
        assert!(out.over_probability(220.0) > 0.5);
        assert!(out.over_probability(240.0) < 0.5);
    }

    #[tokio::test]
    async fn slow_function_gets_neutral_vote() {
        let mut e = Ensemble::new(Duration::from_millis(50));
        e.register(Arc::new(Constant(230.0)));
        e.register(Arc::new(Sleepy));

        let out = e.score(game_candidate()).await;
        assert_eq!(out.votes.len(), 2);
        assert_eq!(out.fallback_count(), 1);
        let sleepy = out.votes.iter().find(|v| v.name == "sleepy").unwrap();
        assert!(sleepy.fallback);
        assert_relative_eq!(sleepy.confidence, FALLBACK_CONFIDENCE);
        // Neutral value is the league-average total, not the slow function's output.
        assert_relative_eq!(sleepy.predicted_value, Sport::Nba.average_total());
        assert!(out.consensus.value < 1000.0);
    }

    #[tokio::test]
    async fn default_roster_scores_game_totals() {
        let e = Ensemble::with_defaults(Duration::from_secs(2));
        assert_eq!(e.len(), 9);
        let out = e.score(game_candidate()).await;
        assert_eq!(out.votes.len(), 9);
        assert_eq!(out.fallback_count(), 0);
        assert!(out.agreement > 0.9);
        assert!(out.consensus.confidence > 0.0 && out.consensus.confidence <= 1.0);
    }
}
