pub mod combiner;
pub mod models;
pub mod scoring;

pub use combiner::{combine, Consensus, Ensemble, EnsembleOutput};
pub use scoring::{Candidate, ModelCategory, ModelVote, ScoringFunction, Subject, Vote};

use tracing::debug;

use crate::config::SportFilter;
use crate::models::PropSubject;
use crate::normalize::NormalizedData;

/// Pair every prop with its subject and context. Props whose subject
/// cannot be resolved are skipped.
pub fn build_candidates(data: &NormalizedData, sports: SportFilter) -> Vec<Candidate> {
    let sentiment = |team: &str| data.sentiment.for_team(team).map(|s| s.score);

    data.props
        .iter()
        .filter(|p| sports.allows(p.sport))
        .filter_map(|prop| {
            let game = prop.game_id.as_deref().and_then(|id| data.game(id)).cloned();
            let candidate = match &prop.subject {
                PropSubject::Player { .. } => {
                    let player = data.player(prop)?.clone();
                    let opponent = game.as_ref().map(|g| {
                        if crate::models::teams_match(&g.home_team, &player.team) {
                            g.away_team.clone()
                        } else {
                            g.home_team.clone()
                        }
                    });
                    Candidate {
                        prop: prop.clone(),
                        team_sentiment: sentiment(&player.team),
                        opponent_sentiment: opponent.as_deref().and_then(sentiment),
                        subject: Subject::Player(player),
                        game,
                    }
                }
                PropSubject::Game { game_id } => {
                    let g = data.game(game_id)?.clone();
                    Candidate {
                        prop: prop.clone(),
                        team_sentiment: sentiment(&g.home_team),
                        opponent_sentiment: sentiment(&g.away_team),
                        subject: Subject::Game(g),
                        game,
                    }
                }
            };
            Some(candidate)
        })
        .inspect(|c| debug!("Candidate {} ({} {})", c.prop.id, c.prop.market, c.prop.line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, GameStatus, Player, Prop, Sport};
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn player(name: &str, form: &[f64]) -> Player {
        let mut stats = BTreeMap::new();
        stats.insert("points".to_string(), 25.0);
        Player {
            id: format!("nba-{}", name),
            name: name.into(),
            team: "Boston Celtics".into(),
            position: "F".into(),
            sport: Sport::Nba,
            stats,
            recent_form: form.to_vec(),
            injury_status: None,
            fantasy_relevance: 0.5,
            sources: vec![],
        }
    }

    fn prop(name: &str, line: f64) -> Prop {
        Prop {
            id: format!("book:{}:points:{}", name, line),
            subject: PropSubject::Player {
                name: name.into(),
                team: "Boston Celtics".into(),
            },
            sport: Sport::Nba,
            market: "points".into(),
            line,
            game_id: Some("g1".into()),
            over_price: Some(-110),
            under_price: Some(-110),
            platform: "Book".into(),
            source_id: "odds".into(),
        }
    }

    fn data() -> NormalizedData {
        let game = Game {
            id: "g1".into(),
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
        NormalizedData {
            games: vec![game],
            players: vec![player("Hot", &[0.9; 5]), player("Cold", &[0.1; 5])],
            props: vec![prop("Hot", 23.5), prop("Cold", 23.5), prop("Ghost", 10.5)],
            ..Default::default()
        }
    }

    #[test]
    fn unresolved_subjects_are_skipped() {
        let candidates = build_candidates(&data(), SportFilter::All);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.game.is_some()));
        assert!(build_candidates(&data(), SportFilter::Only(Sport::Nfl)).is_empty());
    }

    #[tokio::test]
    async fn hot_form_earns_higher_over_confidence() {
        let ensemble = Ensemble::with_defaults(Duration::from_secs(2));
        let candidates = build_candidates(&data(), SportFilter::All);
        let hot = candidates.iter().find(|c| c.prop.subject_name() == "Hot").unwrap();
        let cold = candidates.iter().find(|c| c.prop.subject_name() == "Cold").unwrap();

        let hot_out = ensemble.score(Arc::new(hot.clone())).await;
        let cold_out = ensemble.score(Arc::new(cold.clone())).await;

        let p_hot = hot_out.over_probability(23.5);
        let p_cold = cold_out.over_probability(23.5);
        assert!(p_hot > 0.5);
        assert!(p_hot - p_cold > 0.2, "hot={} cold={}", p_hot, p_cold);
        assert_relative_eq!(
            hot_out.votes.iter().map(|v| v.weight).sum::<f64>(),
            cold_out.votes.iter().map(|v| v.weight).sum::<f64>()
        );
    }
}
