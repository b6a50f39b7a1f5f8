use serde::Serialize;
use std::collections::BTreeMap;

use super::parsers::Headline;
use crate::models::{normalize_text, Game};

const POSITIVE: &[&str] = &[
    "win", "wins", "won", "streak", "dominant", "surge", "surges", "roll", "rolls", "fire", "elite",
    "lock", "clicking", "healthy", "rested", "blowout", "best", "hot", "strong", "returns",
];

const NEGATIVE: &[&str] = &[
    "lose", "loses", "lost", "struggle", "struggles", "injury", "injured", "slump", "questionable",
    "out", "terrible", "fading", "collapse", "brutal", "banged", "cold", "suspended", "doubtful",
];

/// Per-team sentiment in [-1, 1] keyed by team nickname.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentIndex {
    teams: BTreeMap<String, TeamSentiment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSentiment {
    pub score: f64,
    pub mentions: usize,
}

fn nickname(team: &str) -> Option<String> {
    normalize_text(team).split_whitespace().last().map(str::to_string)
}

/// Polarity of one text in [-1, 1], 0 when no lexicon word appears.
pub fn polarity(words: &[&str]) -> f64 {
    let pos = words.iter().filter(|w| POSITIVE.contains(*w)).count() as f64;
    let neg = words.iter().filter(|w| NEGATIVE.contains(*w)).count() as f64;
    if pos + neg == 0.0 {
        0.0
    } else {
        (pos - neg) / (pos + neg)
    }
}

impl SentimentIndex {
    /// Score every team appearing in `games` against the headlines that
    /// mention its nickname.
    pub fn build(games: &[Game], headlines: &[Headline]) -> Self {
        let mut nicknames: Vec<String> = games
            .iter()
            .flat_map(|g| [nickname(&g.home_team), nickname(&g.away_team)])
            .flatten()
            .collect();
        nicknames.sort();
        nicknames.dedup();

        let texts: Vec<(Vec<String>, f64)> = headlines
            .iter()
            .map(|h| {
                let words = normalize_text(&h.text)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                (words, h.weight)
            })
            .collect();

        let mut teams = BTreeMap::new();
        for nick in nicknames {
            let mut weighted = 0.0;
            let mut weight = 0.0;
            let mut mentions = 0;
            for (words, w) in &texts {
                if !words.iter().any(|x| *x == nick) {
                    continue;
                }
                let refs: Vec<&str> = words.iter().map(String::as_str).collect();
                weighted += w * polarity(&refs);
                weight += w;
                mentions += 1;
            }
            if mentions > 0 && weight > 0.0 {
                teams.insert(
                    nick,
                    TeamSentiment {
                        score: (weighted / weight).clamp(-1.0, 1.0),
                        mentions,
                    },
                );
            }
        }
        SentimentIndex { teams }
    }

    pub fn for_team(&self, team: &str) -> Option<&TeamSentiment> {
        nickname(team).and_then(|n| self.teams.get(&n))
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }
}
