use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Game, Player, Prop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Statistical,
    MlStyle,
    Ensemble,
    Market,
    Sentiment,
    Environmental,
    Situational,
}

impl ModelCategory {
    /// Static category multiplier; net weight is this times the function's accuracy.
    pub fn multiplier(&self) -> f64 {
        match self {
            ModelCategory::Statistical => 0.8,
            ModelCategory::MlStyle => 1.2,
            ModelCategory::Ensemble => 1.5,
            ModelCategory::Market => 1.0,
            ModelCategory::Sentiment => 0.6,
            ModelCategory::Environmental => 0.7,
            ModelCategory::Situational => 0.9,
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelCategory::Statistical => "statistical",
            ModelCategory::MlStyle => "ml_style",
            ModelCategory::Ensemble => "ensemble",
            ModelCategory::Market => "market",
            ModelCategory::Sentiment => "sentiment",
            ModelCategory::Environmental => "environmental",
            ModelCategory::Situational => "situational",
        };
        f.write_str(s)
    }
}

/// What a scoring function returns for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub value: f64,
    /// In [0, 1]
    pub confidence: f64,
}

impl Vote {
    pub fn new(value: f64, confidence: f64) -> Self {
        Vote {
            value,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One function's contribution to a scoring call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVote {
    pub name: String,
    pub category: ModelCategory,
    /// Net weight: category multiplier × accuracy
    pub weight: f64,
    pub accuracy: f64,
    pub predicted_value: f64,
    pub confidence: f64,
    /// The function missed its budget and a neutral vote stands in
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Player(Player),
    Game(Game),
}

/// Everything a scoring function may look at: the prop, its subject and
/// the surrounding game context.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub prop: Prop,
    pub subject: Subject,
    pub game: Option<Game>,
    /// Sentiment of the subject's team (home team for game markets)
    pub team_sentiment: Option<f64>,
    pub opponent_sentiment: Option<f64>,
}

impl Candidate {
    pub fn player(&self) -> Option<&Player> {
        match &self.subject {
            Subject::Player(p) => Some(p),
            Subject::Game(_) => None,
        }
    }

    /// The per-game average for the prop's stat, if the subject has one.
    pub fn season_average(&self) -> Option<f64> {
        match &self.subject {
            Subject::Player(p) => p.stat(&self.prop.market),
            Subject::Game(g) => match self.prop.market.as_str() {
                "total" => Some(g.sport.average_total()),
                "spread" => Some(g.sport.home_margin()),
                _ => None,
            },
        }
    }

    /// Naive expectation used when a function has nothing better: the
    /// season average, else the line itself.
    pub fn baseline(&self) -> f64 {
        self.season_average().unwrap_or(self.prop.line)
    }

    pub fn is_home(&self) -> Option<bool> {
        let (player, game) = (self.player()?, self.game.as_ref()?);
        Some(crate::models::teams_match(&player.team, &game.home_team))
    }
}

/// A pluggable scoring function.
///
/// Implementations must be pure: same candidate in, same vote out, no shared
/// mutable state. The combiner runs them concurrently on blocking threads.
pub trait ScoringFunction: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> ModelCategory;

    /// Historical accuracy in [0, 1].
    fn accuracy(&self) -> f64;

    fn weight(&self) -> f64 {
        self.category().multiplier() * self.accuracy()
    }

    fn evaluate(&self, candidate: &Candidate) -> Vote;
}
