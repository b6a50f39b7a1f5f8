//! Built-in scoring functions.
//!
//! These are arithmetic heuristics over season averages, recent form, market
//! prices and context. None of them is a trained model; each is a plain
//! `ScoringFunction` that a real model can replace without touching the
//! combiner.

use std::sync::Arc;

use super::combiner::line_scale;
use super::scoring::{Candidate, ModelCategory, ScoringFunction, Subject, Vote};
use crate::ranking::kelly::implied_probability;

/// The default roster, one of each.
pub fn default_functions() -> Vec<Arc<dyn ScoringFunction>> {
    vec![
        Arc::new(SeasonAverage),
        Arc::new(RecentForm),
        Arc::new(FormMomentum),
        Arc::new(RegressionBlend),
        Arc::new(MarketImplied),
        Arc::new(SentimentSignal),
        Arc::new(WeatherImpact),
        Arc::new(Situational),
        Arc::new(MetaEnsemble),
    ]
}

/// Form multiplier: an average recent stretch (0.5) leaves the baseline as is.
fn form_factor(form: f64) -> f64 {
    0.5 + form
}

pub struct SeasonAverage;

impl ScoringFunction for SeasonAverage {
    fn name(&self) -> &str {
        "season_average"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Statistical
    }
    fn accuracy(&self) -> f64 {
        0.62
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        match c.season_average() {
            Some(avg) => Vote::new(avg, 0.6),
            None => Vote::new(c.prop.line, 0.3),
        }
    }
}

pub struct RecentForm;

impl ScoringFunction for RecentForm {
    fn name(&self) -> &str {
        "recent_form"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Statistical
    }
    fn accuracy(&self) -> f64 {
        0.64
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        match c.player().filter(|p| !p.recent_form.is_empty()) {
            Some(p) => {
                let coverage = p.recent_form.len().min(5) as f64 / 5.0;
                Vote::new(c.baseline() * form_factor(p.form_mean(5)), 0.45 + 0.3 * coverage)
            }
            None => Vote::new(c.baseline(), 0.3),
        }
    }
}

/// Trend of the last three games against the rest of the window.
pub struct FormMomentum;

impl ScoringFunction for FormMomentum {
    fn name(&self) -> &str {
        "form_momentum"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::MlStyle
    }
    fn accuracy(&self) -> f64 {
        0.66
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let Some(p) = c.player().filter(|p| p.recent_form.len() >= 2) else {
            return Vote::new(c.baseline(), 0.3);
        };
        let recent = p.form_mean(3);
        let split = p.recent_form.len().saturating_sub(3).max(1);
        let earlier = &p.recent_form[..split];
        let prior = earlier.iter().sum::<f64>() / earlier.len() as f64;
        let trend = (recent - prior).clamp(-0.5, 0.5);
        let value = c.baseline() * form_factor(p.form_mean(10)) * (1.0 + 0.5 * trend);
        Vote::new(value, 0.55 + 0.25 * (1.0 - 2.0 * trend.abs()))
    }
}

/// Fixed blend of average, recent form and the posted line.
pub struct RegressionBlend;

impl ScoringFunction for RegressionBlend {
    fn name(&self) -> &str {
        "regression_blend"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::MlStyle
    }
    fn accuracy(&self) -> f64 {
        0.68
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let base = c.baseline();
        let line = c.prop.line;
        match &c.subject {
            Subject::Player(p) => {
                let recent = base * form_factor(p.form_mean(5));
                Vote::new(0.5 * base + 0.3 * recent + 0.2 * line, 0.65)
            }
            Subject::Game(_) => Vote::new(0.6 * base + 0.4 * line, 0.5),
        }
    }
}

/// Reads the de-vigged over probability off the quoted prices.
pub struct MarketImplied;

impl MarketImplied {
    fn over_probability(over: i32, under: i32) -> f64 {
        let po = implied_probability(over);
        let pu = implied_probability(under);
        if po + pu <= 0.0 {
            0.5
        } else {
            po / (po + pu)
        }
    }
}

impl ScoringFunction for MarketImplied {
    fn name(&self) -> &str {
        "market_implied"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Market
    }
    fn accuracy(&self) -> f64 {
        0.70
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let line = c.prop.line;
        match (c.prop.over_price, c.prop.under_price) {
            (Some(over), Some(under)) => {
                let p = Self::over_probability(over, under).clamp(0.01, 0.99);
                // Invert the logistic used to read probabilities off the consensus.
                let value = line + line_scale(line) * (p / (1.0 - p)).ln();
                Vote::new(value, 0.7)
            }
            _ => Vote::new(line, 0.35),
        }
    }
}

pub struct SentimentSignal;

impl ScoringFunction for SentimentSignal {
    fn name(&self) -> &str {
        "sentiment_signal"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Sentiment
    }
    fn accuracy(&self) -> f64 {
        0.55
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let base = c.baseline();
        match (&c.subject, c.team_sentiment, c.opponent_sentiment) {
            (Subject::Player(_), Some(s), _) => Vote::new(base * (1.0 + 0.08 * s), 0.4 + 0.3 * s.abs()),
            (Subject::Game(_), home, away) if home.is_some() || away.is_some() => {
                let s = home.unwrap_or(0.0) + away.unwrap_or(0.0);
                Vote::new(base * (1.0 + 0.03 * s), 0.4 + 0.15 * s.abs())
            }
            _ => Vote::new(base, 0.2),
        }
    }
}

/// Cold, wind and precipitation suppress scoring in outdoor games. Margins
/// are left alone.
pub struct WeatherImpact;

impl ScoringFunction for WeatherImpact {
    fn name(&self) -> &str {
        "weather_impact"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Environmental
    }
    fn accuracy(&self) -> f64 {
        0.60
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let base = c.baseline();
        let Some(w) = c
            .game
            .as_ref()
            .filter(|g| g.sport.is_outdoor() && c.prop.market != "spread")
            .and_then(|g| g.weather.as_ref())
        else {
            return Vote::new(base, 0.25);
        };
        let mut factor = 1.0;
        if w.has_precipitation() {
            factor -= 0.06;
        }
        factor -= 0.004 * (w.wind_kph - 15.0).max(0.0);
        if w.temperature_c < 5.0 {
            factor -= 0.03;
        }
        Vote::new(base * factor.max(0.7), 0.6)
    }
}

/// Injury designations and home advantage.
pub struct Situational;

impl ScoringFunction for Situational {
    fn name(&self) -> &str {
        "situational"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Situational
    }
    fn accuracy(&self) -> f64 {
        0.58
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let base = c.baseline();
        let Some(p) = c.player() else {
            return Vote::new(base, 0.3);
        };
        let (injury_factor, confidence) = match p.injury_status.as_deref().map(str::to_lowercase).as_deref() {
            Some("out") | Some("ir") | Some("suspended") => (0.0, 0.9),
            Some("doubtful") => (0.7, 0.7),
            Some("questionable") => (0.9, 0.6),
            Some("probable") => (0.97, 0.55),
            _ => (1.0, 0.5),
        };
        let venue_factor = match c.is_home() {
            Some(true) => 1.02,
            Some(false) => 0.99,
            None => 1.0,
        };
        Vote::new(base * injury_factor * venue_factor, confidence)
    }
}

/// Stacks a few of the cheaper functions and takes their median.
pub struct MetaEnsemble;

impl ScoringFunction for MetaEnsemble {
    fn name(&self) -> &str {
        "meta_ensemble"
    }
    fn category(&self) -> ModelCategory {
        ModelCategory::Ensemble
    }
    fn accuracy(&self) -> f64 {
        0.72
    }
    fn evaluate(&self, c: &Candidate) -> Vote {
        let mut values = [
            SeasonAverage.evaluate(c).value,
            RecentForm.evaluate(c).value,
            RegressionBlend.evaluate(c).value,
            MarketImplied.evaluate(c).value,
        ];
        values.sort_by(f64::total_cmp);
        let median = (values[1] + values[2]) / 2.0;
        let spread = values[3] - values[0];
        let tightness = 1.0 - (spread / median.abs().max(1e-9)).min(1.0);
        Vote::new(median, 0.6 + 0.2 * tightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, GameStatus, Player, Prop, PropSubject, Sport, WeatherSnapshot};
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn player(form: &[f64], injury: Option<&str>) -> Player {
        let mut stats = BTreeMap::new();
        stats.insert("points".to_string(), 25.0);
        Player {
            id: "nba-a".into(),
            name: "A".into(),
            team: "Boston Celtics".into(),
            position: "F".into(),
            sport: Sport::Nba,
            stats,
            recent_form: form.to_vec(),
            injury_status: injury.map(str::to_string),
            fantasy_relevance: 0.5,
            sources: vec![],
        }
    }

    fn game(sport: Sport, weather: Option<WeatherSnapshot>) -> Game {
        Game {
            id: "g1".into(),
            sport,
            home_team: "Boston Celtics".into(),
            away_team: "Los Angeles Lakers".into(),
            start_time: Utc::now(),
            status: GameStatus::Scheduled,
            venue: None,
            city: Some("Boston".into()),
            weather,
            odds: None,
            props: vec![],
            sources: vec![],
        }
    }

    fn prop(line: f64, over: Option<i32>, under: Option<i32>) -> Prop {
        Prop {
            id: "p".into(),
            subject: PropSubject::Player {
                name: "A".into(),
                team: "Boston Celtics".into(),
            },
            sport: Sport::Nba,
            market: "points".into(),
            line,
            game_id: Some("g1".into()),
            over_price: over,
            under_price: under,
            platform: "Book".into(),
            source_id: "odds".into(),
        }
    }

    fn candidate(p: Player, pr: Prop) -> Candidate {
        Candidate {
            prop: pr,
            subject: Subject::Player(p),
            game: Some(game(Sport::Nba, None)),
            team_sentiment: None,
            opponent_sentiment: None,
        }
    }

    #[test]
    fn neutral_form_leaves_baseline() {
        let c = candidate(player(&[0.5; 5], None), prop(24.5, None, None));
        assert_relative_eq!(RecentForm.evaluate(&c).value, 25.0);
        assert_relative_eq!(SeasonAverage.evaluate(&c).value, 25.0);
    }

    #[test]
    fn hot_form_raises_estimates() {
        let hot = candidate(player(&[0.9; 5], None), prop(24.5, None, None));
        let cold = candidate(player(&[0.1; 5], None), prop(24.5, None, None));
        assert!(RecentForm.evaluate(&hot).value > RecentForm.evaluate(&cold).value);
        assert!(FormMomentum.evaluate(&hot).value > FormMomentum.evaluate(&cold).value);
    }

    #[test]
    fn fair_prices_imply_the_line() {
        let c = candidate(player(&[], None), prop(24.5, Some(-110), Some(-110)));
        let v = MarketImplied.evaluate(&c);
        assert_relative_eq!(v.value, 24.5, epsilon = 1e-9);
        assert_relative_eq!(v.confidence, 0.7);

        let juiced = candidate(player(&[], None), prop(24.5, Some(-150), Some(130)));
        assert!(MarketImplied.evaluate(&juiced).value > 24.5);
    }

    #[test]
    fn ruled_out_player_projects_zero() {
        let c = candidate(player(&[0.9; 5], Some("Out")), prop(24.5, None, None));
        let v = Situational.evaluate(&c);
        assert_relative_eq!(v.value, 0.0);
        assert!(v.confidence > 0.8);
    }

    #[test]
    fn weather_only_matters_outdoors() {
        let storm = WeatherSnapshot {
            city: "Boston".into(),
            temperature_c: 2.0,
            wind_kph: 35.0,
            weather_code: 63,
            source_id: "w".into(),
        };
        let mut c = candidate(player(&[], None), prop(24.5, None, None));
        c.game = Some(game(Sport::Nba, Some(storm.clone())));
        assert_relative_eq!(WeatherImpact.evaluate(&c).value, 25.0);

        c.game = Some(game(Sport::Nfl, Some(storm)));
        let v = WeatherImpact.evaluate(&c);
        assert_relative_eq!(v.value, 25.0 * (1.0 - 0.06 - 0.08 - 0.03));
    }

    #[test]
    fn spread_baseline_is_home_margin() {
        let storm = WeatherSnapshot {
            city: "Boston".into(),
            temperature_c: -2.0,
            wind_kph: 40.0,
            weather_code: 71,
            source_id: "w".into(),
        };
        let g = game(Sport::Nfl, Some(storm));
        let c = Candidate {
            prop: Prop {
                id: "s".into(),
                subject: PropSubject::Game { game_id: "g1".into() },
                sport: Sport::Nfl,
                market: "spread".into(),
                line: 6.5,
                game_id: Some("g1".into()),
                over_price: Some(-110),
                under_price: Some(-110),
                platform: "Book".into(),
                source_id: "odds".into(),
            },
            subject: Subject::Game(g.clone()),
            game: Some(g),
            team_sentiment: None,
            opponent_sentiment: None,
        };
        assert_relative_eq!(SeasonAverage.evaluate(&c).value, Sport::Nfl.home_margin());
        assert_relative_eq!(MarketImplied.evaluate(&c).value, 6.5, epsilon = 1e-9);
        assert_relative_eq!(WeatherImpact.evaluate(&c).value, Sport::Nfl.home_margin());
    }

    #[test]
    fn default_roster_spans_all_categories() {
        let cats: std::collections::HashSet<ModelCategory> =
            default_functions().iter().map(|f| f.category()).collect();
        assert_eq!(cats.len(), 7);
    }
}
