use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use super::grade::ValueGrade;
use super::kelly::{american_to_decimal, expected_value, kelly_fraction, STANDARD_PRICE};
use crate::config::EngineSettings;
use crate::ensemble::{Candidate, EnsembleOutput, Subject};
use crate::models::{Player, Sport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Over,
    Under,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Over => f.write_str("Over"),
            Side::Under => f.write_str("Under"),
        }
    }
}

/// A scored, graded pick. Built once per ranking pass and never mutated;
/// re-scoring produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub id: String,
    pub description: String,
    pub side: Side,
    pub sport: Sport,
    pub market: String,
    pub line: f64,
    pub platform: String,
    pub game_id: Option<String>,
    /// Player name, or the matchup for game markets
    pub subject: String,
    /// Teams the pick depends on
    pub teams: Vec<String>,
    /// Win probability of the chosen side, in [0, 100]
    pub confidence: f64,
    /// Expected return per unit staked, in percent
    pub expected_value: f64,
    pub decimal_odds: f64,
    /// In [0, 0.25]
    pub kelly_fraction: f64,
    /// In [0, 1]
    pub risk_score: f64,
    pub value_grade: ValueGrade,
    /// Ensemble agreement in [0, 1]
    pub model_consensus: f64,
    /// Ensemble consensus confidence in [0, 1]
    pub model_confidence: f64,
    /// EV% × confidence/100, the grading score
    pub composite: f64,
    /// Composite after the strategy adjustment; the sort key
    pub ranking_score: f64,
    pub historical_drawdown: f64,
    /// Source ids that contributed
    pub provenance: Vec<String>,
}

/// A candidate together with its ensemble output.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub output: EnsembleOutput,
}

/// Pull the raw over probability toward 0.5 when the models disagree.
fn shrink(p_over: f64, agreement: f64) -> f64 {
    0.5 + (p_over - 0.5) * (0.5 + 0.5 * agreement.clamp(0.0, 1.0))
}

fn injury_penalty(player: &Player) -> f64 {
    match player.injury_status.as_deref().map(str::to_lowercase).as_deref() {
        Some("out") | Some("ir") | Some("suspended") => 1.0,
        Some("doubtful") => 0.6,
        Some("questionable") => 0.3,
        Some("probable") => 0.1,
        _ => 0.0,
    }
}

/// Largest peak-to-trough drop across the form window.
fn form_drawdown(form: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for &v in form {
        peak = peak.max(v);
        worst = worst.max(peak - v);
    }
    worst
}

fn risk_score(output: &EnsembleOutput, candidate: &Candidate) -> f64 {
    let injury = candidate.player().map(injury_penalty).unwrap_or(0.0);
    let risk = 0.5 * (1.0 - output.agreement)
        + 0.3 * (1.0 - output.consensus.confidence)
        + 0.2 * injury;
    risk.clamp(0.0, 1.0)
}

fn provenance(candidate: &Candidate) -> Vec<String> {
    let mut ids = vec![candidate.prop.source_id.clone()];
    if let Some(p) = candidate.player() {
        ids.extend(p.sources.iter().cloned());
    }
    if let Some(g) = &candidate.game {
        ids.extend(g.sources.iter().cloned());
    }
    ids.sort();
    ids.dedup();
    ids
}

/// Build the opportunity for one scored candidate. Grading happens here;
/// filtering is left to `rank`.
pub fn evaluate(scored: &ScoredCandidate, settings: &EngineSettings) -> Opportunity {
    let ScoredCandidate { candidate, output } = scored;
    let prop = &candidate.prop;

    let p_over = shrink(output.over_probability(prop.line), output.agreement);
    let (side, win_prob, price) = if p_over >= 0.5 {
        (Side::Over, p_over, prop.over_price)
    } else {
        (Side::Under, 1.0 - p_over, prop.under_price)
    };
    let decimal_odds = american_to_decimal(price.unwrap_or(STANDARD_PRICE));

    let confidence = win_prob * 100.0;
    let ev = expected_value(win_prob, decimal_odds) * 100.0;
    let composite = ev * confidence / 100.0;
    let risk = risk_score(output, candidate);

    let (subject, teams, drawdown) = match &candidate.subject {
        Subject::Player(p) => (
            p.name.clone(),
            vec![p.team.clone()],
            form_drawdown(&p.recent_form),
        ),
        Subject::Game(g) => (
            g.matchup(),
            vec![g.home_team.clone(), g.away_team.clone()],
            risk * 0.25,
        ),
    };

    Opportunity {
        id: format!("{}:{}", prop.id, side.to_string().to_lowercase()),
        description: format!("{} {} {} {}", subject, side, prop.line, prop.market),
        side,
        sport: prop.sport,
        market: prop.market.clone(),
        line: prop.line,
        platform: prop.platform.clone(),
        game_id: prop.game_id.clone(),
        subject,
        teams,
        confidence,
        expected_value: ev,
        decimal_odds,
        kelly_fraction: kelly_fraction(win_prob, decimal_odds),
        risk_score: risk,
        value_grade: ValueGrade::from_composite(composite),
        model_consensus: output.agreement.clamp(0.0, 1.0),
        model_confidence: output.consensus.confidence,
        composite,
        ranking_score: settings.strategy.adjust(composite, ev, risk),
        historical_drawdown: drawdown,
        provenance: provenance(candidate),
    }
}

/// Score, grade, filter and order. Only A/B grades with enough model
/// confidence survive; the result is sorted by ranking score, descending.
pub fn rank(scored: &[ScoredCandidate], settings: &EngineSettings) -> Vec<Opportunity> {
    let floor = settings.confidence.min_model_confidence();
    let mut below_floor = 0;
    let mut below_grade = 0;

    let mut ranked: Vec<Opportunity> = scored
        .iter()
        .filter(|s| {
            let keep = s.output.consensus.confidence >= floor;
            if !keep {
                below_floor += 1;
            }
            keep
        })
        .map(|s| evaluate(s, settings))
        .filter(|o| {
            let keep = o.value_grade.is_surfaced();
            if !keep {
                below_grade += 1;
            }
            keep
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.ranking_score
            .total_cmp(&a.ranking_score)
            .then_with(|| a.id.cmp(&b.id))
    });

    for o in &ranked {
        debug!(
            "{} [{}] conf={:.1} ev={:.1}% kelly={:.3} risk={:.2}",
            o.description, o.value_grade, o.confidence, o.expected_value, o.kelly_fraction, o.risk_score
        );
    }
    info!(
        "Ranked {} of {} candidates ({} under model-confidence floor {:.2}, {} graded C or below)",
        ranked.len(),
        scored.len(),
        below_floor,
        floor,
        below_grade
    );
    ranked
}
