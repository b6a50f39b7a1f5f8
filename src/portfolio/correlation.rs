//! Pairwise correlation between picks.
//!
//! Rule-based and deterministic: picks are correlated through what they
//! share (game, subject, team, sport and market), checked from the
//! strongest tie down. There is no joint-outcome model behind these
//! numbers; they only need to order risk sensibly for the selector.

use crate::models::{normalize_text, teams_match};
use crate::ranking::Opportunity;

pub const SAME_GAME: f64 = 0.9;
pub const SAME_SUBJECT: f64 = 0.6;
pub const SAME_TEAM: f64 = 0.35;
pub const SAME_SPORT_AND_MARKET: f64 = 0.15;
pub const BASELINE: f64 = 0.05;

/// The subject's words appear as a contiguous run of whole words.
fn mentions(subject: &str, description: &str) -> bool {
    let subject = normalize_text(subject);
    let description = normalize_text(description);
    let needle: Vec<&str> = subject.split_whitespace().collect();
    let words: Vec<&str> = description.split_whitespace().collect();
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn teams_overlap(a: &[String], b: &[String]) -> bool {
    a.iter().any(|ta| b.iter().any(|tb| teams_match(ta, tb)))
}

/// Symmetric, in [BASELINE, SAME_GAME].
pub fn pairwise_correlation(a: &Opportunity, b: &Opportunity) -> f64 {
    if a.game_id.is_some() && a.game_id == b.game_id {
        return SAME_GAME;
    }
    if mentions(&a.subject, &b.description) || mentions(&b.subject, &a.description) {
        return SAME_SUBJECT;
    }
    if teams_overlap(&a.teams, &b.teams) {
        return SAME_TEAM;
    }
    if a.sport == b.sport && a.market == b.market {
        return SAME_SPORT_AND_MARKET;
    }
    BASELINE
}
