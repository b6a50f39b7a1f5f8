use chrono::Duration;
use std::cmp::Ordering;

use super::parsers::{RawGame, RawPlayer};
use crate::models::{normalize_text, teams_match, Game, OddsSnapshot, Player, Prop, Sport, FORM_WINDOW};

/// Two records whose start times differ by more than this are different games.
pub const START_TOLERANCE_HOURS: i64 = 6;

/// Lowest reliability first, so later (more reliable) records overwrite.
fn by_reliability(a_rel: f64, a_id: &str, b_rel: f64, b_id: &str) -> Ordering {
    a_rel.total_cmp(&b_rel).then_with(|| a_id.cmp(b_id))
}

fn same_game(game: &Game, raw: &RawGame) -> bool {
    game.sport == raw.sport
        && teams_match(&game.home_team, &raw.home_team)
        && teams_match(&game.away_team, &raw.away_team)
        && (game.start_time - raw.start_time).num_minutes().abs() <= START_TOLERANCE_HOURS * 60
}

fn nickname(team: &str) -> String {
    normalize_text(team)
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Stable id from the identity key.
pub fn game_id(game: &Game) -> String {
    format!(
        "{}-{}-at-{}-{}",
        game.sport,
        nickname(&game.away_team),
        nickname(&game.home_team),
        game.start_time.format("%Y%m%d")
    )
}

/// Merge per-source game records by `(sport, home, away, start ± 6h)`.
/// Higher-reliability fields win; props and provenance are unioned.
pub fn merge_games(mut raws: Vec<RawGame>) -> Vec<Game> {
    raws.sort_by(|a, b| by_reliability(a.reliability, &a.source_id, b.reliability, &b.source_id));

    let mut games: Vec<Game> = Vec::new();
    for raw in raws {
        match games.iter_mut().find(|g| same_game(g, &raw)) {
            Some(game) => {
                game.home_team = raw.home_team;
                game.away_team = raw.away_team;
                game.start_time = raw.start_time;
                game.status = raw.status;
                if raw.venue.is_some() {
                    game.venue = raw.venue;
                }
                if raw.city.is_some() {
                    game.city = raw.city;
                }
                if raw.odds.is_some() {
                    game.odds = raw.odds;
                }
                for prop in raw.props {
                    union_prop(&mut game.props, prop);
                }
                if !game.sources.contains(&raw.source_id) {
                    game.sources.push(raw.source_id);
                }
            }
            None => {
                let mut props = Vec::new();
                for prop in raw.props {
                    union_prop(&mut props, prop);
                }
                games.push(Game {
                    id: String::new(),
                    sport: raw.sport,
                    home_team: raw.home_team,
                    away_team: raw.away_team,
                    start_time: raw.start_time,
                    status: raw.status,
                    venue: raw.venue,
                    city: raw.city,
                    weather: None,
                    odds: raw.odds,
                    props,
                    sources: vec![raw.source_id],
                });
            }
        }
    }

    for game in games.iter_mut() {
        game.id = game_id(game);
        game.sources.sort();
        for prop in game.props.iter_mut() {
            prop.game_id = Some(game.id.clone());
        }
    }
    games.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    games
}

/// Insert unless a prop with the same id is already present; a later
/// (more reliable) copy replaces the earlier one.
pub fn union_prop(props: &mut Vec<Prop>, prop: Prop) {
    match props.iter_mut().find(|p| p.id == prop.id) {
        Some(existing) => *existing = prop,
        None => props.push(prop),
    }
}

/// Fallback odds at the standard -110 both ways, around the league-average total.
pub fn synthetic_odds(sport: Sport) -> OddsSnapshot {
    OddsSnapshot {
        bookmaker: "synthetic".to_string(),
        home_moneyline: Some(-110),
        away_moneyline: Some(-110),
        home_spread: Some(0.0),
        spread_price: Some(-110),
        away_spread_price: Some(-110),
        total: Some(sport.average_total()),
        over_price: Some(-110),
        under_price: Some(-110),
        synthetic: true,
        source_id: "synthetic".to_string(),
    }
}

/// Attach fallback odds to games lacking them. Returns how many were filled.
pub fn attach_fallback_odds(games: &mut [Game]) -> usize {
    let mut filled = 0;
    for game in games.iter_mut().filter(|g| g.odds.is_none()) {
        game.odds = Some(synthetic_odds(game.sport));
        filled += 1;
    }
    filled
}

fn same_player(player: &Player, raw: &RawPlayer) -> bool {
    player.sport == raw.sport
        && normalize_text(&player.name) == normalize_text(&raw.name)
        && (player.team.is_empty() || raw.team.is_empty() || teams_match(&player.team, &raw.team))
}

pub fn player_id(sport: Sport, name: &str) -> String {
    format!("{}-{}", sport, normalize_text(name).replace(' ', "-"))
}

/// Merge per-source player records by `(sport, normalized name, team)`, then
/// derive recent form and fantasy relevance.
pub fn merge_players(mut raws: Vec<RawPlayer>) -> Vec<Player> {
    raws.sort_by(|a, b| by_reliability(a.reliability, &a.source_id, b.reliability, &b.source_id));

    let mut players: Vec<(Player, Vec<f64>, Option<u32>)> = Vec::new();
    for raw in raws {
        match players.iter_mut().find(|(p, _, _)| same_player(p, &raw)) {
            Some((player, log, rank)) => {
                player.name = raw.name;
                if !raw.team.is_empty() {
                    player.team = raw.team;
                }
                if let Some(pos) = raw.position {
                    player.position = pos;
                }
                player.stats.extend(raw.stats);
                if !raw.game_log.is_empty() {
                    *log = raw.game_log;
                }
                if raw.injury_status.is_some() {
                    player.injury_status = raw.injury_status;
                }
                *rank = match (*rank, raw.fantasy_rank) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                if !player.sources.contains(&raw.source_id) {
                    player.sources.push(raw.source_id);
                }
            }
            None => players.push((
                Player {
                    id: player_id(raw.sport, &raw.name),
                    name: raw.name,
                    team: raw.team,
                    position: raw.position.unwrap_or_default(),
                    sport: raw.sport,
                    stats: raw.stats,
                    recent_form: vec![],
                    injury_status: raw.injury_status,
                    fantasy_relevance: 0.0,
                    sources: vec![raw.source_id],
                },
                raw.game_log,
                raw.fantasy_rank,
            )),
        }
    }

    let mut out: Vec<Player> = players
        .into_iter()
        .map(|(mut player, log, rank)| {
            player.recent_form = recent_form(&player, &log);
            player.fantasy_relevance = fantasy_relevance(&player, rank);
            player.sources.sort();
            player
        })
        .collect();
    out.sort_by(|a, b| {
        b.fantasy_relevance
            .total_cmp(&a.fantasy_relevance)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

/// Each logged value relative to twice the season average, so an average
/// game maps to 0.5. Keeps the last `FORM_WINDOW` games.
pub fn recent_form(player: &Player, game_log: &[f64]) -> Vec<f64> {
    if game_log.is_empty() {
        return vec![];
    }
    let avg = player
        .stat(player.sport.primary_stat())
        .filter(|a| *a > 0.0)
        .unwrap_or_else(|| game_log.iter().sum::<f64>() / game_log.len() as f64);
    let tail = &game_log[game_log.len().saturating_sub(FORM_WINDOW)..];
    tail.iter()
        .map(|x| if avg > 0.0 { (x / (2.0 * avg)).clamp(0.0, 1.0) } else { 0.5 })
        .collect()
}

pub fn fantasy_relevance(player: &Player, rank: Option<u32>) -> f64 {
    let rank_score = match rank {
        Some(r) => 1.0 - (r.saturating_sub(1) as f64 / 20.0).min(0.9),
        None => 0.3,
    };
    let mut relevance = 0.6 * rank_score + 0.4 * player.form_mean(5);
    if player.is_ruled_out() {
        relevance *= 0.2;
    }
    relevance.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStatus;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn raw_game(source: &str, rel: f64, home: &str, away: &str, minutes: i64) -> RawGame {
        RawGame {
            sport: Sport::Nba,
            home_team: home.into(),
            away_team: away.into(),
            start_time: Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap() + Duration::minutes(minutes),
            status: GameStatus::Scheduled,
            venue: None,
            city: None,
            odds: None,
            props: vec![],
            source_id: source.into(),
            reliability: rel,
        }
    }

    fn raw_player(source: &str, rel: f64, name: &str, team: &str) -> RawPlayer {
        RawPlayer {
            sport: Sport::Nba,
            name: name.into(),
            team: team.into(),
            position: None,
            stats: BTreeMap::new(),
            game_log: vec![],
            injury_status: None,
            fantasy_rank: None,
            source_id: source.into(),
            reliability: rel,
        }
    }

    #[test]
    fn overlapping_records_merge_and_higher_reliability_wins() {
        let mut low = raw_game("espn", 0.9, "LA Lakers", "Boston Celtics", 0);
        low.venue = Some("Arena".into());
        low.city = Some("Los Angeles".into());
        let high = raw_game("sportradar", 0.97, "Los Angeles Lakers", "Boston Celtics", 10);

        let games = merge_games(vec![high, low]);
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.home_team, "Los Angeles Lakers");
        assert_eq!(g.venue.as_deref(), Some("Arena"));
        assert_eq!(g.sources, vec!["espn".to_string(), "sportradar".to_string()]);
        assert_eq!(g.id, "nba-celtics-at-lakers-20261018");
    }

    #[test]
    fn far_apart_start_times_stay_separate() {
        let a = raw_game("espn", 0.9, "Lakers", "Celtics", 0);
        let b = raw_game("espn", 0.9, "Lakers", "Celtics", 60 * 24);
        let games = merge_games(vec![b, a]);
        assert_eq!(games.len(), 2);
        assert!(games[0].start_time < games[1].start_time);
    }

    #[test]
    fn fallback_odds_only_fill_gaps() {
        let mut games = merge_games(vec![raw_game("espn", 0.9, "Lakers", "Celtics", 0)]);
        assert_eq!(attach_fallback_odds(&mut games), 1);
        assert!(games[0].odds.as_ref().unwrap().synthetic);
        assert_eq!(attach_fallback_odds(&mut games), 0);
    }

    #[test]
    fn players_merge_across_feeds() {
        let mut stats = raw_player("sportradar", 0.97, "Jayson Tatum", "Boston Celtics");
        stats.stats.insert("points".into(), 20.0);
        stats.game_log = vec![20.0, 30.0, 40.0];
        let mut board = raw_player("fantasy", 0.88, "jayson tatum", "Boston Celtics");
        board.fantasy_rank = Some(1);
        board.position = Some("F".into());

        let players = merge_players(vec![stats, board]);
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.name, "Jayson Tatum");
        assert_eq!(p.position, "F");
        assert_eq!(p.recent_form, vec![0.5, 0.75, 1.0]);
        assert_eq!(p.sources.len(), 2);
        assert!(p.fantasy_relevance > 0.8);
    }

    #[test]
    fn form_window_keeps_latest_games() {
        let mut raw = raw_player("s", 0.9, "A", "Boston Celtics");
        raw.stats.insert("points".into(), 10.0);
        raw.game_log = (1..=15).map(|x| x as f64).collect();
        let p = &merge_players(vec![raw])[0];
        assert_eq!(p.recent_form.len(), FORM_WINDOW);
        assert_relative_eq!(p.recent_form[FORM_WINDOW - 1], 0.75);
    }

    #[test]
    fn players_sorted_by_relevance() {
        let mut a = raw_player("f", 0.9, "Bench Guy", "Boston Celtics");
        a.fantasy_rank = Some(15);
        let mut b = raw_player("f", 0.9, "Star", "Boston Celtics");
        b.fantasy_rank = Some(1);
        let players = merge_players(vec![a, b]);
        assert_eq!(players[0].name, "Star");
    }
}
