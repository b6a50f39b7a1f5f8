//! Deterministic synthetic payloads for demo mode.
//!
//! Every provider kind gets a payload in the same shape its real counterpart
//! returns, so the normalizer, ensemble and ranker run exactly the same code
//! path with or without credentials. Schedules are anchored to a caller-given
//! instant (today's UTC midnight in production) and contain no randomness.

use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};
use url::Url;

use super::catalog::odds_key;
use super::descriptor::{ProviderKind, SourceDescriptor};
use crate::models::Sport;
use crate::normalize::weather::nearest_city;

pub fn today_anchor() -> DateTime<Utc> {
    Utc.from_utc_datetime(&Utc::now().date_naive().and_time(NaiveTime::default()))
}

struct DemoGame {
    sport: Sport,
    home: &'static str,
    home_abbr: &'static str,
    away: &'static str,
    away_abbr: &'static str,
    venue: &'static str,
    city: &'static str,
    /// Minutes after the anchor
    start_offset_min: i64,
    total: f64,
    home_spread: f64,
    home_ml: i32,
    away_ml: i32,
}

const GAMES: &[DemoGame] = &[
    DemoGame { sport: Sport::Nba, home: "Boston Celtics", home_abbr: "BOS", away: "Los Angeles Lakers", away_abbr: "LAL", venue: "TD Garden", city: "Boston", start_offset_min: 1410, total: 229.5, home_spread: -5.5, home_ml: -220, away_ml: 180 },
    DemoGame { sport: Sport::Nba, home: "Denver Nuggets", home_abbr: "DEN", away: "Golden State Warriors", away_abbr: "GSW", venue: "Ball Arena", city: "Denver", start_offset_min: 1500, total: 231.5, home_spread: -3.5, home_ml: -165, away_ml: 140 },
    DemoGame { sport: Sport::Nba, home: "Milwaukee Bucks", home_abbr: "MIL", away: "Phoenix Suns", away_abbr: "PHX", venue: "Fiserv Forum", city: "Milwaukee", start_offset_min: 1440, total: 226.0, home_spread: -2.0, home_ml: -130, away_ml: 110 },
    DemoGame { sport: Sport::Nfl, home: "Kansas City Chiefs", home_abbr: "KC", away: "Buffalo Bills", away_abbr: "BUF", venue: "Arrowhead Stadium", city: "Kansas City", start_offset_min: 2460, total: 47.5, home_spread: -2.5, home_ml: -140, away_ml: 120 },
    DemoGame { sport: Sport::Nfl, home: "Green Bay Packers", home_abbr: "GB", away: "Chicago Bears", away_abbr: "CHI", venue: "Lambeau Field", city: "Green Bay", start_offset_min: 2460, total: 42.0, home_spread: -6.5, home_ml: -280, away_ml: 230 },
    DemoGame { sport: Sport::Mlb, home: "New York Yankees", home_abbr: "NYY", away: "Boston Red Sox", away_abbr: "BOS", venue: "Yankee Stadium", city: "New York", start_offset_min: 1385, total: 8.5, home_spread: -1.5, home_ml: -150, away_ml: 130 },
    DemoGame { sport: Sport::Mlb, home: "Chicago Cubs", home_abbr: "CHC", away: "St. Louis Cardinals", away_abbr: "STL", venue: "Wrigley Field", city: "Chicago", start_offset_min: 1200, total: 7.5, home_spread: -1.5, home_ml: -125, away_ml: 105 },
];

struct DemoPlayer {
    id: &'static str,
    sport: Sport,
    name: &'static str,
    team: &'static str,
    position: &'static str,
    averages: &'static [(&'static str, f64)],
    injury: Option<&'static str>,
    /// Stat offered on the projection board and its line relative to average
    board: (&'static str, f64),
}

const PLAYERS: &[DemoPlayer] = &[
    DemoPlayer { id: "nba-tatum", sport: Sport::Nba, name: "Jayson Tatum", team: "Boston Celtics", position: "F", averages: &[("points", 27.1), ("rebounds", 8.4), ("assists", 4.9)], injury: None, board: ("points", 0.92) },
    DemoPlayer { id: "nba-james", sport: Sport::Nba, name: "LeBron James", team: "Los Angeles Lakers", position: "F", averages: &[("points", 25.4), ("rebounds", 7.3), ("assists", 8.1)], injury: None, board: ("assists", 1.04) },
    DemoPlayer { id: "nba-jokic", sport: Sport::Nba, name: "Nikola Jokic", team: "Denver Nuggets", position: "C", averages: &[("points", 26.3), ("rebounds", 12.2), ("assists", 9.0)], injury: None, board: ("rebounds", 0.9) },
    DemoPlayer { id: "nba-curry", sport: Sport::Nba, name: "Stephen Curry", team: "Golden State Warriors", position: "G", averages: &[("points", 26.8), ("rebounds", 4.5), ("assists", 5.1)], injury: Some("Questionable"), board: ("points", 1.0) },
    DemoPlayer { id: "nba-giannis", sport: Sport::Nba, name: "Giannis Antetokounmpo", team: "Milwaukee Bucks", position: "F", averages: &[("points", 30.2), ("rebounds", 11.5), ("assists", 6.3)], injury: None, board: ("points", 0.93) },
    DemoPlayer { id: "nba-booker", sport: Sport::Nba, name: "Devin Booker", team: "Phoenix Suns", position: "G", averages: &[("points", 27.0), ("rebounds", 4.6), ("assists", 6.8)], injury: None, board: ("points", 1.06) },
    DemoPlayer { id: "nfl-mahomes", sport: Sport::Nfl, name: "Patrick Mahomes", team: "Kansas City Chiefs", position: "QB", averages: &[("passing_yards", 262.0), ("passing_tds", 1.9), ("fantasy_points", 21.8)], injury: None, board: ("passing_yards", 0.95) },
    DemoPlayer { id: "nfl-allen", sport: Sport::Nfl, name: "Josh Allen", team: "Buffalo Bills", position: "QB", averages: &[("passing_yards", 248.0), ("rushing_yards", 36.0), ("fantasy_points", 23.4)], injury: None, board: ("rushing_yards", 0.9) },
    DemoPlayer { id: "nfl-kelce", sport: Sport::Nfl, name: "Travis Kelce", team: "Kansas City Chiefs", position: "TE", averages: &[("receiving_yards", 64.0), ("receptions", 6.1), ("fantasy_points", 13.2)], injury: None, board: ("receiving_yards", 1.05) },
    DemoPlayer { id: "nfl-love", sport: Sport::Nfl, name: "Jordan Love", team: "Green Bay Packers", position: "QB", averages: &[("passing_yards", 241.0), ("passing_tds", 1.7), ("fantasy_points", 18.6)], injury: None, board: ("passing_yards", 0.97) },
    DemoPlayer { id: "mlb-judge", sport: Sport::Mlb, name: "Aaron Judge", team: "New York Yankees", position: "OF", averages: &[("total_bases", 2.3), ("hits", 1.1), ("home_runs", 0.35)], injury: None, board: ("total_bases", 0.85) },
    DemoPlayer { id: "mlb-devers", sport: Sport::Mlb, name: "Rafael Devers", team: "Boston Red Sox", position: "3B", averages: &[("total_bases", 1.9), ("hits", 1.0), ("home_runs", 0.22)], injury: None, board: ("total_bases", 1.1) },
    DemoPlayer { id: "mlb-suzuki", sport: Sport::Mlb, name: "Seiya Suzuki", team: "Chicago Cubs", position: "OF", averages: &[("total_bases", 1.7), ("hits", 0.95), ("home_runs", 0.18)], injury: None, board: ("total_bases", 0.95) },
];

/// Per-game multipliers of the primary stat, oldest first.
const FORM_PATTERNS: [[f64; 10]; 3] = [
    [1.05, 0.95, 1.1, 1.2, 1.15, 1.25, 1.3, 1.2, 1.35, 1.3],
    [1.0, 1.1, 0.9, 0.95, 0.85, 0.9, 0.8, 0.85, 0.75, 0.8],
    [0.95, 1.05, 1.0, 0.9, 1.1, 1.0, 0.95, 1.05, 1.0, 1.02],
];

const HEADLINES: &[(&str, &str)] = &[
    ("Celtics roll behind dominant Tatum performance", "Boston extends its win streak with another blowout."),
    ("Lakers struggle on the road as injury concerns grow", "Los Angeles has lost three straight away from home."),
    ("Nuggets surge as Jokic posts another triple-double", "Denver looks healthy and rested."),
    ("Warriors slump continues, Curry questionable", "Golden State is banged up heading into Denver."),
    ("Chiefs offense clicking ahead of Bills showdown", "Kansas City has scored 30+ in three straight."),
    ("Bears lose starting tackle to injury", "Chicago's line takes another hit."),
    ("Yankees win streak reaches six", "New York dominant at home."),
];

const REDDIT_POSTS: &[(&str, i64, i64)] = &[
    ("Bucks are on fire, hammering the over tonight", 412, 88),
    ("Suns look terrible lately, fading them", 230, 61),
    ("Packers defense is elite, lock of the day", 518, 140),
    ("Cardinals bullpen collapse again, brutal", 190, 45),
    ("Jokic is a cheat code, best player alive", 880, 210),
];

fn round_half(x: f64) -> f64 {
    (x - 0.5).round() + 0.5
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn games_for(sport: Option<Sport>) -> impl Iterator<Item = &'static DemoGame> {
    GAMES
        .iter()
        .filter(move |g| sport.map_or(true, |s| g.sport == s))
}

fn players_for(sport: Option<Sport>) -> impl Iterator<Item = (usize, &'static DemoPlayer)> {
    PLAYERS
        .iter()
        .enumerate()
        .filter(move |(_, p)| sport.map_or(true, |s| p.sport == s))
}

fn primary_average(p: &DemoPlayer) -> f64 {
    let key = p.sport.primary_stat();
    p.averages
        .iter()
        .find(|(k, _)| *k == key)
        .or_else(|| p.averages.first())
        .map(|(_, v)| *v)
        .unwrap_or(1.0)
}

fn average_of(p: &DemoPlayer, stat: &str) -> f64 {
    p.averages
        .iter()
        .find(|(k, _)| *k == stat)
        .map(|(_, v)| *v)
        .unwrap_or_else(|| primary_average(p))
}

/// Build the payload a provider of `descriptor`'s kind would return.
pub fn payload_for(descriptor: &SourceDescriptor, anchor: DateTime<Utc>) -> Value {
    match descriptor.provider {
        ProviderKind::EspnScoreboard => espn_scoreboard(descriptor.sport, anchor),
        ProviderKind::LeagueStats => league_stats(descriptor.sport, anchor),
        ProviderKind::OddsApi => odds_api(descriptor.sport, anchor),
        ProviderKind::FantasyProjections => fantasy_projections(descriptor.sport, anchor),
        ProviderKind::NewsRss => news_rss(anchor),
        ProviderKind::RedditListing => reddit_listing(),
        ProviderKind::OpenMeteo => open_meteo(&descriptor.endpoint),
        ProviderKind::FinancialQuote => financial_quote(),
    }
}

fn espn_scoreboard(sport: Option<Sport>, anchor: DateTime<Utc>) -> Value {
    let events: Vec<Value> = games_for(sport)
        .enumerate()
        .map(|(i, g)| {
            let start = anchor + Duration::minutes(g.start_offset_min);
            json!({
                "id": format!("espn-{}-{}", g.sport, i),
                "date": start.format("%Y-%m-%dT%H:%MZ").to_string(),
                "name": format!("{} at {}", g.away, g.home),
                "status": { "type": { "state": "pre", "completed": false } },
                "competitions": [{
                    "venue": { "fullName": g.venue, "address": { "city": g.city } },
                    "competitors": [
                        { "homeAway": "home", "team": { "abbreviation": g.home_abbr, "displayName": g.home } },
                        { "homeAway": "away", "team": { "abbreviation": g.away_abbr, "displayName": g.away } }
                    ]
                }]
            })
        })
        .collect();
    let league = sport.map(|s| s.as_str().to_uppercase()).unwrap_or_default();
    json!({
        "leagues": [{ "abbreviation": league }],
        "season": { "year": anchor.format("%Y").to_string() },
        "day": { "date": anchor.format("%Y-%m-%d").to_string() },
        "events": events,
    })
}

fn league_stats(sport: Option<Sport>, anchor: DateTime<Utc>) -> Value {
    let games: Vec<Value> = games_for(sport)
        .enumerate()
        .map(|(i, g)| {
            // Official feeds list the scheduled time a few minutes off the broadcast time
            let start = anchor + Duration::minutes(g.start_offset_min + 5);
            json!({
                "id": format!("sr-{}-{}", g.sport, i),
                "home": { "name": g.home, "alias": g.home_abbr },
                "away": { "name": g.away, "alias": g.away_abbr },
                "scheduled": rfc3339(start),
                "status": "scheduled",
                "venue": { "name": g.venue, "city": g.city }
            })
        })
        .collect();
    let players: Vec<Value> = players_for(sport)
        .map(|(i, p)| {
            let avg = primary_average(p);
            let log: Vec<f64> = FORM_PATTERNS[i % FORM_PATTERNS.len()]
                .iter()
                .map(|m| (avg * m * 100.0).round() / 100.0)
                .collect();
            let averages: serde_json::Map<String, Value> = p
                .averages
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            json!({
                "id": format!("sr-{}", p.id),
                "full_name": p.name,
                "team": { "name": p.team },
                "position": p.position,
                "sport": p.sport.as_str(),
                "injury": p.injury.map(|s| json!({ "status": s })),
                "averages": averages,
                "game_log": log,
            })
        })
        .collect();
    json!({
        "league": sport.map(|s| s.as_str()).unwrap_or("multi"),
        "season": anchor.format("%Y").to_string(),
        "games": games,
        "players": players,
    })
}

fn odds_api(sport: Option<Sport>, anchor: DateTime<Utc>) -> Value {
    let events: Vec<Value> = games_for(sport)
        .enumerate()
        .map(|(i, g)| {
            let start = anchor + Duration::minutes(g.start_offset_min);
            let mut markets = vec![
                json!({ "key": "h2h", "outcomes": [
                    { "name": g.home, "price": g.home_ml },
                    { "name": g.away, "price": g.away_ml }
                ]}),
                json!({ "key": "spreads", "outcomes": [
                    { "name": g.home, "price": -110, "point": g.home_spread },
                    { "name": g.away, "price": -110, "point": -g.home_spread }
                ]}),
                json!({ "key": "totals", "outcomes": [
                    { "name": "Over", "price": -110, "point": g.total },
                    { "name": "Under", "price": -110, "point": g.total }
                ]}),
            ];
            let props: Vec<Value> = PLAYERS
                .iter()
                .filter(|p| p.sport == g.sport && p.team == g.home)
                .flat_map(|p| {
                    let stat = p.sport.primary_stat();
                    let line = round_half(average_of(p, stat) * 0.98);
                    [
                        json!({ "name": "Over", "description": p.name, "price": -115, "point": line }),
                        json!({ "name": "Under", "description": p.name, "price": -105, "point": line }),
                    ]
                })
                .collect();
            if !props.is_empty() {
                let key = format!("player_{}", g.sport.primary_stat());
                markets.push(json!({ "key": key, "outcomes": props }));
            }
            json!({
                "id": format!("oa-{}-{}", g.sport, i),
                "sport_key": odds_key(g.sport),
                "commence_time": rfc3339(start),
                "home_team": g.home,
                "away_team": g.away,
                "bookmakers": [{ "key": "draftkings", "title": "DraftKings", "markets": markets }]
            })
        })
        .collect();
    Value::Array(events)
}

fn fantasy_projections(sport: Option<Sport>, anchor: DateTime<Utc>) -> Value {
    let projections: Vec<Value> = players_for(sport)
        .map(|(i, p)| {
            let (stat, factor) = p.board;
            let line = round_half(average_of(p, stat) * factor);
            json!({
                "id": format!("pp-{}", p.id),
                "player_name": p.name,
                "team": p.team,
                "position": p.position,
                "sport": p.sport.as_str().to_uppercase(),
                "stat_type": stat,
                "line": line,
                "platform": if i % 2 == 0 { "PrizePicks" } else { "Underdog" },
                "fantasy_rank": i + 1,
            })
        })
        .collect();
    json!({ "updated_at": rfc3339(anchor), "projections": projections })
}

fn news_rss(anchor: DateTime<Utc>) -> Value {
    let items: Vec<Value> = HEADLINES
        .iter()
        .enumerate()
        .map(|(i, (title, desc))| {
            json!({
                "title": title,
                "description": desc,
                "pubDate": (anchor - Duration::hours(i as i64 + 1)).format("%Y-%m-%d %H:%M:%S").to_string(),
            })
        })
        .collect();
    json!({
        "status": "ok",
        "feed": { "title": "Sports headlines", "url": "https://www.espn.com/espn/rss/news" },
        "items": items,
    })
}

fn reddit_listing() -> Value {
    let children: Vec<Value> = REDDIT_POSTS
        .iter()
        .map(|(title, score, comments)| {
            json!({ "kind": "t3", "data": { "title": title, "score": score, "num_comments": comments } })
        })
        .collect();
    json!({ "kind": "Listing", "data": { "after": null, "children": children } })
}

fn open_meteo(endpoint: &str) -> Value {
    let (lat, lon) = Url::parse(endpoint)
        .ok()
        .map(|u| {
            let mut lat: f64 = 0.0;
            let mut lon: f64 = 0.0;
            for (k, v) in u.query_pairs() {
                match k.as_ref() {
                    "latitude" => lat = v.parse().unwrap_or(0.0),
                    "longitude" => lon = v.parse().unwrap_or(0.0),
                    _ => {}
                }
            }
            (lat, lon)
        })
        .unwrap_or((0.0, 0.0));
    // Colder and windier further north; deterministic per coordinate.
    let temperature = ((25.0 - (lat - 25.0) * 0.9) * 10.0_f64).round() / 10.0;
    let wind = ((lat * 13.0 + lon.abs() * 7.0) % 35.0 * 10.0).round() / 10.0;
    let code = if nearest_city(lat, lon).is_some_and(|c| c == "Green Bay") {
        61
    } else if wind > 25.0 {
        3
    } else {
        1
    };
    json!({
        "latitude": lat,
        "longitude": lon,
        "current_weather": { "temperature": temperature, "windspeed": wind, "weathercode": code }
    })
}

fn financial_quote() -> Value {
    json!({
        "Global Quote": {
            "01. symbol": "DKNG",
            "05. price": "34.1000",
            "09. change": "0.4100",
            "10. change percent": "1.2170%"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap()
    }

    #[test]
    fn payloads_are_deterministic() {
        let d = SourceDescriptor::new("odds-nba", "Odds", ProviderKind::OddsApi, "https://x")
            .with_sport(Sport::Nba);
        assert_eq!(payload_for(&d, anchor()), payload_for(&d, anchor()));
    }

    #[test]
    fn scoreboard_is_filtered_by_sport() {
        let d = SourceDescriptor::new("espn-nfl", "ESPN", ProviderKind::EspnScoreboard, "https://x")
            .with_sport(Sport::Nfl);
        let v = payload_for(&d, anchor());
        assert_eq!(v["events"].as_array().unwrap().len(), 2);
        assert_eq!(v["leagues"][0]["abbreviation"], "NFL");
    }

    #[test]
    fn odds_include_player_markets_for_home_players() {
        let d = SourceDescriptor::new("odds-nba", "Odds", ProviderKind::OddsApi, "https://x")
            .with_sport(Sport::Nba);
        let v = payload_for(&d, anchor());
        let first = &v[0];
        assert_eq!(first["home_team"], "Boston Celtics");
        let markets = first["bookmakers"][0]["markets"].as_array().unwrap();
        assert!(markets.iter().any(|m| m["key"] == "player_points"));
    }

    #[test]
    fn weather_reads_coordinates_from_endpoint() {
        let d = SourceDescriptor::new(
            "weather-green-bay",
            "Weather",
            ProviderKind::OpenMeteo,
            "https://api.open-meteo.com/v1/forecast?latitude=44.5013&longitude=-88.0622&current_weather=true",
        );
        let v = payload_for(&d, anchor());
        assert!((v["latitude"].as_f64().unwrap() - 44.5013).abs() < 1e-6);
        assert_eq!(v["current_weather"]["weathercode"], 61);
        // Negative longitude still yields a deterministic, non-negative wind.
        let wind = v["current_weather"]["windspeed"].as_f64().unwrap();
        assert!((0.0..35.0).contains(&wind));
        assert_eq!(payload_for(&d, anchor()), v);
    }

    #[test]
    fn round_half_produces_hook_lines() {
        assert_eq!(round_half(24.9), 24.5);
        assert_eq!(round_half(25.2), 25.5);
    }
}
