//! Provider payload parsers.
//!
//! Every parser walks `serde_json::Value` defensively: a record missing a
//! required field is skipped (logged at debug) and the rest of the payload is
//! still used. Nothing here returns an error for a bad record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::weather::nearest_city;
use crate::models::{normalize_text, GameStatus, OddsSnapshot, Prop, PropSubject, Sport, WeatherSnapshot};
use crate::sources::{ProviderKind, SourceSnapshot};

/// A game as one source describes it, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGame {
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub status: GameStatus,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub odds: Option<OddsSnapshot>,
    /// Player props quoted alongside the game (odds feeds)
    pub props: Vec<Prop>,
    pub source_id: String,
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPlayer {
    pub sport: Sport,
    pub name: String,
    pub team: String,
    pub position: Option<String>,
    pub stats: BTreeMap<String, f64>,
    /// Primary-stat values, oldest first
    pub game_log: Vec<f64>,
    pub injury_status: Option<String>,
    pub fantasy_rank: Option<u32>,
    pub source_id: String,
    pub reliability: f64,
}

/// A piece of text that feeds the sentiment index.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub text: String,
    pub weight: f64,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: f64,
    pub change_pct: f64,
    pub source_id: String,
}

/// Everything one source contributed.
#[derive(Debug, Default)]
pub struct Extracted {
    pub games: Vec<RawGame>,
    pub players: Vec<RawPlayer>,
    /// Props not tied to a parsed game (projection boards)
    pub props: Vec<Prop>,
    pub weather: Vec<WeatherSnapshot>,
    pub headlines: Vec<Headline>,
    pub quotes: Vec<MarketQuote>,
}

/// Dispatch on the provider kind fixed at registration.
pub fn extract(source: &SourceSnapshot) -> Extracted {
    let Some(payload) = source.payload() else {
        return Extracted::default();
    };
    let ctx = Ctx {
        source_id: &source.descriptor.id,
        sport: source.descriptor.sport,
        reliability: source.state.reliability,
    };
    match source.descriptor.provider {
        ProviderKind::EspnScoreboard => espn_scoreboard(&ctx, payload),
        ProviderKind::LeagueStats => league_stats(&ctx, payload),
        ProviderKind::OddsApi => odds_api(&ctx, payload),
        ProviderKind::FantasyProjections => fantasy_projections(&ctx, payload),
        ProviderKind::NewsRss => news_rss(&ctx, payload),
        ProviderKind::RedditListing => reddit_listing(&ctx, payload),
        ProviderKind::OpenMeteo => open_meteo(&ctx, payload),
        ProviderKind::FinancialQuote => financial_quote(&ctx, payload),
    }
}

struct Ctx<'a> {
    source_id: &'a str,
    sport: Option<Sport>,
    reliability: f64,
}

fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(v, |cur, key| cur.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numbers sometimes arrive as strings ("34.10", "1.2%").
fn num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn num_at(v: &Value, path: &[&str]) -> Option<f64> {
    path.iter().try_fold(v, |cur, key| cur.get(*key)).and_then(num)
}

pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Largest price magnitude taken at face value.
const MAX_AMERICAN: f64 = 100_000.0;

/// American prices live in (-inf, -100] and [100, +inf); anything between,
/// or absurdly far out, is treated as missing.
fn american(v: Option<&Value>) -> Option<i32> {
    v.and_then(num)
        .map(f64::round)
        .filter(|p| (100.0..=MAX_AMERICAN).contains(&p.abs()))
        .map(|p| p as i32)
}

pub fn prop_id(platform: &str, subject: &str, market: &str, line: f64) -> String {
    format!(
        "{}:{}:{}:{}",
        normalize_text(platform).replace(' ', "-"),
        normalize_text(subject).replace(' ', "-"),
        market,
        line
    )
}

fn espn_scoreboard(ctx: &Ctx, payload: &Value) -> Extracted {
    let sport = ctx.sport.or_else(|| {
        payload
            .get("leagues")
            .and_then(|l| l.get(0))
            .and_then(|l| str_at(l, &["abbreviation"]))
            .and_then(Sport::parse)
    });
    let Some(sport) = sport else {
        debug!("{}: scoreboard without a sport, skipped", ctx.source_id);
        return Extracted::default();
    };

    let events = payload.get("events").and_then(Value::as_array);
    let games = events
        .into_iter()
        .flatten()
        .filter_map(|ev| {
            let comp = ev.get("competitions")?.get(0)?;
            let competitors = comp.get("competitors")?.as_array()?;
            let side = |which: &str| {
                competitors
                    .iter()
                    .find(|c| str_at(c, &["homeAway"]) == Some(which))
                    .and_then(|c| str_at(c, &["team", "displayName"]))
            };
            let (Some(home), Some(away)) = (side("home"), side("away")) else {
                debug!("{}: event without home/away, skipped", ctx.source_id);
                return None;
            };
            let start = str_at(ev, &["date"]).and_then(parse_time)?;
            Some(RawGame {
                sport,
                home_team: home.to_string(),
                away_team: away.to_string(),
                start_time: start,
                status: str_at(ev, &["status", "type", "state"])
                    .map(GameStatus::from_str_lenient)
                    .unwrap_or(GameStatus::Scheduled),
                venue: str_at(comp, &["venue", "fullName"]).map(str::to_string),
                city: str_at(comp, &["venue", "address", "city"]).map(str::to_string),
                odds: None,
                props: vec![],
                source_id: ctx.source_id.to_string(),
                reliability: ctx.reliability,
            })
        })
        .collect();

    Extracted {
        games,
        ..Default::default()
    }
}

fn league_stats(ctx: &Ctx, payload: &Value) -> Extracted {
    let feed_sport = ctx
        .sport
        .or_else(|| str_at(payload, &["league"]).and_then(Sport::parse));

    let games = feed_sport
        .into_iter()
        .flat_map(|sport| {
            payload
                .get("games")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(move |g| {
                    let home = str_at(g, &["home", "name"])?;
                    let away = str_at(g, &["away", "name"])?;
                    let start = str_at(g, &["scheduled"]).and_then(parse_time)?;
                    Some(RawGame {
                        sport,
                        home_team: home.to_string(),
                        away_team: away.to_string(),
                        start_time: start,
                        status: str_at(g, &["status"])
                            .map(GameStatus::from_str_lenient)
                            .unwrap_or(GameStatus::Scheduled),
                        venue: str_at(g, &["venue", "name"]).map(str::to_string),
                        city: str_at(g, &["venue", "city"]).map(str::to_string),
                        odds: None,
                        props: vec![],
                        source_id: ctx.source_id.to_string(),
                        reliability: ctx.reliability,
                    })
                })
        })
        .collect();

    let players = payload
        .get("players")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| {
            let sport = str_at(p, &["sport"]).and_then(Sport::parse).or(feed_sport)?;
            let name = str_at(p, &["full_name"]).or_else(|| str_at(p, &["name"]))?;
            let team = str_at(p, &["team", "name"])?;
            let stats: BTreeMap<String, f64> = p
                .get("averages")
                .and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| num(v).map(|x| (k.clone(), x)))
                        .collect()
                })
                .unwrap_or_default();
            let game_log: Vec<f64> = p
                .get("game_log")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(num).collect())
                .unwrap_or_default();
            Some(RawPlayer {
                sport,
                name: name.to_string(),
                team: team.to_string(),
                position: str_at(p, &["position"]).map(str::to_string),
                stats,
                game_log,
                injury_status: str_at(p, &["injury", "status"]).map(str::to_string),
                fantasy_rank: None,
                source_id: ctx.source_id.to_string(),
                reliability: ctx.reliability,
            })
        })
        .collect();

    Extracted {
        games,
        players,
        ..Default::default()
    }
}

fn odds_api(ctx: &Ctx, payload: &Value) -> Extracted {
    let games = payload
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|g| {
            let sport = str_at(g, &["sport_key"]).and_then(Sport::parse).or(ctx.sport)?;
            let home = str_at(g, &["home_team"])?;
            let away = str_at(g, &["away_team"])?;
            let start = str_at(g, &["commence_time"]).and_then(parse_time)?;
            let book = g
                .get("bookmakers")
                .and_then(Value::as_array)
                .and_then(|b| b.iter().find(|bk| bk.get("markets").is_some()));

            let (odds, props) = match book {
                Some(book) => odds_from_book(ctx, sport, home, book),
                None => (None, vec![]),
            };
            Some(RawGame {
                sport,
                home_team: home.to_string(),
                away_team: away.to_string(),
                start_time: start,
                status: GameStatus::Scheduled,
                venue: None,
                city: None,
                odds,
                props,
                source_id: ctx.source_id.to_string(),
                reliability: ctx.reliability,
            })
        })
        .collect();

    Extracted {
        games,
        ..Default::default()
    }
}

fn odds_from_book(ctx: &Ctx, sport: Sport, home: &str, book: &Value) -> (Option<OddsSnapshot>, Vec<Prop>) {
    let bookmaker = str_at(book, &["title"])
        .or_else(|| str_at(book, &["key"]))
        .unwrap_or("unknown");
    let mut odds = OddsSnapshot {
        bookmaker: bookmaker.to_string(),
        home_moneyline: None,
        away_moneyline: None,
        home_spread: None,
        spread_price: None,
        away_spread_price: None,
        total: None,
        over_price: None,
        under_price: None,
        synthetic: false,
        source_id: ctx.source_id.to_string(),
    };
    let mut props = Vec::new();
    let is_home = |name: Option<&str>| name.is_some_and(|n| normalize_text(n) == normalize_text(home));

    for market in book.get("markets").and_then(Value::as_array).into_iter().flatten() {
        let Some(key) = str_at(market, &["key"]) else { continue };
        let outcomes: &[Value] = market
            .get("outcomes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        match key {
            "h2h" => {
                for o in outcomes {
                    if is_home(str_at(o, &["name"])) {
                        odds.home_moneyline = american(o.get("price"));
                    } else {
                        odds.away_moneyline = american(o.get("price"));
                    }
                }
            }
            "spreads" => {
                for o in outcomes {
                    if is_home(str_at(o, &["name"])) {
                        odds.home_spread = num_at(o, &["point"]);
                        odds.spread_price = american(o.get("price"));
                    } else {
                        odds.away_spread_price = american(o.get("price"));
                    }
                }
            }
            "totals" => {
                for o in outcomes {
                    match str_at(o, &["name"]).map(str::to_lowercase).as_deref() {
                        Some("over") => {
                            odds.total = num_at(o, &["point"]);
                            odds.over_price = american(o.get("price"));
                        }
                        Some("under") => odds.under_price = american(o.get("price")),
                        _ => {}
                    }
                }
            }
            k if k.starts_with("player_") => {
                let stat = &k["player_".len()..];
                props.extend(player_market_props(ctx, sport, bookmaker, stat, outcomes));
            }
            _ => debug!("{}: ignoring market '{}'", ctx.source_id, key),
        }
    }

    let has_any = odds.home_moneyline.is_some() || odds.home_spread.is_some() || odds.total.is_some();
    (has_any.then_some(odds), props)
}

/// Pair Over/Under outcomes per player into one prop each.
fn player_market_props(ctx: &Ctx, sport: Sport, book: &str, stat: &str, outcomes: &[Value]) -> Vec<Prop> {
    let mut by_player: BTreeMap<String, (f64, Option<i32>, Option<i32>)> = BTreeMap::new();
    for o in outcomes {
        let (Some(player), Some(line)) = (str_at(o, &["description"]), num_at(o, &["point"])) else {
            continue;
        };
        let entry = by_player.entry(player.to_string()).or_insert((line, None, None));
        match str_at(o, &["name"]).map(str::to_lowercase).as_deref() {
            Some("over") => entry.1 = american(o.get("price")),
            Some("under") => entry.2 = american(o.get("price")),
            _ => {}
        }
    }
    by_player
        .into_iter()
        .map(|(name, (line, over, under))| Prop {
            id: prop_id(book, &name, stat, line),
            subject: PropSubject::Player {
                name,
                // Resolved against the player index after merging
                team: String::new(),
            },
            sport,
            market: stat.to_string(),
            line,
            game_id: None,
            over_price: over,
            under_price: under,
            platform: book.to_string(),
            source_id: ctx.source_id.to_string(),
        })
        .collect()
}

fn fantasy_projections(ctx: &Ctx, payload: &Value) -> Extracted {
    let mut out = Extracted::default();
    for p in payload.get("projections").and_then(Value::as_array).into_iter().flatten() {
        let (Some(name), Some(team), Some(stat), Some(line)) = (
            str_at(p, &["player_name"]),
            str_at(p, &["team"]),
            str_at(p, &["stat_type"]),
            num_at(p, &["line"]),
        ) else {
            debug!("{}: incomplete projection, skipped", ctx.source_id);
            continue;
        };
        let Some(sport) = str_at(p, &["sport"]).and_then(Sport::parse).or(ctx.sport) else {
            continue;
        };
        let platform = str_at(p, &["platform"]).unwrap_or("DFS");
        out.props.push(Prop {
            id: prop_id(platform, name, stat, line),
            subject: PropSubject::Player {
                name: name.to_string(),
                team: team.to_string(),
            },
            sport,
            market: stat.to_string(),
            line,
            game_id: None,
            over_price: None,
            under_price: None,
            platform: platform.to_string(),
            source_id: ctx.source_id.to_string(),
        });
        out.players.push(RawPlayer {
            sport,
            name: name.to_string(),
            team: team.to_string(),
            position: str_at(p, &["position"]).map(str::to_string),
            stats: BTreeMap::new(),
            game_log: vec![],
            injury_status: None,
            fantasy_rank: num_at(p, &["fantasy_rank"]).map(|r| r.max(1.0) as u32),
            source_id: ctx.source_id.to_string(),
            reliability: ctx.reliability,
        });
    }
    out
}

fn news_rss(ctx: &Ctx, payload: &Value) -> Extracted {
    let headlines = payload
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let title = str_at(item, &["title"])?;
            let text = match str_at(item, &["description"]) {
                Some(desc) => format!("{} {}", title, desc),
                None => title.to_string(),
            };
            Some(Headline {
                text,
                weight: 1.0,
                source_id: ctx.source_id.to_string(),
            })
        })
        .collect();
    Extracted {
        headlines,
        ..Default::default()
    }
}

fn reddit_listing(ctx: &Ctx, payload: &Value) -> Extracted {
    let headlines = payload
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|child| {
            let post = child.get("data")?;
            let title = str_at(post, &["title"])?;
            let score = num_at(post, &["score"]).unwrap_or(0.0).max(0.0);
            // Social chatter counts for less than reporting, upvotes add a little back.
            Some(Headline {
                text: title.to_string(),
                weight: (0.4 + (1.0 + score).ln() / 20.0).min(1.0),
                source_id: ctx.source_id.to_string(),
            })
        })
        .collect();
    Extracted {
        headlines,
        ..Default::default()
    }
}

fn open_meteo(ctx: &Ctx, payload: &Value) -> Extracted {
    let (Some(lat), Some(lon)) = (num_at(payload, &["latitude"]), num_at(payload, &["longitude"])) else {
        return Extracted::default();
    };
    let Some(city) = nearest_city(lat, lon) else {
        debug!("{}: no known city near ({}, {})", ctx.source_id, lat, lon);
        return Extracted::default();
    };
    let Some(current) = payload.get("current_weather") else {
        return Extracted::default();
    };
    let snapshot = (|| {
        Some(WeatherSnapshot {
            city: city.to_string(),
            temperature_c: num_at(current, &["temperature"])?,
            wind_kph: num_at(current, &["windspeed"])?,
            weather_code: num_at(current, &["weathercode"]).unwrap_or(0.0) as i32,
            source_id: ctx.source_id.to_string(),
        })
    })();
    Extracted {
        weather: snapshot.into_iter().collect(),
        ..Default::default()
    }
}

fn financial_quote(ctx: &Ctx, payload: &Value) -> Extracted {
    let Some(quote) = payload.get("Global Quote") else {
        return Extracted::default();
    };
    let parsed = (|| {
        Some(MarketQuote {
            symbol: str_at(quote, &["01. symbol"])?.to_string(),
            price: num_at(quote, &["05. price"])?,
            change_pct: num_at(quote, &["10. change percent"]).unwrap_or(0.0),
            source_id: ctx.source_id.to_string(),
        })
    })();
    Extracted {
        quotes: parsed.into_iter().collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::demo::payload_for;
    use crate::sources::{SourceDescriptor, SourceState};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn snapshot(descriptor: SourceDescriptor, payload: Value) -> SourceSnapshot {
        let mut state = SourceState::new(&descriptor);
        state.connected = true;
        state.reliability = descriptor.provider.reliability_baseline();
        state.last_payload = Some(Arc::new(payload));
        SourceSnapshot { descriptor, state }
    }

    fn demo(id: &str, kind: ProviderKind, sport: Option<Sport>, endpoint: &str) -> SourceSnapshot {
        let mut d = SourceDescriptor::new(id, id, kind, endpoint);
        if let Some(s) = sport {
            d = d.with_sport(s);
        }
        let anchor = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        let payload = payload_for(&d, anchor);
        snapshot(d, payload)
    }

    #[test]
    fn parses_espn_short_dates() {
        let t = parse_time("2026-10-18T23:30Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2026, 10, 18, 23, 30, 0).unwrap());
        assert!(parse_time("yesterday").is_none());
    }

    #[test]
    fn scoreboard_yields_games_with_venue() {
        let ex = extract(&demo("espn-nba", ProviderKind::EspnScoreboard, Some(Sport::Nba), "https://x"));
        assert_eq!(ex.games.len(), 3);
        let g = &ex.games[0];
        assert_eq!(g.home_team, "Boston Celtics");
        assert_eq!(g.city.as_deref(), Some("Boston"));
    }

    #[test]
    fn scoreboard_skips_incomplete_events() {
        let payload = json!({
            "leagues": [{"abbreviation": "NBA"}],
            "events": [
                {"id": "1", "date": "2026-10-18T23:30Z", "competitions": [{"competitors": [
                    {"homeAway": "home", "team": {"displayName": "Boston Celtics"}}
                ]}]},
                {"id": "2", "date": "2026-10-18T23:30Z", "competitions": [{"competitors": [
                    {"homeAway": "home", "team": {"displayName": "Boston Celtics"}},
                    {"homeAway": "away", "team": {"displayName": "Miami Heat"}}
                ]}]},
                "garbage"
            ]
        });
        let d = SourceDescriptor::new("espn", "ESPN", ProviderKind::EspnScoreboard, "https://x");
        let ex = extract(&snapshot(d, payload));
        assert_eq!(ex.games.len(), 1);
        assert_eq!(ex.games[0].sport, Sport::Nba);
    }

    #[test]
    fn odds_feed_builds_snapshot_and_player_props() {
        let ex = extract(&demo("odds-nba", ProviderKind::OddsApi, Some(Sport::Nba), "https://x"));
        let g = &ex.games[0];
        let odds = g.odds.as_ref().unwrap();
        assert_eq!(odds.home_moneyline, Some(-220));
        assert_eq!(odds.away_moneyline, Some(180));
        assert_eq!(odds.home_spread, Some(-5.5));
        assert_eq!(odds.spread_price, Some(-110));
        assert_eq!(odds.away_spread_price, Some(-110));
        assert_eq!(odds.total, Some(229.5));
        assert_eq!(g.props.len(), 1);
        assert_eq!(g.props[0].over_price, Some(-115));
        assert_eq!(g.props[0].under_price, Some(-105));
        assert_eq!(g.props[0].market, "points");
    }

    #[test]
    fn out_of_range_prices_are_dropped() {
        let payload = json!([{
            "id": "x", "sport_key": "basketball_nba", "commence_time": "2026-10-18T23:30:00Z",
            "home_team": "Boston Celtics", "away_team": "Los Angeles Lakers",
            "bookmakers": [{"key": "book", "title": "Book", "markets": [
                {"key": "h2h", "outcomes": [
                    {"name": "Boston Celtics", "price": -1e12},
                    {"name": "Los Angeles Lakers", "price": 50}
                ]},
                {"key": "totals", "outcomes": [
                    {"name": "Over", "price": -110, "point": 229.5},
                    {"name": "Under", "price": 1e12, "point": 229.5}
                ]}
            ]}]
        }]);
        let d = SourceDescriptor::new("odds", "Odds", ProviderKind::OddsApi, "https://x").with_sport(Sport::Nba);
        let ex = extract(&snapshot(d, payload));
        let odds = ex.games[0].odds.as_ref().unwrap();
        assert_eq!(odds.home_moneyline, None);
        assert_eq!(odds.away_moneyline, None);
        assert_eq!(odds.over_price, Some(-110));
        assert_eq!(odds.under_price, None);
        assert_eq!(odds.total, Some(229.5));
    }

    #[test]
    fn league_feed_yields_players_with_logs() {
        let ex = extract(&demo("sr-nba", ProviderKind::LeagueStats, Some(Sport::Nba), "https://x"));
        assert_eq!(ex.games.len(), 3);
        let curry = ex.players.iter().find(|p| p.name == "Stephen Curry").unwrap();
        assert_eq!(curry.injury_status.as_deref(), Some("Questionable"));
        assert_eq!(curry.game_log.len(), 10);
        assert!(curry.stats.contains_key("points"));
    }

    #[test]
    fn projections_yield_props_and_players() {
        let ex = extract(&demo("fantasy", ProviderKind::FantasyProjections, None, "https://x"));
        assert!(!ex.props.is_empty());
        assert_eq!(ex.props.len(), ex.players.len());
        assert!(ex.props.iter().any(|p| p.sport == Sport::Mlb));
    }

    #[test]
    fn text_feeds_become_headlines() {
        let news = extract(&demo("news", ProviderKind::NewsRss, None, "https://x"));
        let reddit = extract(&demo("reddit", ProviderKind::RedditListing, None, "https://x"));
        assert!(!news.headlines.is_empty());
        assert!(reddit.headlines.iter().all(|h| h.weight < 1.0 && h.weight > 0.0));
    }

    #[test]
    fn weather_and_quotes() {
        let w = extract(&demo(
            "weather-chicago",
            ProviderKind::OpenMeteo,
            None,
            "https://api.open-meteo.com/v1/forecast?latitude=41.9484&longitude=-87.6553",
        ));
        assert_eq!(w.weather[0].city, "Chicago");
        let q = extract(&demo("fin", ProviderKind::FinancialQuote, None, "https://x"));
        assert_eq!(q.quotes[0].symbol, "DKNG");
        assert!((q.quotes[0].change_pct - 1.217).abs() < 1e-9);
    }

    #[test]
    fn disconnected_source_contributes_nothing() {
        let mut s = demo("espn-nba", ProviderKind::EspnScoreboard, Some(Sport::Nba), "https://x");
        s.state.connected = false;
        assert!(extract(&s).games.is_empty());
    }
}
