pub mod merge;
pub mod parsers;
pub mod sentiment;
pub mod weather;

pub use parsers::{Headline, MarketQuote};
pub use sentiment::{SentimentIndex, TeamSentiment};

use serde::Serialize;
use tracing::debug;

use crate::models::{normalize_text, Game, Player, Prop, PropSubject};
use crate::sources::{SourceCategory, SourceSnapshot};
use merge::{attach_fallback_odds, merge_games, merge_players, union_prop};
use parsers::{extract, prop_id};
use weather::attach_weather;

/// Canonical entities built from one registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedData {
    /// Ascending by start time
    pub games: Vec<Game>,
    /// Descending by fantasy relevance
    pub players: Vec<Player>,
    /// Every scoreable line, ordered by id
    pub props: Vec<Prop>,
    pub sentiment: SentimentIndex,
    pub quotes: Vec<MarketQuote>,
    /// Games that received fallback odds
    pub synthesized_odds: usize,
}

impl NormalizedData {
    pub fn game(&self, id: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.id == id)
    }

    pub fn player(&self, prop: &Prop) -> Option<&Player> {
        match &prop.subject {
            PropSubject::Player { name, .. } => {
                let n = normalize_text(name);
                self.players
                    .iter()
                    .find(|p| p.sport == prop.sport && normalize_text(&p.name) == n)
            }
            PropSubject::Game { .. } => None,
        }
    }
}

/// Pure function of the snapshot: the same input always yields the same
/// output, order included.
pub fn normalize(sources: &[SourceSnapshot]) -> NormalizedData {
    let mut raw_games = Vec::new();
    let mut raw_players = Vec::new();
    let mut board_props = Vec::new();
    let mut weather = Vec::new();
    let mut headlines = Vec::new();
    let mut quotes = Vec::new();

    for source in sources {
        let ex = extract(source);
        raw_games.extend(ex.games);
        raw_players.extend(ex.players);
        board_props.extend(ex.props);
        weather.extend(ex.weather);
        headlines.extend(ex.headlines);
        quotes.extend(ex.quotes);
    }

    let mut games = merge_games(raw_games);
    attach_weather(&mut games, &weather);

    let odds_connected = sources
        .iter()
        .any(|s| s.descriptor.category == SourceCategory::Odds && s.state.connected);
    let synthesized_odds = if odds_connected {
        0
    } else {
        attach_fallback_odds(&mut games)
    };

    let players = merge_players(raw_players);

    for game in games.iter_mut() {
        add_total_prop(game);
        add_spread_prop(game);
        for prop in game.props.iter_mut() {
            resolve_team(prop, &players);
        }
    }

    let mut props: Vec<Prop> = Vec::new();
    for game in &games {
        for prop in &game.props {
            union_prop(&mut props, prop.clone());
        }
    }
    for mut prop in board_props {
        resolve_team(&mut prop, &players);
        prop.game_id = game_for(&prop, &games).map(|g| g.id.clone());
        union_prop(&mut props, prop);
    }
    props.sort_by(|a, b| a.id.cmp(&b.id));

    let sentiment = SentimentIndex::build(&games, &headlines);
    debug!(
        "Normalized {} games, {} players, {} props ({} teams with sentiment)",
        games.len(),
        players.len(),
        props.len(),
        sentiment.len()
    );

    NormalizedData {
        games,
        players,
        props,
        sentiment,
        quotes,
        synthesized_odds,
    }
}

pub fn normalize_games(sources: &[SourceSnapshot]) -> Vec<Game> {
    normalize(sources).games
}

pub fn normalize_players(sources: &[SourceSnapshot]) -> Vec<Player> {
    normalize(sources).players
}

/// Game-total line from real odds. Synthetic odds carry no market view.
fn add_total_prop(game: &mut Game) {
    let Some(odds) = game.odds.as_ref().filter(|o| !o.synthetic) else {
        return;
    };
    let Some(line) = odds.total else { return };
    let prop = Prop {
        id: prop_id(&odds.bookmaker, &game.id, "total", line),
        subject: PropSubject::Game {
            game_id: game.id.clone(),
        },
        sport: game.sport,
        market: "total".to_string(),
        line,
        game_id: Some(game.id.clone()),
        over_price: odds.over_price,
        under_price: odds.under_price,
        platform: odds.bookmaker.clone(),
        source_id: odds.source_id.clone(),
    };
    union_prop(&mut game.props, prop);
}

/// Home-margin line from the real spread: a home spread of -5.5 becomes a
/// line of 5.5, Over taking the home side.
fn add_spread_prop(game: &mut Game) {
    let Some(odds) = game.odds.as_ref().filter(|o| !o.synthetic) else {
        return;
    };
    let Some(spread) = odds.home_spread else { return };
    // Adding 0.0 folds a pick'em -0.0 into 0.0
    let line = -spread + 0.0;
    let prop = Prop {
        id: prop_id(&odds.bookmaker, &game.id, "spread", line),
        subject: PropSubject::Game {
            game_id: game.id.clone(),
        },
        sport: game.sport,
        market: "spread".to_string(),
        line,
        game_id: Some(game.id.clone()),
        over_price: odds.spread_price,
        under_price: odds.away_spread_price,
        platform: odds.bookmaker.clone(),
        source_id: odds.source_id.clone(),
    };
    union_prop(&mut game.props, prop);
}

fn resolve_team(prop: &mut Prop, players: &[Player]) {
    if let PropSubject::Player { name, team } = &mut prop.subject {
        let n = normalize_text(name);
        if let Some(p) = players
            .iter()
            .find(|p| p.sport == prop.sport && normalize_text(&p.name) == n)
        {
            if team.is_empty() {
                *team = p.team.clone();
            }
        }
    }
}

fn game_for<'a>(prop: &Prop, games: &'a [Game]) -> Option<&'a Game> {
    match &prop.subject {
        PropSubject::Player { team, .. } if !team.is_empty() => games
            .iter()
            .find(|g| g.sport == prop.sport && g.involves_team(team)),
        _ => None,
    }
}
