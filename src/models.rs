use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of values kept in `Player::recent_form`.
pub const FORM_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Nfl,
    Mlb,
    Nhl,
    Soccer,
    Ncaab,
    Ncaaf,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Nba => "nba",
            Sport::Nfl => "nfl",
            Sport::Mlb => "mlb",
            Sport::Nhl => "nhl",
            Sport::Soccer => "soccer",
            Sport::Ncaab => "ncaab",
            Sport::Ncaaf => "ncaaf",
        }
    }

    /// Lenient parse accepting league abbreviations and odds-feed sport keys
    /// such as `basketball_nba` or `americanfootball_nfl`.
    pub fn parse(raw: &str) -> Option<Sport> {
        let s = raw.trim().to_lowercase();
        let tail = s.rsplit('_').next().unwrap_or(&s);
        match tail {
            "nba" | "basketball" => Some(Sport::Nba),
            "nfl" | "football" if !s.starts_with("soccer") => Some(Sport::Nfl),
            "mlb" | "baseball" => Some(Sport::Mlb),
            "nhl" | "hockey" => Some(Sport::Nhl),
            "ncaab" => Some(Sport::Ncaab),
            "ncaaf" => Some(Sport::Ncaaf),
            _ if s.starts_with("soccer") || s == "epl" || s == "mls" => Some(Sport::Soccer),
            _ => None,
        }
    }

    /// Outdoor sports get weather attached during enrichment.
    pub fn is_outdoor(&self) -> bool {
        matches!(self, Sport::Nfl | Sport::Mlb | Sport::Soccer | Sport::Ncaaf)
    }

    /// League-average combined score, the naive baseline for game totals.
    pub fn average_total(&self) -> f64 {
        match self {
            Sport::Nba => 228.0,
            Sport::Ncaab => 142.0,
            Sport::Nfl => 44.5,
            Sport::Ncaaf => 54.0,
            Sport::Mlb => 8.8,
            Sport::Nhl => 6.2,
            Sport::Soccer => 2.7,
        }
    }

    /// Typical home winning margin, the naive baseline for spreads.
    pub fn home_margin(&self) -> f64 {
        match self {
            Sport::Nba => 2.5,
            Sport::Ncaab => 3.5,
            Sport::Nfl => 1.5,
            Sport::Ncaaf => 2.5,
            Sport::Mlb => 0.15,
            Sport::Nhl => 0.2,
            Sport::Soccer => 0.35,
        }
    }

    /// The stat that drives a player's recent-form sequence.
    pub fn primary_stat(&self) -> &'static str {
        match self {
            Sport::Nba | Sport::Ncaab => "points",
            Sport::Nfl | Sport::Ncaaf => "fantasy_points",
            Sport::Mlb => "total_bases",
            Sport::Nhl => "shots",
            Sport::Soccer => "shots",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sport::parse(s).ok_or_else(|| format!("unknown sport '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

impl GameStatus {
    pub fn from_str_lenient(s: &str) -> GameStatus {
        match s.to_lowercase().as_str() {
            "in" | "in_progress" | "inprogress" | "live" | "halftime" => GameStatus::InProgress,
            "post" | "final" | "closed" | "complete" | "completed" | "ft" => GameStatus::Final,
            _ => GameStatus::Scheduled,
        }
    }
}

/// Market odds for a game in American format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub bookmaker: String,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    /// Home team point spread (negative = home favoured)
    pub home_spread: Option<f64>,
    /// Price of the home side of the spread
    pub spread_price: Option<i32>,
    pub away_spread_price: Option<i32>,
    pub total: Option<f64>,
    pub over_price: Option<i32>,
    pub under_price: Option<i32>,
    /// True when the snapshot was synthesized because no odds feed connected
    pub synthetic: bool,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub temperature_c: f64,
    pub wind_kph: f64,
    /// WMO weather interpretation code
    pub weather_code: i32,
    pub source_id: String,
}

impl WeatherSnapshot {
    /// WMO codes 51 and above are drizzle, rain, snow or storms.
    pub fn has_precipitation(&self) -> bool {
        self.weather_code >= 51
    }
}

/// A scheduled or live contest, merged across all sources that describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub status: GameStatus,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub weather: Option<WeatherSnapshot>,
    pub odds: Option<OddsSnapshot>,
    pub props: Vec<Prop>,
    /// Source ids that contributed to this record
    pub sources: Vec<String>,
}

impl Game {
    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }

    pub fn involves_team(&self, team: &str) -> bool {
        teams_match(&self.home_team, team) || teams_match(&self.away_team, team)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team: String,
    pub position: String,
    pub sport: Sport,
    /// stat name → per-game average
    pub stats: BTreeMap<String, f64>,
    /// Normalized recent performance in [0, 1], most recent last
    pub recent_form: Vec<f64>,
    pub injury_status: Option<String>,
    pub fantasy_relevance: f64,
    pub sources: Vec<String>,
}

impl Player {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }

    /// Mean of the last `n` form values, 0.5 when no history exists.
    pub fn form_mean(&self, n: usize) -> f64 {
        let tail = &self.recent_form[self.recent_form.len().saturating_sub(n)..];
        if tail.is_empty() {
            0.5
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        }
    }

    pub fn is_ruled_out(&self) -> bool {
        self.injury_status
            .as_deref()
            .is_some_and(|s| matches!(s.to_lowercase().as_str(), "out" | "ir" | "suspended"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropSubject {
    Player { name: String, team: String },
    Game { game_id: String },
}

/// A proposed line on a player stat or game market; the unit of scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub id: String,
    pub subject: PropSubject,
    pub sport: Sport,
    /// Stat type (`points`, `rebounds`, ...) or game market (`total`, `spread`).
    /// A spread line is the home margin to beat: Over means the home side covers.
    pub market: String,
    pub line: f64,
    pub game_id: Option<String>,
    pub over_price: Option<i32>,
    pub under_price: Option<i32>,
    /// Book or DFS platform offering the line
    pub platform: String,
    pub source_id: String,
}

impl Prop {
    pub fn subject_name(&self) -> String {
        match &self.subject {
            PropSubject::Player { name, .. } => name.clone(),
            PropSubject::Game { game_id } => game_id.clone(),
        }
    }
}

/// Base letter of a lowercase accented Latin letter, e.g. `ć` → `c`.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' => 's',
        'ţ' | 'ť' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Lowercase, fold accents, strip punctuation and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !('\u{300}'..='\u{36f}').contains(c))
        .map(fold_diacritic)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Team identity: either the normalized names agree or the nicknames
/// (last token, e.g. "lakers") do, so "LA Lakers" matches "Los Angeles Lakers".
pub fn teams_match(a: &str, b: &str) -> bool {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb {
        return true;
    }
    match (na.split_whitespace().last(), nb.split_whitespace().last()) {
        (Some(x), Some(y)) => x.len() >= 4 && x == y,
        _ => false,
    }
}
