use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::Sport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Sports,
    Odds,
    Fantasy,
    News,
    Social,
    Weather,
    Financial,
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceCategory::Sports => "sports",
            SourceCategory::Odds => "odds",
            SourceCategory::Fantasy => "fantasy",
            SourceCategory::News => "news",
            SourceCategory::Social => "social",
            SourceCategory::Weather => "weather",
            SourceCategory::Financial => "financial",
        };
        f.write_str(s)
    }
}

/// Payload shape of a provider. Set explicitly at registration and used to
/// pick the parser; never inferred from the source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// ESPN-style scoreboard (`events[].competitions[].competitors[]`)
    EspnScoreboard,
    /// Official league feed with schedule and player averages/game logs
    LeagueStats,
    /// Odds-API array of games with bookmaker/market/outcome nesting
    OddsApi,
    /// DFS projection board (player stat lines)
    FantasyProjections,
    /// RSS converted to JSON (`items[]`)
    NewsRss,
    /// Reddit listing (`data.children[].data`)
    RedditListing,
    /// Open-Meteo forecast with `current_weather`
    OpenMeteo,
    /// Market quote for a sports-betting equity
    FinancialQuote,
}

impl ProviderKind {
    pub fn category(&self) -> SourceCategory {
        match self {
            ProviderKind::EspnScoreboard | ProviderKind::LeagueStats => SourceCategory::Sports,
            ProviderKind::OddsApi => SourceCategory::Odds,
            ProviderKind::FantasyProjections => SourceCategory::Fantasy,
            ProviderKind::NewsRss => SourceCategory::News,
            ProviderKind::RedditListing => SourceCategory::Social,
            ProviderKind::OpenMeteo => SourceCategory::Weather,
            ProviderKind::FinancialQuote => SourceCategory::Financial,
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            ProviderKind::LeagueStats
                | ProviderKind::OddsApi
                | ProviderKind::FantasyProjections
                | ProviderKind::NewsRss
                | ProviderKind::FinancialQuote
        )
    }

    /// Top-level keys a well-formed payload carries (first element for
    /// array payloads). Drives the quality heuristic.
    pub fn expected_keys(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::EspnScoreboard => &["leagues", "events", "season", "day"],
            ProviderKind::LeagueStats => &["league", "games", "players", "season"],
            ProviderKind::OddsApi => &[
                "id",
                "sport_key",
                "commence_time",
                "home_team",
                "away_team",
                "bookmakers",
            ],
            ProviderKind::FantasyProjections => &["projections", "updated_at"],
            ProviderKind::NewsRss => &["status", "feed", "items"],
            ProviderKind::RedditListing => &["kind", "data"],
            ProviderKind::OpenMeteo => &["latitude", "longitude", "current_weather"],
            ProviderKind::FinancialQuote => &["Global Quote"],
        }
    }

    /// Static reliability baseline before jitter.
    pub fn reliability_baseline(&self) -> f64 {
        match self {
            ProviderKind::LeagueStats => 0.97,
            ProviderKind::OddsApi => 0.95,
            ProviderKind::EspnScoreboard => 0.92,
            ProviderKind::OpenMeteo => 0.90,
            ProviderKind::FantasyProjections => 0.88,
            ProviderKind::FinancialQuote => 0.85,
            ProviderKind::NewsRss => 0.80,
            ProviderKind::RedditListing => 0.70,
        }
    }

    /// Requests per hour the provider tolerates.
    pub fn default_hourly_limit(&self) -> u32 {
        match self {
            ProviderKind::OddsApi | ProviderKind::LeagueStats => 1000,
            ProviderKind::FantasyProjections
            | ProviderKind::NewsRss
            | ProviderKind::FinancialQuote => 500,
            ProviderKind::EspnScoreboard
            | ProviderKind::RedditListing
            | ProviderKind::OpenMeteo => 100,
        }
    }

    /// Query parameter carrying the credential, for authenticated kinds.
    pub fn api_key_param(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OddsApi => Some("apiKey"),
            ProviderKind::LeagueStats
            | ProviderKind::FantasyProjections
            | ProviderKind::NewsRss => Some("api_key"),
            ProviderKind::FinancialQuote => Some("apikey"),
            _ => None,
        }
    }
}

/// Identity and endpoint of one external data source. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub category: SourceCategory,
    pub provider: ProviderKind,
    pub sport: Option<Sport>,
    pub endpoint: String,
    pub requires_auth: bool,
    pub poll_interval_secs: u64,
    pub hourly_limit: u32,
}

impl SourceDescriptor {
    pub fn new(id: &str, name: &str, provider: ProviderKind, endpoint: &str) -> Self {
        SourceDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            category: provider.category(),
            provider,
            sport: None,
            endpoint: endpoint.to_string(),
            requires_auth: provider.requires_auth(),
            poll_interval_secs: 300,
            hourly_limit: provider.default_hourly_limit(),
        }
    }

    pub fn with_sport(mut self, sport: Sport) -> Self {
        self.sport = Some(sport);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn with_hourly_limit(mut self, limit: u32) -> Self {
        self.hourly_limit = limit;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
