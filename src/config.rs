use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Sport;
use crate::sources::ProviderKind;

/// Sports data aggregation and opportunity-ranking engine
#[derive(Parser, Debug, Clone)]
#[command(name = "sportsedge", version, about)]
pub struct Config {
    /// Output API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Run a single cycle, print the JSON output and exit
    #[arg(long, env = "RUN_ONCE", default_value = "false")]
    pub once: bool,

    /// Longest gap between background refresh ticks, in seconds. Sources
    /// with a shorter poll interval tighten the tick.
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "300")]
    pub refresh_interval_secs: u64,

    /// Per-fetch timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "12")]
    pub fetch_timeout_secs: u64,

    /// Maximum delayed retries per source
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Per scoring-function budget in milliseconds
    #[arg(long, env = "MODEL_TIMEOUT_MS", default_value = "3000")]
    pub model_timeout_ms: u64,

    /// Pairwise correlation at or above which two picks cannot coexist
    #[arg(long, env = "CORRELATION_CAP", default_value = "0.7")]
    pub correlation_cap: f64,

    /// Amplitude of the random jitter added to reliability baselines
    #[arg(long, env = "RELIABILITY_JITTER", default_value = "0.02")]
    pub reliability_jitter: f64,

    /// Bankroll used to turn Kelly fractions into stakes (USD)
    #[arg(long, env = "INVESTMENT", default_value = "1000.0")]
    pub investment: f64,

    /// Where source data comes from
    #[arg(long, env = "DATA_SOURCE", value_enum, default_value = "hybrid")]
    pub data_source: DataSource,

    /// Ranking strategy
    #[arg(long, env = "STRATEGY", value_enum, default_value = "maximum")]
    pub strategy: Strategy,

    /// Confidence level: 85, 90, 95 or 99
    #[arg(long, env = "CONFIDENCE", default_value = "85")]
    pub confidence: ConfidenceLevel,

    /// Portfolio size: 2, 3, 4, 5 or "dynamic"
    #[arg(long, env = "PORTFOLIO_SIZE", default_value = "4")]
    pub portfolio_size: PortfolioSize,

    /// Sport filter: "all" or a sport id such as "nba"
    #[arg(long, env = "SPORTS", default_value = "all")]
    pub sports: SportFilter,

    /// The Odds API key
    #[arg(long, env = "ODDS_API_KEY")]
    pub odds_api_key: Option<String>,

    /// Sportradar (official league stats) key
    #[arg(long, env = "SPORTRADAR_API_KEY")]
    pub sportradar_api_key: Option<String>,

    /// Fantasy projections API key
    #[arg(long, env = "FANTASY_API_KEY")]
    pub fantasy_api_key: Option<String>,

    /// News feed API key
    #[arg(long, env = "NEWS_API_KEY")]
    pub news_api_key: Option<String>,

    /// Financial quotes API key
    #[arg(long, env = "FINANCIAL_API_KEY")]
    pub financial_api_key: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be positive");
        }
        if !(1..=120).contains(&self.fetch_timeout_secs) {
            anyhow::bail!("fetch_timeout_secs must be between 1 and 120");
        }
        if self.model_timeout_ms == 0 {
            anyhow::bail!("model_timeout_ms must be positive");
        }
        if !(0.0..=1.0).contains(&self.correlation_cap) || self.correlation_cap == 0.0 {
            anyhow::bail!("correlation_cap must be in (0.0, 1.0]");
        }
        if !(0.0..=0.2).contains(&self.reliability_jitter) {
            anyhow::bail!("reliability_jitter must be between 0.0 and 0.2");
        }
        if self.investment <= 0.0 {
            anyhow::bail!("investment must be positive");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            odds_api: self.odds_api_key.clone(),
            sportradar: self.sportradar_api_key.clone(),
            fantasy: self.fantasy_api_key.clone(),
            news: self.news_api_key.clone(),
            financial: self.financial_api_key.clone(),
        }
    }

    pub fn data_mode(&self) -> DataMode {
        DataMode::resolve(self.data_source, &self.credentials())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            investment: self.investment,
            data_source: self.data_source,
            strategy: self.strategy,
            confidence: self.confidence,
            portfolio_size: self.portfolio_size,
            sports: self.sports,
            correlation_cap: self.correlation_cap,
            model_timeout: Duration::from_millis(self.model_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Real,
    Hybrid,
    Simulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Maximum,
    Conservative,
    Aggressive,
    #[value(name = "real_time")]
    RealTime,
}

impl Strategy {
    /// Adjust the composite ranking score; only ordering is affected.
    pub fn adjust(&self, composite: f64, expected_value: f64, risk_score: f64) -> f64 {
        match self {
            Strategy::Conservative => composite - risk_score * 0.3,
            Strategy::Aggressive => composite + expected_value * 0.2,
            Strategy::Maximum | Strategy::RealTime => composite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    P85,
    P90,
    P95,
    P99,
}

impl ConfidenceLevel {
    /// Minimum ensemble confidence an opportunity must carry.
    pub fn min_model_confidence(&self) -> f64 {
        match self {
            ConfidenceLevel::P85 => 0.55,
            ConfidenceLevel::P90 => 0.60,
            ConfidenceLevel::P95 => 0.65,
            ConfidenceLevel::P99 => 0.70,
        }
    }
}

impl FromStr for ConfidenceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "85" => Ok(ConfidenceLevel::P85),
            "90" => Ok(ConfidenceLevel::P90),
            "95" => Ok(ConfidenceLevel::P95),
            "99" => Ok(ConfidenceLevel::P99),
            other => Err(format!("confidence must be one of 85/90/95/99, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioSize {
    Fixed(usize),
    Dynamic,
}

impl PortfolioSize {
    pub const DYNAMIC_MIN: usize = 2;
    pub const DYNAMIC_MAX: usize = 6;

    /// Resolve to a concrete target given how many A-or-better picks exist.
    pub fn target(&self, top_grade_count: usize) -> usize {
        match self {
            PortfolioSize::Fixed(n) => *n,
            PortfolioSize::Dynamic => top_grade_count.clamp(Self::DYNAMIC_MIN, Self::DYNAMIC_MAX),
        }
    }
}

impl FromStr for PortfolioSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dynamic" => Ok(PortfolioSize::Dynamic),
            n @ ("2" | "3" | "4" | "5") => n
                .parse()
                .map(PortfolioSize::Fixed)
                .map_err(|e| format!("{}", e)),
            other => Err(format!("portfolio size must be 2-5 or 'dynamic', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportFilter {
    All,
    Only(Sport),
}

impl SportFilter {
    pub fn allows(&self, sport: Sport) -> bool {
        match self {
            SportFilter::All => true,
            SportFilter::Only(s) => *s == sport,
        }
    }
}

impl FromStr for SportFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SportFilter::All)
        } else {
            s.parse::<Sport>().map(SportFilter::Only)
        }
    }
}

impl fmt::Display for SportFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SportFilter::All => f.write_str("all"),
            SportFilter::Only(s) => write!(f, "{}", s),
        }
    }
}

/// Engine-facing settings, the knobs a user picks in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub investment: f64,
    pub data_source: DataSource,
    pub strategy: Strategy,
    pub confidence: ConfidenceLevel,
    pub portfolio_size: PortfolioSize,
    pub sports: SportFilter,
    pub correlation_cap: f64,
    #[serde(skip, default = "default_model_timeout")]
    pub model_timeout: Duration,
}

fn default_model_timeout() -> Duration {
    Duration::from_millis(3000)
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            investment: 1000.0,
            data_source: DataSource::Hybrid,
            strategy: Strategy::Maximum,
            confidence: ConfidenceLevel::P85,
            portfolio_size: PortfolioSize::Fixed(4),
            sports: SportFilter::All,
            correlation_cap: 0.7,
            model_timeout: default_model_timeout(),
        }
    }
}

/// Provider credentials read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub odds_api: Option<String>,
    pub sportradar: Option<String>,
    pub fantasy: Option<String>,
    pub news: Option<String>,
    pub financial: Option<String>,
}

impl Credentials {
    pub fn for_kind(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::OddsApi => &self.odds_api,
            ProviderKind::LeagueStats => &self.sportradar,
            ProviderKind::FantasyProjections => &self.fantasy,
            ProviderKind::NewsRss => &self.news,
            ProviderKind::FinancialQuote => &self.financial,
            ProviderKind::EspnScoreboard
            | ProviderKind::RedditListing
            | ProviderKind::OpenMeteo => return None,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn any_configured(&self) -> bool {
        [
            &self.odds_api,
            &self.sportradar,
            &self.fantasy,
            &self.news,
            &self.financial,
        ]
        .iter()
        .any(|k| k.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Whether sources talk to real providers or serve synthetic payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    Live,
    /// Live where possible; authenticated sources without a key use demo data
    Hybrid,
    Demo,
}

impl DataMode {
    /// The one place that decides between live and demo source behaviour.
    pub fn resolve(data_source: DataSource, credentials: &Credentials) -> DataMode {
        if data_source == DataSource::Simulation || !credentials.any_configured() {
            return DataMode::Demo;
        }
        match data_source {
            DataSource::Real => DataMode::Live,
            _ => DataMode::Hybrid,
        }
    }
}
