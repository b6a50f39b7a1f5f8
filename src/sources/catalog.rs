use std::time::Duration;

use super::descriptor::{ProviderKind, SourceDescriptor};
use crate::config::SportFilter;
use crate::models::Sport;
use crate::normalize::weather::KNOWN_CITIES;

const CATALOG_SPORTS: [Sport; 3] = [Sport::Nba, Sport::Nfl, Sport::Mlb];

fn espn_path(sport: Sport) -> &'static str {
    match sport {
        Sport::Nba => "basketball/nba",
        Sport::Ncaab => "basketball/mens-college-basketball",
        Sport::Nfl => "football/nfl",
        Sport::Ncaaf => "football/college-football",
        Sport::Mlb => "baseball/mlb",
        Sport::Nhl => "hockey/nhl",
        Sport::Soccer => "soccer/eng.1",
    }
}

pub(crate) fn odds_key(sport: Sport) -> &'static str {
    match sport {
        Sport::Nba => "basketball_nba",
        Sport::Ncaab => "basketball_ncaab",
        Sport::Nfl => "americanfootball_nfl",
        Sport::Ncaaf => "americanfootball_ncaaf",
        Sport::Mlb => "baseball_mlb",
        Sport::Nhl => "icehockey_nhl",
        Sport::Soccer => "soccer_epl",
    }
}

fn slug(city: &str) -> String {
    city.to_lowercase().replace(' ', "-")
}

/// The sources the engine registers at startup. Sport-tagged feeds outside
/// `filter` are left out; untagged feeds are always included.
pub fn default_descriptors(filter: SportFilter) -> Vec<SourceDescriptor> {
    let mut out = Vec::new();

    for sport in CATALOG_SPORTS.into_iter().filter(|s| filter.allows(*s)) {
        let upper = sport.as_str().to_uppercase();
        out.push(
            SourceDescriptor::new(
                &format!("espn-{}", sport),
                &format!("ESPN {} Scoreboard", upper),
                ProviderKind::EspnScoreboard,
                &format!(
                    "https://site.api.espn.com/apis/site/v2/sports/{}/scoreboard",
                    espn_path(sport)
                ),
            )
            .with_sport(sport)
            .with_poll_interval(Duration::from_secs(30)),
        );
        out.push(
            SourceDescriptor::new(
                &format!("sportradar-{}", sport),
                &format!("Sportradar {}", upper),
                ProviderKind::LeagueStats,
                &format!(
                    "https://api.sportradar.us/{}/trial/v8/en/league/daily_summary.json",
                    sport
                ),
            )
            .with_sport(sport),
        );
        out.push(
            SourceDescriptor::new(
                &format!("odds-{}", sport),
                &format!("The Odds API {}", upper),
                ProviderKind::OddsApi,
                &format!(
                    "https://api.the-odds-api.com/v4/sports/{}/odds?regions=us&markets=h2h,spreads,totals&oddsFormat=american",
                    odds_key(sport)
                ),
            )
            .with_sport(sport)
            .with_poll_interval(Duration::from_secs(60)),
        );
    }

    out.push(SourceDescriptor::new(
        "fantasy-projections",
        "DFS Projections",
        ProviderKind::FantasyProjections,
        "https://api.prizepicks.com/projections",
    ));
    out.push(
        SourceDescriptor::new(
            "news-espn",
            "ESPN Headlines",
            ProviderKind::NewsRss,
            "https://api.rss2json.com/v1/api.json?rss_url=https://www.espn.com/espn/rss/news",
        )
        .with_poll_interval(Duration::from_secs(900)),
    );
    out.push(
        SourceDescriptor::new(
            "reddit-sportsbook",
            "r/sportsbook",
            ProviderKind::RedditListing,
            "https://www.reddit.com/r/sportsbook/hot.json?limit=25",
        )
        .with_poll_interval(Duration::from_secs(900)),
    );

    for (city, lat, lon) in KNOWN_CITIES {
        out.push(
            SourceDescriptor::new(
                &format!("weather-{}", slug(city)),
                &format!("Open-Meteo {}", city),
                ProviderKind::OpenMeteo,
                &format!(
                    "https://api.open-meteo.com/v1/forecast?latitude={}&longitude={}&current_weather=true",
                    lat, lon
                ),
            )
            .with_poll_interval(Duration::from_secs(1800)),
        );
    }

    out.push(SourceDescriptor::new(
        "financial-dkng",
        "DraftKings (DKNG) quote",
        ProviderKind::FinancialQuote,
        "https://www.alphavantage.co/query?function=GLOBAL_QUOTE&symbol=DKNG",
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceCategory;
    use std::collections::HashSet;

    #[test]
    fn catalog_covers_every_category_with_unique_ids() {
        let all = default_descriptors(SportFilter::All);
        let ids: HashSet<&str> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), all.len());
        for cat in [
            SourceCategory::Sports,
            SourceCategory::Odds,
            SourceCategory::Fantasy,
            SourceCategory::News,
            SourceCategory::Social,
            SourceCategory::Weather,
            SourceCategory::Financial,
        ] {
            assert!(all.iter().any(|d| d.category == cat), "missing {}", cat);
        }
    }

    #[test]
    fn sport_filter_drops_other_sport_feeds() {
        let nfl = default_descriptors(SportFilter::Only(Sport::Nfl));
        assert!(nfl.iter().all(|d| d.sport.map_or(true, |s| s == Sport::Nfl)));
        assert!(nfl.iter().any(|d| d.id == "odds-nfl"));
        assert!(nfl.iter().any(|d| d.id == "reddit-sportsbook"));
    }

    #[test]
    fn weather_ids_are_slugged() {
        let all = default_descriptors(SportFilter::All);
        assert!(all.iter().any(|d| d.id == "weather-green-bay"));
    }
}
