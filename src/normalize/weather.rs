use crate::models::{normalize_text, Game, WeatherSnapshot};

/// Cities with outdoor venues we pull forecasts for: (name, latitude, longitude).
pub const KNOWN_CITIES: &[(&str, f64, f64)] = &[
    ("Boston", 42.3467, -71.0972),
    ("New York", 40.8296, -73.9262),
    ("Chicago", 41.9484, -87.6553),
    ("Green Bay", 44.5013, -88.0622),
    ("Kansas City", 39.0489, -94.4839),
    ("Buffalo", 42.7738, -78.787),
    ("Denver", 39.7439, -105.0201),
    ("Philadelphia", 39.9008, -75.1675),
    ("Seattle", 47.5952, -122.3316),
    ("Milwaukee", 43.028, -87.9712),
];

/// Half a degree, roughly 50 km.
const MATCH_RADIUS_DEG: f64 = 0.5;

pub fn nearest_city(lat: f64, lon: f64) -> Option<&'static str> {
    KNOWN_CITIES
        .iter()
        .map(|(name, clat, clon)| (*name, ((lat - clat).powi(2) + (lon - clon).powi(2)).sqrt()))
        .filter(|(_, d)| *d <= MATCH_RADIUS_DEG)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
}

pub fn known_city(name: &str) -> Option<&'static str> {
    let n = normalize_text(name);
    KNOWN_CITIES
        .iter()
        .find(|(city, _, _)| normalize_text(city) == n)
        .map(|(city, _, _)| *city)
}

/// Attach weather to outdoor games played in a known city.
pub fn attach_weather(games: &mut [Game], snapshots: &[WeatherSnapshot]) {
    for game in games.iter_mut().filter(|g| g.sport.is_outdoor()) {
        let Some(city) = game.city.as_deref().and_then(known_city) else {
            continue;
        };
        if let Some(w) = snapshots.iter().find(|w| w.city == city) {
            game.weather = Some(w.clone());
            if !game.sources.contains(&w.source_id) {
                game.sources.push(w.source_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, Sport};
    use chrono::Utc;

    fn game(sport: Sport, city: &str) -> Game {
        Game {
            id: "g".into(),
            sport,
            home_team: "Green Bay Packers".into(),
            away_team: "Chicago Bears".into(),
            start_time: Utc::now(),
            status: GameStatus::Scheduled,
            venue: None,
            city: Some(city.into()),
            weather: None,
            odds: None,
            props: vec![],
            sources: vec![],
        }
    }

    fn snapshot(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city: city.into(),
            temperature_c: 2.0,
            wind_kph: 30.0,
            weather_code: 61,
            source_id: "weather-green-bay".into(),
        }
    }

    #[test]
    fn nearest_city_matches_within_radius() {
        assert_eq!(nearest_city(44.5, -88.06), Some("Green Bay"));
        assert_eq!(nearest_city(0.0, 0.0), None);
    }

    #[test]
    fn weather_only_for_outdoor_games() {
        let mut games = vec![game(Sport::Nfl, "green bay"), game(Sport::Nba, "Green Bay")];
        attach_weather(&mut games, &[snapshot("Green Bay")]);
        assert!(games[0].weather.is_some());
        assert_eq!(games[0].sources, vec!["weather-green-bay".to_string()]);
        assert!(games[1].weather.is_none());
    }

    #[test]
    fn unknown_city_gets_nothing() {
        let mut games = vec![game(Sport::Nfl, "Atlantis")];
        attach_weather(&mut games, &[snapshot("Green Bay")]);
        assert!(games[0].weather.is_none());
    }
}
