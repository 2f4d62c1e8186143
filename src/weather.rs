//! Current weather for a city via the Open-Meteo geocoding and forecast APIs.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geo::Coordinate;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("weather service returned status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub coordinates: Coordinate,
    /// Degrees Celsius.
    pub temperature: f64,
    /// km/h.
    pub wind_speed: f64,
    pub condition_code: u16,
    pub condition: &'static str,
}

#[derive(Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: u16,
}

/// Human-readable text for a WMO weather interpretation code.
#[must_use]
pub fn weather_condition(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1..=3 => "Partly cloudy",
        45..=48 => "Foggy",
        51..=55 => "Drizzle",
        61..=65 => "Rain",
        71..=77 => "Snow",
        95..=99 => "Thunderstorm",
        _ => "Overcast",
    }
}

fn parse_location(city: &str, body: &str) -> Result<(String, Coordinate), WeatherError> {
    let resp: GeocodingResponse = serde_json::from_str(body)?;
    let first = resp
        .results
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::CityNotFound(city.to_string()))?;
    Ok((
        first.name,
        Coordinate {
            latitude: first.latitude,
            longitude: first.longitude,
        },
    ))
}

fn parse_current(body: &str) -> Result<CurrentWeather, WeatherError> {
    let resp: ForecastResponse = serde_json::from_str(body)?;
    Ok(resp.current_weather)
}

pub struct WeatherClient {
    client: Client,
}

impl WeatherClient {
    pub fn new() -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("reliefnet")
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, WeatherError> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    /// Resolve `city` to coordinates using the first geocoding match.
    pub async fn locate(&self, city: &str) -> Result<(String, Coordinate), WeatherError> {
        let body = self
            .get(
                GEOCODING_URL,
                &[
                    ("name", city.to_string()),
                    ("count", "1".to_string()),
                    ("language", "en".to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;
        parse_location(city, &body)
    }

    /// Current conditions for `city`.
    pub async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let (name, coordinates) = self.locate(city).await?;
        debug!(
            "Resolved {} to {}, {}",
            city, coordinates.latitude, coordinates.longitude
        );

        let body = self
            .get(
                FORECAST_URL,
                &[
                    ("latitude", coordinates.latitude.to_string()),
                    ("longitude", coordinates.longitude.to_string()),
                    ("current_weather", "true".to_string()),
                ],
            )
            .await?;
        let current = parse_current(&body)?;

        Ok(WeatherReport {
            city: name,
            coordinates,
            temperature: current.temperature,
            wind_speed: current.windspeed,
            condition_code: current.weathercode,
            condition: weather_condition(current.weathercode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_condition() {
        assert_eq!(weather_condition(0), "Clear sky");
        assert_eq!(weather_condition(2), "Partly cloudy");
        assert_eq!(weather_condition(45), "Foggy");
        assert_eq!(weather_condition(53), "Drizzle");
        assert_eq!(weather_condition(63), "Rain");
        assert_eq!(weather_condition(75), "Snow");
        assert_eq!(weather_condition(96), "Thunderstorm");
        assert_eq!(weather_condition(80), "Overcast");
        assert_eq!(weather_condition(4), "Overcast");
    }

    #[test]
    fn test_parse_location() {
        let body = r#"{"results":[{"id":1277333,"name":"Bengaluru","latitude":12.97194,"longitude":77.59369,"country":"India"}],"generationtime_ms":0.5}"#;
        let (name, at) = parse_location("Bangalore", body).unwrap();
        assert_eq!(name, "Bengaluru");
        assert!((at.latitude - 12.97194).abs() < 1e-9);
    }

    #[test]
    fn test_parse_location_no_results() {
        // Open-Meteo omits `results` entirely when nothing matches
        let err = parse_location("Atlantis", r#"{"generationtime_ms":0.2}"#).unwrap_err();
        assert!(matches!(err, WeatherError::CityNotFound(c) if c == "Atlantis"));
    }

    #[test]
    fn test_parse_current() {
        let body = r#"{"latitude":12.98,"longitude":77.6,"current_weather":{"temperature":24.3,"windspeed":11.2,"winddirection":250,"weathercode":61,"is_day":1,"time":"2024-07-01T10:00"}}"#;
        let current = parse_current(body).unwrap();
        assert_eq!(current.temperature, 24.3);
        assert_eq!(current.windspeed, 11.2);
        assert_eq!(weather_condition(current.weathercode), "Rain");
    }

    #[test]
    fn test_parse_current_malformed() {
        assert!(matches!(parse_current("{}"), Err(WeatherError::Json(_))));
    }
}
