//! QWeather API から天気情報を取得する。
//!
//! 取得に失敗した場合は None を返し、呼び出し側は天気なしで処理を続ける。

mod countries;

pub use countries::localized_country_name;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use tracing::{debug, warn};

use crate::config::WeatherConfig;

/// QWeather の成功コード。
const CODE_OK: u16 = 200;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// 都市名と国名から都市コードを解決する。
    async fn resolve_city_code(&self, city: &str, country: &str) -> Option<String>;

    /// 24 時間分の時間別予報を取得する。
    async fn fetch_hourly_forecast(&self, city_code: &str) -> Option<Vec<HourlyForecast>>;
}

/// 時間別予報の 1 件（表示に使う項目のみ）。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HourlyForecast {
    #[serde(rename = "fxTime")]
    pub fx_time: String,
    /// 気温 (°C)
    pub temp: String,
    pub icon: String,
    /// 天気の説明
    pub text: String,
    /// 湿度 (%)
    pub humidity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temp: String,
    pub humidity: String,
    pub text: String,
}

/// 予報の先頭から現在の天気を取り出す。予報が空なら None。
pub fn current_weather(hourly: &[HourlyForecast]) -> Option<CurrentWeather> {
    hourly.first().map(|h| CurrentWeather {
        temp: h.temp.clone(),
        humidity: h.humidity.clone(),
        text: h.text.clone(),
    })
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    code: u16,
    #[serde(default)]
    location: Vec<GeoLocation>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoLocation {
    id: String,
    #[serde(default)]
    country: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    code: u16,
    #[serde(default)]
    hourly: Vec<HourlyForecast>,
}

/// 候補から国名が一致する最初の都市コードを選ぶ。
///
/// 対応表にない国名はそのままの表記で照合する。
fn select_city_code(locations: &[GeoLocation], country: &str) -> Option<String> {
    let needle = localized_country_name(country).unwrap_or(country.trim());
    locations
        .iter()
        .find(|location| location.country.contains(needle))
        .map(|location| location.id.clone())
}

pub struct QWeatherClient {
    http: reqwest::Client,
    api_key: String,
    geo_base: String,
    forecast_base: String,
}

impl QWeatherClient {
    pub fn new(http: reqwest::Client, config: &WeatherConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            geo_base: config.geo_base.trim_end_matches('/').to_string(),
            forecast_base: config.forecast_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String, location: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .query(&[("location", location), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP status: {}", response.status());
        }

        response.json().await.context("Failed to parse response body")
    }
}

#[async_trait]
impl WeatherProvider for QWeatherClient {
    async fn resolve_city_code(&self, city: &str, country: &str) -> Option<String> {
        let url = format!("{}/v2/city/lookup", self.geo_base);
        let response: GeoResponse = match self.get_json(url, city).await {
            Ok(response) => response,
            Err(e) => {
                warn!(city, error = %e, "Failed to look up city");
                return None;
            }
        };

        if response.code != CODE_OK {
            warn!(city, code = response.code, "City lookup returned an error code");
            return None;
        }

        let code = select_city_code(&response.location, country);
        match &code {
            Some(code) => debug!(city, country, code = %code, "Resolved city code"),
            None => warn!(city, country, "No city candidate matched the country"),
        }
        code
    }

    async fn fetch_hourly_forecast(&self, city_code: &str) -> Option<Vec<HourlyForecast>> {
        let url = format!("{}/v7/weather/24h", self.forecast_base);
        let response: ForecastResponse = match self.get_json(url, city_code).await {
            Ok(response) => response,
            Err(e) => {
                warn!(city_code, error = %e, "Failed to fetch hourly forecast");
                return None;
            }
        };

        if response.code != CODE_OK {
            warn!(city_code, code = response.code, "Forecast returned an error code");
            return None;
        }

        Some(response.hourly)
    }
}
