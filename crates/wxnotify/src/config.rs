use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wxnotify_core::clock::DEFAULT_TIMEZONE;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default = "default_true")]
    pub show_color: bool,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub http: HttpConfig,
    pub wechat: WechatConfig,
    pub feedback: Option<FeedbackConfig>,
    pub weather: WeatherConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            show_color: true,
            collection: default_collection(),
            http: HttpConfig::default(),
            wechat: WechatConfig::default(),
            feedback: None,
            weather: WeatherConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WechatConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_wechat_api_base")]
    pub api_base: String,
    /// メッセージタップ時に開く URL
    pub open_url: Option<String>,
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            app_id: "YOUR_WECHAT_APP_ID".to_string(),
            app_secret: "YOUR_WECHAT_APP_SECRET".to_string(),
            api_base: default_wechat_api_base(),
            open_url: None,
        }
    }
}

/// 配信結果の通知先。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedbackConfig {
    pub template_id: String,
    /// 未指定なら全ユーザーに送る
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_geo_base")]
    pub geo_base: String,
    #[serde(default = "default_forecast_base")]
    pub forecast_base: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: "YOUR_QWEATHER_API_KEY".to_string(),
            geo_base: default_geo_base(),
            forecast_base: default_forecast_base(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    File {
        path: PathBuf,
    },
    Firestore {
        project_id: String,
        #[serde(default = "default_firestore_database")]
        database: String,
        /// サービスアカウント鍵 (JSON) のパス
        credentials_path: Option<PathBuf>,
        /// 発行済みのアクセストークン。`credentials_path` が優先される
        access_token: Option<String>,
        #[serde(default = "default_firestore_base")]
        base_url: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from("data"),
        }
    }
}

fn default_timezone() -> Tz {
    DEFAULT_TIMEZONE
}

fn default_true() -> bool {
    true
}

fn default_collection() -> String {
    "users".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_wechat_api_base() -> String {
    "https://api.weixin.qq.com".to_string()
}

fn default_geo_base() -> String {
    "https://geoapi.qweather.com".to_string()
}

fn default_forecast_base() -> String {
    "https://devapi.qweather.com".to_string()
}

fn default_firestore_database() -> String {
    "(default)".to_string()
}

fn default_firestore_base() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

impl Config {
    /// 環境変数で秘密情報を上書きする。
    ///
    /// 起動時に一度だけ呼ぶ。`lookup` は変数名から値を返す。
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("APP_ID") {
            self.wechat.app_id = v;
        }
        if let Some(v) = non_empty("APP_SECRET") {
            self.wechat.app_secret = v;
        }
        if let Some(v) = non_empty("WEATHER_API_KEY") {
            self.weather.api_key = v;
        }
        if let StoreConfig::Firestore {
            credentials_path,
            access_token,
            ..
        } = &mut self.store
        {
            if let Some(v) = non_empty("GOOGLE_APPLICATION_CREDENTIALS") {
                *credentials_path = Some(PathBuf::from(v));
            }
            if let Some(v) = non_empty("FIRESTORE_ACCESS_TOKEN") {
                *access_token = Some(v);
            }
        }
    }
}

pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
    let config: Config = toml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = Config {
        feedback: Some(FeedbackConfig {
            template_id: "YOUR_FEEDBACK_TEMPLATE_ID".to_string(),
            recipients: vec![],
        }),
        ..Default::default()
    };
    let content = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}
