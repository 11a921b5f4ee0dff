//! ユーザーごとに天気・記念日・周期の情報を集めてテンプレートフィールドを組み立てる。

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, error, info, warn};
use wxnotify_core::{
    ColorPolicy, CycleStatus, ImportantDay, ImportantDayEvent, ImportantDayKind, TemplateField,
    clock::{days_between, parse_date},
    important_day::sort_by_countdown,
};

use crate::store::DocumentStore;
use crate::user::{AggregatedUser, UserData};
use crate::weather::{CurrentWeather, WeatherProvider, current_weather};

pub struct Aggregator<'a> {
    weather: &'a dyn WeatherProvider,
    store: &'a dyn DocumentStore,
    colors: ColorPolicy,
    collection: &'a str,
    /// false の場合は周期履歴を書き戻さない
    persist: bool,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        weather: &'a dyn WeatherProvider,
        store: &'a dyn DocumentStore,
        colors: ColorPolicy,
        collection: &'a str,
    ) -> Self {
        Self {
            weather,
            store,
            colors,
            collection,
            persist: true,
        }
    }

    /// ストアへの書き戻しを行わないようにする。
    pub fn dry_run(mut self) -> Self {
        self.persist = false;
        self
    }

    /// 全ユーザーのテンプレートフィールドを組み立てる。
    ///
    /// ユーザーは 1 人ずつ順番に処理する。デコードできないドキュメントは警告を出して除外する。
    pub async fn aggregate(&self, now: &DateTime<Tz>) -> Result<Vec<AggregatedUser>> {
        let documents = self
            .store
            .list_all(self.collection)
            .await
            .context("Failed to list user documents")?;
        info!(count = documents.len(), collection = self.collection, "Loaded user documents");

        let mut users = Vec::with_capacity(documents.len());
        for document in documents {
            let data: UserData = match serde_json::from_value(document.data) {
                Ok(data) => data,
                Err(e) => {
                    warn!(user = %document.id, error = %e, "Skipping undecodable user document");
                    continue;
                }
            };
            users.push(self.aggregate_user(document.id, data, now).await);
        }

        Ok(users)
    }

    async fn aggregate_user(
        &self,
        id: String,
        mut data: UserData,
        now: &DateTime<Tz>,
    ) -> AggregatedUser {
        let today = now.date_naive();

        let weather = self.current_weather(&data).await;
        let period_message = self.cycle_message(&id, &mut data, today).await;

        let events = sort_by_countdown(&important_days(&data), today);
        let message_for = |kind: ImportantDayKind| {
            events
                .iter()
                .find(|e| e.kind == kind)
                .map(ImportantDayEvent::message)
        };

        let love_day_message = data
            .love_day
            .as_deref()
            .and_then(|date| parse_field_date(&id, "love_day", date))
            .map(|date| format!("今天是我们念爱的第{}天", days_between(now, date)));

        let city = Some(data.city.clone()).filter(|c| !c.is_empty());
        let (temp, humidity, condition) = match weather {
            Some(CurrentWeather {
                temp,
                humidity,
                text,
            }) => (
                Some(format!("{temp}°C")),
                Some(format!("{humidity}%")),
                Some(text),
            ),
            None => (None, None, None),
        };

        let colors = &self.colors;
        let fields: Vec<TemplateField> = vec![
            colors.field("period_time", period_message),
            colors.field("anniversary_day", message_for(ImportantDayKind::Anniversary)),
            colors.field("birthday_day", message_for(ImportantDayKind::Birthday)),
            colors.field("city", city),
            colors.field("love_day", love_day_message),
            colors.field("temp", temp),
            colors.field("humidity", humidity),
            colors.field("weather_condition", condition),
        ];
        debug!(user = %id, ?fields, "Template fields built");

        AggregatedUser { id, data, fields }
    }

    async fn current_weather(&self, data: &UserData) -> Option<CurrentWeather> {
        if data.city.is_empty() {
            return None;
        }

        let city_code = self
            .weather
            .resolve_city_code(&data.city, &data.country)
            .await?;
        let hourly = self.weather.fetch_hourly_forecast(&city_code).await?;

        let current = current_weather(&hourly);
        if current.is_none() {
            warn!(city = %data.city, "Forecast has no hourly entries");
        }
        current
    }

    /// 周期メッセージを返す。新しい周期が始まった日は開始日と履歴を更新する。
    async fn cycle_message(&self, id: &str, data: &mut UserData, today: NaiveDate) -> Option<String> {
        let start = parse_field_date(id, "period_time", data.period_time.as_deref()?)?;
        let status = CycleStatus::from_dates(start, today);
        debug!(user = id, ?status, "Cycle status");

        if status.starts_new_cycle() {
            self.record_cycle_start(id, data, today).await;
        }

        Some(status.message())
    }

    async fn record_cycle_start(&self, id: &str, data: &mut UserData, today: NaiveDate) {
        if !self.persist {
            info!(user = id, "Dry run; cycle history is not updated");
            return;
        }

        let today_str = today.format("%Y-%m-%d").to_string();

        // 他の更新を取りこぼさないよう最新の履歴に追記する
        let mut history = match self.store.get_by_id(self.collection, id).await {
            Ok(Some(latest)) => serde_json::from_value::<UserData>(latest)
                .map(|latest| latest.period_history)
                .unwrap_or_else(|_| data.period_history.clone()),
            Ok(None) => data.period_history.clone(),
            Err(e) => {
                warn!(user = id, error = %e, "Failed to read latest user document");
                data.period_history.clone()
            }
        };
        history.record(today);

        let update = json!({
            "period_time": today_str,
            "period_history": history,
        });

        match self.store.update_by_id(self.collection, id, &update).await {
            Ok(()) => {
                info!(user = id, date = %today_str, "Recorded new cycle start");
                data.period_time = Some(today_str);
                data.period_history = history;
            }
            Err(e) => error!(user = id, error = %e, "Failed to record new cycle start"),
        }
    }
}

fn important_days(data: &UserData) -> Vec<ImportantDay> {
    [&data.birthday, &data.anniversary]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
}

fn parse_field_date(id: &str, field: &str, value: &str) -> Option<NaiveDate> {
    match parse_date(value) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(user = id, field, error = %e, "Ignoring invalid date");
            None
        }
    }
}
