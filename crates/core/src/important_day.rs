//! 誕生日・記念日のカウントダウン計算。

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};
use crate::lunar::lunar_to_solar;

/// 種別の先頭に付くと旧暦日付として扱う。
pub const LUNAR_MARKER: char = '*';

/// ユーザードキュメントに保存される記念日の生データ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantDay {
    /// `Birthday` / `Anniversary`（先頭の `*` は旧暦）
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// `MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportantDayKind {
    Birthday,
    Anniversary,
}

impl FromStr for ImportantDayKind {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "birthday" => Ok(Self::Birthday),
            "anniversary" | "festival" | "festivals" => Ok(Self::Anniversary),
            _ => Err(CalendarError::UnknownKind(s.to_string())),
        }
    }
}

/// カウントダウン計算済みの記念日。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportantDayEvent {
    pub kind: ImportantDayKind,
    pub name: String,
    pub use_lunar: bool,
    pub date: String,
    /// 次の当日までの日数（当日なら 0）
    pub countdown: u32,
}

impl ImportantDayEvent {
    /// 通知に載せる文面を返す。
    pub fn message(&self) -> String {
        let name = &self.name;
        match (self.kind, self.countdown) {
            (ImportantDayKind::Birthday, 0) => {
                format!("今天是 {name} 的生日哦，祝{name}生日快乐!!!")
            }
            (ImportantDayKind::Birthday, days) => format!("距离{name} 的生日还有{days}天"),
            (ImportantDayKind::Anniversary, 0) => format!("今天是 {name} 哦，要永远开心！"),
            (ImportantDayKind::Anniversary, days) => format!("距离{name} 还有{days}天"),
        }
    }
}

/// `MM-DD` をパースする。
///
/// 西暦はうるう年に存在する日付、旧暦は 1〜12 月 / 1〜30 日を受け付ける。
pub fn parse_month_day(month_day: &str, use_lunar: bool) -> Result<(u32, u32)> {
    let invalid = || CalendarError::InvalidMonthDay(month_day.to_string());

    let (month, day) = month_day.trim().split_once('-').ok_or_else(invalid)?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    let valid = if use_lunar {
        (1..=12).contains(&month) && (1..=30).contains(&day)
    } else {
        NaiveDate::from_ymd_opt(2000, month, day).is_some()
    };

    if valid { Ok((month, day)) } else { Err(invalid()) }
}

/// 指定年における西暦の発生日。うるう年以外の 2/29 は 3/1 に繰り越す。
fn solar_occurrence(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| {
            (month == 2 && day == 29)
                .then(|| NaiveDate::from_ymd_opt(year, 3, 1))
                .flatten()
        })
        .ok_or_else(|| CalendarError::InvalidMonthDay(format!("{month:02}-{day:02}")))
}

/// `today` から次に `month_day` が来るまでの日数を返す（当日なら 0）。
///
/// 旧暦の場合は前年・当年・翌年の旧暦日付を西暦に変換し、
/// 最も近い未来（当日を含む）の日付を採用する。
pub fn countdown_to_next_occurrence(
    month_day: &str,
    use_lunar: bool,
    today: NaiveDate,
) -> Result<u32> {
    let (month, day) = parse_month_day(month_day, use_lunar)?;
    let year = today.year();

    let years: &[i32] = if use_lunar {
        &[year - 1, year, year + 1]
    } else {
        &[year, year + 1]
    };

    let mut best: Option<i64> = None;
    for &y in years {
        let occurrence = if use_lunar {
            lunar_to_solar(y, month, day)?
        } else {
            solar_occurrence(y, month, day)?
        };

        let diff = (occurrence - today).num_days();
        if diff >= 0 && best.is_none_or(|b| diff < b) {
            best = Some(diff);
        }
    }

    best.map(|d| d as u32)
        .ok_or_else(|| CalendarError::InvalidMonthDay(month_day.to_string()))
}

/// 記念日リストのカウントダウンを計算し、近い順に並べて返す。
///
/// 入力は変更しない。パースできない要素は警告を出して除外する。
pub fn sort_by_countdown(days: &[ImportantDay], today: NaiveDate) -> Vec<ImportantDayEvent> {
    let mut events: Vec<ImportantDayEvent> = days
        .iter()
        .filter_map(|raw| match to_event(raw, today) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(name = %raw.name, date = %raw.date, error = %e, "Skipping important day");
                None
            }
        })
        .collect();

    events.sort_by_key(|e| e.countdown);
    events
}

fn to_event(raw: &ImportantDay, today: NaiveDate) -> Result<ImportantDayEvent> {
    let use_lunar = raw.kind.starts_with(LUNAR_MARKER);
    let kind: ImportantDayKind = raw.kind.trim_start_matches(LUNAR_MARKER).parse()?;
    let countdown = countdown_to_next_occurrence(&raw.date, use_lunar, today)?;

    Ok(ImportantDayEvent {
        kind,
        name: raw.name.clone(),
        use_lunar,
        date: raw.date.clone(),
        countdown,
    })
}
