//! 生理周期のカウントダウン。

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{OneOrMany, formats::PreferOne, serde_as};

/// 周期の日数。
pub const CYCLE_LENGTH: i64 = 28;

/// 周期内の位置（次の開始日までの残り日数）を返す。
///
/// 経過日数が 0 または周期の倍数なら 0（開始日）。
pub fn cycle_position(start: NaiveDate, today: NaiveDate) -> u32 {
    let elapsed = (today - start).num_days();
    let rem = elapsed.rem_euclid(CYCLE_LENGTH);
    if rem == 0 {
        0
    } else {
        (CYCLE_LENGTH - rem) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// 周期 1 日目
    FirstDay,
    /// 周期 2 日目
    SecondDay,
    /// 開始が 1〜2 日後に迫っている
    Upcoming(u32),
    /// 次の開始までの残り日数
    Countdown(u32),
}

impl CycleStatus {
    pub fn from_position(position: u32) -> Self {
        match position {
            0 => Self::FirstDay,
            27 => Self::SecondDay,
            1 | 2 => Self::Upcoming(position),
            n => Self::Countdown(n),
        }
    }

    pub fn from_dates(start: NaiveDate, today: NaiveDate) -> Self {
        Self::from_position(cycle_position(start, today))
    }

    /// 新しい周期が始まった（履歴の更新が必要）かどうか。
    pub fn starts_new_cycle(&self) -> bool {
        matches!(self, Self::FirstDay)
    }

    pub fn message(&self) -> String {
        match self {
            Self::FirstDay => "今天是宝贝例假第一天，注意多休息，宝贝肚子不舒服就给我说，出门注意 包里放卫生巾".to_string(),
            Self::SecondDay => "今天是宝贝例假第二天，注意多休息, 开心最重要".to_string(),
            Self::Upcoming(days) => {
                format!("宝贝下次例假还有 {days} 天，出门注意 包里放卫生巾, 注意早点休息")
            }
            Self::Countdown(days) => format!("距离下一次姨妈期还有 {days}天"),
        }
    }
}

/// 周期履歴のキー (`YYYY-MM`)。
pub fn history_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// 月 (`YYYY-MM`) ごとの周期開始日。
///
/// 1 か月に開始日が 1 つだけなら文字列、複数なら配列として保存する。
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleHistory(
    #[serde_as(as = "BTreeMap<_, OneOrMany<_, PreferOne>>")] BTreeMap<String, Vec<String>>,
);

impl CycleHistory {
    /// 開始日を追加する。同じ日付が既にあれば何もしない。
    pub fn record(&mut self, date: NaiveDate) {
        let starts = self.0.entry(history_key(date)).or_default();
        let date = date.format("%Y-%m-%d").to_string();
        if !starts.contains(&date) {
            starts.push(date);
            starts.sort();
        }
    }

    /// 指定した月の開始日。
    pub fn starts_in(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
