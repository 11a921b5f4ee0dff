//! 基準タイムゾーンでの「今日」と経過日数の計算。

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CalendarError, Result};

/// 既定の基準タイムゾーン (UTC+8)。
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Shanghai;

const SECONDS_PER_DAY: i64 = 86_400;

/// 指定タイムゾーンでの現在時刻を取得する。
pub fn now_in(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// `YYYY-MM-DD` 形式の日付をパースする。
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| CalendarError::InvalidDate(date.to_string()))
}

/// `target` の 0 時から `now` までの日数を返す。
///
/// 過去の日付は当日を 1 日目として数え（端数は切り上げ）、
/// 未来の日付は残り日数を正の値で返す。
pub fn days_between(now: &DateTime<Tz>, target: NaiveDate) -> i64 {
    let tz = now.timezone();
    let midnight = target.and_time(chrono::NaiveTime::MIN);
    let target_at = tz
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight));

    let seconds = (*now - target_at).num_seconds();
    let ceil = -(-seconds).div_euclid(SECONDS_PER_DAY);
    if ceil > 0 {
        ceil
    } else {
        seconds.div_euclid(SECONDS_PER_DAY).abs()
    }
}
