//! 旧暦（中国の太陰太陽暦）から西暦への変換。
//!
//! 暦の計算は tyme4rs に任せ、ここでは平月の指定と月末への丸めだけを行う。

use chrono::NaiveDate;
use tyme4rs::tyme::lunar::{LunarDay, LunarMonth, LunarYear};
use tyme4rs::tyme::solar::SolarDay;

use crate::error::{CalendarError, Result};

/// 旧暦の日付を西暦に変換する。
///
/// `month` は常に平月として扱い、閏月は対象にしない。
/// 月の日数を超える `day` は月末に丸める。
pub fn lunar_to_solar(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    let invalid = || CalendarError::InvalidLunarDate { year, month, day };

    if !(1..=12).contains(&month) || day == 0 || day > 30 {
        return Err(invalid());
    }
    LunarYear::new(year as isize).map_err(|_| CalendarError::LunarYearOutOfRange(year))?;

    let days_in_month = LunarMonth::new(year as isize, month as isize)
        .map_err(|_| invalid())?
        .get_day_count();
    let day = (day as usize).min(days_in_month);

    let solar = LunarDay::new(year as isize, month as isize, day)
        .map_err(|_| invalid())?
        .get_solar_day();

    to_naive_date(&solar).ok_or_else(invalid)
}

fn to_naive_date(solar: &SolarDay) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(solar.get_year()).ok()?,
        u32::try_from(solar.get_month()).ok()?,
        u32::try_from(solar.get_day()).ok()?,
    )
}
