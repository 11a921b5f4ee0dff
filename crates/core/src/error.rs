use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid month-day '{0}', expected MM-DD")]
    InvalidMonthDay(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Unknown important day type '{0}'")]
    UnknownKind(String),
    #[error("Lunar year {0} is outside the supported range")]
    LunarYearOutOfRange(i32),
    #[error("Invalid lunar date {year}-{month}-{day}")]
    InvalidLunarDate { year: i32, month: u32, day: u32 },
}

pub type Result<T> = std::result::Result<T, CalendarError>;
