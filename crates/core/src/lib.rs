//! 通知メッセージを組み立てるための日付計算とテンプレート部品。
//!
//! 外部 API に依存しない純粋な処理のみを置く。

pub mod clock;
pub mod cycle;
pub mod error;
pub mod important_day;
pub mod lunar;
pub mod template;

pub use cycle::{CycleHistory, CycleStatus};
pub use error::CalendarError;
pub use important_day::{ImportantDay, ImportantDayEvent, ImportantDayKind};
pub use template::{ColorPolicy, TemplateField};
