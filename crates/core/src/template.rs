//! テンプレートメッセージのフィールドと色付けポリシー。

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::Serialize;

/// テンプレートメッセージの 1 フィールド。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateField {
    pub name: String,
    /// 計算できなかった場合は None
    pub value: Option<String>,
    pub color: Option<String>,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, value: Option<String>, color: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            color,
        }
    }
}

/// フィールドの表示色を決めるポリシー。無効時は色を付けない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPolicy {
    enabled: bool,
}

impl ColorPolicy {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// ランダムな `#rrggbb` を返す。
    pub fn pick(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let value: u32 = rand::thread_rng().gen_range(0..0xff_ffff);
        Some(format!("#{:0<6}", format!("{value:x}")))
    }

    pub fn field(&self, name: impl Into<String>, value: Option<String>) -> TemplateField {
        TemplateField::new(name, value, self.pick())
    }
}

static UPPERCASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Z]").expect("valid uppercase pattern"));

/// キャメルケースをアンダースコア区切りに変換する (`needPostNum` → `need_post_num`)。
pub fn to_snake_case(name: &str) -> String {
    let converted = UPPERCASE.replace_all(name, |caps: &regex::Captures| {
        format!("_{}", caps[0].to_lowercase())
    });
    converted
        .strip_prefix('_')
        .unwrap_or(&*converted)
        .to_string()
}
