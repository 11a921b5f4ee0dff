//! ユーザードキュメントの型。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wxnotify_core::{CycleHistory, ImportantDay, TemplateField};

/// ユーザードキュメントのデータ部。
///
/// 未知のフィールドは `extra` に保持し、書き戻し時にそのまま残す。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    /// 受信者の open id
    #[serde(default)]
    pub wechat_id: String,
    /// ユーザーごとのテンプレート ID
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<ImportantDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anniversary: Option<ImportantDay>,
    /// 交際開始日 (YYYY-MM-DD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub love_day: Option<String>,
    /// 直近の周期開始日 (YYYY-MM-DD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_time: Option<String>,
    /// `YYYY-MM` -> 周期開始日
    #[serde(default)]
    pub period_history: CycleHistory,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// テンプレートフィールドを付与したユーザー。
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedUser {
    /// ドキュメントキー
    pub id: String,
    pub data: UserData,
    pub fields: Vec<TemplateField>,
}

/// メッセージの送信先。
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    /// 集計に使う識別子
    pub id: String,
    pub open_id: String,
    pub template_id: Option<String>,
    pub fields: Vec<TemplateField>,
}

impl From<&AggregatedUser> for Recipient {
    fn from(user: &AggregatedUser) -> Self {
        Self {
            id: user.id.clone(),
            open_id: user.data.wechat_id.clone(),
            template_id: Some(user.data.template_id.clone()).filter(|t| !t.is_empty()),
            fields: user.fields.clone(),
        }
    }
}

impl Recipient {
    /// テンプレートとフィールドを上書きで渡す送信先（配信結果の通知用）。
    pub fn open_id_only(open_id: impl Into<String>) -> Self {
        let open_id = open_id.into();
        Self {
            id: open_id.clone(),
            open_id,
            template_id: None,
            fields: vec![],
        }
    }
}
