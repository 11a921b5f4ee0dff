//! テンプレートメッセージの一斉送信と配信結果のまとめ。

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{info, warn};
use wxnotify_core::{ColorPolicy, TemplateField, template::to_snake_case};

use crate::config::FeedbackConfig;
use crate::user::Recipient;
use crate::wechat::{Messenger, SendOutcome};

/// 送信先が 1 件もない場合の表記。
pub const NONE_PLACEHOLDER: &str = "无";

/// 受信者ごとの送信結果。
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub id: String,
    pub outcome: SendOutcome,
}

/// 1 回の一斉送信の集計。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub need_post_num: usize,
    pub success_post_num: usize,
    pub fail_post_num: usize,
    pub success_post_ids: String,
    pub fail_post_ids: String,
}

impl DispatchSummary {
    pub fn from_results(results: &[DispatchResult]) -> Self {
        let (succeeded, failed): (Vec<_>, Vec<_>) =
            results.iter().partition(|r| r.outcome.is_delivered());

        let join = |list: &[&DispatchResult]| {
            if list.is_empty() {
                NONE_PLACEHOLDER.to_string()
            } else {
                list.iter()
                    .map(|r| r.id.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            }
        };

        Self {
            need_post_num: results.len(),
            success_post_num: succeeded.len(),
            fail_post_num: failed.len(),
            success_post_ids: join(&succeeded),
            fail_post_ids: join(&failed),
        }
    }
}

/// 全受信者にメッセージを 1 件ずつ順番に送る。
///
/// `template_override` / `fields_override` が指定された場合は受信者ごとの値より優先する。
pub async fn send_all(
    messenger: &dyn Messenger,
    recipients: &[Recipient],
    template_override: Option<&str>,
    fields_override: Option<&[TemplateField]>,
) -> DispatchSummary {
    let mut results = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let template_id = template_override.or(recipient.template_id.as_deref());
        let fields = fields_override.unwrap_or(&recipient.fields);

        let outcome = match template_id {
            Some(template_id) if !recipient.open_id.is_empty() => {
                messenger
                    .send_templated_message(&recipient.open_id, template_id, fields)
                    .await
            }
            _ => {
                warn!(recipient = %recipient.id, "Recipient has no open id or template id");
                SendOutcome::Failed("missing open id or template id".to_string())
            }
        };

        info!(recipient = %recipient.id, delivered = outcome.is_delivered(), "Dispatched");
        results.push(DispatchResult {
            id: recipient.id.clone(),
            outcome,
        });
    }

    DispatchSummary::from_results(&results)
}

/// 配信結果を通知するテンプレートフィールドを組み立てる。
pub fn build_run_summary_fields(
    summary: &DispatchSummary,
    now: &DateTime<Tz>,
    colors: &ColorPolicy,
) -> Vec<TemplateField> {
    let values = [
        ("postTimeZone", now.timezone().name().to_string()),
        ("postTime", now.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("needPostNum", summary.need_post_num.to_string()),
        ("successPostNum", summary.success_post_num.to_string()),
        ("failPostNum", summary.fail_post_num.to_string()),
        ("successPostIds", summary.success_post_ids.clone()),
        ("failPostIds", summary.fail_post_ids.clone()),
    ];

    values
        .into_iter()
        .map(|(name, value)| colors.field(to_snake_case(name), Some(value)))
        .collect()
}

/// 配信結果を通知先に送る。
///
/// 通知先が設定されていなければ `users` 全員に送る。
/// 設定がない、またはテンプレート ID が空の場合は何もせず None を返す。
pub async fn send_feedback(
    messenger: &dyn Messenger,
    feedback: Option<&FeedbackConfig>,
    summary: &DispatchSummary,
    users: &[Recipient],
    now: &DateTime<Tz>,
    colors: &ColorPolicy,
) -> Option<DispatchSummary> {
    let feedback = feedback?;
    if feedback.template_id.is_empty() {
        warn!("Feedback template id is empty; skipping feedback");
        return None;
    }

    let fields = build_run_summary_fields(summary, now, colors);
    let configured: Vec<Recipient>;
    let recipients = if feedback.recipients.is_empty() {
        users
    } else {
        configured = feedback
            .recipients
            .iter()
            .map(|open_id| Recipient::open_id_only(open_id.as_str()))
            .collect();
        &configured
    };

    let result = send_all(
        messenger,
        recipients,
        Some(&feedback.template_id),
        Some(&fields),
    )
    .await;
    info!(
        success = result.success_post_num,
        fail = result.fail_post_num,
        "Finished sending feedback"
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMessenger;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use wxnotify_core::clock::DEFAULT_TIMEZONE;

    fn recipient(id: &str, open_id: &str, template_id: Option<&str>) -> Recipient {
        Recipient {
            id: id.to_string(),
            open_id: open_id.to_string(),
            template_id: template_id.map(str::to_string),
            fields: vec![TemplateField::new("city", Some(id.to_string()), None)],
        }
    }

    #[tokio::test]
    async fn empty_recipients() {
        let messenger = FakeMessenger::default();
        let summary = send_all(&messenger, &[], None, None).await;

        assert_eq!(
            summary,
            DispatchSummary {
                need_post_num: 0,
                success_post_num: 0,
                fail_post_num: 0,
                success_post_ids: "无".to_string(),
                fail_post_ids: "无".to_string(),
            }
        );
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn tallies_successes_and_failures_in_order() {
        let messenger = FakeMessenger {
            outcomes: BTreeMap::from([(
                "oB".to_string(),
                SendOutcome::Rejected {
                    errcode: 40003,
                    errmsg: "invalid openid".to_string(),
                },
            )]),
            ..Default::default()
        };
        let recipients = vec![
            recipient("a@example.com", "oA", Some("tpl-a")),
            recipient("b@example.com", "oB", Some("tpl-b")),
            recipient("c@example.com", "oC", Some("tpl-c")),
        ];

        let summary = send_all(&messenger, &recipients, None, None).await;

        assert_eq!(summary.need_post_num, 3);
        assert_eq!(summary.success_post_num, 2);
        assert_eq!(summary.fail_post_num, 1);
        assert_eq!(summary.success_post_ids, "a@example.com,c@example.com");
        assert_eq!(summary.fail_post_ids, "b@example.com");

        let sent = messenger.sent();
        let order: Vec<_> = sent.iter().map(|(open_id, tpl, _)| (open_id.as_str(), tpl.as_str())).collect();
        assert_eq!(order, vec![("oA", "tpl-a"), ("oB", "tpl-b"), ("oC", "tpl-c")]);
        assert_eq!(sent[0].2, recipients[0].fields);
    }

    #[tokio::test]
    async fn overrides_replace_template_and_fields() {
        let messenger = FakeMessenger::default();
        let recipients = vec![recipient("a@example.com", "oA", Some("tpl-a"))];
        let fields = vec![TemplateField::new("need_post_num", Some("1".to_string()), None)];

        send_all(&messenger, &recipients, Some("feedback"), Some(&fields)).await;

        let sent = messenger.sent();
        assert_eq!(sent[0].1, "feedback");
        assert_eq!(sent[0].2, fields);
    }

    #[tokio::test]
    async fn recipient_without_template_fails_without_sending() {
        let messenger = FakeMessenger::default();
        let recipients = vec![
            recipient("a@example.com", "oA", None),
            recipient("b@example.com", "", Some("tpl")),
        ];

        let summary = send_all(&messenger, &recipients, None, None).await;

        assert_eq!(summary.fail_post_num, 2);
        assert_eq!(summary.fail_post_ids, "a@example.com,b@example.com");
        assert_eq!(summary.success_post_ids, "无");
        assert!(messenger.sent().is_empty());
    }

    fn summary() -> DispatchSummary {
        DispatchSummary {
            need_post_num: 2,
            success_post_num: 1,
            fail_post_num: 1,
            success_post_ids: "a@example.com".to_string(),
            fail_post_ids: "b@example.com".to_string(),
        }
    }

    fn now() -> DateTime<Tz> {
        DEFAULT_TIMEZONE
            .with_ymd_and_hms(2026, 10, 18, 9, 30, 0)
            .single()
            .unwrap()
    }

    fn feedback(template_id: &str, recipients: &[&str]) -> FeedbackConfig {
        FeedbackConfig {
            template_id: template_id.to_string(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn feedback_without_config_sends_nothing() {
        let messenger = FakeMessenger::default();
        let users = vec![recipient("a@example.com", "oA", Some("tpl-a"))];

        let result = send_feedback(
            &messenger,
            None,
            &summary(),
            &users,
            &now(),
            &ColorPolicy::disabled(),
        )
        .await;

        assert_eq!(result, None);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn feedback_with_empty_template_sends_nothing() {
        let messenger = FakeMessenger::default();
        let users = vec![recipient("a@example.com", "oA", Some("tpl-a"))];
        let config = feedback("", &["oAdmin"]);

        let result = send_feedback(
            &messenger,
            Some(&config),
            &summary(),
            &users,
            &now(),
            &ColorPolicy::disabled(),
        )
        .await;

        assert_eq!(result, None);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn feedback_goes_to_every_user_when_no_recipients_configured() {
        let messenger = FakeMessenger::default();
        let users = vec![
            recipient("a@example.com", "oA", Some("tpl-a")),
            recipient("b@example.com", "oB", None),
        ];
        let config = feedback("tpl-feedback", &[]);

        let result = send_feedback(
            &messenger,
            Some(&config),
            &summary(),
            &users,
            &now(),
            &ColorPolicy::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(result.success_post_num, 2);
        assert_eq!(result.success_post_ids, "a@example.com,b@example.com");

        let expected = build_run_summary_fields(&summary(), &now(), &ColorPolicy::disabled());
        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        for ((open_id, template_id, fields), want) in sent.iter().zip(["oA", "oB"]) {
            assert_eq!(open_id, want);
            assert_eq!(template_id, "tpl-feedback");
            assert_eq!(fields, &expected);
        }
    }

    #[tokio::test]
    async fn feedback_goes_only_to_configured_open_ids() {
        let messenger = FakeMessenger::default();
        let users = vec![recipient("a@example.com", "oA", Some("tpl-a"))];
        let config = feedback("tpl-feedback", &["oAdmin", "oOps"]);

        let result = send_feedback(
            &messenger,
            Some(&config),
            &summary(),
            &users,
            &now(),
            &ColorPolicy::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(result.need_post_num, 2);
        assert_eq!(result.success_post_ids, "oAdmin,oOps");

        let sent: Vec<_> = messenger
            .sent()
            .into_iter()
            .map(|(open_id, template_id, _)| (open_id, template_id))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("oAdmin".to_string(), "tpl-feedback".to_string()),
                ("oOps".to_string(), "tpl-feedback".to_string()),
            ]
        );
    }

    #[test]
    fn run_summary_fields() {
        let fields = build_run_summary_fields(&summary(), &now(), &ColorPolicy::disabled());

        let pairs: Vec<_> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_deref().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("post_time_zone", "Asia/Shanghai"),
                ("post_time", "2026-10-18 09:30:00"),
                ("need_post_num", "2"),
                ("success_post_num", "1"),
                ("fail_post_num", "1"),
                ("success_post_ids", "a@example.com"),
                ("fail_post_ids", "b@example.com"),
            ]
        );
    }
}
