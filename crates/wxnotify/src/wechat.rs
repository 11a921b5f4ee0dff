//! WeChat 公众号 API との連携（アクセストークン取得とテンプレートメッセージ送信）。

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use wxnotify_core::TemplateField;

use crate::config::WechatConfig;

/// 送信結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// 配信成功 (`errcode == 0`)
    Delivered,
    /// WeChat 側がエラーコードを返した
    Rejected { errcode: i64, errmsg: String },
    /// アクセストークンを取得できず送信しなかった
    NoToken,
    /// 通信エラー
    Failed(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// 1 人の受信者にテンプレートメッセージを送る。
    async fn send_templated_message(
        &self,
        open_id: &str,
        template_id: &str,
        fields: &[TemplateField],
    ) -> SendOutcome;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Serialize)]
struct TemplateMessage<'a> {
    touser: &'a str,
    template_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    data: BTreeMap<&'a str, FieldValue<'a>>,
}

#[derive(Debug, PartialEq, Serialize)]
struct FieldValue<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

/// フィールドリストを `{name: {value, color}}` に変換する。値のないフィールドは省く。
fn template_data(fields: &[TemplateField]) -> BTreeMap<&str, FieldValue<'_>> {
    fields
        .iter()
        .filter_map(|field| {
            let value = field.value.as_deref()?;
            Some((
                field.name.as_str(),
                FieldValue {
                    value,
                    color: field.color.as_deref(),
                },
            ))
        })
        .collect()
}

pub struct WechatClient {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    open_url: Option<String>,
}

impl WechatClient {
    pub fn new(http: reqwest::Client, config: &WechatConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            open_url: config.open_url.clone(),
        }
    }

    /// client_credential でアクセストークンを取得する。
    ///
    /// app id / secret が空の場合はリクエストせずに None を返す。
    pub async fn acquire_access_token(&self) -> Option<String> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            warn!("WeChat app id and app secret must not be empty");
            return None;
        }

        match self.request_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Failed to get access token");
                None
            }
        }
    }

    async fn request_token(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/cgi-bin/token", self.api_base))
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
            ])
            .send()
            .await
            .context("HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP status: {}", response.status());
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        match body.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => anyhow::bail!(
                "errcode {}: {}",
                body.errcode.unwrap_or_default(),
                body.errmsg.unwrap_or_default()
            ),
        }
    }

    async fn post_message(&self, token: &str, message: &TemplateMessage<'_>) -> Result<SendResponse> {
        let response = self
            .http
            .post(format!("{}/cgi-bin/message/template/send", self.api_base))
            .query(&[("access_token", token)])
            .json(message)
            .send()
            .await
            .context("HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse send response")
    }
}

#[async_trait]
impl Messenger for WechatClient {
    async fn send_templated_message(
        &self,
        open_id: &str,
        template_id: &str,
        fields: &[TemplateField],
    ) -> SendOutcome {
        let Some(token) = self.acquire_access_token().await else {
            return SendOutcome::NoToken;
        };

        let message = TemplateMessage {
            touser: open_id,
            template_id,
            url: self.open_url.as_deref(),
            data: template_data(fields),
        };

        let response = match self.post_message(&token, &message).await {
            Ok(response) => response,
            Err(e) => {
                error!(open_id, error = %e, "Failed to send template message");
                return SendOutcome::Failed(e.to_string());
            }
        };

        match response.errcode {
            0 => {
                info!(open_id, "Template message sent");
                return SendOutcome::Delivered;
            }
            40003 => error!(open_id, "Invalid open id; use the id generated after the user follows the account"),
            40036 => error!(open_id, template_id, "Invalid template id"),
            errcode => error!(open_id, errcode, errmsg = %response.errmsg, "Template message rejected"),
        }

        SendOutcome::Rejected {
            errcode: response.errcode,
            errmsg: response.errmsg,
        }
    }
}
