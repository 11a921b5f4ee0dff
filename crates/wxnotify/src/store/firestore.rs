//! Firestore REST API をバックエンドにするストア。

use std::path::Path;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Document, DocumentStore, StoreError};

const PAGE_SIZE: &str = "300";

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Firestore へのリクエストに付けるベアラートークンの出どころ。
pub enum FirestoreAuth {
    /// 発行済みのアクセストークン（期限切れは更新しない）
    AccessToken(String),
    /// サービスアカウント鍵。トークンは期限前に自動で再発行される
    ServiceAccount(CustomServiceAccount),
}

impl FirestoreAuth {
    pub fn service_account(key_path: &Path) -> Result<Self> {
        let account = CustomServiceAccount::from_file(key_path).with_context(|| {
            format!("Failed to load service account key {}", key_path.display())
        })?;
        Ok(Self::ServiceAccount(account))
    }

    async fn bearer_token(&self) -> Result<String> {
        match self {
            Self::AccessToken(token) => Ok(token.clone()),
            Self::ServiceAccount(account) => {
                let token = account
                    .token(&[DATASTORE_SCOPE])
                    .await
                    .context("Failed to obtain Firestore access token")?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    auth: FirestoreAuth,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        project_id: String,
        database: String,
        auth: FirestoreAuth,
    ) -> Self {
        Self {
            http,
            base_url,
            project_id,
            database,
            auth,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database,
            collection
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), id)
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(request.bearer_auth(self.auth.bearer_token().await?))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>> {
        let url = self.collection_url(collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .authorized(self.http.get(&url).query(&query))
                .await?
                .send()
                .await
                .context("Firestore list request failed")?
                .error_for_status()
                .context("Firestore list returned an error status")?;

            let page: ListDocumentsResponse = response
                .json()
                .await
                .context("Failed to parse Firestore list response")?;

            for doc in page.documents {
                documents.push(Document {
                    id: document_id(&doc.name).to_string(),
                    data: from_firestore_fields(&doc.fields)?,
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(collection, count = documents.len(), "Listed Firestore documents");
        Ok(documents)
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let response = self
            .authorized(self.http.get(self.document_url(collection, id)))
            .await?
            .send()
            .await
            .context("Firestore get request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: FirestoreDocument = response
            .error_for_status()
            .context("Firestore get returned an error status")?
            .json()
            .await
            .context("Failed to parse Firestore document")?;

        Ok(Some(from_firestore_fields(&doc.fields)?))
    }

    async fn update_by_id(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        let Value::Object(fields) = data else {
            return Err(StoreError::NotAnObject.into());
        };

        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", field_path(key)))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let response = self
            .authorized(
                self.http
                    .patch(self.document_url(collection, id))
                    .query(&query)
                    .json(&json!({ "fields": to_firestore_fields(fields) })),
            )
            .await?
            .send()
            .await
            .context("Firestore update request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()).into());
        }

        response
            .error_for_status()
            .context("Firestore update returned an error status")?;

        Ok(())
    }
}

/// `projects/.../documents/users/a@example.com` の末尾を取り出す。
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// 英数字とアンダースコア以外を含むキーはバッククォートで囲む。
fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn to_firestore_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect()
}

fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

fn from_firestore_fields(fields: &Map<String, Value>) -> Result<Value, StoreError> {
    let mut out = Map::new();
    for (key, value) in fields {
        out.insert(key.clone(), from_firestore_value(value)?);
    }
    Ok(Value::Object(out))
}

fn from_firestore_value(value: &Value) -> Result<Value, StoreError> {
    let unsupported = || StoreError::UnsupportedValue(value.to_string());

    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(unsupported());
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).map_err(|_| unsupported()),
            Value::Number(_) => Ok(inner.clone()),
            _ => Err(unsupported()),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            values
                .iter()
                .map(from_firestore_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => from_firestore_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        _ => Err(unsupported()),
    }
}
