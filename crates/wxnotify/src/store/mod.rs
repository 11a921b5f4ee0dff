//! ユーザードキュメントを保持するドキュメントストア。
//!
//! コレクション単位の一覧取得と、キー単位の取得・更新だけを提供する。

mod file;
mod firestore;

pub use file::FileStore;
pub use firestore::{FirestoreAuth, FirestoreStore};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::StoreConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document '{0}' not found")]
    NotFound(String),
    #[error("Document data must be a JSON object")]
    NotAnObject,
    #[error("Unsupported Firestore value: {0}")]
    UnsupportedValue(String),
}

/// コレクション内の 1 ドキュメント。
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// ドキュメントキー（通常はメールアドレス）
    pub id: String,
    pub data: Value,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// コレクションの全ドキュメントを取得する。
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// キーを指定してドキュメントを取得する。存在しなければ None。
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// `data` のトップレベルのフィールドで既存ドキュメントを更新する。
    ///
    /// ドキュメントが存在しない場合はエラー。
    async fn update_by_id(&self, collection: &str, id: &str, data: &Value) -> Result<()>;
}

/// 設定に応じたストアを開く。
pub fn open_store(config: &StoreConfig, http: reqwest::Client) -> Result<Box<dyn DocumentStore>> {
    match config {
        StoreConfig::File { path } => Ok(Box::new(FileStore::open(path)?)),
        StoreConfig::Firestore {
            project_id,
            database,
            credentials_path,
            access_token,
            base_url,
        } => {
            let auth = match (credentials_path, access_token) {
                (Some(path), _) => FirestoreAuth::service_account(path)?,
                (None, Some(token)) => {
                    tracing::warn!("Using a fixed Firestore access token; it will not be refreshed");
                    FirestoreAuth::AccessToken(token.clone())
                }
                (None, None) => anyhow::bail!(
                    "Firestore store requires credentials_path or access_token"
                ),
            };
            Ok(Box::new(FirestoreStore::new(
                http,
                base_url.clone(),
                project_id.clone(),
                database.clone(),
                auth,
            )))
        }
    }
}
