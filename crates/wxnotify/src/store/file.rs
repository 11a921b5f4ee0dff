//! コレクションごとに 1 つの JSON ファイルへ保存するストア。

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{Document, DocumentStore, StoreError};

/// `<dir>/<collection>.json` に `キー -> データ` のマップを保存するストア。
pub struct FileStore {
    /// データディレクトリ
    dir: PathBuf,
}

impl FileStore {
    /// ストアを開く。ディレクトリが存在しない場合は作成する。
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create data directory")?;
        Ok(Self { dir })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn load(&self, collection: &str) -> Result<BTreeMap<String, Value>> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path).context("Failed to read collection file")?;
        serde_json::from_str(&content).context("Failed to parse collection file")
    }

    fn save(&self, collection: &str, documents: &BTreeMap<String, Value>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(documents).context("Failed to serialize collection")?;
        fs::write(self.collection_path(collection), content)
            .context("Failed to write collection file")?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .load(collection)?
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.load(collection)?.remove(id))
    }

    async fn update_by_id(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        let Value::Object(fields) = data else {
            return Err(StoreError::NotAnObject.into());
        };

        let mut documents = self.load(collection)?;
        let Some(Value::Object(existing)) = documents.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()).into());
        };

        for (key, value) in fields {
            existing.insert(key.clone(), value.clone());
        }

        self.save(collection, &documents)
    }
}
