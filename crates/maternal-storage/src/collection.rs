//! JSON 文档集合

use crate::storage::KeyValueStore;
use maternal_core::{MaternalError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// 以单个键保存的实体数组
pub struct JsonCollection<T> {
    key: &'static str,
    store: Arc<dyn KeyValueStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for JsonCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCollection").field("key", &self.key).finish()
    }
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(key: &'static str, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key,
            store,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// 读取全部实体
    ///
    /// 文档缺失与读取失败不作区分，均返回空集合。
    pub async fn load(&self) -> Vec<T> {
        match self.store.get(self.key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Collection {} is not valid JSON, treating as empty: {}", self.key, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read collection {}, treating as empty: {}", self.key, e);
                Vec::new()
            }
        }
    }

    /// 为写入读取全部实体
    ///
    /// 仅文档缺失视为空集合；读取失败或内容损坏时返回错误，原文档保持不变。
    pub async fn load_for_update(&self) -> Result<Vec<T>> {
        match self.store.get(self.key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                tracing::error!("Refusing to overwrite corrupt collection {}: {}", self.key, e);
                MaternalError::Storage(format!("集合 {} 内容损坏，拒绝覆盖: {}", self.key, e))
            }),
            None => Ok(Vec::new()),
        }
    }

    /// 整体覆盖写入
    pub async fn store(&self, items: &[T]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(self.key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_missing_and_corrupt_documents_read_as_empty() {
        let store = Arc::new(MemoryStore::new());
        let collection: JsonCollection<u32> = JsonCollection::new("numbers", store.clone());

        assert!(collection.load().await.is_empty());

        store.set("numbers", "{not json").await.unwrap();
        assert!(collection.load().await.is_empty());

        collection.store(&[1, 2, 3]).await.unwrap();
        assert_eq!(collection.load().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_load_for_update_rejects_corrupt_document() {
        let store = Arc::new(MemoryStore::new());
        let collection: JsonCollection<u32> = JsonCollection::new("numbers", store.clone());

        assert!(collection.load_for_update().await.unwrap().is_empty());

        store.set("numbers", "[1, 2,").await.unwrap();
        let result = collection.load_for_update().await;
        assert!(matches!(result, Err(MaternalError::Storage(_))));
        assert_eq!(store.get("numbers").await.unwrap().as_deref(), Some("[1, 2,"));
    }
}
