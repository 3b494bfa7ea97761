use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flatsync_model::{HashKey, ServerId};
use tokio::sync::Mutex;

use crate::Result;
use crate::database::ports::content_hashes::ContentHashStore;

#[derive(Debug, Default, Clone)]
pub struct InMemoryContentHashStore {
    hashes: Arc<Mutex<HashMap<(HashKey, ServerId), String>>>,
}

impl InMemoryContentHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.hashes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContentHashStore for InMemoryContentHashStore {
    async fn store(
        &self,
        key: &HashKey,
        hash: &str,
        server: &ServerId,
    ) -> Result<()> {
        let mut guard = self.hashes.lock().await;
        guard.insert((key.clone(), server.clone()), hash.to_string());
        Ok(())
    }

    async fn get(
        &self,
        key: &HashKey,
        server: &ServerId,
    ) -> Result<Option<String>> {
        let guard = self.hashes.lock().await;
        Ok(guard.get(&(key.clone(), server.clone())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_are_kept_per_server() {
        let store = InMemoryContentHashStore::new();
        let key = HashKey::season("Show Y", 2);
        store.store(&key, "h1", &ServerId::new("server1")).await.unwrap();

        assert_eq!(
            store.get(&key, &ServerId::new("server1")).await.unwrap(),
            Some("h1".to_string())
        );
        assert_eq!(store.get(&key, &ServerId::new("server2")).await.unwrap(), None);
        assert_eq!(
            store.get(&HashKey::show("Show Y"), &ServerId::new("server1")).await.unwrap(),
            None
        );
    }
}
