//! JSON-file wallet store
//!
//! Single-file persistence for wallet records: the whole map is rewritten on
//! every mutation. Adequate for a single-process bot; anything heavier is a
//! different adapter behind the same port.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::chat::UserId;
use crate::ports::store::{Preferences, StoreError, WalletRecord, WalletStore};

pub struct JsonWalletStore {
    path: PathBuf,
    records: Mutex<HashMap<UserId, WalletRecord>>,
}

impl JsonWalletStore {
    /// Open the store, loading any existing file. A missing file is an empty
    /// store; a present-but-unreadable file is an error, never silently
    /// discarded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            let list: Vec<WalletRecord> =
                serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            list.into_iter().map(|r| (r.user_id, r)).collect()
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn persist(&self, records: &HashMap<UserId, WalletRecord>) -> Result<(), StoreError> {
        let mut list: Vec<&WalletRecord> = records.values().collect();
        list.sort_by_key(|r| r.user_id);
        let contents =
            serde_json::to_string_pretty(&list).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl WalletStore for JsonWalletStore {
    async fn wallet_by_user(&self, user: UserId) -> Result<Option<WalletRecord>, StoreError> {
        Ok(self.records.lock().await.get(&user).cloned())
    }

    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.insert(record.user_id, record.clone());
        self.persist(&records).await
    }

    async fn preferences(&self, user: UserId) -> Result<Option<Preferences>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&user)
            .map(|r| r.preferences.clone()))
    }

    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&user)
            .ok_or_else(|| StoreError::Corrupt(format!("no wallet record for user {user}")))?;
        record.preferences = preferences.clone();
        self.persist(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(user: UserId) -> WalletRecord {
        WalletRecord {
            user_id: user,
            encrypted_key: format!("ciphertext-{user}"),
            address: format!("address-{user}"),
            preferences: Preferences::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let store = JsonWalletStore::open(&path).unwrap();
        store.save_wallet(&record(7)).await.unwrap();
        store.save_wallet(&record(3)).await.unwrap();

        // a second open sees what the first wrote
        let reopened = JsonWalletStore::open(&path).unwrap();
        let loaded = reopened.wallet_by_user(7).await.unwrap().unwrap();
        assert_eq!(loaded.address, "address-7");
        assert!(reopened.wallet_by_user(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preferences_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let store = JsonWalletStore::open(&path).unwrap();
        store.save_wallet(&record(1)).await.unwrap();

        let prefs = Preferences {
            slippage_bps: 250,
            notifications: false,
            accepted_terms: true,
        };
        store.save_preferences(1, &prefs).await.unwrap();

        let reopened = JsonWalletStore::open(&path).unwrap();
        assert_eq!(reopened.preferences(1).await.unwrap(), Some(prefs));
    }

    #[tokio::test]
    async fn test_preferences_require_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWalletStore::open(dir.path().join("w.json")).unwrap();
        let result = store.save_preferences(5, &Preferences::default()).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonWalletStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }
}
