use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use futures::lock::Mutex;
use mongodb::{
    bson::doc,
    options::{ClientOptions, ReplaceOptions},
    Client, Collection, Database,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PersistenceError;

/// String-keyed key/value backend. Each key holds one serialized collection.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn write(&self, key: &str, value: String) -> Result<(), PersistenceError>;
}

pub async fn connect(uri: &str, name: &str) -> mongodb::error::Result<Database> {
    let mut options = ClientOptions::parse(uri).await?;
    options.app_name = Some("chmrs-server".to_string());
    let client = Client::with_options(options)?;
    info!(database = name, "connected to mongodb");
    Ok(client.database(name))
}

#[derive(Debug, Deserialize, Serialize)]
struct Slot {
    _id: String,
    value: String,
}

pub struct MongoSlotStore {
    collection: Collection<Slot>,
}

impl MongoSlotStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<Slot>("slots"),
        }
    }
}

#[async_trait]
impl SlotStore for MongoSlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.collection
            .find_one(doc! { "_id": key }, None)
            .await
            .map(|slot| slot.map(|slot| slot.value))
            .map_err(|error| PersistenceError::Read {
                key: key.to_string(),
                message: error.to_string(),
            })
    }
    async fn write(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        let slot = Slot {
            _id: key.to_string(),
            value,
        };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(doc! { "_id": key }, slot, options)
            .await
            .map(|_| ())
            .map_err(|error| PersistenceError::Write {
                key: key.to_string(),
                message: error.to_string(),
            })
    }
}

/// Process-local backend used for development and tests.
#[derive(Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Makes every following write fail, emulating a full or unavailable backend.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.slots.lock().await.get(key).cloned())
    }
    async fn write(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                message: "QUOTA_EXCEEDED".to_string(),
            });
        }
        self.slots.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
