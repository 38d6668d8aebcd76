//! JSON-backed record store
//!
//! Two independent collections, `trades.json` and `offers.json`, each
//! rewritten wholesale on every save:
//!
//! ```json
//! { "version": 1, "nextId": 8, "records": [ ... ] }
//! ```
//!
//! A bare JSON array (the layout the first bot release wrote) is migrated on
//! load. `nextId` is a high-water mark so ids are never handed out twice,
//! even after the records holding the highest ids are removed.
//!
//! Each collection has its own lock; `update_*` holds it across the whole
//! load → mutate → save cycle. Writers also take an exclusive advisory lock
//! on `<collection>.lock` so that a second process on the same data
//! directory (the moderation CLI next to a running server) waits its turn.

use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{Result, TradeError};
use crate::model::{Offer, TradeListing};

/// Current on-disk layout version
pub const SCHEMA_VERSION: u32 = 1;

pub const TRADES_FILE: &str = "trades.json";
pub const OFFERS_FILE: &str = "offers.json";

/// A record kind stored in its own collection
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human-readable kind, used in logs
    const KIND: &'static str;

    /// Id allocated from the collection counter
    fn id(&self) -> u64;
}

impl Record for TradeListing {
    const KIND: &'static str = "trade listing";

    fn id(&self) -> u64 {
        self.index
    }
}

impl Record for Offer {
    const KIND: &'static str = "offer";

    fn id(&self) -> u64 {
        self.offer_id
    }
}

/// In-memory image of one collection file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    pub version: u32,
    pub next_id: u64,
    pub records: Vec<T>,
}

impl<T: Record> Collection<T> {
    pub fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION,
            next_id: 1,
            records: Vec::new(),
        }
    }

    fn from_records(records: Vec<T>, next_id: u64) -> Self {
        let mut collection = Self {
            version: SCHEMA_VERSION,
            next_id,
            records,
        };
        collection.next_id = collection.next_id.max(collection.max_id() + 1);
        collection
    }

    fn max_id(&self) -> u64 {
        self.records.iter().map(Record::id).max().unwrap_or(0)
    }

    /// Hand out the next id and advance the high-water mark.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id.max(self.max_id() + 1);
        self.next_id = id + 1;
        id
    }
}

/// Exclusive advisory lock on a sidecar file, released when dropped
struct WriterLock {
    file: File,
}

impl WriterLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(Self { file })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release collection lock");
        }
    }
}

/// One collection on disk plus the locks serializing its writers
struct CollectionFile<T> {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> CollectionFile<T> {
    fn new(path: PathBuf) -> Self {
        Self {
            lock_path: path.with_extension("json.lock"),
            path,
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Take the in-process lock, then the cross-process one.
    async fn lock_for_write(&self) -> Result<(tokio::sync::MutexGuard<'_, ()>, WriterLock)> {
        let guard = self.lock.lock().await;
        let writer = WriterLock::acquire(self.lock_path.clone()).await?;
        Ok((guard, writer))
    }

    async fn read(&self) -> Result<Collection<T>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Collection::empty()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Collection::empty());
        }

        let value: Value = serde_json::from_slice(&raw)
            .map_err(|e| TradeError::json(self.path.display().to_string(), e))?;

        let (items, next_id) = match value {
            Value::Array(items) => {
                tracing::info!(path = %self.path.display(), "migrating unversioned collection");
                (items, 1)
            }
            Value::Object(mut map) => {
                let version = map.get("version").and_then(Value::as_u64).ok_or_else(|| {
                    TradeError::storage(&self.path, "missing schema version")
                })?;
                if version > SCHEMA_VERSION as u64 {
                    return Err(TradeError::storage(
                        &self.path,
                        format!("schema version {} is newer than supported {}", version, SCHEMA_VERSION),
                    ));
                }
                let next_id = map.get("nextId").and_then(Value::as_u64).unwrap_or(1);
                let items = match map.remove("records") {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(_) => {
                        return Err(TradeError::storage(&self.path, "'records' is not an array"))
                    }
                };
                (items, next_id)
            }
            _ => {
                return Err(TradeError::storage(
                    &self.path,
                    "expected a JSON object or array",
                ))
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<T>(item) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        position,
                        error = %e,
                        "dropping malformed {}",
                        T::KIND
                    );
                }
            }
        }

        Ok(Collection::from_records(records, next_id))
    }

    async fn write(&self, collection: &Collection<T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(collection)
            .map_err(|e| TradeError::json(format!("serializing {}", T::KIND), e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            records = collection.records.len(),
            next_id = collection.next_id,
            "collection saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Collection<T>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn replace(&self, records: Vec<T>) -> Result<()> {
        let _locks = self.lock_for_write().await?;
        let current = self.read().await?;
        let collection = Collection::from_records(records, current.next_id);
        self.write(&collection).await
    }

    async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Collection<T>) -> Result<R>,
    {
        let _locks = self.lock_for_write().await?;
        let mut collection = self.read().await?;
        let out = f(&mut collection)?;
        self.write(&collection).await?;
        Ok(out)
    }
}

/// Durable home of the `trades` and `offers` collections
pub struct RecordStore {
    trades: CollectionFile<TradeListing>,
    offers: CollectionFile<Offer>,
}

impl RecordStore {
    /// Open (and create if needed) a store rooted at `data_dir`.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await?;

        tracing::debug!(data_dir = %data_dir.display(), "record store opened");

        Ok(Self {
            trades: CollectionFile::new(data_dir.join(TRADES_FILE)),
            offers: CollectionFile::new(data_dir.join(OFFERS_FILE)),
        })
    }

    pub fn trades_path(&self) -> &Path {
        &self.trades.path
    }

    /// All listing rows in storage order; empty when nothing was saved yet.
    pub async fn load_trades(&self) -> Result<Vec<TradeListing>> {
        Ok(self.trades.load().await?.records)
    }

    /// Replace every listing row.
    pub async fn save_trades(&self, trades: Vec<TradeListing>) -> Result<()> {
        self.trades.replace(trades).await
    }

    /// All offers in storage order; empty when nothing was saved yet.
    pub async fn load_offers(&self) -> Result<Vec<Offer>> {
        Ok(self.offers.load().await?.records)
    }

    /// Replace every offer.
    pub async fn save_offers(&self, offers: Vec<Offer>) -> Result<()> {
        self.offers.replace(offers).await
    }

    /// Serialized read-modify-write of the trades collection.
    ///
    /// Nothing is written when `f` fails.
    pub async fn update_trades<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Collection<TradeListing>) -> Result<R>,
    {
        self.trades.update(f).await
    }

    /// Serialized read-modify-write of the offers collection.
    ///
    /// Nothing is written when `f` fails.
    pub async fn update_offers<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Collection<Offer>) -> Result<R>,
    {
        self.offers.update(f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ladder, Mode, OfferStatus, Platform, Region};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn listing(index: u64) -> TradeListing {
        TradeListing {
            index,
            owner_id: "U1".into(),
            item: "Grief".into(),
            wanted_in_return: "Enigma".into(),
            mode: Mode::Hardcore,
            ladder: Ladder::Ladder,
            platform: Platform::Pc,
            region: Region::Europe,
            base: None,
            socket_count: None,
            is_ethereal: false,
            notes: None,
            external_link: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            origin_channel_ref: None,
            origin_message_ref: None,
        }
    }

    #[tokio::test]
    async fn load_without_data_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path()).await.unwrap();

        assert!(store.load_trades().await.unwrap().is_empty());
        assert!(store.load_offers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_contents() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path()).await.unwrap();

        store.save_trades(vec![listing(1), listing(2)]).await.unwrap();
        store.save_trades(vec![listing(3)]).await.unwrap();

        let trades = store.load_trades().await.unwrap();
        assert_eq!(trades, vec![listing(3)]);

        let raw = std::fs::read_to_string(store.trades_path()).unwrap();
        assert!(raw.contains("\"version\": 1"));
        assert!(!temp.path().join("trades.json.tmp").exists());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_removal() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path()).await.unwrap();

        for _ in 0..3 {
            store
                .update_trades(|c| {
                    let index = c.allocate_id();
                    c.records.push(listing(index));
                    Ok(())
                })
                .await
                .unwrap();
        }

        // drop the highest index, then allocate again
        store
            .update_trades(|c| {
                c.records.retain(|t| t.index != 3);
                Ok(())
            })
            .await
            .unwrap();
        let next = store.update_trades(|c| Ok(c.allocate_id())).await.unwrap();
        assert_eq!(next, 4);

        // a full replace keeps the high-water mark too
        store.save_trades(Vec::new()).await.unwrap();
        let next = store.update_trades(|c| Ok(c.allocate_id())).await.unwrap();
        assert_eq!(next, 5);
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path()).await.unwrap();
        store.save_trades(vec![listing(1)]).await.unwrap();

        let result: Result<()> = store
            .update_trades(|c| {
                c.records.clear();
                Err(TradeError::not_found("trade listing", 9))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.load_trades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn migrates_bare_arrays_and_drops_malformed_records() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(OFFERS_FILE),
            r#"[
                {"offerId": 1, "tradeIndex": 4, "sellerId": "S", "buyerId": "B",
                 "yourOffer": "Ist", "notes": "", "status": "Pending",
                 "timestamp": "2025-06-01T10:00:00.000Z"},
                {"offerId": 2, "status": "Pending"},
                {"offerId": 5, "tradeIndex": 4, "sellerId": "S", "buyerId": "C",
                 "yourOffer": "Mal", "status": "Declined",
                 "timestamp": "2025-06-01T11:00:00.000Z"}
            ]"#,
        )
        .unwrap();

        let store = RecordStore::open(temp.path()).await.unwrap();
        let offers = store.load_offers().await.unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[1].status, OfferStatus::Declined);

        let next = store.update_offers(|c| Ok(c.allocate_id())).await.unwrap();
        assert_eq!(next, 6);
    }

    #[tokio::test]
    async fn rejects_newer_schema() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(TRADES_FILE),
            r#"{"version": 99, "nextId": 1, "records": []}"#,
        )
        .unwrap();

        let store = RecordStore::open(temp.path()).await.unwrap();
        let err = store.load_trades().await.unwrap_err();
        assert!(matches!(err, TradeError::Storage { .. }));
    }

    #[tokio::test]
    async fn concurrent_updates_are_serialized() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(temp.path()).await.unwrap());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update_trades(|c| {
                        let index = c.allocate_id();
                        c.records.push(listing(index));
                        Ok(index)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut indices = Vec::new();
        for handle in handles {
            indices.push(handle.await.unwrap());
        }
        indices.sort_unstable();

        assert_eq!(indices, (1..=16).collect::<Vec<_>>());
        assert_eq!(store.load_trades().await.unwrap().len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn separate_stores_on_one_directory_lose_no_updates() {
        let temp = TempDir::new().unwrap();
        let server = Arc::new(RecordStore::open(temp.path()).await.unwrap());
        let moderator = Arc::new(RecordStore::open(temp.path()).await.unwrap());

        let mut handles = Vec::new();
        for round in 0..24 {
            let store = if round % 2 == 0 {
                Arc::clone(&server)
            } else {
                Arc::clone(&moderator)
            };
            handles.push(tokio::spawn(async move {
                store
                    .update_trades(|c| {
                        let index = c.allocate_id();
                        c.records.push(listing(index));
                        Ok(index)
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stored: Vec<u64> = server
            .load_trades()
            .await
            .unwrap()
            .iter()
            .map(|t| t.index)
            .collect();
        stored.sort_unstable();
        assert_eq!(stored, (1..=24).collect::<Vec<_>>());
        assert!(temp.path().join("trades.json.lock").exists());
    }
}
