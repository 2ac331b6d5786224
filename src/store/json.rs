use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CsrStore, StoreError, StoreTxn};
use crate::model::{Csr, CsrId, CsrSummary};

/// File-backed store: one JSON document holding every CSR.
///
/// The whole document is read once at open; commits rewrite it through a
/// temp file and rename, so a failed write never leaves a torn store
/// behind. Suited to the fleet sizes a single admin tool manages.
pub struct JsonFileStore {
    path: PathBuf,
    inner: Mutex<HashMap<CsrId, Csr>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating an empty one if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows: Vec<Csr> = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let map = rows.into_iter().map(|csr| (csr.id, csr)).collect();
        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    /// Inserts a CSR and persists immediately, outside any transaction.
    /// For the submission pathway and seeding.
    pub fn insert(&self, csr: Csr) -> Result<(), StoreError> {
        let mut map = self.lock();
        let mut next = map.clone();
        next.insert(csr.id, csr);
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CsrId, Csr>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, map: &HashMap<CsrId, Csr>) -> Result<(), StoreError> {
        let mut rows: Vec<&Csr> = map.values().collect();
        rows.sort_by_key(|csr| csr.id);
        let json = serde_json::to_string_pretty(&rows)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl CsrStore for JsonFileStore {
    async fn find(&self, id: CsrId) -> Result<Option<Csr>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn refreshable(&self) -> Result<Vec<Csr>, StoreError> {
        let mut csrs: Vec<Csr> = self
            .lock()
            .values()
            .filter(|csr| csr.is_refreshable())
            .cloned()
            .collect();
        csrs.sort_by_key(|csr| csr.id);
        Ok(csrs)
    }

    async fn printable(&self) -> Result<Vec<CsrSummary>, StoreError> {
        let mut rows: Vec<CsrSummary> = self.lock().values().map(Csr::summary).collect();
        rows.sort_by_key(CsrSummary::sort_key);
        Ok(rows)
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTxn + 'a>, StoreError> {
        Ok(Box::new(JsonTxn {
            store: self,
            staged: HashMap::new(),
        }))
    }
}

struct JsonTxn<'a> {
    store: &'a JsonFileStore,
    staged: HashMap<CsrId, Csr>,
}

#[async_trait]
impl StoreTxn for JsonTxn<'_> {
    async fn find(&mut self, id: CsrId) -> Result<Option<Csr>, StoreError> {
        if let Some(staged) = self.staged.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.lock().get(&id).cloned())
    }

    async fn save(&mut self, csr: Csr) -> Result<(), StoreError> {
        self.staged.insert(csr.id, csr);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut map = self.store.lock();
        let mut next = map.clone();
        next.extend(self.staged);
        // Persist first: a failed write leaves memory and file unchanged.
        self.store.persist(&next)?;
        *map = next;
        Ok(())
    }
}
