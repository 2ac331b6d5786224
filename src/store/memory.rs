use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CsrStore, StoreError, StoreTxn};
use crate::model::{Csr, CsrId, CsrSummary};

/// In-memory store backed by a mutexed map. The default test double, also
/// useful for embedding.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<CsrId, Csr>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a CSR directly, outside any transaction. Seeding only.
    pub fn insert(&self, csr: Csr) {
        self.lock().insert(csr.id, csr);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CsrId, Csr>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CsrStore for MemoryStore {
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
        Ok(Box::new(MemoryTxn {
            store: self,
            staged: HashMap::new(),
        }))
    }
}

struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    staged: HashMap<CsrId, Csr>,
}

#[async_trait]
impl StoreTxn for MemoryTxn<'_> {
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
        for (id, csr) in self.staged {
            map.insert(id, csr);
        }
        Ok(())
    }
}
