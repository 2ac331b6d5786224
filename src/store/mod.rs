use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Csr, CsrId, CsrSummary};

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Storage boundary for CSRs and their certificates.
///
/// Reads go straight through; every mutation happens inside a scoped
/// transaction obtained from [`CsrStore::begin`].
#[async_trait]
pub trait CsrStore: Send + Sync {
    async fn find(&self, id: CsrId) -> Result<Option<Csr>, StoreError>;

    /// Non-rejected CSRs holding at least one certificate, ascending id.
    async fn refreshable(&self) -> Result<Vec<Csr>, StoreError>;

    /// Summary rows for reporting, in listing order: CSRs without a
    /// certificate last, ties by ascending id.
    async fn printable(&self) -> Result<Vec<CsrSummary>, StoreError>;

    /// Opens a scoped transaction. Writes are staged until
    /// [`StoreTxn::commit`]; dropping the transaction without committing
    /// rolls everything back.
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTxn + 'a>, StoreError>;
}

/// A scoped transaction over a [`CsrStore`].
#[async_trait]
pub trait StoreTxn: Send {
    /// Reads through staged writes first, then the underlying store.
    async fn find(&mut self, id: CsrId) -> Result<Option<Csr>, StoreError>;

    /// Stages an upsert of the given CSR.
    async fn save(&mut self, csr: Csr) -> Result<(), StoreError>;

    /// Applies every staged write atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
