use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use certmill::model::{Certificate, Csr, CsrId, CsrSummary, fingerprint};
use certmill::signer::{SigningCert, generate_request};
use certmill::store::{CsrStore, MemoryStore, StoreError, StoreTxn};

pub fn test_ca() -> SigningCert {
    SigningCert::generate("test-ca").expect("CA generation")
}

/// A CSR carrying a real PKCS#10 request for the given common name.
pub fn new_csr(id: u64, common_name: &str) -> Csr {
    let request_pem = generate_request(common_name).expect("request generation");
    Csr::builder()
        .id(CsrId(id))
        .common_name(common_name.to_string())
        .sha256sum(fingerprint(&request_pem))
        .request_pem(request_pem)
        .build()
}

/// A pre-existing certificate with the given lifetime, started an hour ago
/// so it is still valid for any lifetime above one hour.
pub fn cert_with_lifetime(csr_id: CsrId, hours: i64) -> Certificate {
    let not_before = OffsetDateTime::now_utc() - Duration::hours(1);
    Certificate {
        csr_id,
        not_before,
        not_after: not_before + Duration::hours(hours),
        pem: String::new(),
    }
}

/// Wraps a [`MemoryStore`] with injectable failures: saves for chosen ids,
/// or the refreshable listing as a whole.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_save_ids: Vec<CsrId>,
    pub fail_listing: bool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_save_ids: Vec::new(),
            fail_listing: false,
        }
    }
}

#[async_trait]
impl CsrStore for FailingStore {
    async fn find(&self, id: CsrId) -> Result<Option<Csr>, StoreError> {
        self.inner.find(id).await
    }

    async fn refreshable(&self) -> Result<Vec<Csr>, StoreError> {
        if self.fail_listing {
            return Err(StoreError::Backend("listing unavailable".to_string()));
        }
        self.inner.refreshable().await
    }

    async fn printable(&self) -> Result<Vec<CsrSummary>, StoreError> {
        self.inner.printable().await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTxn + 'a>, StoreError> {
        let txn = self.inner.begin().await?;
        Ok(Box::new(FailingTxn {
            txn,
            fail_save_ids: self.fail_save_ids.clone(),
        }))
    }
}

struct FailingTxn<'a> {
    txn: Box<dyn StoreTxn + 'a>,
    fail_save_ids: Vec<CsrId>,
}

#[async_trait]
impl StoreTxn for FailingTxn<'_> {
    async fn find(&mut self, id: CsrId) -> Result<Option<Csr>, StoreError> {
        self.txn.find(id).await
    }

    async fn save(&mut self, csr: Csr) -> Result<(), StoreError> {
        if self.fail_save_ids.contains(&csr.id) {
            return Err(StoreError::Backend(format!(
                "injected failure saving CSR {}",
                csr.id
            )));
        }
        self.txn.save(csr).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.txn.commit().await
    }
}
