use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::error::CertMillError;
use crate::model::{Certificate, CsrId};
use crate::policy::LifetimePolicy;
use crate::signer::SigningCert;
use crate::store::CsrStore;

type Result<T> = std::result::Result<T, CertMillError>;

/// Orchestrates the single-CSR state transitions.
///
/// Every operation runs inside one scoped transaction: committed on
/// success, rolled back on any error path, so no partial mutation is ever
/// retained.
pub struct CertificateManager<'a> {
    store: &'a dyn CsrStore,
}

impl<'a> CertificateManager<'a> {
    pub fn new(store: &'a dyn CsrStore) -> Self {
        Self { store }
    }

    /// Signs the CSR with the given lifetime, attaching the new
    /// certificate as the newest entry.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown, `Rejected` if the CSR was
    /// rejected, and `ShorteningBlocked` if an unexpired certificate with
    /// a lifetime at least as long already exists. The longer-lived
    /// certificate remains usable by a stale client even after a shorter
    /// replacement, so the operator must clean or wipe first.
    pub async fn sign(
        &self,
        id: CsrId,
        ca: &SigningCert,
        duration: Duration,
        backdate: bool,
    ) -> Result<Certificate> {
        let mut txn = self.store.begin().await?;
        let mut csr = txn.find(id).await?.ok_or(CertMillError::NotFound(id))?;
        if csr.rejected {
            return Err(CertMillError::Rejected(id));
        }

        if let Some(current) = csr.latest() {
            let now = OffsetDateTime::now_utc();
            if current.is_valid_at(now) && current.lifetime() >= duration {
                return Err(CertMillError::ShorteningBlocked {
                    id,
                    current: current.lifetime(),
                    requested: duration,
                });
            }
        }

        let cert = ca.sign(&csr, duration, backdate)?;
        csr.attach(cert.clone());
        txn.save(csr).await?;
        txn.commit().await?;
        info!(%id, lifetime = %duration, backdate, "signed CSR");
        Ok(cert)
    }

    /// Renews a CSR under the refresh rule: the lifetime class is chosen
    /// from the newest certificate's lifetime, and the shortening guard is
    /// bypassed since the rule never hands out less than the CSR's current
    /// tier allows. Rejected CSRs are still refused.
    pub async fn renew(
        &self,
        id: CsrId,
        ca: &SigningCert,
        policy: LifetimePolicy,
    ) -> Result<Certificate> {
        let mut txn = self.store.begin().await?;
        let mut csr = txn.find(id).await?.ok_or(CertMillError::NotFound(id))?;
        if csr.rejected {
            return Err(CertMillError::Rejected(id));
        }

        let current_lifetime = csr
            .latest()
            .map(Certificate::lifetime)
            .unwrap_or(Duration::ZERO);
        let decision = policy.refresh(current_lifetime);

        let cert = ca.sign(&csr, decision.duration, decision.backdate)?;
        csr.attach(cert.clone());
        txn.save(csr).await?;
        txn.commit().await?;
        info!(%id, lifetime = %decision.duration, backdate = decision.backdate, "renewed CSR");
        Ok(cert)
    }

    /// Marks the CSR rejected; no certificate can ever be attached again.
    /// Rejecting an already-rejected CSR is a no-op.
    pub async fn reject(&self, id: CsrId) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let mut csr = txn.find(id).await?.ok_or(CertMillError::NotFound(id))?;
        if csr.rejected {
            return Ok(());
        }
        csr.rejected = true;
        txn.save(csr).await?;
        txn.commit().await?;
        info!(%id, "rejected CSR");
        Ok(())
    }

    /// Retains only the newest certificate for the CSR. No-op at zero or
    /// one certificates.
    pub async fn clean(&self, id: CsrId) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let mut csr = txn.find(id).await?.ok_or(CertMillError::NotFound(id))?;
        if csr.certificates().len() <= 1 {
            return Ok(());
        }
        csr.retain_latest();
        txn.save(csr).await?;
        txn.commit().await?;
        info!(%id, "cleaned older certificates");
        Ok(())
    }

    /// Discards every certificate for the CSR, leaving it signable again
    /// under the normal preconditions.
    pub async fn wipe(&self, id: CsrId) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let mut csr = txn.find(id).await?.ok_or(CertMillError::NotFound(id))?;
        csr.clear_certificates();
        txn.save(csr).await?;
        txn.commit().await?;
        info!(%id, "wiped certificates");
        Ok(())
    }
}
