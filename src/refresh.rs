use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::error::CertMillError;
use crate::manager::CertificateManager;
use crate::model::CsrId;
use crate::policy::LifetimePolicy;
use crate::signer::SigningCert;
use crate::store::CsrStore;

/// Default width of the renewal worker pool.
pub const DEFAULT_WORKERS: usize = 16;

/// Tally of one bulk pass. Per-item failures are logged as they happen;
/// the pass itself succeeds whenever the refreshable set could be listed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Renews every refreshable CSR with at most `workers` renewals in flight.
///
/// Each CSR is renewed independently in its own transaction; a failing or
/// panicking renewal is caught at the task boundary, logged, and counted,
/// without aborting its siblings. Completion order is unspecified. Only a
/// failure to list the refreshable set is fatal for the pass.
pub async fn refresh_all(
    store: Arc<dyn CsrStore>,
    ca: Arc<SigningCert>,
    policy: LifetimePolicy,
    workers: usize,
) -> Result<BulkOutcome, CertMillError> {
    let csrs = store.refreshable().await?;
    let workers = workers.max(1);
    let total = csrs.len();

    let mut outcome = BulkOutcome::default();
    let mut tasks: JoinSet<(CsrId, Result<(), CertMillError>)> = JoinSet::new();

    for csr in csrs {
        while tasks.len() >= workers {
            if let Some(joined) = tasks.join_next().await {
                record(&mut outcome, joined);
            }
        }
        let store = Arc::clone(&store);
        let ca = Arc::clone(&ca);
        let id = csr.id;
        tasks.spawn(async move {
            let manager = CertificateManager::new(store.as_ref());
            let result = manager.renew(id, ca.as_ref(), policy).await.map(drop);
            (id, result)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        record(&mut outcome, joined);
    }

    info!(
        total,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "refresh pass complete"
    );
    Ok(outcome)
}

fn record(
    outcome: &mut BulkOutcome,
    joined: Result<(CsrId, Result<(), CertMillError>), JoinError>,
) {
    match joined {
        Ok((_, Ok(()))) => outcome.succeeded += 1,
        Ok((id, Err(err))) => {
            warn!(%id, %err, "renewal failed");
            outcome.failed += 1;
        }
        Err(err) => {
            warn!(%err, "renewal task panicked");
            outcome.failed += 1;
        }
    }
}

/// Applies `clean` to every refreshable CSR: a maintenance sweep that
/// drops superseded certificates, keeping the newest per CSR.
pub async fn clean_all(store: Arc<dyn CsrStore>) -> Result<BulkOutcome, CertMillError> {
    let csrs = store.refreshable().await?;
    let manager = CertificateManager::new(store.as_ref());

    let mut outcome = BulkOutcome::default();
    for csr in csrs {
        match manager.clean(csr.id).await {
            Ok(()) => outcome.succeeded += 1,
            Err(err) => {
                warn!(id = %csr.id, %err, "clean failed");
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}
