mod util;

use std::sync::Arc;

use certmill::error::CertMillError;
use certmill::model::CsrId;
use certmill::policy::LifetimePolicy;
use certmill::refresh::{clean_all, refresh_all};
use certmill::signer::BACKDATE_SKEW;
use certmill::store::{CsrStore, MemoryStore};
use time::{Duration, OffsetDateTime};

use util::{FailingStore, cert_with_lifetime, new_csr, test_ca};

fn policy(backdate: bool) -> LifetimePolicy {
    LifetimePolicy::from_hours(48, 168, backdate).unwrap()
}

#[tokio::test]
async fn short_tier_renews_short_and_never_backdates() {
    // 72h existing < 168h long: the renewal is 48h with backdating forced
    // off, regardless of the operator's backdate flag.
    let store = Arc::new(MemoryStore::new());
    let mut csr = new_csr(7, "node7.example.com");
    csr.attach(cert_with_lifetime(CsrId(7), 72));
    store.insert(csr);

    let outcome = refresh_all(store.clone(), Arc::new(test_ca()), policy(true), 16)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 0);

    let csr = store.find(CsrId(7)).await.unwrap().unwrap();
    let renewed = csr.latest().unwrap();
    assert_eq!(renewed.lifetime(), Duration::hours(48));
    assert!(renewed.not_before > OffsetDateTime::now_utc() - Duration::minutes(1));
}

#[tokio::test]
async fn long_tier_keeps_long_and_backdates_when_enabled() {
    let store = Arc::new(MemoryStore::new());
    let mut csr = new_csr(1, "node1.example.com");
    csr.attach(cert_with_lifetime(CsrId(1), 168));
    store.insert(csr);

    refresh_all(store.clone(), Arc::new(test_ca()), policy(true), 16)
        .await
        .unwrap();

    let csr = store.find(CsrId(1)).await.unwrap().unwrap();
    let renewed = csr.latest().unwrap();
    assert_eq!(renewed.lifetime(), Duration::hours(168));
    let skewed = OffsetDateTime::now_utc() - BACKDATE_SKEW;
    assert!(renewed.not_before <= skewed);
}

#[tokio::test]
async fn long_tier_does_not_backdate_when_disabled() {
    let store = Arc::new(MemoryStore::new());
    let mut csr = new_csr(1, "node1.example.com");
    csr.attach(cert_with_lifetime(CsrId(1), 168));
    store.insert(csr);

    refresh_all(store.clone(), Arc::new(test_ca()), policy(false), 16)
        .await
        .unwrap();

    let csr = store.find(CsrId(1)).await.unwrap().unwrap();
    let renewed = csr.latest().unwrap();
    assert_eq!(renewed.lifetime(), Duration::hours(168));
    assert!(renewed.not_before > OffsetDateTime::now_utc() - Duration::minutes(1));
}

#[tokio::test]
async fn one_failing_item_does_not_abort_siblings() {
    let inner = MemoryStore::new();
    for id in 1..=3u64 {
        let mut csr = new_csr(id, &format!("node{id}.example.com"));
        csr.attach(cert_with_lifetime(CsrId(id), 72));
        inner.insert(csr);
    }
    let mut failing = FailingStore::new(inner);
    failing.fail_save_ids = vec![CsrId(2)];
    let store: Arc<dyn CsrStore> = Arc::new(failing);

    let outcome = refresh_all(store.clone(), Arc::new(test_ca()), policy(false), 16)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);

    // Siblings renewed, the failing CSR rolled back.
    for (id, expected) in [(1u64, 2usize), (2, 1), (3, 2)] {
        let csr = store.find(CsrId(id)).await.unwrap().unwrap();
        assert_eq!(csr.certificates().len(), expected, "CSR {id}");
    }
}

#[tokio::test]
async fn listing_failure_is_fatal_for_the_pass() {
    let mut failing = FailingStore::new(MemoryStore::new());
    failing.fail_listing = true;
    let store: Arc<dyn CsrStore> = Arc::new(failing);

    let err = refresh_all(store, Arc::new(test_ca()), policy(false), 16)
        .await
        .unwrap_err();
    assert!(matches!(err, CertMillError::Store(_)));
}

#[tokio::test]
async fn rejected_and_unsigned_csrs_are_not_refreshable() {
    let store = Arc::new(MemoryStore::new());
    let mut rejected = new_csr(1, "rejected.example.com");
    rejected.attach(cert_with_lifetime(CsrId(1), 72));
    rejected.rejected = true;
    store.insert(rejected);
    store.insert(new_csr(2, "unsigned.example.com"));

    let outcome = refresh_all(store.clone(), Arc::new(test_ca()), policy(false), 16)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failed, 0);

    assert_eq!(
        store
            .find(CsrId(1))
            .await
            .unwrap()
            .unwrap()
            .certificates()
            .len(),
        1
    );
    assert!(
        store
            .find(CsrId(2))
            .await
            .unwrap()
            .unwrap()
            .certificates()
            .is_empty()
    );
}

#[tokio::test]
async fn refresh_scales_past_the_pool_width() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=20u64 {
        let mut csr = new_csr(id, &format!("node{id}.example.com"));
        csr.attach(cert_with_lifetime(CsrId(id), 72));
        store.insert(csr);
    }

    let outcome = refresh_all(store.clone(), Arc::new(test_ca()), policy(false), 4)
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 20);
    assert_eq!(outcome.failed, 0);
}

#[tokio::test]
async fn clean_all_sweeps_every_refreshable_csr() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=2u64 {
        let mut csr = new_csr(id, &format!("node{id}.example.com"));
        let older = cert_with_lifetime(CsrId(id), 48);
        let mut newest = cert_with_lifetime(CsrId(id), 72);
        newest.not_before += Duration::minutes(30);
        newest.not_after += Duration::minutes(30);
        csr.attach(older);
        csr.attach(newest);
        store.insert(csr);
    }

    let outcome = clean_all(store.clone()).await.unwrap();
    assert_eq!(outcome.succeeded, 2);

    for id in 1..=2u64 {
        let csr = store.find(CsrId(id)).await.unwrap().unwrap();
        assert_eq!(csr.certificates().len(), 1);
        assert_eq!(csr.latest().unwrap().lifetime(), Duration::hours(72));
    }
}

#[tokio::test]
async fn printable_listing_sorts_unsigned_last_then_by_id() {
    let store = MemoryStore::new();
    store.insert(new_csr(1, "unsigned-low.example.com"));
    let mut signed_high = new_csr(3, "signed-high.example.com");
    signed_high.attach(cert_with_lifetime(CsrId(3), 48));
    store.insert(signed_high);
    let mut signed_low = new_csr(2, "signed-low.example.com");
    signed_low.attach(cert_with_lifetime(CsrId(2), 48));
    store.insert(signed_low);
    store.insert(new_csr(4, "unsigned-high.example.com"));

    let rows = store.printable().await.unwrap();
    let ids: Vec<CsrId> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![CsrId(2), CsrId(3), CsrId(1), CsrId(4)]);
    assert!(rows[0].latest_not_after.is_some());
    assert!(rows[3].latest_not_after.is_none());
}
