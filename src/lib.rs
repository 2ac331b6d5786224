//! # CertMill - A Minimal Certificate Authority Backend
//!
//! CertMill manages certificate signing requests for a fleet of clients:
//! it decides when and for how long a CSR may be signed, enforces the
//! lifecycle rules around rejection and cleanup, and renews whole fleets
//! concurrently under a configurable lifetime policy. Certificates are
//! produced with pure-Rust cryptography (rustcrypto), with no dependency
//! on ring or OpenSSL.
//!
//! ## The lifecycle in short
//!
//! - **sign** issues a certificate against a CSR, refusing rejected CSRs
//!   and refusing to shorten the lifetime below an existing unexpired
//!   certificate (the old one is still out there until cleaned up).
//! - **reject** permanently bars a CSR from ever being signed again.
//! - **clean** keeps only the newest certificate; **wipe** removes all of
//!   them, making the CSR signable from scratch.
//! - **refresh** renews every refreshable CSR with a bounded worker pool:
//!   requests that already earned a long-lived certificate keep the long
//!   class, everyone else is renewed short-lived and never backdated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use certmill::manager::CertificateManager;
//! use certmill::model::{fingerprint, Csr, CsrId};
//! use certmill::policy::LifetimePolicy;
//! use certmill::signer::{generate_request, SigningCert};
//! use certmill::store::MemoryStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), certmill::error::CertMillError> {
//! let ca = SigningCert::generate("ops-ca")?;
//! let policy = LifetimePolicy::from_hours(48, 168, true)?;
//!
//! // A client submitted a request through the enrollment pathway.
//! let request_pem = generate_request("node1.example.com")?;
//! let store = Arc::new(MemoryStore::new());
//! store.insert(
//!     Csr::builder()
//!         .id(CsrId(1))
//!         .common_name("node1.example.com".to_string())
//!         .sha256sum(fingerprint(&request_pem))
//!         .request_pem(request_pem)
//!         .build(),
//! );
//!
//! // Sign it short-lived, then renew the whole fleet in one pass.
//! let manager = CertificateManager::new(store.as_ref());
//! let decision = policy.issuance(false);
//! manager
//!     .sign(CsrId(1), &ca, decision.duration, decision.backdate)
//!     .await?;
//!
//! let outcome =
//!     certmill::refresh::refresh_all(store.clone(), Arc::new(ca), policy, 16).await?;
//! println!("renewed {} requests", outcome.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`model`]: CSR and certificate entities, identifiers, fingerprints
//! - [`policy`]: the lifetime policy engine and its two decision rules
//! - [`manager`]: the single-CSR lifecycle operations
//! - [`refresh`]: fleet-wide renewal and cleanup passes
//! - [`signer`]: CA key material and X.509 issuance
//! - [`store`]: the storage boundary with in-memory and JSON backends
//! - [`error`]: the crate error type

pub mod error;
pub mod manager;
pub mod model;
pub mod policy;
pub mod refresh;
pub mod signer;
pub mod store;
