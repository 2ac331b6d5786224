use thiserror::Error;
use time::Duration;

use crate::model::CsrId;
use crate::store::StoreError;

/// Represents errors that can occur while operating the certificate authority.
///
/// This enum covers every operator-facing failure kind; the `Display`
/// messages are what the command surface prints before exiting non-zero.
#[derive(Debug, Error)]
pub enum CertMillError {
    /// The id does not resolve to a known CSR.
    #[error("CSR {0} not found")]
    NotFound(CsrId),

    /// A sign was attempted against a rejected CSR.
    #[error("refusing to sign rejected CSR {0}")]
    Rejected(CsrId),

    /// Signing would shorten the lifetime below an existing unexpired
    /// certificate. The old certificate is still out there; the operator
    /// must clean or wipe before shortening.
    #[error(
        "CSR {id} has a valid certificate with {current} lifetime, \
         a new certificate would have {requested} lifetime; \
         clean out existing certificates before shortening lifetime"
    )]
    ShorteningBlocked {
        id: CsrId,
        current: Duration,
        requested: Duration,
    },

    /// The command exists but is intentionally not wired up.
    #[error("{0} is not implemented yet")]
    NotImplemented(&'static str),

    /// The short lifetime class was configured longer than the long class.
    #[error("short lived certs ({short}) shouldn't last longer than long lived certs ({long})")]
    PolicyMisconfigured { short: Duration, long: Duration },

    /// Error from the backing store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error while producing or decoding a signed artifact.
    #[error("signing error: {0}")]
    Signing(String),
}

impl From<der::Error> for CertMillError {
    /// Converts a `der::Error` into a `CertMillError`.
    fn from(err: der::Error) -> Self {
        CertMillError::Signing(err.to_string())
    }
}

impl From<pem::PemError> for CertMillError {
    fn from(err: pem::PemError) -> Self {
        CertMillError::Signing(err.to_string())
    }
}

impl From<pkcs8::Error> for CertMillError {
    fn from(err: pkcs8::Error) -> Self {
        CertMillError::Signing(err.to_string())
    }
}
