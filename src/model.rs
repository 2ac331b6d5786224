use std::fmt;
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Stable identifier of a certificate signing request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CsrId(pub u64);

impl fmt::Display for CsrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CsrId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(CsrId)
    }
}

impl From<u64> for CsrId {
    fn from(id: u64) -> Self {
        CsrId(id)
    }
}

/// A signed artifact bound to exactly one CSR.
///
/// Certificates are created only by the signing primitive and never mutated
/// afterwards; the owning CSR discards them wholesale via clean or wipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    /// The CSR this certificate was issued against.
    pub csr_id: CsrId,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    /// PEM-encoded signed X.509 certificate.
    pub pem: String,
}

impl Certificate {
    /// The certificate's lifetime: `not_after - not_before`.
    pub fn lifetime(&self) -> Duration {
        self.not_after - self.not_before
    }

    /// Whether the certificate is still valid at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.not_after > now
    }
}

/// A certificate signing request: a pending identity claim awaiting
/// signature, together with every certificate issued against it.
///
/// The certificate collection is ordered newest-first and is only mutated
/// through [`Csr::attach`], [`Csr::retain_latest`] and
/// [`Csr::clear_certificates`]; once `rejected` is set it never gains
/// another certificate.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct Csr {
    pub id: CsrId,
    pub common_name: String,
    /// SHA-256 fingerprint of the submitted request, lowercase hex.
    pub sha256sum: String,
    /// The PKCS#10 request as submitted, PEM-encoded.
    pub request_pem: String,
    #[builder(default)]
    pub rejected: bool,
    #[builder(default)]
    certificates: Vec<Certificate>,
}

impl Csr {
    /// All certificates issued against this CSR, newest first.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// The newest certificate by `not_before`; ties go to the most
    /// recently attached.
    pub fn latest(&self) -> Option<&Certificate> {
        self.certificates.iter().reduce(|best, cand| {
            if cand.not_before > best.not_before {
                cand
            } else {
                best
            }
        })
    }

    /// Prepends a freshly issued certificate as the newest entry.
    pub fn attach(&mut self, cert: Certificate) {
        self.certificates.insert(0, cert);
    }

    /// Retains only the newest certificate. No-op at zero or one.
    pub fn retain_latest(&mut self) {
        if self.certificates.len() <= 1 {
            return;
        }
        if let Some(newest) = self.latest().cloned() {
            self.certificates = vec![newest];
        }
    }

    /// Discards every certificate, leaving the CSR signable again.
    pub fn clear_certificates(&mut self) {
        self.certificates.clear();
    }

    /// Eligible for automatic renewal: not rejected and holding at least
    /// one certificate.
    pub fn is_refreshable(&self) -> bool {
        !self.rejected && !self.certificates.is_empty()
    }

    /// The printable summary row for this CSR.
    pub fn summary(&self) -> CsrSummary {
        CsrSummary {
            id: self.id,
            common_name: self.common_name.clone(),
            sha256sum: self.sha256sum.clone(),
            latest_not_after: self.latest().map(|cert| cert.not_after),
        }
    }
}

/// One row of the operator-facing listing.
#[derive(Debug, Clone)]
pub struct CsrSummary {
    pub id: CsrId,
    pub common_name: String,
    pub sha256sum: String,
    pub latest_not_after: Option<OffsetDateTime>,
}

impl CsrSummary {
    /// Listing order: CSRs without a certificate sort last, ties break by
    /// ascending id.
    pub fn sort_key(&self) -> (bool, CsrId) {
        (self.latest_not_after.is_none(), self.id)
    }
}

/// SHA-256 fingerprint of submitted request bytes, lowercase hex.
pub fn fingerprint(request_pem: &str) -> String {
    Sha256::digest(request_pem.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
