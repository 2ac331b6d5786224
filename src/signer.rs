use core::str::FromStr;
use std::path::Path;

use const_oid::AssociatedOid;
use der::asn1::{BitString, OctetString, UtcTime};
use der::{Decode, Encode, EncodePem};
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use p256::ecdsa::SigningKey as P256SigningKey;
use pkcs8::DecodePrivateKey;
use rand_core::{OsRng, RngCore};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::name::{Name, RdnSequence};
use x509_cert::request::{CertReq, CertReqInfo};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

use crate::error::CertMillError;
use crate::model::{Certificate, Csr};

/// How far into the past a backdated certificate's `not_before` is set, to
/// tolerate clock drift across verifying clients.
pub const BACKDATE_SKEW: Duration = Duration::hours(1);

type Result<T> = std::result::Result<T, CertMillError>;

/// Private key material an authority signs with. Only the private half is
/// held; the public half and the matching X.509 algorithm identifier are
/// derived on demand.
pub enum CaKey {
    Rsa(Box<RsaPrivateKey>),
    EcdsaP256(P256SigningKey),
    Ed25519(Ed25519SigningKey),
}

impl CaKey {
    /// Parses a PKCS#8 PEM private key, accepting ECDSA P-256, Ed25519 or
    /// RSA material.
    pub fn from_pkcs8_pem(pem_str: &str) -> Result<Self> {
        P256SigningKey::from_pkcs8_pem(pem_str)
            .map(CaKey::EcdsaP256)
            .or_else(|_| Ed25519SigningKey::from_pkcs8_pem(pem_str).map(CaKey::Ed25519))
            .or_else(|_| {
                RsaPrivateKey::from_pkcs8_pem(pem_str).map(|key| CaKey::Rsa(Box::new(key)))
            })
            .map_err(|_| {
                CertMillError::Signing("unsupported or malformed PKCS#8 private key".to_string())
            })
    }

    /// Signature over `data`, in the encoding X.509 expects for the key
    /// type: PKCS#1 v1.5 for RSA, DER for ECDSA, raw for Ed25519.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match self {
            CaKey::Rsa(private) => rsa::pkcs1v15::SigningKey::<Sha256>::new((**private).clone())
                .try_sign(data)
                .map_err(|e| CertMillError::Signing(e.to_string()))?
                .to_vec(),
            CaKey::EcdsaP256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .try_sign(data)
                    .map_err(|e| CertMillError::Signing(e.to_string()))?;
                signature.to_der().to_vec()
            }
            CaKey::Ed25519(key) => key
                .try_sign(data)
                .map_err(|e| CertMillError::Signing(e.to_string()))?
                .to_vec(),
        };
        Ok(signature)
    }

    /// The signature algorithm identifier certificates signed by this key
    /// will carry.
    pub fn signature_algorithm(&self) -> AlgorithmIdentifierOwned {
        let oid = match self {
            CaKey::Rsa(_) => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            CaKey::EcdsaP256(_) => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            CaKey::Ed25519(_) => const_oid::db::rfc8410::ID_ED_25519,
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    /// The subject-public-key-info of this key's public half.
    pub fn spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        match self {
            CaKey::Rsa(private) => {
                SubjectPublicKeyInfoOwned::from_key(RsaPublicKey::from(private.as_ref()))
                    .map_err(|e| CertMillError::Signing(e.to_string()))
            }
            CaKey::EcdsaP256(key) => SubjectPublicKeyInfoOwned::from_key(*key.verifying_key())
                .map_err(|e| CertMillError::Signing(e.to_string())),
            CaKey::Ed25519(key) => Ok(SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: const_oid::db::rfc8410::ID_ED_25519,
                    parameters: None,
                },
                subject_public_key: BitString::from_bytes(&key.verifying_key().to_bytes())?,
            }),
        }
    }
}

/// The authority's own certificate and key material, loaded once per
/// process and shared read-only for the duration of a run.
pub struct SigningCert {
    cert: CertificateInner,
    key: CaKey,
}

impl SigningCert {
    /// Loads CA material from PEM-encoded certificate and PKCS#8 key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path).map_err(|e| {
            CertMillError::Signing(format!("failed to read {}: {e}", cert_path.display()))
        })?;
        let key_pem = std::fs::read_to_string(key_path).map_err(|e| {
            CertMillError::Signing(format!("failed to read {}: {e}", key_path.display()))
        })?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Loads CA material from PEM-encoded strings.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let cert = CertificateInner::from_der(&pem_to_der(cert_pem)?)?;
        let key = CaKey::from_pkcs8_pem(key_pem)?;
        Ok(Self { cert, key })
    }

    /// Bootstraps a fresh authority: generates an ECDSA P-256 key and
    /// self-signs a ten-year CA certificate for it.
    pub fn generate(common_name: &str) -> Result<Self> {
        let key = CaKey::EcdsaP256(P256SigningKey::random(&mut OsRng));
        let name = common_name_to_x509(common_name)?;
        let now = OffsetDateTime::now_utc();
        let cert = build_certificate(
            &key,
            name.clone(),
            name,
            key.spki()?,
            now,
            now + Duration::days(3650),
            true,
        )?;
        Ok(Self { cert, key })
    }

    /// The issuer name placed on everything this authority signs: the
    /// subject of its own certificate.
    pub fn issuer_name(&self) -> Name {
        self.cert.tbs_certificate.subject.clone()
    }

    /// This authority's certificate in PEM form.
    pub fn to_pem(&self) -> Result<String> {
        Ok(self.cert.to_pem(pkcs8::LineEnding::LF)?)
    }

    /// Signs a CSR, producing a certificate valid for `duration`.
    ///
    /// With `backdate` the validity window starts [`BACKDATE_SKEW`] in the
    /// past instead of now; either way the lifetime equals `duration`.
    pub fn sign(&self, csr: &Csr, duration: Duration, backdate: bool) -> Result<Certificate> {
        let now = OffsetDateTime::now_utc();
        let not_before = if backdate { now - BACKDATE_SKEW } else { now };
        let not_after = not_before + duration;

        let request = CertReq::from_der(&pem_to_der(&csr.request_pem)?)?;
        let cert = build_certificate(
            &self.key,
            self.issuer_name(),
            request.info.subject,
            request.info.public_key,
            not_before,
            not_after,
            false,
        )?;

        Ok(Certificate {
            csr_id: csr.id,
            not_before,
            not_after,
            pem: cert.to_pem(pkcs8::LineEnding::LF)?,
        })
    }
}

/// Builds and signs a certificate for the given subject and window.
fn build_certificate(
    key: &CaKey,
    issuer: Name,
    subject: Name,
    subject_public_key: SubjectPublicKeyInfoOwned,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    is_ca: bool,
) -> Result<CertificateInner> {
    let algorithm = key.signature_algorithm();

    let basic_constraints = BasicConstraints {
        ca: is_ca,
        path_len_constraint: None,
    };
    let mut key_usage_flags = KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment;
    if is_ca {
        key_usage_flags |= KeyUsages::KeyCertSign;
        key_usage_flags |= KeyUsages::CRLSign;
    }
    let key_usage = KeyUsage(key_usage_flags);

    let extensions = vec![
        Extension {
            extn_id: BasicConstraints::OID,
            critical: true,
            extn_value: OctetString::new(basic_constraints.to_der()?)?,
        },
        Extension {
            extn_id: KeyUsage::OID,
            critical: true,
            extn_value: OctetString::new(key_usage.to_der()?)?,
        },
    ];

    let validity = Validity {
        not_before: Time::UtcTime(UtcTime::from_system_time(not_before.into())?),
        not_after: Time::UtcTime(UtcTime::from_system_time(not_after.into())?),
    };

    let tbs_certificate = TbsCertificateInner {
        version: Version::V3,
        serial_number: random_serial()?,
        signature: algorithm.clone(),
        issuer,
        validity,
        subject,
        subject_public_key_info: subject_public_key,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let signature = key.sign_data(&tbs_certificate.to_der()?)?;

    Ok(CertificateInner {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature)?,
    })
}

/// Builds a PKCS#10 certification request for the given common name,
/// self-signed by a fresh ECDSA P-256 subject key. This is the
/// submission-side counterpart of [`SigningCert::sign`].
pub fn generate_request(common_name: &str) -> Result<String> {
    let subject_key = CaKey::EcdsaP256(P256SigningKey::random(&mut OsRng));
    let info = CertReqInfo {
        version: x509_cert::request::Version::V1,
        subject: common_name_to_x509(common_name)?,
        public_key: subject_key.spki()?,
        attributes: Default::default(),
    };
    let signature = subject_key.sign_data(&info.to_der()?)?;
    let request = CertReq {
        info,
        algorithm: subject_key.signature_algorithm(),
        signature: BitString::from_bytes(&signature)?,
    };
    Ok(request.to_pem(pkcs8::LineEnding::LF)?)
}

fn common_name_to_x509(common_name: &str) -> Result<Name> {
    RdnSequence::from_str(&format!("CN={common_name}"))
        .map_err(|e| CertMillError::Signing(e.to_string()))
}

// Random positive serial, high bit clear, top byte nonzero.
fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7f) | 0x40;
    SerialNumber::new(&bytes).map_err(|e| CertMillError::Signing(e.to_string()))
}

/// Convert a PEM-encoded string to DER-encoded bytes.
fn pem_to_der(pem_str: &str) -> Result<Vec<u8>> {
    let parsed = pem::parse(pem_str)?;
    Ok(parsed.contents().to_vec())
}
