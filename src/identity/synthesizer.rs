//! Self-signed certificate synthesis using rcgen.

use std::sync::Arc;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::CertifiedKey;
use time::{Duration, OffsetDateTime};
use tracing::info;

use super::IdentityError;

/// Backdating applied to `not_before` to tolerate client clock skew.
pub const CLOCK_SKEW: Duration = Duration::minutes(5);

/// Lifetime of a synthesized certificate.
pub const VALIDITY: Duration = Duration::days(180);

/// A freshly generated certificate and key, ready for rustls.
#[derive(Debug, Clone)]
pub struct SelfSignedIdentity {
    certified_key: Arc<CertifiedKey>,
    cert_pem: String,
    common_name: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl SelfSignedIdentity {
    /// The certificate chain (a single self-signed certificate) and signing key.
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified_key)
    }

    /// The certificate in PEM format, for clients that want to pin it.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }
}

/// Generates a new key pair and a self-signed certificate for `common_name`.
///
/// The certificate is marked as a CA, carries digital signature, key
/// encipherment and certificate signing key usages, and is valid for server
/// authentication from five minutes ago until 180 days from now.
///
/// Keys are ECDSA P-256, which matches the strength of 3072-bit RSA.
pub fn synthesize(common_name: &str) -> Result<SelfSignedIdentity, IdentityError> {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, common_name);

    let mut params = CertificateParams::default();
    params.distinguished_name = dn;
    params.subject_alt_names = vec![SanType::DnsName(
        common_name
            .try_into()
            .map_err(|_| IdentityError::InvalidDnsName(common_name.to_string()))?,
    )];
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let now = OffsetDateTime::now_utc();
    params.not_before = now - CLOCK_SKEW;
    params.not_after = now + VALIDITY;

    let key_pair = KeyPair::generate()?;
    let cert = params.clone().self_signed(&key_pair)?;

    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)
        .map_err(IdentityError::SigningKey)?;

    info!(common_name, not_after = %params.not_after, "generated self-signed certificate");

    Ok(SelfSignedIdentity {
        certified_key: Arc::new(CertifiedKey::new(vec![cert_der], signing_key)),
        cert_pem: cert.pem(),
        common_name: common_name.to_string(),
        not_before: params.not_before,
        not_after: params.not_after,
    })
}
