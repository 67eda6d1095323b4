//! Root CA Certificate Generation
//!
//! Self-signed root CA certificates form the trust anchor at the top of the
//! generated hierarchy.
//!
//! # PKI Hierarchy Position
//! ```text
//! Root CA (self-signed) ← This module
//!   └── Intermediate CA (signed by Root)
//!       └── Server Certificate (signed by Intermediate)
//! ```
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Key Usage**: keyCertSign, cRLSign, digitalSignature (critical)
//! - **Basic Constraints**: CA=true with no path length constraint, critical
//! - **Signature Algorithm**: SHA-256 with RSA
//! - **Serial Number**: Random 128-bit number
//! - **Version**: X.509v3

use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::X509;
use tracing::debug;

use crate::errors::ChainError;
use crate::keypair::{generate_rsa_keypair, RSA_KEY_SIZE_DEFAULT};
use crate::{random_serial, SubjectAttributes, X509_VERSION_3};

/// Builder for a self-signed root CA certificate and its RSA key pair.
///
/// The root carries no path length constraint, so it can anchor a hierarchy
/// of any depth; the issued intermediate is what pins the depth to one more
/// tier.
///
/// # Example
/// ```rust,no_run
/// use cert_chain::generate_root_ca::RsaRootCaBuilder;
/// use cert_chain::SubjectAttributes;
/// # use cert_chain::errors::ChainError;
/// # fn example(subject: SubjectAttributes) -> Result<(), ChainError> {
/// let (root_key, root_cert) = RsaRootCaBuilder::new(subject)
///     .validity_days(3650) // 10 years
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaRootCaBuilder {
    subject: SubjectAttributes,
    validity_days: i64,
    key_bits: u32,
}

impl RsaRootCaBuilder {
    /// Create a builder for the given subject with default validity (3650
    /// days) and key size.
    pub fn new(subject: SubjectAttributes) -> Self {
        Self {
            subject,
            validity_days: 3650,
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// Set the validity period in days. Non-positive values are rejected by
    /// `build()` before any key material is generated.
    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Set the RSA modulus size in bits.
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Generate the RSA key pair and build the self-signed certificate.
    ///
    /// # Errors
    /// - [`ChainError::Validity`] if the validity window is not positive
    ///   (checked before key generation)
    /// - [`ChainError::Generation`] if key generation or any certificate
    ///   construction step fails
    pub fn build(self) -> Result<(PKey<Private>, X509), ChainError> {
        if self.validity_days <= 0 {
            return Err(ChainError::Validity {
                days: self.validity_days,
            });
        }

        let private_key = generate_rsa_keypair(self.key_bits)?;

        let mut builder = X509::builder()?;
        builder.set_version(X509_VERSION_3)?;
        builder.set_serial_number(random_serial()?.as_ref())?;

        let name = self.subject.to_x509_name()?;
        builder.set_subject_name(&name)?;
        // Self-signed: issuer is the subject itself
        builder.set_issuer_name(&name)?;

        let not_before = Asn1Time::days_from_now(0)?;
        builder.set_not_before(&not_before)?;
        let not_after = Asn1Time::days_from_now(self.validity_days as u32)?;
        builder.set_not_after(&not_after)?;

        builder.set_pubkey(&private_key)?;

        // CA=true without a path length constraint
        let mut bc = BasicConstraints::new();
        bc.critical().ca();
        builder.append_extension(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.key_cert_sign();
        ku.crl_sign();
        ku.digital_signature();
        builder.append_extension(ku.build()?)?;

        builder.sign(&private_key, MessageDigest::sha256())?;
        let certificate = builder.build();
        debug!(subject = %self.subject.common_name, "built self-signed root CA");

        Ok((private_key, certificate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectAttributes {
        SubjectAttributes {
            common_name: "Test Root CA".to_string(),
            organization: "Example Corp".to_string(),
            organizational_unit: "Infrastructure".to_string(),
            locality: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_root_is_self_signed() {
        let (key, cert) = RsaRootCaBuilder::new(subject())
            .key_bits(2048)
            .build()
            .unwrap();

        // Issuer equals subject and the signature verifies under the
        // certificate's own public key.
        assert_eq!(
            crate::name_text(cert.subject_name()),
            crate::name_text(cert.issuer_name())
        );
        assert!(cert.verify(&key).unwrap());
    }

    #[test]
    fn test_root_extensions() {
        let (_, cert) = RsaRootCaBuilder::new(subject())
            .key_bits(2048)
            .build()
            .unwrap();
        let text = String::from_utf8(cert.to_text().unwrap()).unwrap();
        assert!(text.contains("CA:TRUE"));
        assert!(!text.contains("pathlen"));
        assert!(text.contains("Certificate Sign"));
        assert!(text.contains("CRL Sign"));
    }

    #[test]
    fn test_non_positive_validity_rejected() {
        for days in [0, -1] {
            let result = RsaRootCaBuilder::new(subject())
                .key_bits(2048)
                .validity_days(days)
                .build();
            assert!(matches!(result, Err(ChainError::Validity { .. })));
        }
    }
}
