//! Intermediate CA Certificate Generation
//!
//! Intermediate CA certificates are signed by the root CA and are the tier
//! that actually issues server certificates, so the root key can stay cold
//! after a run.
//!
//! # PKI Hierarchy Position
//! ```text
//! Root CA (self-signed)
//!   └── Intermediate CA (signed by Root) ← This module
//!       └── Server Certificate (signed by Intermediate)
//! ```
//!
//! # Certificate Properties
//! - **Signed by**: Root CA
//! - **Key Usage**: keyCertSign, cRLSign, digitalSignature (critical)
//! - **Basic Constraints**: CA=true, pathlen=0, critical
//! - **Signature Algorithm**: SHA-256 with RSA
//!
//! The `pathlen=0` constraint prevents the intermediate from issuing further
//! CA certificates; it may only sign end-entity certificates.

use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::X509;
use tracing::debug;

use crate::errors::ChainError;
use crate::keypair::{generate_rsa_keypair, RSA_KEY_SIZE_DEFAULT};
use crate::{random_serial, SubjectAttributes, X509_VERSION_3};

const INTERMEDIATE_CA_PATH_LENGTH: u32 = 0;

/// Builder for an intermediate CA certificate signed by the root.
///
/// # Example
/// ```rust,no_run
/// use cert_chain::generate_intermediate_ca::RsaIntermediateCaBuilder;
/// # use cert_chain::SubjectAttributes;
/// # use cert_chain::errors::ChainError;
/// # use openssl::pkey::{PKey, Private};
/// # use openssl::x509::X509;
/// # fn example(root_key: &PKey<Private>, root_cert: &X509,
/// #            subject: SubjectAttributes) -> Result<(), ChainError> {
/// let (int_key, int_cert) = RsaIntermediateCaBuilder::new(root_key, root_cert, subject)
///     .validity_days(1825) // 5 years
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaIntermediateCaBuilder<'a> {
    signing_key: &'a PKey<Private>,
    signing_cert: &'a X509,
    subject: SubjectAttributes,
    validity_days: i64,
    key_bits: u32,
}

impl<'a> RsaIntermediateCaBuilder<'a> {
    /// Create a builder signing with the root CA's key, issuing under the
    /// root certificate's subject name.
    pub fn new(root_key: &'a PKey<Private>, root_cert: &'a X509, subject: SubjectAttributes) -> Self {
        Self {
            signing_key: root_key,
            signing_cert: root_cert,
            subject,
            validity_days: 1825,
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// Set the validity period in days. Should be shorter than the root's
    /// and longer than the leaf's.
    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Set the RSA modulus size in bits.
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Generate the intermediate's key pair and build the root-signed
    /// certificate.
    ///
    /// # Errors
    /// - [`ChainError::Validity`] if the validity window is not positive
    ///   (checked before key generation)
    /// - [`ChainError::Generation`] on key generation or certificate
    ///   construction failure
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

        let subject_name = self.subject.to_x509_name()?;
        builder.set_subject_name(&subject_name)?;
        builder.set_issuer_name(self.signing_cert.subject_name())?;

        let not_before = Asn1Time::days_from_now(0)?;
        builder.set_not_before(&not_before)?;
        let not_after = Asn1Time::days_from_now(self.validity_days as u32)?;
        builder.set_not_after(&not_after)?;

        builder.set_pubkey(&private_key)?;

        // pathlen=0: may only sign end-entity certificates
        let mut bc = BasicConstraints::new();
        bc.critical().ca();
        bc.pathlen(INTERMEDIATE_CA_PATH_LENGTH);
        builder.append_extension(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.key_cert_sign();
        ku.crl_sign();
        ku.digital_signature();
        builder.append_extension(ku.build()?)?;

        builder.sign(self.signing_key, MessageDigest::sha256())?;
        let certificate = builder.build();
        debug!(subject = %self.subject.common_name, "built intermediate CA signed by root");

        Ok((private_key, certificate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_root_ca::RsaRootCaBuilder;

    fn subject(cn: &str) -> SubjectAttributes {
        SubjectAttributes {
            common_name: cn.to_string(),
            organization: "Example Corp".to_string(),
            organizational_unit: "Infrastructure".to_string(),
            locality: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_intermediate_signed_by_root() {
        let (root_key, root_cert) = RsaRootCaBuilder::new(subject("Test Root CA"))
            .key_bits(2048)
            .build()
            .unwrap();
        let (_, int_cert) =
            RsaIntermediateCaBuilder::new(&root_key, &root_cert, subject("Test Issuing CA"))
                .key_bits(2048)
                .build()
                .unwrap();

        assert_eq!(
            crate::name_text(int_cert.issuer_name()),
            crate::name_text(root_cert.subject_name())
        );
        assert!(int_cert.verify(&root_key).unwrap());
    }

    #[test]
    fn test_intermediate_path_length_zero() {
        let (root_key, root_cert) = RsaRootCaBuilder::new(subject("Test Root CA"))
            .key_bits(2048)
            .build()
            .unwrap();
        let (_, int_cert) =
            RsaIntermediateCaBuilder::new(&root_key, &root_cert, subject("Test Issuing CA"))
                .key_bits(2048)
                .build()
                .unwrap();

        let text = String::from_utf8(int_cert.to_text().unwrap()).unwrap();
        assert!(text.contains("CA:TRUE"));
        assert!(text.contains("pathlen:0"));
    }

    #[test]
    fn test_validity_checked_before_keygen() {
        let (root_key, root_cert) = RsaRootCaBuilder::new(subject("Test Root CA"))
            .key_bits(2048)
            .build()
            .unwrap();
        let result =
            RsaIntermediateCaBuilder::new(&root_key, &root_cert, subject("Test Issuing CA"))
                .validity_days(-30)
                .build();
        assert!(matches!(result, Err(ChainError::Validity { days: -30 })));
    }
}
