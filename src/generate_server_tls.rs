//! TLS Server Certificate Generation
//!
//! End-entity server certificates signed by the intermediate CA, completing
//! the chain: Root CA → Intermediate CA → **Server Certificate**.
//!
//! # X.509 Extensions
//! - **Basic Constraints**: CA=false, critical
//! - **Key Usage**: digitalSignature, keyEncipherment, dataEncipherment (critical)
//! - **Extended Key Usage**: serverAuth, clientAuth
//! - **Subject Alternative Name**: the FQDN itself plus a wildcard covering
//!   its parent domain, e.g. `api.internal.example.com` and
//!   `*.internal.example.com`. Single-label hosts get only themselves.

use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::X509;
use tracing::debug;

use crate::errors::ChainError;
use crate::keypair::{generate_rsa_keypair, RSA_KEY_SIZE_DEFAULT};
use crate::{random_serial, SubjectAttributes, X509_VERSION_3};

/// The SAN entries issued for a hostname: the name itself, then a wildcard
/// for its parent domain when there is one.
pub fn san_entries(fqdn: &str) -> Vec<String> {
    let mut entries = vec![fqdn.to_string()];
    if let Some((_, parent)) = fqdn.split_once('.') {
        entries.push(format!("*.{}", parent));
    }
    entries
}

/// Builder for a TLS server certificate signed by the intermediate CA.
///
/// The subject common name is the server FQDN; the remaining distinguished
/// name attributes are shared with the CA tiers.
///
/// # Example
/// ```rust,no_run
/// use cert_chain::generate_server_tls::RsaServerCertBuilder;
/// # use cert_chain::SubjectAttributes;
/// # use cert_chain::errors::ChainError;
/// # use openssl::pkey::{PKey, Private};
/// # use openssl::x509::X509;
/// # fn example(int_key: &PKey<Private>, int_cert: &X509,
/// #            subject: SubjectAttributes) -> Result<(), ChainError> {
/// let (server_key, server_cert) =
///     RsaServerCertBuilder::new(int_key, int_cert, subject)
///         .validity_days(365)
///         .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaServerCertBuilder<'a> {
    signing_key: &'a PKey<Private>,
    signing_cert: &'a X509,
    subject: SubjectAttributes,
    validity_days: i64,
    key_bits: u32,
}

impl<'a> RsaServerCertBuilder<'a> {
    /// Create a builder signing with the intermediate CA's key. The
    /// subject's common name must be the server FQDN.
    pub fn new(
        intermediate_key: &'a PKey<Private>,
        intermediate_cert: &'a X509,
        subject: SubjectAttributes,
    ) -> Self {
        Self {
            signing_key: intermediate_key,
            signing_cert: intermediate_cert,
            subject,
            validity_days: 365,
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// Set the validity period in days.
    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Set the RSA modulus size in bits.
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Generate the server key pair and build the intermediate-signed
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

        // End-entity: CA=false
        let mut bc = BasicConstraints::new();
        bc.critical();
        builder.append_extension(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.digital_signature();
        ku.key_encipherment();
        ku.data_encipherment();
        builder.append_extension(ku.build()?)?;

        let mut eku = ExtendedKeyUsage::new();
        eku.server_auth();
        eku.client_auth();
        builder.append_extension(eku.build()?)?;

        let entries = san_entries(&self.subject.common_name);
        let mut san = SubjectAlternativeName::new();
        for dns in &entries {
            san.dns(dns);
        }
        let san_ext = san.build(&builder.x509v3_context(Some(self.signing_cert), None))?;
        builder.append_extension(san_ext)?;

        builder.sign(self.signing_key, MessageDigest::sha256())?;
        let certificate = builder.build();
        debug!(
            fqdn = %self.subject.common_name,
            san = ?entries,
            "built server certificate signed by intermediate CA"
        );

        Ok((private_key, certificate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_intermediate_ca::RsaIntermediateCaBuilder;
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

    fn issue(fqdn: &str) -> X509 {
        let (root_key, root_cert) = RsaRootCaBuilder::new(subject("Test Root CA"))
            .key_bits(2048)
            .build()
            .unwrap();
        let (int_key, int_cert) =
            RsaIntermediateCaBuilder::new(&root_key, &root_cert, subject("Test Issuing CA"))
                .key_bits(2048)
                .build()
                .unwrap();
        let (_, cert) = RsaServerCertBuilder::new(&int_key, &int_cert, subject(fqdn))
            .key_bits(2048)
            .build()
            .unwrap();
        cert
    }

    #[test]
    fn test_san_entries_with_parent_domain() {
        assert_eq!(
            san_entries("api.internal.example.com"),
            vec!["api.internal.example.com", "*.internal.example.com"]
        );
    }

    #[test]
    fn test_san_entries_single_label() {
        assert_eq!(san_entries("localhost"), vec!["localhost"]);
    }

    #[test]
    fn test_leaf_san_matches_fqdn_and_wildcard() {
        let cert = issue("api.internal.example.com");
        let names: Vec<String> = cert
            .subject_alt_names()
            .unwrap()
            .iter()
            .filter_map(|n| n.dnsname().map(str::to_string))
            .collect();
        assert_eq!(
            names,
            vec!["api.internal.example.com", "*.internal.example.com"]
        );
    }

    #[test]
    fn test_leaf_is_end_entity() {
        let cert = issue("www.example.com");
        let text = String::from_utf8(cert.to_text().unwrap()).unwrap();
        assert!(text.contains("CA:FALSE"));
        assert!(text.contains("TLS Web Server Authentication"));
        assert!(text.contains("TLS Web Client Authentication"));
        assert!(text.contains("Data Encipherment"));
    }
}
