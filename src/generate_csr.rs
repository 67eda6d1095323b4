//! Certificate Signing Request Generation
//!
//! Produces a PKCS#10 request for the server key pair carrying the same
//! extension profile the issued server certificate gets, so the request can
//! be replayed against any external CA and yield an equivalent certificate.

use openssl::hash::MessageDigest;
use openssl::pkey::{PKeyRef, Private};
use openssl::stack::Stack;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Extension, X509Req};
use tracing::debug;

use crate::errors::ChainError;
use crate::generate_server_tls::san_entries;
use crate::SubjectAttributes;

/// Builder for a PKCS#10 CSR matching the server certificate profile.
pub struct CsrBuilder {
    subject: SubjectAttributes,
}

impl CsrBuilder {
    /// Create a builder for the given subject. The common name must be the
    /// server FQDN; SAN entries are derived from it.
    pub fn new(subject: SubjectAttributes) -> Self {
        Self { subject }
    }

    /// Build and sign the request with the server's existing key pair. The
    /// key is borrowed, not generated here; the server tier owns it.
    pub fn build(self, key_pair: &PKeyRef<Private>) -> Result<X509Req, ChainError> {
        let mut builder = X509Req::builder()?;
        builder.set_version(0)?;
        let subject_name = self.subject.to_x509_name()?;
        builder.set_subject_name(&subject_name)?;
        builder.set_pubkey(key_pair)?;

        let mut extensions: Stack<X509Extension> = Stack::new()?;

        let mut bc = BasicConstraints::new();
        bc.critical();
        extensions.push(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.digital_signature();
        ku.key_encipherment();
        ku.data_encipherment();
        extensions.push(ku.build()?)?;

        let mut eku = ExtendedKeyUsage::new();
        eku.server_auth();
        eku.client_auth();
        extensions.push(eku.build()?)?;

        let mut san = SubjectAlternativeName::new();
        for dns in san_entries(&self.subject.common_name) {
            san.dns(&dns);
        }
        extensions.push(san.build(&builder.x509v3_context(None))?)?;

        builder.add_extensions(&extensions)?;
        builder.sign(key_pair, MessageDigest::sha256())?;
        debug!(subject = %self.subject.common_name, "built CSR");

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::generate_rsa_keypair;

    fn subject() -> SubjectAttributes {
        SubjectAttributes {
            common_name: "api.internal.example.com".to_string(),
            organization: "Example Corp".to_string(),
            organizational_unit: "Infrastructure".to_string(),
            locality: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_csr_signed_by_subject_key() {
        let key = generate_rsa_keypair(2048).unwrap();
        let csr = CsrBuilder::new(subject()).build(&key).unwrap();
        assert!(csr.verify(&key).unwrap());
        assert!(crate::name_text(csr.subject_name()).contains("CN=api.internal.example.com"));
    }

    #[test]
    fn test_csr_carries_leaf_profile() {
        let key = generate_rsa_keypair(2048).unwrap();
        let csr = CsrBuilder::new(subject()).build(&key).unwrap();
        let pem = String::from_utf8(csr.to_pem().unwrap()).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));

        // Round-trip and confirm the requested extensions survive
        let parsed = X509Req::from_pem(pem.as_bytes()).unwrap();
        let exts = parsed.extensions().unwrap();
        assert!(!exts.is_empty());
    }
}
