//! Three-Tier Chain Assembly
//!
//! Drives the Root → Intermediate → Server issuance sequence and verifies
//! the linkage cryptographically before the chain is handed to exporters.
//! Issuance is inherently sequential: each tier's certificate is signed with
//! the previous tier's key, so there is nothing to parallelize.

use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Ref, X509};
use tracing::debug;

use crate::errors::ChainError;
use crate::generate_intermediate_ca::RsaIntermediateCaBuilder;
use crate::generate_root_ca::RsaRootCaBuilder;
use crate::generate_server_tls::RsaServerCertBuilder;
use crate::keypair::RSA_KEY_SIZE_DEFAULT;
use crate::{name_text, SubjectAttributes};

/// A tier's key pair and issued certificate. The key is generated once and
/// owned by its tier for the lifetime of the run.
pub struct CertifiedKeyPair {
    pub key: PKey<Private>,
    pub cert: X509,
}

/// The assembled trust chain: Root, Intermediate, Leaf.
pub struct CertificateChain {
    pub root: CertifiedKeyPair,
    pub intermediate: CertifiedKeyPair,
    pub leaf: CertifiedKeyPair,
}

impl CertificateChain {
    /// Verify every signature in the chain: root under its own key,
    /// intermediate under the root, leaf under the intermediate.
    ///
    /// # Errors
    /// [`ChainError::ChainIntegrity`] naming the child and parent whose
    /// linkage failed.
    pub fn verify_linkage(&self) -> Result<(), ChainError> {
        verify_signed_by(&self.root.cert, &self.root.cert)?;
        verify_signed_by(&self.intermediate.cert, &self.root.cert)?;
        verify_signed_by(&self.leaf.cert, &self.intermediate.cert)?;
        debug!("chain linkage verified: leaf -> intermediate -> root");
        Ok(())
    }
}

/// Check that `child`'s signature verifies under `parent`'s public key.
pub fn verify_signed_by(child: &X509Ref, parent: &X509Ref) -> Result<(), ChainError> {
    let integrity_error = || ChainError::ChainIntegrity {
        child: name_text(child.subject_name()),
        parent: name_text(parent.subject_name()),
    };
    let parent_key = parent.public_key().map_err(|_| integrity_error())?;
    match child.verify(&parent_key) {
        Ok(true) => Ok(()),
        // false: signature mismatch; Err: malformed signature material
        Ok(false) | Err(_) => Err(integrity_error()),
    }
}

/// Orchestrates Root → Intermediate → Leaf issuance.
pub struct ChainAssembler {
    root_subject: SubjectAttributes,
    intermediate_subject: SubjectAttributes,
    leaf_subject: SubjectAttributes,
    root_days: i64,
    intermediate_days: i64,
    leaf_days: i64,
    key_bits: u32,
}

impl ChainAssembler {
    /// Create an assembler with default validity windows (root 3650 days,
    /// intermediate 1825, leaf 365). The leaf subject's common name must be
    /// the server FQDN.
    pub fn new(
        root_subject: SubjectAttributes,
        intermediate_subject: SubjectAttributes,
        leaf_subject: SubjectAttributes,
    ) -> Self {
        Self {
            root_subject,
            intermediate_subject,
            leaf_subject,
            root_days: 3650,
            intermediate_days: 1825,
            leaf_days: 365,
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// Override the per-tier validity windows in days.
    pub fn validity_days(mut self, root: i64, intermediate: i64, leaf: i64) -> Self {
        self.root_days = root;
        self.intermediate_days = intermediate;
        self.leaf_days = leaf;
        self
    }

    /// Set the RSA modulus size used for all three tiers.
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Issue all three tiers and verify the chain's linkage.
    ///
    /// All validity windows are validated up front so an invalid request
    /// fails before any key material exists.
    ///
    /// # Errors
    /// - [`ChainError::Validity`] for a non-positive validity window
    /// - [`ChainError::Generation`] for key/certificate construction failure
    /// - [`ChainError::ChainIntegrity`] if a child signature does not verify
    ///   under its parent key
    pub fn assemble(self) -> Result<CertificateChain, ChainError> {
        for days in [self.root_days, self.intermediate_days, self.leaf_days] {
            if days <= 0 {
                return Err(ChainError::Validity { days });
            }
        }

        let (root_key, root_cert) = RsaRootCaBuilder::new(self.root_subject)
            .validity_days(self.root_days)
            .key_bits(self.key_bits)
            .build()?;
        debug!("root CA issued");

        let (int_key, int_cert) =
            RsaIntermediateCaBuilder::new(&root_key, &root_cert, self.intermediate_subject)
                .validity_days(self.intermediate_days)
                .key_bits(self.key_bits)
                .build()?;
        debug!("intermediate CA issued");

        let (leaf_key, leaf_cert) =
            RsaServerCertBuilder::new(&int_key, &int_cert, self.leaf_subject)
                .validity_days(self.leaf_days)
                .key_bits(self.key_bits)
                .build()?;
        debug!("server certificate issued");

        let chain = CertificateChain {
            root: CertifiedKeyPair {
                key: root_key,
                cert: root_cert,
            },
            intermediate: CertifiedKeyPair {
                key: int_key,
                cert: int_cert,
            },
            leaf: CertifiedKeyPair {
                key: leaf_key,
                cert: leaf_cert,
            },
        };
        chain.verify_linkage()?;
        Ok(chain)
    }
}

/// Test-only fixture: a full 2048-bit chain for the given hostname.
#[cfg(test)]
pub(crate) fn test_chain(fqdn: &str) -> CertificateChain {
    let subject = |cn: &str| SubjectAttributes {
        common_name: cn.to_string(),
        organization: "Example Corp".to_string(),
        organizational_unit: "Infrastructure".to_string(),
        locality: "Springfield".to_string(),
        state: "IL".to_string(),
        country: "US".to_string(),
    };
    ChainAssembler::new(
        subject("Test Root CA"),
        subject("Test Issuing CA"),
        subject(fqdn),
    )
    .key_bits(2048)
    .assemble()
    .unwrap()
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
    fn test_issuer_linkage() {
        let chain = test_chain("api.internal.example.com");
        assert_eq!(
            name_text(chain.leaf.cert.issuer_name()),
            name_text(chain.intermediate.cert.subject_name())
        );
        assert_eq!(
            name_text(chain.intermediate.cert.issuer_name()),
            name_text(chain.root.cert.subject_name())
        );
    }

    #[test]
    fn test_keys_are_distinct_per_tier() {
        let chain = test_chain("www.example.com");
        let root_pub = chain.root.key.public_key_to_der().unwrap();
        let int_pub = chain.intermediate.key.public_key_to_der().unwrap();
        let leaf_pub = chain.leaf.key.public_key_to_der().unwrap();
        assert_ne!(root_pub, int_pub);
        assert_ne!(int_pub, leaf_pub);
        assert_ne!(root_pub, leaf_pub);
    }

    #[test]
    fn test_unrelated_parent_fails_integrity() {
        let chain = test_chain("www.example.com");
        let (_, other_root) = RsaRootCaBuilder::new(subject("Other Root CA"))
            .key_bits(2048)
            .build()
            .unwrap();
        let result = verify_signed_by(&chain.leaf.cert, &other_root);
        assert!(matches!(result, Err(ChainError::ChainIntegrity { .. })));
    }

    #[test]
    fn test_invalid_leaf_days_fails_before_keygen() {
        let result = ChainAssembler::new(
            subject("Test Root CA"),
            subject("Test Issuing CA"),
            subject("www.example.com"),
        )
        .validity_days(3650, 1825, 0)
        .assemble();
        assert!(matches!(result, Err(ChainError::Validity { days: 0 })));
    }
}
