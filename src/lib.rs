//! cert-chain - Three-Tier TLS Certificate Chain Generator
//!
//! Generates a complete three-tier trust chain for a server hostname and
//! exports it in every format a deployment typically needs: PEM, DER,
//! PKCS#12, and Java-keystore containers, plus chain/CA bundles and a
//! reproducibility config.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed, no path length limit)
//!   └── Intermediate CA (signed by Root, pathlen=0)
//!       └── Server Certificate (signed by Intermediate, CA=false)
//! ```
//!
//! Each tier owns its own freshly generated RSA key pair. The run is a
//! one-shot batch pipeline: assemble the chain, verify its linkage, write
//! every export artifact into a per-run output directory, and finish with a
//! summary document listing what was produced.
//!
//! # Quick Start
//!
//! ```bash
//! cargo build --release
//! ./target/release/cert-chain api.internal.example.com --output-dir ./certs
//! ```
//!
//! As a library:
//!
//! ```no_run
//! use cert_chain::configs::AppConfig;
//! use cert_chain::pipeline::{self, GenerateOptions};
//!
//! # fn main() -> Result<(), cert_chain::errors::ChainError> {
//! let opts = GenerateOptions {
//!     fqdn: "api.internal.example.com".to_string(),
//!     output_dir: "./certs".into(),
//!     config: AppConfig::default(),
//! };
//! let report = pipeline::run(&opts)?;
//! println!("wrote {} artifacts", report.manifest.records().len());
//! # Ok(())
//! # }
//! ```
//!
//! # Module Overview
//!
//! - [`keypair`]: RSA key pair generation
//! - [`generate_root_ca`]: self-signed Root CA certificates
//! - [`generate_intermediate_ca`]: Intermediate CA certificates (signed by Root)
//! - [`generate_server_tls`]: end-entity TLS server certificates
//! - [`generate_csr`]: PKCS#10 certificate signing requests
//! - [`chain`]: three-tier assembly and linkage verification
//! - [`export`]: PEM/DER/PKCS#12 serialization and the output directory layout
//! - [`keystore`]: swappable Java-keystore export backends
//! - [`bundle`]: chain/CA-bundle concatenation and the request-config artifact
//! - [`manifest`]: per-artifact result ledger and the summary document
//! - [`pipeline`]: single-run orchestration used by the CLI
//!
//! # Failure Semantics
//!
//! Tier construction (Root, Intermediate, Leaf) is fatal on failure since
//! everything downstream depends on it. Export formats fail independently:
//! the pipeline keeps going and the final summary records the outcome of
//! every artifact, including which keystore backend ran and whether it
//! degraded.

pub mod bundle;
pub mod chain;
pub mod configs;
pub mod errors;
pub mod export;
pub mod generate_csr;
pub mod generate_intermediate_ca;
pub mod generate_root_ca;
pub mod generate_server_tls;
pub mod keypair;
pub mod keystore;
pub mod manifest;
pub mod pipeline;

use openssl::asn1::Asn1Integer;
use openssl::bn::{BigNum, MsbOption};
use openssl::nid::Nid;
use openssl::x509::{X509Name, X509NameRef};

use crate::errors::ChainError;

pub(crate) const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2

/// Distinguished-name attributes shared by every certificate tier.
#[derive(Debug, Clone)]
pub struct SubjectAttributes {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub state: String,
    pub country: String,
}

impl SubjectAttributes {
    /// Build the X.509 name for these attributes, in the conventional
    /// CN/O/OU/L/ST/C order.
    pub fn to_x509_name(&self) -> Result<X509Name, ChainError> {
        let mut name_builder = X509Name::builder()?;
        name_builder.append_entry_by_nid(Nid::COMMONNAME, &self.common_name)?;
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, &self.organization)?;
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, &self.organizational_unit)?;
        name_builder.append_entry_by_nid(Nid::LOCALITYNAME, &self.locality)?;
        name_builder.append_entry_by_nid(Nid::STATEORPROVINCENAME, &self.state)?;
        name_builder.append_entry_by_nid(Nid::COUNTRYNAME, &self.country)?;
        Ok(name_builder.build())
    }
}

/// Render an X.509 name as `CN=.., O=.., ..` for logs and error messages.
pub fn name_text(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Random 128-bit certificate serial number.
///
/// Collision-resistant within a run; serials are not tracked across runs.
pub(crate) fn random_serial() -> Result<Asn1Integer, ChainError> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    Ok(serial.to_asn1_integer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> SubjectAttributes {
        SubjectAttributes {
            common_name: "Unit Test CA".to_string(),
            organization: "Example Corp".to_string(),
            organizational_unit: "Infrastructure".to_string(),
            locality: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_name_round_trip() {
        let name = attrs().to_x509_name().unwrap();
        let text = name_text(&name);
        assert!(text.contains("CN=Unit Test CA"));
        assert!(text.contains("O=Example Corp"));
        assert!(text.contains("C=US"));
    }

    #[test]
    fn test_serials_differ() {
        let a = random_serial().unwrap().to_bn().unwrap();
        let b = random_serial().unwrap().to_bn().unwrap();
        assert_ne!(a, b);
    }
}
