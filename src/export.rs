//! Format Export
//!
//! Serializes chain members into PEM, DER and PKCS#12 and owns the per-run
//! output directory layout. Every write lands inside the run directory;
//! nothing outside it is touched. Each export is independent: a failure is
//! reported to the caller, which records it and moves on to the next format.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKeyRef, Private};
use openssl::stack::Stack;
use openssl::x509::{X509Ref, X509Req, X509};
use tracing::debug;

use crate::errors::ChainError;

/// Replace characters unsuitable for a directory name. Dots become
/// underscores, a wildcard label becomes `wildcard`.
pub fn sanitize_fqdn(fqdn: &str) -> String {
    fqdn.replace('*', "wildcard").replace('.', "_")
}

/// The per-run output directory: `<fqdn_safe>_<timestamp>/` plus its
/// `formats/` subdirectory. All artifact paths are derived here so exporters
/// and the summary agree on the layout.
pub struct OutputLayout {
    pub fqdn: String,
    pub run_dir: PathBuf,
    pub formats_dir: PathBuf,
}

impl OutputLayout {
    /// Create the run directory under `base`, named from the sanitized FQDN
    /// and a UTC timestamp.
    pub fn create(base: &Path, fqdn: &str) -> Result<Self, ChainError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let run_dir = base.join(format!("{}_{}", sanitize_fqdn(fqdn), stamp));
        let formats_dir = run_dir.join("formats");
        fs::create_dir_all(&formats_dir).map_err(|e| ChainError::Export {
            format: "directory",
            path: formats_dir.clone(),
            reason: e.to_string(),
        })?;
        debug!(run_dir = %run_dir.display(), "created output directory");
        Ok(Self {
            fqdn: fqdn.to_string(),
            run_dir,
            formats_dir,
        })
    }

    pub fn root_ca_pem(&self) -> PathBuf {
        self.run_dir.join("root_ca.pem")
    }
    pub fn root_ca_key_pem(&self) -> PathBuf {
        self.run_dir.join("root_ca_key.pem")
    }
    pub fn intermediate_ca_pem(&self) -> PathBuf {
        self.run_dir.join("intermediate_ca.pem")
    }
    pub fn intermediate_ca_key_pem(&self) -> PathBuf {
        self.run_dir.join("intermediate_ca_key.pem")
    }
    pub fn leaf_pem(&self) -> PathBuf {
        self.run_dir.join(format!("{}.pem", self.fqdn))
    }
    pub fn leaf_key_pem(&self) -> PathBuf {
        self.run_dir.join(format!("{}_key.pem", self.fqdn))
    }
    pub fn leaf_csr(&self) -> PathBuf {
        self.run_dir.join(format!("{}.csr", self.fqdn))
    }
    pub fn chain_pem(&self) -> PathBuf {
        self.run_dir.join(format!("{}_chain.pem", self.fqdn))
    }
    pub fn pkcs12(&self) -> PathBuf {
        self.run_dir.join(format!("{}.p12", self.fqdn))
    }
    pub fn truststore_pem(&self) -> PathBuf {
        self.run_dir.join("truststore.pem")
    }
    pub fn summary(&self) -> PathBuf {
        self.run_dir.join("CERTIFICATE_SUMMARY.md")
    }
    pub fn leaf_der(&self) -> PathBuf {
        self.formats_dir.join(format!("{}.der", self.fqdn))
    }
    pub fn leaf_key_der(&self) -> PathBuf {
        self.formats_dir.join(format!("{}_key.der", self.fqdn))
    }
    pub fn ca_bundle_pem(&self) -> PathBuf {
        self.formats_dir.join("ca_bundle.pem")
    }
    pub fn request_config(&self) -> PathBuf {
        self.formats_dir.join(format!("{}_req.cnf", self.fqdn))
    }
}

fn write_artifact(
    format: &'static str,
    path: &Path,
    bytes: Result<Vec<u8>, openssl::error::ErrorStack>,
) -> Result<(), ChainError> {
    let export_err = |reason: String| ChainError::Export {
        format,
        path: path.to_path_buf(),
        reason,
    };
    let bytes = bytes.map_err(|e| export_err(e.to_string()))?;
    fs::write(path, bytes).map_err(|e| export_err(e.to_string()))?;
    debug!(format, path = %path.display(), "wrote artifact");
    Ok(())
}

/// Write pre-serialized bytes (bundles, config artifacts) into the layout.
pub fn write_bytes(format: &'static str, bytes: &[u8], path: &Path) -> Result<(), ChainError> {
    fs::write(path, bytes).map_err(|e| ChainError::Export {
        format,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(format, path = %path.display(), "wrote artifact");
    Ok(())
}

/// Write a certificate as PEM.
pub fn write_cert_pem(cert: &X509Ref, path: &Path) -> Result<(), ChainError> {
    write_artifact("PEM", path, cert.to_pem())
}

/// Write a private key as PKCS#8 PEM.
pub fn write_key_pem(key: &PKeyRef<Private>, path: &Path) -> Result<(), ChainError> {
    write_artifact("PEM", path, key.private_key_to_pem_pkcs8())
}

/// Write a certificate as DER.
pub fn write_cert_der(cert: &X509Ref, path: &Path) -> Result<(), ChainError> {
    write_artifact("DER", path, cert.to_der())
}

/// Write a private key as PKCS#8 DER.
pub fn write_key_der(key: &PKeyRef<Private>, path: &Path) -> Result<(), ChainError> {
    write_artifact("DER", path, key.private_key_to_pkcs8())
}

/// Write a CSR as PEM.
pub fn write_csr_pem(csr: &X509Req, path: &Path) -> Result<(), ChainError> {
    write_artifact("PEM", path, csr.to_pem())
}

/// Serialize a PKCS#12 container bundling the leaf key and certificate with
/// the CA certificates (intermediate first, then root) as chain entries.
pub fn pkcs12_bytes(
    leaf_key: &PKeyRef<Private>,
    leaf_cert: &X509Ref,
    ca_certs: &[&X509],
    friendly_name: &str,
    password: &str,
) -> Result<Vec<u8>, ChainError> {
    let build = || -> Result<Vec<u8>, openssl::error::ErrorStack> {
        let mut ca_stack: Stack<X509> = Stack::new()?;
        for cert in ca_certs {
            ca_stack.push((*cert).clone())?;
        }
        let mut builder = Pkcs12::builder();
        builder.name(friendly_name);
        builder.pkey(leaf_key);
        builder.cert(leaf_cert);
        builder.ca(ca_stack);
        let container = builder.build2(password)?;
        container.to_der()
    };
    build().map_err(|e| ChainError::Export {
        format: "PKCS#12",
        path: PathBuf::from(friendly_name),
        reason: e.to_string(),
    })
}

/// Build and write the PKCS#12 container to `path`.
pub fn write_pkcs12(
    leaf_key: &PKeyRef<Private>,
    leaf_cert: &X509Ref,
    ca_certs: &[&X509],
    friendly_name: &str,
    password: &str,
    path: &Path,
) -> Result<(), ChainError> {
    let bytes = pkcs12_bytes(leaf_key, leaf_cert, ca_certs, friendly_name, password)?;
    fs::write(path, bytes).map_err(|e| ChainError::Export {
        format: "PKCS#12",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(path = %path.display(), "wrote PKCS#12 container");
    Ok(())
}
