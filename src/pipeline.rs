//! Single-Run Pipeline
//!
//! The orchestration the CLI drives: assemble the three-tier chain, verify
//! it, write every export artifact, and finish with the summary document.
//!
//! Failure policy: chain assembly is fatal (everything downstream depends on
//! it); each export artifact fails independently and is recorded in the
//! manifest while the remaining formats are still attempted.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::bundle;
use crate::chain::{CertificateChain, ChainAssembler};
use crate::configs::AppConfig;
use crate::errors::ChainError;
use crate::export::{self, OutputLayout};
use crate::generate_csr::CsrBuilder;
use crate::generate_server_tls::san_entries;
use crate::keystore;
use crate::manifest::Manifest;
use crate::SubjectAttributes;

/// Inputs of one generation run.
pub struct GenerateOptions {
    /// Hostname the leaf certificate is issued for.
    pub fqdn: String,
    /// Base directory the per-run output directory is created under.
    pub output_dir: PathBuf,
    pub config: AppConfig,
}

/// What a completed run produced.
pub struct RunReport {
    pub layout: OutputLayout,
    pub manifest: Manifest,
}

fn subject_for(config: &AppConfig, common_name: &str) -> SubjectAttributes {
    SubjectAttributes {
        common_name: common_name.to_string(),
        organization: config.subject.organization.clone(),
        organizational_unit: config.subject.organizational_unit.clone(),
        locality: config.subject.locality.clone(),
        state: config.subject.state.clone(),
        country: config.subject.country.clone(),
    }
}

/// Record an export attempt without aborting the run.
fn attempt(
    manifest: &mut Manifest,
    path: PathBuf,
    format: &'static str,
    purpose: &'static str,
    result: Result<(), ChainError>,
) {
    match result {
        Ok(()) => manifest.record_written(path, format, purpose),
        Err(err) => manifest.record_failed(path, format, purpose, err.to_string()),
    }
}

/// Execute one full generation run.
///
/// # Errors
/// Fatal errors only: invalid validity windows, key/certificate generation
/// failure, chain integrity failure, or an unwritable output directory.
/// Per-format export failures land in the returned manifest instead.
pub fn run(opts: &GenerateOptions) -> Result<RunReport, ChainError> {
    let config = &opts.config;
    let fqdn = &opts.fqdn;

    // Assemble first: a chain failure must leave no output directory behind.
    let leaf_subject = subject_for(config, fqdn);
    let chain = ChainAssembler::new(
        subject_for(config, &config.subject.root_common_name),
        subject_for(config, &config.subject.intermediate_common_name),
        leaf_subject.clone(),
    )
    .validity_days(
        config.validity.root_days,
        config.validity.intermediate_days,
        config.validity.leaf_days,
    )
    .key_bits(config.keys.bits)
    .assemble()?;
    println!("✓ Certificate chain assembled (root → intermediate → {})", fqdn);

    let csr = CsrBuilder::new(leaf_subject.clone()).build(&chain.leaf.key)?;
    println!("✓ Certificate signing request built");

    let layout = OutputLayout::create(&opts.output_dir, fqdn)?;
    let mut manifest = Manifest::new(fqdn, &layout.run_dir);
    manifest.add_fingerprint("Root CA", &chain.root.cert)?;
    manifest.add_fingerprint("Intermediate CA", &chain.intermediate.cert)?;
    manifest.add_fingerprint("Server certificate", &chain.leaf.cert)?;

    export_pem_der(&chain, &csr, &layout, &mut manifest, config);
    println!("✓ PEM and DER artifacts written");

    export_bundles(&chain, &layout, &mut manifest, config);
    println!("✓ Chain and CA bundles written");

    export_keystores(&chain, &layout, &mut manifest, config);

    manifest.write_summary(&layout.summary())?;
    println!("✓ Summary written to {}", layout.summary().display());

    let failed = manifest.failures().len();
    if failed > 0 {
        info!(failed, "run finished with degraded exports");
    } else {
        debug!("run finished, all exports written");
    }
    Ok(RunReport { layout, manifest })
}

fn export_pem_der(
    chain: &CertificateChain,
    csr: &openssl::x509::X509Req,
    layout: &OutputLayout,
    manifest: &mut Manifest,
    config: &AppConfig,
) {
    attempt(
        manifest,
        layout.root_ca_pem(),
        "PEM",
        "Root CA certificate",
        export::write_cert_pem(&chain.root.cert, &layout.root_ca_pem()),
    );
    attempt(
        manifest,
        layout.root_ca_key_pem(),
        "PEM",
        "Root CA private key",
        export::write_key_pem(&chain.root.key, &layout.root_ca_key_pem()),
    );
    attempt(
        manifest,
        layout.intermediate_ca_pem(),
        "PEM",
        "Intermediate CA certificate",
        export::write_cert_pem(&chain.intermediate.cert, &layout.intermediate_ca_pem()),
    );
    attempt(
        manifest,
        layout.intermediate_ca_key_pem(),
        "PEM",
        "Intermediate CA private key",
        export::write_key_pem(&chain.intermediate.key, &layout.intermediate_ca_key_pem()),
    );
    attempt(
        manifest,
        layout.leaf_pem(),
        "PEM",
        "Server certificate",
        export::write_cert_pem(&chain.leaf.cert, &layout.leaf_pem()),
    );
    attempt(
        manifest,
        layout.leaf_key_pem(),
        "PEM",
        "Server private key",
        export::write_key_pem(&chain.leaf.key, &layout.leaf_key_pem()),
    );
    attempt(
        manifest,
        layout.leaf_csr(),
        "PEM",
        "Certificate signing request",
        export::write_csr_pem(csr, &layout.leaf_csr()),
    );
    attempt(
        manifest,
        layout.leaf_der(),
        "DER",
        "Server certificate (binary)",
        export::write_cert_der(&chain.leaf.cert, &layout.leaf_der()),
    );
    attempt(
        manifest,
        layout.leaf_key_der(),
        "DER",
        "Server private key (binary, PKCS#8)",
        export::write_key_der(&chain.leaf.key, &layout.leaf_key_der()),
    );
    attempt(
        manifest,
        layout.pkcs12(),
        "PKCS#12",
        "Server key + full chain container",
        export::write_pkcs12(
            &chain.leaf.key,
            &chain.leaf.cert,
            &[&chain.intermediate.cert, &chain.root.cert],
            &layout.fqdn,
            &config.export.p12_password,
            &layout.pkcs12(),
        ),
    );
}

fn export_bundles(
    chain: &CertificateChain,
    layout: &OutputLayout,
    manifest: &mut Manifest,
    config: &AppConfig,
) {
    let full_chain = bundle::full_chain_pem(
        &chain.leaf.cert,
        &chain.intermediate.cert,
        &chain.root.cert,
    )
    .and_then(|bytes| export::write_bytes("PEM", &bytes, &layout.chain_pem()));
    attempt(
        manifest,
        layout.chain_pem(),
        "PEM",
        "Full chain, leaf first (TLS server order)",
        full_chain,
    );

    let ca_bundle = bundle::ca_bundle_pem(&chain.intermediate.cert, &chain.root.cert);
    match ca_bundle {
        Ok(bytes) => {
            attempt(
                manifest,
                layout.truststore_pem(),
                "PEM",
                "CA certificates for client trust stores",
                export::write_bytes("PEM", &bytes, &layout.truststore_pem()),
            );
            attempt(
                manifest,
                layout.ca_bundle_pem(),
                "PEM",
                "CA-only bundle",
                export::write_bytes("PEM", &bytes, &layout.ca_bundle_pem()),
            );
        }
        Err(err) => {
            let reason = err.to_string();
            manifest.record_failed(
                layout.truststore_pem(),
                "PEM",
                "CA certificates for client trust stores",
                reason.clone(),
            );
            manifest.record_failed(layout.ca_bundle_pem(), "PEM", "CA-only bundle", reason);
        }
    }

    let cnf = bundle::request_config(
        &subject_for(config, &layout.fqdn),
        &san_entries(&layout.fqdn),
        config.keys.bits,
    );
    attempt(
        manifest,
        layout.request_config(),
        "CNF",
        "Request inputs for reproduction",
        export::write_bytes("CNF", cnf.as_bytes(), &layout.request_config()),
    );
}

fn export_keystores(
    chain: &CertificateChain,
    layout: &OutputLayout,
    manifest: &mut Manifest,
    config: &AppConfig,
) {
    let bridge = keystore::select_bridge(
        config.export.keytool_path.as_deref(),
        Duration::from_secs(config.export.keytool_timeout_secs),
    );
    println!("✓ Keystore backend: {}", bridge.backend());

    let password = &config.export.p12_password;
    match bridge.write_keystore(chain, &layout.fqdn, password, &layout.formats_dir) {
        Ok(outcome) => match outcome.fallback {
            Some(note) => {
                manifest.record_degraded(outcome.path, "keystore", "Java keystore", note)
            }
            None => manifest.record_written(outcome.path, "keystore", "Java keystore"),
        },
        // Non-fatal: the rest of the run already succeeded without it
        Err(err) => manifest.record_failed(
            layout.formats_dir.join("keystore"),
            "keystore",
            "Java keystore",
            err.to_string(),
        ),
    }
    match bridge.write_truststore(chain, password, &layout.formats_dir) {
        Ok(outcome) => match outcome.fallback {
            Some(note) => {
                manifest.record_degraded(outcome.path, "truststore", "Java truststore", note)
            }
            None => manifest.record_written(outcome.path, "truststore", "Java truststore"),
        },
        Err(err) => manifest.record_failed(
            layout.formats_dir.join("truststore"),
            "truststore",
            "Java truststore",
            err.to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ArtifactStatus;
    use std::fs;
    use tempfile::tempdir;

    fn test_options(fqdn: &str, output_dir: PathBuf) -> GenerateOptions {
        let mut config = AppConfig::default();
        config.keys.bits = 2048;
        GenerateOptions {
            fqdn: fqdn.to_string(),
            output_dir,
            config,
        }
    }

    #[test]
    fn test_end_to_end_run() {
        let dir = tempdir().unwrap();
        let opts = test_options("api.internal.example.com", dir.path().to_path_buf());
        let report = run(&opts).unwrap();
        let layout = &report.layout;

        for path in [
            layout.root_ca_pem(),
            layout.root_ca_key_pem(),
            layout.intermediate_ca_pem(),
            layout.intermediate_ca_key_pem(),
            layout.leaf_pem(),
            layout.leaf_key_pem(),
            layout.leaf_csr(),
            layout.chain_pem(),
            layout.pkcs12(),
            layout.truststore_pem(),
            layout.summary(),
            layout.leaf_der(),
            layout.leaf_key_der(),
            layout.ca_bundle_pem(),
            layout.request_config(),
        ] {
            assert!(path.exists(), "missing artifact: {}", path.display());
        }

        // Full chain carries exactly three PEM blocks, leaf first
        let chain_text = fs::read_to_string(layout.chain_pem()).unwrap();
        assert_eq!(chain_text.matches("BEGIN CERTIFICATE").count(), 3);
        let leaf_text = fs::read_to_string(layout.leaf_pem()).unwrap();
        assert!(chain_text.starts_with(leaf_text.trim_end_matches('\n')));

        // PKCS#12 holds the key plus three certificates
        let p12 = openssl::pkcs12::Pkcs12::from_der(&fs::read(layout.pkcs12()).unwrap())
            .unwrap()
            .parse2("changeit")
            .unwrap();
        assert!(p12.pkey.is_some());
        assert!(p12.cert.is_some());
        assert_eq!(p12.ca.unwrap().len(), 2);

        // The summary lists every artifact the manifest recorded
        let summary = fs::read_to_string(layout.summary()).unwrap();
        for record in report.manifest.records() {
            if matches!(record.status, ArtifactStatus::Written) {
                let name = record.path.file_name().unwrap().to_str().unwrap();
                assert!(summary.contains(name), "summary missing {}", name);
            }
        }
    }

    #[test]
    fn test_invalid_validity_creates_nothing() {
        let dir = tempdir().unwrap();
        let mut opts = test_options("api.internal.example.com", dir.path().to_path_buf());
        opts.config.validity.leaf_days = 0;

        let result = run(&opts);
        assert!(matches!(result, Err(ChainError::Validity { days: 0 })));
        // No run directory, no key material
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
