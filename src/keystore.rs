//! Java Keystore Export Backends
//!
//! The keystore-equivalent export is the one format this tool cannot emit
//! purely in-process in every environment, so it sits behind the
//! [`KeystoreBridge`] trait and the rest of the pipeline never knows which
//! backend ran:
//!
//! - [`KeytoolBridge`] shells out to the JDK `keytool` utility and produces
//!   classic JKS stores. The primary path imports the leaf PKCS#12 in one
//!   step; if that fails it falls back to the dummy-entry sequence (create a
//!   throwaway key entry so the store file exists, delete it, then import
//!   the certificates one by one).
//! - [`Pkcs12KeystoreBridge`] runs fully in-process and emits PKCS#12-format
//!   stores, which the JDK accepts as keystores natively.
//!
//! Every subprocess invocation is time-bounded. Staging files live in a
//! temporary directory that is removed on all exit paths. A bridge failure
//! is reported as [`ChainError::ExternalTool`] and treated as non-fatal by
//! the pipeline.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use openssl::pkcs12::Pkcs12;
use openssl::stack::Stack;
use openssl::x509::X509;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::chain::CertificateChain;
use crate::errors::ChainError;
use crate::export::pkcs12_bytes;

const INTERMEDIATE_ALIAS: &str = "intermediate-ca";
const ROOT_ALIAS: &str = "root-ca";
const DUMMY_ALIAS: &str = "bootstrap-dummy";

/// Default wall-clock bound for one external-tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a bridge export: where the store landed and, when a fallback
/// path produced it, a note for the summary document.
pub struct KeystoreOutcome {
    pub path: PathBuf,
    pub fallback: Option<String>,
}

impl KeystoreOutcome {
    fn clean(path: PathBuf) -> Self {
        Self {
            path,
            fallback: None,
        }
    }
}

/// A backend capable of producing keystore- and truststore-equivalent
/// containers from the assembled chain.
pub trait KeystoreBridge {
    /// Short backend name for logs and the summary document.
    fn backend(&self) -> &'static str;

    /// Write a keystore holding the leaf key entry plus the intermediate
    /// and root certificates under distinct aliases. Returns the path of
    /// the store written into `dest_dir`.
    fn write_keystore(
        &self,
        chain: &CertificateChain,
        fqdn: &str,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError>;

    /// Write a truststore holding only the CA certificates.
    fn write_truststore(
        &self,
        chain: &CertificateChain,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError>;
}

/// Pick the backend for this run: `keytool` when present (or explicitly
/// configured), the in-process PKCS#12 backend otherwise.
pub fn select_bridge(
    keytool_path: Option<&Path>,
    timeout: Duration,
) -> Box<dyn KeystoreBridge> {
    match KeytoolBridge::detect(keytool_path, timeout) {
        Some(bridge) => Box::new(bridge),
        None => {
            debug!("keytool not found, using in-process PKCS#12 keystore backend");
            Box::new(Pkcs12KeystoreBridge)
        }
    }
}

/// Run a prepared command, bounded by `timeout`. The child is killed when
/// the deadline passes.
fn run_bounded(command: &mut Command, timeout: Duration, tool: &str) -> Result<(), ChainError> {
    let tool_err = |reason: String| ChainError::ExternalTool {
        tool: tool.to_string(),
        reason,
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| tool_err(format!("failed to spawn: {}", e)))?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(tool_err(format!("timed out after {:?}", timeout)));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(tool_err(format!("wait failed: {}", e))),
        }
    };

    if status.success() {
        Ok(())
    } else {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(tool_err(format!(
            "exited with {}: {}",
            status,
            stderr.trim()
        )))
    }
}

/// Subprocess bridge to the JDK `keytool` utility, producing JKS stores.
pub struct KeytoolBridge {
    keytool: PathBuf,
    timeout: Duration,
}

impl KeytoolBridge {
    /// Probe for a usable `keytool`: the configured path if given, otherwise
    /// whatever `PATH` resolves. Returns `None` when the probe fails.
    pub fn detect(keytool_path: Option<&Path>, timeout: Duration) -> Option<Self> {
        let keytool = keytool_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("keytool"));
        let mut probe = Command::new(&keytool);
        probe.arg("-help");
        let usable = run_bounded(&mut probe, timeout, "keytool").is_ok();
        if usable {
            debug!(keytool = %keytool.display(), "keytool detected");
            Some(Self { keytool, timeout })
        } else {
            None
        }
    }

    fn keytool(&self, args: &[&str]) -> Result<(), ChainError> {
        debug!(subcommand = args.first().copied().unwrap_or(""), "invoking keytool");
        let mut command = Command::new(&self.keytool);
        command.args(args);
        run_bounded(&mut command, self.timeout, "keytool")
    }

    fn import_cert(
        &self,
        store: &Path,
        password: &str,
        alias: &str,
        cert_file: &Path,
    ) -> Result<(), ChainError> {
        self.keytool(&[
            "-importcert",
            "-noprompt",
            "-keystore",
            &store.to_string_lossy(),
            "-storepass",
            password,
            "-alias",
            alias,
            "-file",
            &cert_file.to_string_lossy(),
        ])
    }

    /// Stage the chain as PEM/PKCS#12 files in a scoped temporary directory.
    /// The directory is removed when the returned guard drops, on success
    /// and failure alike.
    fn stage(
        &self,
        chain: &CertificateChain,
        fqdn: &str,
        password: &str,
    ) -> Result<(TempDir, StagedChain), ChainError> {
        let staging = TempDir::new().map_err(|e| ChainError::ExternalTool {
            tool: "keytool".to_string(),
            reason: format!("failed to create staging directory: {}", e),
        })?;
        let stage_err = |reason: String| ChainError::ExternalTool {
            tool: "keytool".to_string(),
            reason,
        };

        let leaf_p12 = staging.path().join("leaf.p12");
        let bytes = pkcs12_bytes(
            &chain.leaf.key,
            &chain.leaf.cert,
            &[&chain.intermediate.cert, &chain.root.cert],
            fqdn,
            password,
        )
        .map_err(|e| stage_err(e.to_string()))?;
        fs::write(&leaf_p12, bytes).map_err(|e| stage_err(e.to_string()))?;

        let staged = StagedChain {
            leaf_p12,
            leaf_pem: staging.path().join("leaf.pem"),
            intermediate_pem: staging.path().join("intermediate.pem"),
            root_pem: staging.path().join("root.pem"),
        };
        for (path, cert) in [
            (&staged.leaf_pem, &chain.leaf.cert),
            (&staged.intermediate_pem, &chain.intermediate.cert),
            (&staged.root_pem, &chain.root.cert),
        ] {
            let pem = cert.to_pem().map_err(|e| stage_err(e.to_string()))?;
            fs::write(path, pem).map_err(|e| stage_err(e.to_string()))?;
        }
        Ok((staging, staged))
    }

    /// Primary import path: convert the staged PKCS#12 into the JKS store,
    /// then add the CA certificates under their own aliases.
    fn import_via_pkcs12(
        &self,
        staged: &StagedChain,
        store: &Path,
        password: &str,
    ) -> Result<(), ChainError> {
        self.keytool(&[
            "-importkeystore",
            "-noprompt",
            "-srckeystore",
            &staged.leaf_p12.to_string_lossy(),
            "-srcstoretype",
            "PKCS12",
            "-srcstorepass",
            password,
            "-destkeystore",
            &store.to_string_lossy(),
            "-deststoretype",
            "JKS",
            "-deststorepass",
            password,
        ])?;
        self.import_cert(store, password, INTERMEDIATE_ALIAS, &staged.intermediate_pem)?;
        self.import_cert(store, password, ROOT_ALIAS, &staged.root_pem)
    }

    /// Fallback path: some keytool builds reject `-importkeystore` for
    /// foreign PKCS#12 input. Create a dummy key entry so the store file
    /// exists, delete it, then import each certificate individually.
    fn import_via_dummy_entry(
        &self,
        staged: &StagedChain,
        store: &Path,
        fqdn: &str,
        password: &str,
    ) -> Result<(), ChainError> {
        if store.exists() {
            let _ = fs::remove_file(store);
        }
        self.keytool(&[
            "-genkeypair",
            "-keystore",
            &store.to_string_lossy(),
            "-storetype",
            "JKS",
            "-storepass",
            password,
            "-keypass",
            password,
            "-alias",
            DUMMY_ALIAS,
            "-dname",
            "CN=bootstrap-dummy",
            "-keyalg",
            "RSA",
            "-keysize",
            "2048",
            "-validity",
            "1",
        ])?;
        self.keytool(&[
            "-delete",
            "-keystore",
            &store.to_string_lossy(),
            "-storepass",
            password,
            "-alias",
            DUMMY_ALIAS,
        ])?;
        self.import_cert(store, password, fqdn, &staged.leaf_pem)?;
        self.import_cert(store, password, INTERMEDIATE_ALIAS, &staged.intermediate_pem)?;
        self.import_cert(store, password, ROOT_ALIAS, &staged.root_pem)
    }
}

struct StagedChain {
    leaf_p12: PathBuf,
    leaf_pem: PathBuf,
    intermediate_pem: PathBuf,
    root_pem: PathBuf,
}

impl KeystoreBridge for KeytoolBridge {
    fn backend(&self) -> &'static str {
        "keytool (JKS)"
    }

    fn write_keystore(
        &self,
        chain: &CertificateChain,
        fqdn: &str,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError> {
        let store = dest_dir.join("keystore.jks");
        let (_staging, staged) = self.stage(chain, fqdn, password)?;

        if let Err(primary) = self.import_via_pkcs12(&staged, &store, password) {
            warn!(error = %primary, "keytool PKCS#12 import failed, trying dummy-entry fallback");
            self.import_via_dummy_entry(&staged, &store, fqdn, password)?;
            return Ok(KeystoreOutcome {
                path: store,
                fallback: Some(format!(
                    "keytool -importkeystore failed ({}); dummy-entry import sequence used",
                    primary
                )),
            });
        }
        Ok(KeystoreOutcome::clean(store))
    }

    fn write_truststore(
        &self,
        chain: &CertificateChain,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError> {
        let store = dest_dir.join("truststore.jks");
        let (_staging, staged) = self.stage(chain, "truststore", password)?;
        self.import_cert(&store, password, INTERMEDIATE_ALIAS, &staged.intermediate_pem)?;
        self.import_cert(&store, password, ROOT_ALIAS, &staged.root_pem)?;
        Ok(KeystoreOutcome::clean(store))
    }
}

/// In-process backend: PKCS#12-format stores, no external tooling. The JDK
/// treats PKCS#12 as its default keystore format, so these load anywhere a
/// JKS file would.
pub struct Pkcs12KeystoreBridge;

impl KeystoreBridge for Pkcs12KeystoreBridge {
    fn backend(&self) -> &'static str {
        "in-process (PKCS#12)"
    }

    fn write_keystore(
        &self,
        chain: &CertificateChain,
        fqdn: &str,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError> {
        let store = dest_dir.join("keystore.p12");
        let bytes = pkcs12_bytes(
            &chain.leaf.key,
            &chain.leaf.cert,
            &[&chain.intermediate.cert, &chain.root.cert],
            fqdn,
            password,
        )?;
        fs::write(&store, bytes).map_err(|e| ChainError::Export {
            format: "keystore",
            path: store.clone(),
            reason: e.to_string(),
        })?;
        Ok(KeystoreOutcome::clean(store))
    }

    fn write_truststore(
        &self,
        chain: &CertificateChain,
        password: &str,
        dest_dir: &Path,
    ) -> Result<KeystoreOutcome, ChainError> {
        let store = dest_dir.join("truststore.p12");
        let build = || -> Result<Vec<u8>, openssl::error::ErrorStack> {
            let mut ca_stack: Stack<X509> = Stack::new()?;
            ca_stack.push(chain.intermediate.cert.clone())?;
            ca_stack.push(chain.root.cert.clone())?;
            let mut builder = Pkcs12::builder();
            builder.ca(ca_stack);
            let container = builder.build2(password)?;
            container.to_der()
        };
        let bytes = build().map_err(|e| ChainError::Export {
            format: "truststore",
            path: store.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&store, bytes).map_err(|e| ChainError::Export {
            format: "truststore",
            path: store.clone(),
            reason: e.to_string(),
        })?;
        Ok(KeystoreOutcome::clean(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_chain;
    use tempfile::tempdir;

    fn keytool_available() -> bool {
        KeytoolBridge::detect(None, DEFAULT_TOOL_TIMEOUT).is_some()
    }

    #[test]
    fn test_native_keystore_round_trip() {
        let chain = test_chain("www.example.com");
        let dir = tempdir().unwrap();
        let bridge = Pkcs12KeystoreBridge;

        let outcome = bridge
            .write_keystore(&chain, "www.example.com", "changeit", dir.path())
            .unwrap();
        assert!(outcome.fallback.is_none());
        let parsed = Pkcs12::from_der(&fs::read(outcome.path).unwrap())
            .unwrap()
            .parse2("changeit")
            .unwrap();
        assert!(parsed.pkey.is_some());
        assert!(parsed.cert.is_some());
        assert_eq!(parsed.ca.unwrap().len(), 2);
    }

    #[test]
    fn test_native_truststore_has_only_ca_certs() {
        let chain = test_chain("www.example.com");
        let dir = tempdir().unwrap();
        let bridge = Pkcs12KeystoreBridge;

        let outcome = bridge
            .write_truststore(&chain, "changeit", dir.path())
            .unwrap();
        let parsed = Pkcs12::from_der(&fs::read(outcome.path).unwrap())
            .unwrap()
            .parse2("changeit")
            .unwrap();
        assert!(parsed.pkey.is_none());
        assert_eq!(parsed.ca.unwrap().len(), 2);
    }

    #[test]
    #[cfg(unix)]
    fn test_run_bounded_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let result = run_bounded(&mut cmd, Duration::from_millis(200), "sleep");
        match result {
            Err(ChainError::ExternalTool { reason, .. }) => {
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected timeout error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_keytool_keystore_if_available() {
        if !keytool_available() {
            eprintln!("keytool not available, skipping");
            return;
        }
        let chain = test_chain("www.example.com");
        let dir = tempdir().unwrap();
        let bridge = KeytoolBridge::detect(None, DEFAULT_TOOL_TIMEOUT).unwrap();
        let outcome = bridge
            .write_keystore(&chain, "www.example.com", "changeit", dir.path())
            .unwrap();
        assert!(outcome.path.exists());
        assert!(fs::metadata(&outcome.path).unwrap().len() > 0);
    }
}
