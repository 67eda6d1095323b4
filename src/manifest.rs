//! Run Manifest and Summary Document
//!
//! Tracks the outcome of every export artifact in a run and renders the
//! terminal `CERTIFICATE_SUMMARY.md` enumerating what was produced, what
//! each file is for, and which paths degraded or failed.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use openssl::x509::X509Ref;

use crate::errors::ChainError;

/// Outcome of a single export artifact.
#[derive(Debug, Clone)]
pub enum ArtifactStatus {
    Written,
    /// Produced, but through a fallback path worth surfacing.
    Degraded { note: String },
    Failed { error: String },
}

/// One artifact the run attempted to produce.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub format: &'static str,
    pub purpose: &'static str,
    pub status: ArtifactStatus,
}

/// Ledger of everything a run produced.
pub struct Manifest {
    fqdn: String,
    run_dir: PathBuf,
    generated_at: DateTime<Utc>,
    records: Vec<ArtifactRecord>,
    fingerprints: Vec<(String, String)>,
}

impl Manifest {
    pub fn new(fqdn: &str, run_dir: &Path) -> Self {
        Self {
            fqdn: fqdn.to_string(),
            run_dir: run_dir.to_path_buf(),
            generated_at: Utc::now(),
            records: Vec::new(),
            fingerprints: Vec::new(),
        }
    }

    pub fn record_written(&mut self, path: PathBuf, format: &'static str, purpose: &'static str) {
        self.records.push(ArtifactRecord {
            path,
            format,
            purpose,
            status: ArtifactStatus::Written,
        });
    }

    pub fn record_degraded(
        &mut self,
        path: PathBuf,
        format: &'static str,
        purpose: &'static str,
        note: String,
    ) {
        self.records.push(ArtifactRecord {
            path,
            format,
            purpose,
            status: ArtifactStatus::Degraded { note },
        });
    }

    pub fn record_failed(
        &mut self,
        path: PathBuf,
        format: &'static str,
        purpose: &'static str,
        error: String,
    ) {
        self.records.push(ArtifactRecord {
            path,
            format,
            purpose,
            status: ArtifactStatus::Failed { error },
        });
    }

    /// Store the SHA-256 fingerprint of a chain certificate for the summary.
    pub fn add_fingerprint(&mut self, label: &str, cert: &X509Ref) -> Result<(), ChainError> {
        let digest = cert.digest(MessageDigest::sha256())?;
        self.fingerprints.push((label.to_string(), hex_fingerprint(&digest)));
        Ok(())
    }

    pub fn records(&self) -> &[ArtifactRecord] {
        &self.records
    }

    /// Records that failed outright (degraded artifacts still count as
    /// produced).
    pub fn failures(&self) -> Vec<&ArtifactRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.status, ArtifactStatus::Failed { .. }))
            .collect()
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.run_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Render the summary document.
    pub fn render_markdown(&self) -> String {
        let mut doc = String::new();
        let _ = writeln!(doc, "# Certificate Summary");
        let _ = writeln!(doc);
        let _ = writeln!(doc, "- Hostname: `{}`", self.fqdn);
        let _ = writeln!(
            doc,
            "- Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(doc, "- Output directory: `{}`", self.run_dir.display());
        let _ = writeln!(doc);

        if !self.fingerprints.is_empty() {
            let _ = writeln!(doc, "## Certificate Fingerprints (SHA-256)");
            let _ = writeln!(doc);
            let _ = writeln!(doc, "| Certificate | Fingerprint |");
            let _ = writeln!(doc, "|---|---|");
            for (label, fp) in &self.fingerprints {
                let _ = writeln!(doc, "| {} | `{}` |", label, fp);
            }
            let _ = writeln!(doc);
        }

        let _ = writeln!(doc, "## Artifacts");
        let _ = writeln!(doc);
        let _ = writeln!(doc, "| File | Format | Purpose | Status |");
        let _ = writeln!(doc, "|---|---|---|---|");
        for record in &self.records {
            let status = match &record.status {
                ArtifactStatus::Written => "written".to_string(),
                ArtifactStatus::Degraded { .. } => "written (degraded)".to_string(),
                ArtifactStatus::Failed { .. } => "FAILED".to_string(),
            };
            let _ = writeln!(
                doc,
                "| `{}` | {} | {} | {} |",
                self.display_path(&record.path),
                record.format,
                record.purpose,
                status
            );
        }

        let notes: Vec<String> = self
            .records
            .iter()
            .filter_map(|r| match &r.status {
                ArtifactStatus::Degraded { note } => {
                    Some(format!("- `{}`: {}", self.display_path(&r.path), note))
                }
                ArtifactStatus::Failed { error } => {
                    Some(format!("- `{}`: {}", self.display_path(&r.path), error))
                }
                ArtifactStatus::Written => None,
            })
            .collect();
        if !notes.is_empty() {
            let _ = writeln!(doc);
            let _ = writeln!(doc, "## Notes");
            let _ = writeln!(doc);
            for note in notes {
                let _ = writeln!(doc, "{}", note);
            }
        }
        doc
    }

    /// Write the summary document to `path`.
    pub fn write_summary(&self, path: &Path) -> Result<(), ChainError> {
        fs::write(path, self.render_markdown()).map_err(|e| ChainError::Export {
            format: "summary",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn hex_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_chain;
    use tempfile::tempdir;

    #[test]
    fn test_hex_fingerprint_format() {
        assert_eq!(hex_fingerprint(&[0xab, 0x01, 0xff]), "AB:01:FF");
    }

    #[test]
    fn test_summary_lists_artifacts_and_failures() {
        let run_dir = PathBuf::from("/tmp/run");
        let mut manifest = Manifest::new("api.internal.example.com", &run_dir);
        manifest.record_written(run_dir.join("root_ca.pem"), "PEM", "Root CA certificate");
        manifest.record_failed(
            run_dir.join("formats/keystore.jks"),
            "JKS",
            "Java keystore",
            "keytool timed out".to_string(),
        );
        manifest.record_degraded(
            run_dir.join("formats/truststore.jks"),
            "JKS",
            "Java truststore",
            "dummy-entry fallback used".to_string(),
        );

        let doc = manifest.render_markdown();
        assert!(doc.contains("`root_ca.pem`"));
        assert!(doc.contains("FAILED"));
        assert!(doc.contains("keytool timed out"));
        assert!(doc.contains("dummy-entry fallback used"));
        assert_eq!(manifest.failures().len(), 1);
    }

    #[test]
    fn test_fingerprints_rendered() {
        let chain = test_chain("www.example.com");
        let mut manifest = Manifest::new("www.example.com", Path::new("/tmp/run"));
        manifest.add_fingerprint("Root CA", &chain.root.cert).unwrap();
        let doc = manifest.render_markdown();
        assert!(doc.contains("## Certificate Fingerprints"));
        assert!(doc.contains("Root CA"));
    }

    #[test]
    fn test_write_summary() {
        let dir = tempdir().unwrap();
        let manifest = Manifest::new("www.example.com", dir.path());
        let path = dir.path().join("CERTIFICATE_SUMMARY.md");
        manifest.write_summary(&path).unwrap();
        assert!(fs::read_to_string(path)
            .unwrap()
            .starts_with("# Certificate Summary"));
    }
}
