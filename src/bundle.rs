//! Chain Bundles and the Request-Config Artifact
//!
//! Concatenated PEM bundles plus a reproducibility artifact capturing the
//! exact subject and SAN inputs of the run as an OpenSSL `req`-style config.

use std::fmt::Write;

use openssl::x509::X509Ref;

use crate::errors::ChainError;
use crate::SubjectAttributes;

fn concat_pem(certs: &[&X509Ref]) -> Result<Vec<u8>, ChainError> {
    let mut out = Vec::new();
    for cert in certs {
        out.extend_from_slice(&cert.to_pem()?);
    }
    Ok(out)
}

/// Full chain as concatenated PEM: leaf first, then intermediate, then root.
/// The order is load-bearing; TLS servers send exactly this sequence.
pub fn full_chain_pem(
    leaf: &X509Ref,
    intermediate: &X509Ref,
    root: &X509Ref,
) -> Result<Vec<u8>, ChainError> {
    concat_pem(&[leaf, intermediate, root])
}

/// CA-only bundle: intermediate then root. This is what trust stores and
/// `--cacert` style options consume.
pub fn ca_bundle_pem(intermediate: &X509Ref, root: &X509Ref) -> Result<Vec<u8>, ChainError> {
    concat_pem(&[intermediate, root])
}

/// Render an OpenSSL `req`-style config reproducing the leaf request:
/// subject attributes, SAN list, key size. Re-running `openssl req` with
/// this file asks for the same certificate this run issued.
pub fn request_config(subject: &SubjectAttributes, san: &[String], key_bits: u32) -> String {
    let mut cnf = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(cnf, "[ req ]");
    let _ = writeln!(cnf, "default_bits = {}", key_bits);
    let _ = writeln!(cnf, "default_md = sha256");
    let _ = writeln!(cnf, "prompt = no");
    let _ = writeln!(cnf, "distinguished_name = dn");
    let _ = writeln!(cnf, "req_extensions = v3_req");
    let _ = writeln!(cnf);
    let _ = writeln!(cnf, "[ dn ]");
    let _ = writeln!(cnf, "CN = {}", subject.common_name);
    let _ = writeln!(cnf, "O = {}", subject.organization);
    let _ = writeln!(cnf, "OU = {}", subject.organizational_unit);
    let _ = writeln!(cnf, "L = {}", subject.locality);
    let _ = writeln!(cnf, "ST = {}", subject.state);
    let _ = writeln!(cnf, "C = {}", subject.country);
    let _ = writeln!(cnf);
    let _ = writeln!(cnf, "[ v3_req ]");
    let _ = writeln!(cnf, "basicConstraints = critical, CA:FALSE");
    let _ = writeln!(
        cnf,
        "keyUsage = critical, digitalSignature, keyEncipherment, dataEncipherment"
    );
    let _ = writeln!(cnf, "extendedKeyUsage = serverAuth, clientAuth");
    let _ = writeln!(cnf, "subjectAltName = @alt_names");
    let _ = writeln!(cnf);
    let _ = writeln!(cnf, "[ alt_names ]");
    for (i, name) in san.iter().enumerate() {
        let _ = writeln!(cnf, "DNS.{} = {}", i + 1, name);
    }
    cnf
}
