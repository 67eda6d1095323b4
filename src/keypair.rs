//! RSA Key Pair Generation
//!
//! Every certificate tier gets its own freshly generated RSA key pair; key
//! material is never shared or reused between tiers. Generation is pure
//! compute with no side effects.

use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use tracing::debug;

use crate::errors::ChainError;

/// Default RSA modulus size for all tiers.
pub const RSA_KEY_SIZE_DEFAULT: u32 = 4096;

/// Generate an RSA key pair with the given modulus size in bits.
///
/// # Errors
/// Returns [`ChainError::Generation`] when the backend rejects the key size
/// (for example, sizes too small to be usable).
pub fn generate_rsa_keypair(bits: u32) -> Result<PKey<Private>, ChainError> {
    let rsa = Rsa::generate(bits)
        .map_err(|e| ChainError::Generation(format!("failed to generate RSA-{} keypair: {}", bits, e)))?;
    let private_key = PKey::from_rsa(rsa)
        .map_err(|e| ChainError::Generation(format!("failed to create private key: {}", e)))?;
    debug!(bits, "generated RSA key pair");
    Ok(private_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keypair() {
        let key = generate_rsa_keypair(2048).unwrap();
        assert_eq!(key.bits(), 2048);
    }

    #[test]
    fn test_rejected_key_size() {
        let result = generate_rsa_keypair(0);
        assert!(matches!(result, Err(ChainError::Generation(_))));
    }
}
