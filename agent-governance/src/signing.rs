//! Signing collaborator for decision digests and capability tokens.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{GovernanceError, GovernanceResult};

/// Produces signatures over opaque byte strings.
///
/// Key custody belongs to the implementation; the decision service only
/// hands over the bytes to sign.
pub trait DecisionSigner: Send + Sync {
    /// Signs `message`.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Ed25519 signer built from a 32-byte seed.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Creates a signer from raw seed bytes.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Creates a signer from a 64-character hex seed.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Signing`] when the input is not 32 bytes of
    /// hex.
    pub fn from_hex(seed_hex: &str) -> GovernanceResult<Self> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|err| GovernanceError::Signing(format!("invalid seed hex: {err}")))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            GovernanceError::Signing(format!("seed must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(seed))
    }

    /// Public half of the key pair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex-encoded public key.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    /// Checks a raw signature against this signer's public key.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        Signature::from_slice(signature)
            .is_ok_and(|signature| self.verifying_key().verify(message, &signature).is_ok())
    }

    /// Checks a hex-encoded signature against this signer's public key.
    #[must_use]
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        hex::decode(signature_hex).is_ok_and(|signature| self.verify(message, &signature))
    }
}

impl DecisionSigner for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let signer = Ed25519Signer::from_seed([42u8; 32]);
        let signature = signer.sign(b"decision");
        assert_eq!(signature.len(), 64);
        assert!(signer.verify(b"decision", &signature));
        assert!(!signer.verify(b"tampered", &signature));
        assert!(signer.verify_hex(b"decision", &hex::encode(&signature)));
    }

    #[test]
    fn other_key_rejects() {
        let a = Ed25519Signer::from_seed([42u8; 32]);
        let b = Ed25519Signer::from_seed([99u8; 32]);
        assert!(!b.verify(b"decision", &a.sign(b"decision")));
    }

    #[test]
    fn hex_seed_parsing() {
        let hex_seed = "2a".repeat(32);
        let signer = Ed25519Signer::from_hex(&hex_seed).unwrap();
        assert_eq!(
            signer.public_key_hex(),
            Ed25519Signer::from_seed([42u8; 32]).public_key_hex()
        );
        assert!(matches!(
            Ed25519Signer::from_hex("abcd"),
            Err(GovernanceError::Signing(_))
        ));
        assert!(matches!(
            Ed25519Signer::from_hex("zz"),
            Err(GovernanceError::Signing(_))
        ));
        assert!(!signer.verify(b"x", b"short"));
    }
}
