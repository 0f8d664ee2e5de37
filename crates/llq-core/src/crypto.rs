// crates/llq-core/src/crypto.rs

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::QuorumError;
use crate::member::MemberId;

/// An ed25519 keypair. Used for operator keys (rehabilitation proofs) and
/// the gate authority key (signed gate updates).
pub struct Keypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Keypair {
    /// Generate a new random ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Keypair {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key bytes (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Sign a message and return the signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

/// Verify an ed25519 signature.
///
/// Returns `true` if the signature is valid for the given message and public
/// key. A malformed public key or signature length is an error; a signature
/// that simply does not verify is `Ok(false)`.
pub fn verify_signature(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<bool, QuorumError> {
    let verifying_key = VerifyingKey::from_bytes(public_key_bytes)
        .map_err(|e| QuorumError::Crypto(format!("Invalid public key: {}", e)))?;

    let signature_array: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| QuorumError::Crypto("Signature must be exactly 64 bytes".to_string()))?;

    let signature = ed25519_dalek::Signature::from_bytes(&signature_array);

    match verifying_key.verify(message, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Compute SHA-256 of the given bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Canonical digest signed by a rehabilitation proof:
/// `sha256(member_id || new_endpoint)`.
pub fn rehabilitation_digest(member_id: &MemberId, new_endpoint: &str) -> [u8; 32] {
    let mut payload = Vec::with_capacity(32 + new_endpoint.len());
    payload.extend_from_slice(&member_id.0);
    payload.extend_from_slice(new_endpoint.as_bytes());
    hash_bytes(&payload)
}
