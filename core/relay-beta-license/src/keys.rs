//! Ed25519 key material for signing and verifying beta tokens.
//!
//! Keys travel as lowercase hex: the 32-byte secret seed for signing and the
//! 32-byte public key for verification.

use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey, Verifier as _,
    VerifyingKey as DalekVerifyingKey,
};
use rand::rngs::OsRng;

use crate::error::{LicenseError, LicenseResult};

/// Length of an encoded Ed25519 signature.
pub(crate) const SIGNATURE_LEN: usize = 64;

/// Secret key of the issuer. Never leaves the issuing host.
pub struct SigningKey(DalekSigningKey);

/// Issuer public key, embedded in clients to check tokens offline.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(DalekVerifyingKey);

/// Matching issuer secret and public key, as produced by `keygen`.
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Draws a fresh issuer key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let signing = DalekSigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self {
            signing_key: SigningKey(signing),
            verifying_key: VerifyingKey(verifying),
        }
    }
}

impl SigningKey {
    /// Wraps a 32-byte seed. Every seed is a valid key.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(DalekSigningKey::from_bytes(bytes))
    }

    /// Parses a signing key from its 64-character hex seed.
    pub fn from_hex(hex_seed: &str) -> LicenseResult<Self> {
        let bytes = decode_hex_32(hex_seed, "signing key")?;
        Ok(Self::from_bytes(&bytes))
    }

    /// The seed `from_bytes` accepts.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Returns the seed as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Detached signature over `message`, as carried in a token.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.0.sign(message).to_bytes()
    }

    /// Public half, for publishing to clients.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

impl VerifyingKey {
    /// Fails with `InvalidKey` when the bytes are not a curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> LicenseResult<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| LicenseError::InvalidKey("not a valid Ed25519 public key".to_string()))
    }

    /// Parses a verifying key from its 64-character hex form.
    pub fn from_hex(hex_key: &str) -> LicenseResult<Self> {
        let bytes = decode_hex_32(hex_key, "public key")?;
        Self::from_bytes(&bytes)
    }

    /// Compressed point bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Returns the public key as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Checks a detached signature. Any failure, a wrong-length signature
    /// included, is `InvalidSignature`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> LicenseResult<()> {
        let signature =
            DalekSignature::from_slice(signature).map_err(|_| LicenseError::InvalidSignature)?;
        self.0
            .verify(message, &signature)
            .map_err(|_| LicenseError::InvalidSignature)
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VerifyingKey").field(&self.to_hex()).finish()
    }
}

fn decode_hex_32(input: &str, what: &str) -> LicenseResult<[u8; 32]> {
    let bytes = hex::decode(input.trim())
        .map_err(|e| LicenseError::InvalidKey(format!("{what} is not hex: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        LicenseError::InvalidKey(format!("{what} must be 32 bytes, got {}", v.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_signature_accepted() {
        let kp = KeyPair::generate();
        let sig = kp.signing_key.sign(b"hello world");
        assert!(kp.verifying_key.verify(b"hello world", &sig).is_ok());
    }

    #[test]
    fn other_issuer_rejected() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = kp1.signing_key.sign(b"message");
        assert!(matches!(
            kp2.verifying_key.verify(b"message", &sig),
            Err(LicenseError::InvalidSignature)
        ));
    }

    #[test]
    fn truncated_signature_is_signature_error() {
        let kp = KeyPair::generate();
        let sig = kp.signing_key.sign(b"message");
        assert!(matches!(
            kp.verifying_key.verify(b"message", &sig[..40]),
            Err(LicenseError::InvalidSignature)
        ));
    }

    #[test]
    fn hex_roundtrip() {
        let kp = KeyPair::generate();
        let sk = SigningKey::from_hex(&kp.signing_key.to_hex()).unwrap();
        let vk = VerifyingKey::from_hex(&kp.verifying_key.to_hex()).unwrap();
        assert_eq!(sk.verifying_key(), vk);
    }

    #[test]
    fn bad_hex_rejected() {
        assert!(matches!(
            SigningKey::from_hex("zz"),
            Err(LicenseError::InvalidKey(_))
        ));
        assert!(matches!(
            VerifyingKey::from_hex("abcd"),
            Err(LicenseError::InvalidKey(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let kp = KeyPair::generate();
        let rendered = format!("{:?}", kp.signing_key);
        assert!(!rendered.contains(&kp.signing_key.to_hex()));
    }
}
