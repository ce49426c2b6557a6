//! Offline token verification.

use crate::envelope::{LicenseEnvelope, decode_envelope};
use crate::error::LicenseResult;
use crate::keys::VerifyingKey;
use crate::token::SignedToken;

/// Verifies a token string against a public key and returns its envelope.
///
/// # Steps
///
/// 1. Check the `RELAY-BETA-` prefix
/// 2. Split payload and signature on the single `.`
/// 3. Decode both halves from base64
/// 4. Verify the Ed25519 signature over the decoded payload bytes
/// 5. Parse the envelope from those same bytes
///
/// # Errors
///
/// `InvalidFormat` for steps 1-3, `InvalidSignature` for step 4 and
/// `InvalidPayload` for step 5. Expiry is not checked here; see
/// [`LicenseEnvelope::status_at`].
pub fn verify(token: &str, public_key: &VerifyingKey) -> LicenseResult<LicenseEnvelope> {
    let signed = SignedToken::decode(token)?;
    public_key.verify(signed.envelope_bytes(), signed.signature())?;
    decode_envelope(signed.envelope_bytes())
}
