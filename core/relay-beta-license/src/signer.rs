//! Token issuance.

use crate::envelope::{
    ANONYMOUS, LicenseEnvelope, SECS_PER_DAY, discount_code, encode_envelope, key_id,
};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::SigningKey;
use crate::token::SignedToken;

/// Inputs for one issuance event.
#[derive(Debug, Clone, Copy)]
pub struct IssueRequest<'a> {
    /// Owning user.
    pub owner_id: i64,
    /// Owner display name; empty becomes `"anonymous"`.
    pub display_name: &'a str,
    /// Days until expiry. Must be positive.
    pub validity_days: u32,
    /// Beta cohort tag.
    pub cohort: &'a str,
}

/// Issues a token stamped with the current time.
///
/// Returns `NotConfigured` when no signing key is supplied.
pub fn issue(request: IssueRequest<'_>, signing_key: Option<&SigningKey>) -> LicenseResult<SignedToken> {
    issue_at(request, signing_key, chrono::Utc::now().timestamp())
}

/// Issues a token stamped with `issued_at` (seconds since epoch).
pub fn issue_at(
    request: IssueRequest<'_>,
    signing_key: Option<&SigningKey>,
    issued_at: i64,
) -> LicenseResult<SignedToken> {
    let signing_key = signing_key.ok_or(LicenseError::NotConfigured)?;
    let envelope = build_envelope(request, issued_at)?;
    sign_envelope(&envelope, signing_key)
}

/// Builds the envelope for an issuance event without signing it.
pub fn build_envelope(request: IssueRequest<'_>, issued_at: i64) -> LicenseResult<LicenseEnvelope> {
    if request.validity_days == 0 {
        return Err(LicenseError::InvalidParameter(
            "validity_days must be positive".to_string(),
        ));
    }
    let expires_at = i64::from(request.validity_days)
        .checked_mul(SECS_PER_DAY)
        .and_then(|span| issued_at.checked_add(span))
        .ok_or_else(|| LicenseError::InvalidParameter("expiry overflows".to_string()))?;

    let display_name = if request.display_name.is_empty() {
        ANONYMOUS.to_string()
    } else {
        request.display_name.to_string()
    };

    Ok(LicenseEnvelope {
        owner_id: request.owner_id,
        display_name,
        issued_at,
        expires_at,
        cohort: request.cohort.to_string(),
        discount_code: discount_code(request.owner_id),
        key_id: key_id(request.owner_id, issued_at),
    })
}

/// Serializes and signs an envelope.
pub fn sign_envelope(
    envelope: &LicenseEnvelope,
    signing_key: &SigningKey,
) -> LicenseResult<SignedToken> {
    let bytes = encode_envelope(envelope)?;
    let signature = signing_key.sign(&bytes);
    Ok(SignedToken::from_parts(bytes, signature.to_vec()))
}
