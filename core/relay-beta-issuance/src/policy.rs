//! Decides whether a requesting owner gets a new token, their old one, or
//! nothing.

use relay_beta_license::{IssueRequest, SigningKey, issue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{IssuanceError, IssuanceResult};
use crate::record::IssuedToken;
use crate::registry::{SaveIssued, TokenRegistry};

/// Default token lifetime in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 7;

/// Default cohort tag stamped into new tokens.
pub const DEFAULT_COHORT: &str = "beta-jan-2026";

/// Default cap on the number of tokens ever issued.
pub const DEFAULT_MAX_BETA_USERS: u64 = 100;

/// Knobs for new tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceSettings {
    pub validity_days: u32,
    pub cohort: String,
    pub max_beta_users: u64,
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
            cohort: DEFAULT_COHORT.to_string(),
            max_beta_users: DEFAULT_MAX_BETA_USERS,
        }
    }
}

/// Result of a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// A fresh token was signed; `number` is the issued-count after it.
    Issued { token: IssuedToken, number: u64 },
    /// The owner already had a token; it is returned unchanged.
    AlreadyHave(IssuedToken),
    /// Every beta slot is taken.
    NoSlots,
}

impl IssuanceOutcome {
    /// The token handed back to the caller, if any.
    #[must_use]
    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Issued { token, .. } | Self::AlreadyHave(token) => Some(token),
            Self::NoSlots => None,
        }
    }
}

/// Snapshot of issuance capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IssuanceStats {
    pub issued: u64,
    pub cap: u64,
    pub slots_left: u64,
}

/// Issues beta tokens against a [`TokenRegistry`].
pub struct IssuancePolicy<R> {
    registry: R,
    signing_key: Option<SigningKey>,
    settings: IssuanceSettings,
}

impl<R: TokenRegistry> IssuancePolicy<R> {
    /// Creates a policy. A `None` signing key still serves existing tokens
    /// and stats, but new issuance fails with `NotConfigured`.
    pub fn new(registry: R, signing_key: Option<SigningKey>, settings: IssuanceSettings) -> Self {
        Self {
            registry,
            signing_key,
            settings,
        }
    }

    pub fn settings(&self) -> &IssuanceSettings {
        &self.settings
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Returns the owner's existing token, or signs and records a new one if
    /// a slot is free.
    pub fn request_token(
        &self,
        owner_id: i64,
        display_name: &str,
    ) -> IssuanceResult<IssuanceOutcome> {
        if let Some(existing) = self.registry.load_issued_token(owner_id)? {
            debug!("Owner {} already holds key {}", owner_id, existing.envelope().key_id);
            return Ok(IssuanceOutcome::AlreadyHave(existing));
        }

        let cap = self.settings.max_beta_users;
        let issued = self.registry.issued_count()?;
        if issued >= cap {
            info!("No beta slots left for owner {} ({}/{})", owner_id, issued, cap);
            return Ok(IssuanceOutcome::NoSlots);
        }

        let request = IssueRequest {
            owner_id,
            display_name,
            validity_days: self.settings.validity_days,
            cohort: &self.settings.cohort,
        };
        let signed = issue(request, self.signing_key.as_ref()).map_err(|e| {
            let e = IssuanceError::from(e);
            if matches!(e, IssuanceError::NotConfigured) {
                error!("Cannot issue beta token: signing key not configured");
            }
            e
        })?;
        let token = IssuedToken::new(signed)?;

        match self.registry.save_issued_token(&token, cap)? {
            SaveIssued::Saved { issued_count } => {
                info!(
                    "Issued beta key {} to owner {} ({}/{})",
                    token.envelope().key_id,
                    owner_id,
                    issued_count,
                    cap
                );
                Ok(IssuanceOutcome::Issued {
                    token,
                    number: issued_count,
                })
            }
            SaveIssued::AlreadyIssued(existing) => {
                debug!("Owner {} was issued a key concurrently", owner_id);
                Ok(IssuanceOutcome::AlreadyHave(existing))
            }
            SaveIssued::CapReached { issued_count } => {
                info!(
                    "Beta slots filled before owner {} could be issued ({}/{})",
                    owner_id, issued_count, cap
                );
                Ok(IssuanceOutcome::NoSlots)
            }
        }
    }

    /// Reports issued, cap and remaining slots.
    pub fn stats(&self) -> IssuanceResult<IssuanceStats> {
        let issued = self.registry.issued_count()?;
        let cap = self.settings.max_beta_users;
        Ok(IssuanceStats {
            issued,
            cap,
            slots_left: cap.saturating_sub(issued),
        })
    }
}
