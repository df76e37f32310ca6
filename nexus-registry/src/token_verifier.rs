use async_trait::async_trait;
use nexus_core::ids::AccountId;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub account_id: AccountId,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenVerifyError {
    #[error("token missing")]
    Missing,
    #[error("token invalid: {0}")]
    Invalid(String),
}

/// `TokenVerifier.verify(token) -> {account_id, email?} | error`. The
/// identity provider itself is explicitly out of scope; this crate only
/// pins down the contract a room relies on.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: Option<&str>) -> Result<VerifiedIdentity, TokenVerifyError>;
}

/// No verifier configured: the transport-assigned session id stands in for
/// the account id, with a logged warning. This is NOT a stand-in for real
/// auth in production; it exists so a room can run with `identity provider
/// mode: none`.
pub struct AlwaysAllowVerifier;

#[async_trait]
impl TokenVerifier for AlwaysAllowVerifier {
    async fn verify(&self, token: Option<&str>) -> Result<VerifiedIdentity, TokenVerifyError> {
        log::warn!("no TokenVerifier configured; trusting transport-assigned identity");
        let account_id = match token {
            Some(t) => t
                .parse()
                .map(AccountId::from)
                .unwrap_or_else(|_| AccountId::new()),
            None => AccountId::new(),
        };
        Ok(VerifiedIdentity {
            account_id,
            email: None,
        })
    }
}
