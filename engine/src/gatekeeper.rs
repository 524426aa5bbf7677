//! # Gatekeeper
//!
//! One handle wiring every component to a single store and ledger. The
//! server builds exactly one of these at startup and shares it across
//! request handlers; nothing inside holds per-request state.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{NonceAuthenticator, Session, SessionIssuer};
use crate::config::{ConfigError, EngineConfig};
use crate::content::ContentService;
use crate::error::Result;
use crate::ledger::{Ledger, LedgerObserver};
use crate::model::PaymentRecord;
use crate::payment::PaymentVerifier;
use crate::profile::ProfileService;
use crate::share::SharableLinkIssuer;
use crate::storage::Store;

#[derive(Clone)]
pub struct Gatekeeper {
    config: Arc<EngineConfig>,
    store: Arc<dyn Store>,
    auth: NonceAuthenticator,
    verifier: PaymentVerifier,
    content: ContentService,
    shares: SharableLinkIssuer,
    profiles: ProfileService,
}

impl Gatekeeper {
    /// Validate `config` and assemble the components around `store` and
    /// `ledger`.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn Store>,
        ledger: Arc<dyn Ledger>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let sessions = SessionIssuer::new(&config.jwt_secret, config.session_ttl_secs)?;
        let observer = LedgerObserver::new(ledger, config.ledger.timeout());
        let verifier = PaymentVerifier::new(
            store.clone(),
            observer,
            config.payment_asset,
            config.revenue_split.clone(),
        );

        info!(
            asset = %config.payment_asset,
            split = config.revenue_split.is_some(),
            "gatekeeper ready"
        );

        Ok(Self {
            auth: NonceAuthenticator::new(store.clone(), sessions),
            shares: SharableLinkIssuer::new(
                store.clone(),
                verifier.clone(),
                config.share_grant_ttl_secs,
            ),
            content: ContentService::new(store.clone()),
            profiles: ProfileService::new(store.clone()),
            verifier,
            store,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn auth(&self) -> &NonceAuthenticator {
        &self.auth
    }

    pub fn sessions(&self) -> &SessionIssuer {
        self.auth.sessions()
    }

    pub fn verifier(&self) -> &PaymentVerifier {
        &self.verifier
    }

    pub fn content(&self) -> &ContentService {
        &self.content
    }

    pub fn shares(&self) -> &SharableLinkIssuer {
        &self.shares
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    /// Verify a payment made by the signed-in caller.
    pub async fn verify_payment(
        &self,
        session: &Session,
        content_item_id: Uuid,
        reference: &str,
    ) -> Result<PaymentRecord> {
        self.verifier
            .verify(content_item_id, session.identity_id, reference)
            .await
    }

    /// Every payment the caller has made, newest first.
    pub fn payments_for(&self, session: &Session) -> Result<Vec<PaymentRecord>> {
        let mut payments = self.store.payments_by_payer(session.identity_id)?;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::storage::SledStore;

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let ledger = Arc::new(InMemoryLedger::new());
        let err = Gatekeeper::new(EngineConfig::new("short"), store, ledger).err();
        assert!(matches!(err, Some(ConfigError::SecretTooShort(5))));
    }

    #[test]
    fn sessions_come_from_the_configured_secret() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let ledger = Arc::new(InMemoryLedger::new());
        let secret = "s".repeat(40);
        let gatekeeper = Gatekeeper::new(EngineConfig::new(secret.clone()), store, ledger).unwrap();

        let other = SessionIssuer::new(&secret, 60).unwrap();
        let identity = crate::model::Identity::new(crate::crypto::Address::new([1u8; 32]));
        let (token, _) = other.issue(&identity).unwrap();
        assert_eq!(gatekeeper.sessions().validate(&token).unwrap().identity_id, identity.id);
    }
}
