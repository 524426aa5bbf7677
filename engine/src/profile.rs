//! Public profiles attached to wallet identities.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::crypto::Address;
use crate::error::{Error, Result};
use crate::model::{Identity, ProfileUpdate, Role};
use crate::storage::Store;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Longest accepted bio, in characters.
pub const MAX_BIO_LENGTH: usize = 500;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, identity_id: Uuid) -> Result<Identity> {
        self.store
            .find_identity(identity_id)?
            .ok_or_else(|| Error::not_found("Identity not found"))
    }

    pub fn get_by_wallet(&self, wallet: &str) -> Result<Identity> {
        let wallet = wallet
            .parse::<Address>()
            .map_err(|_| Error::validation("Invalid wallet address"))?;
        self.store
            .find_identity_by_wallet(&wallet)?
            .ok_or_else(|| Error::not_found("Identity not found"))
    }

    #[instrument(skip(self, update))]
    pub fn update(&self, identity_id: Uuid, update: &ProfileUpdate) -> Result<Identity> {
        if let Some(username) = update.username.as_deref().map(str::trim) {
            if username.chars().count() > MAX_USERNAME_LENGTH {
                return Err(Error::validation(format!(
                    "Username must be at most {MAX_USERNAME_LENGTH} characters"
                )));
            }
            if username.chars().any(char::is_whitespace) {
                return Err(Error::validation("Username must not contain spaces"));
            }
        }
        if let Some(bio) = &update.bio {
            if bio.trim().chars().count() > MAX_BIO_LENGTH {
                return Err(Error::validation(format!(
                    "Bio must be at most {MAX_BIO_LENGTH} characters"
                )));
            }
        }
        Ok(self.store.update_profile(identity_id, update)?)
    }

    /// Administrative role change. Takes effect at the identity's next
    /// sign-in; sessions already issued keep the role they were minted with.
    #[instrument(skip(self))]
    pub fn set_role(&self, wallet: &str, role: Role) -> Result<Identity> {
        let identity = self.get_by_wallet(wallet)?;
        let updated = self.store.set_role(identity.id, role)?;
        info!(identity = %updated.id, %role, "role changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::SledStore;

    fn service() -> (ProfileService, Arc<SledStore>) {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        (ProfileService::new(store.clone()), store)
    }

    fn username(name: &str) -> ProfileUpdate {
        ProfileUpdate {
            username: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_identities_are_not_found() {
        let (profiles, _) = service();
        assert_eq!(profiles.get(Uuid::new_v4()).unwrap_err().kind(), ErrorKind::NotFound);
        let wallet = Address::new([8u8; 32]).to_base58();
        assert_eq!(profiles.get_by_wallet(&wallet).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(profiles.get_by_wallet("???").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn usernames_are_unique() {
        let (profiles, store) = service();
        let ada = store.issue_challenge(&Address::new([1u8; 32]), "1").unwrap();
        let bob = store.issue_challenge(&Address::new([2u8; 32]), "1").unwrap();

        profiles.update(ada.id, &username("ada")).unwrap();
        let err = profiles.update(bob.id, &username("ADA")).unwrap_err();
        assert_eq!(err, Error::AlreadyExists("Username already taken".into()));

        // Re-saving your own name is fine.
        profiles.update(ada.id, &username("ada")).unwrap();
    }

    #[test]
    fn usernames_are_validated() {
        let (profiles, store) = service();
        let id = store.issue_challenge(&Address::new([1u8; 32]), "1").unwrap().id;
        assert_eq!(
            profiles.update(id, &username("two words")).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            profiles.update(id, &username(&"a".repeat(33))).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn set_role_by_wallet() {
        let (profiles, store) = service();
        let wallet = Address::new([3u8; 32]);
        store.issue_challenge(&wallet, "1").unwrap();

        let updated = profiles.set_role(&wallet.to_base58(), Role::Moderator).unwrap();
        assert_eq!(updated.role, Role::Moderator);
        assert_eq!(profiles.get_by_wallet(&wallet.to_base58()).unwrap().role, Role::Moderator);
    }
}
