//! Share grants: bearer tokens that unlock one item for whoever holds them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareGrant {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareGrant {
    /// A fresh grant with a random v4 token.
    pub fn new(content_item_id: Uuid, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_item_id,
            token: Uuid::new_v4(),
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Whether this grant unlocks `content_item_id` right now.
    pub fn unlocks(&self, content_item_id: Uuid, now: DateTime<Utc>) -> bool {
        self.content_item_id == content_item_id && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_without_ttl_never_expire() {
        let grant = ShareGrant::new(Uuid::new_v4(), None);
        assert!(!grant.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn grants_expire_at_their_deadline() {
        let grant = ShareGrant::new(Uuid::new_v4(), Some(Duration::seconds(60)));
        let deadline = grant.expires_at.unwrap();
        assert!(!grant.is_expired_at(deadline - Duration::seconds(1)));
        assert!(grant.is_expired_at(deadline));
    }

    #[test]
    fn grant_only_unlocks_its_own_item() {
        let item = Uuid::new_v4();
        let grant = ShareGrant::new(item, None);
        assert!(grant.unlocks(item, Utc::now()));
        assert!(!grant.unlocks(Uuid::new_v4(), Utc::now()));
    }

    #[test]
    fn tokens_are_v4() {
        let grant = ShareGrant::new(Uuid::new_v4(), None);
        assert_eq!(grant.token.get_version_num(), 4);
    }
}
