//! Content lifecycle: create, read through the gate, list, edit, delete, pin.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::gate::{preview, AccessBasis, ContentGate};
use crate::auth::Session;
use crate::crypto::Address;
use crate::error::{Error, Result};
use crate::model::{ContentItem, ContentQuery, ContentUpdate, Identity, NewContentItem};
use crate::policy::{self, Action};
use crate::storage::Store;

/// Public view of an item's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub wallet_address: Address,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl From<&Identity> for AuthorSummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            wallet_address: identity.wallet_address,
            username: identity.username.clone(),
            avatar: identity.avatar.clone(),
        }
    }
}

/// An item as one particular requester sees it. `item.body` is already
/// gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatedContent {
    #[serde(flatten)]
    pub item: ContentItem,
    pub author: Option<AuthorSummary>,
    pub unlocked: bool,
    pub access: AccessBasis,
}

/// Listing parameters as a caller supplies them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub search: Option<String>,
    /// Only items owned by this wallet.
    pub author: Option<Address>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn Store>,
    gate: ContentGate,
}

impl ContentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            gate: ContentGate::new(store.clone()),
            store,
        }
    }

    pub fn gate(&self) -> &ContentGate {
        &self.gate
    }

    #[instrument(skip(self, session, draft), fields(owner = %session.identity_id))]
    pub fn create(&self, session: &Session, draft: NewContentItem) -> Result<ContentItem> {
        policy::authorize(Action::Create, session.role, session.identity_id, None)?;
        check_title(&draft.title)?;
        check_body(&draft.body)?;

        let item = ContentItem::new(session.identity_id, draft);
        self.store.put_content(&item)?;
        info!(content_id = %item.id, price = item.price_amount, "content created");
        Ok(item)
    }

    /// Fetch one item, gated for `session` (or an anonymous reader).
    pub fn get(
        &self,
        id: Uuid,
        session: Option<&Session>,
        share_token: Option<&str>,
    ) -> Result<GatedContent> {
        let mut item = self.live_item(id)?;
        let requester = session.map(|s| s.identity_id);
        let access = self.gate.access(&item, requester, share_token)?;
        if !access.is_unlocked() {
            item.body = preview(&item.body);
        }
        debug!(content_id = %id, %access, "content read");

        let author = self.author_of(&item)?;
        Ok(GatedContent {
            item,
            author,
            unlocked: access.is_unlocked(),
            access,
        })
    }

    /// A page of live items. Bodies are always the preview; `unlocked` says
    /// whether the requester could read the full body.
    pub fn list(&self, params: ListParams, session: Option<&Session>) -> Result<Vec<GatedContent>> {
        let mut query = ContentQuery::new(params.limit, params.offset);
        query.search = params.search;
        if let Some(wallet) = params.author {
            match self.store.find_identity_by_wallet(&wallet)? {
                Some(author) => query.owner_id = Some(author.id),
                None => return Ok(Vec::new()),
            }
        }

        let requester = session.map(|s| s.identity_id);
        let mut authors: HashMap<Uuid, Option<AuthorSummary>> = HashMap::new();
        let mut page = Vec::new();
        for mut item in self.store.list_content(&query)? {
            let access = self.gate.access(&item, requester, None)?;
            item.body = preview(&item.body);
            let author = match item.owner_id {
                Some(owner) => match authors.get(&owner) {
                    Some(cached) => cached.clone(),
                    None => {
                        let summary = self.author_of(&item)?;
                        authors.insert(owner, summary.clone());
                        summary
                    }
                },
                None => None,
            };
            page.push(GatedContent {
                item,
                author,
                unlocked: access.is_unlocked(),
                access,
            });
        }
        Ok(page)
    }

    #[instrument(skip(self, session, update), fields(actor = %session.identity_id))]
    pub fn update(&self, id: Uuid, session: &Session, update: ContentUpdate) -> Result<ContentItem> {
        let item = self.live_item(id)?;
        policy::authorize(Action::Update, session.role, session.identity_id, Some(&item))?;
        if let Some(title) = &update.title {
            check_title(title)?;
        }
        if let Some(body) = &update.body {
            check_body(body)?;
        }

        let item = self
            .store
            .modify_content(id, &|item| update.clone().apply(item))?;
        info!(content_id = %id, "content updated");
        Ok(item)
    }

    /// Soft delete. Payment records keep pointing at the item.
    #[instrument(skip(self, session), fields(actor = %session.identity_id))]
    pub fn delete(&self, id: Uuid, session: &Session) -> Result<()> {
        let item = self.live_item(id)?;
        policy::authorize(Action::Delete, session.role, session.identity_id, Some(&item))?;

        self.store.modify_content(id, &|item| {
            let now = Utc::now();
            item.deleted_at = Some(now);
            item.updated_at = now;
        })?;
        info!(content_id = %id, "content deleted");
        Ok(())
    }

    pub fn pin(&self, id: Uuid, session: &Session) -> Result<ContentItem> {
        self.set_pinned(id, session, Action::Pin)
    }

    pub fn unpin(&self, id: Uuid, session: &Session) -> Result<ContentItem> {
        self.set_pinned(id, session, Action::Unpin)
    }

    fn set_pinned(&self, id: Uuid, session: &Session, action: Action) -> Result<ContentItem> {
        let item = self.live_item(id)?;
        policy::authorize(action, session.role, session.identity_id, Some(&item))?;

        let pin = matches!(action, Action::Pin);
        let item = self
            .store
            .modify_content(id, &|item| item.pinned_at = pin.then(Utc::now))?;
        info!(content_id = %id, %action, "pin status changed");
        Ok(item)
    }

    fn live_item(&self, id: Uuid) -> Result<ContentItem> {
        self.store
            .find_content(id)?
            .filter(|item| !item.is_deleted())
            .ok_or_else(|| Error::not_found("Content not found"))
    }

    fn author_of(&self, item: &ContentItem) -> Result<Option<AuthorSummary>> {
        Ok(match item.owner_id {
            Some(owner) => self.store.find_identity(owner)?.as_ref().map(AuthorSummary::from),
            None => None,
        })
    }
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::validation("Title is required"));
    }
    Ok(())
}

fn check_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::validation("Content body is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{PaymentRecord, Role};
    use crate::storage::SledStore;

    struct Fixture {
        store: Arc<SledStore>,
        service: ContentService,
        author: Session,
        reader: Session,
        moderator: Session,
    }

    fn session(store: &SledStore, seed: u8, role: Role) -> Session {
        let wallet = Address::new([seed; 32]);
        let identity = store.issue_challenge(&wallet, "1").unwrap();
        store.set_role(identity.id, role).unwrap();
        Session {
            identity_id: identity.id,
            wallet,
            role,
        }
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        Fixture {
            author: session(&store, 1, Role::Journalist),
            reader: session(&store, 2, Role::Reader),
            moderator: session(&store, 3, Role::Moderator),
            service: ContentService::new(store.clone()),
            store,
        }
    }

    fn draft(title: &str, price: u64) -> NewContentItem {
        NewContentItem {
            title: title.into(),
            body: "x".repeat(1000),
            image_url: None,
            price_amount: price,
        }
    }

    #[test]
    fn create_requires_title_and_body() {
        let fx = fixture();
        let err = fx.service.create(&fx.author, draft("   ", 0)).unwrap_err();
        assert_eq!(err, Error::validation("Title is required"));

        let mut empty = draft("Title", 0);
        empty.body = "\n".into();
        assert_eq!(fx.service.create(&fx.author, empty).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn get_gates_the_body() {
        let fx = fixture();
        let item = fx.service.create(&fx.author, draft("Paid", 10)).unwrap();

        let anonymous = fx.service.get(item.id, None, None).unwrap();
        assert!(!anonymous.unlocked);
        assert_eq!(anonymous.item.body.chars().count(), 300);
        assert_eq!(anonymous.author.unwrap().wallet_address, fx.author.wallet);

        let owner = fx.service.get(item.id, Some(&fx.author), None).unwrap();
        assert!(owner.unlocked);
        assert_eq!(owner.access, AccessBasis::Owner);
        assert_eq!(owner.item.body.len(), 1000);

        fx.store
            .insert_payment(&PaymentRecord::new(item.id, fx.reader.identity_id, 10, "r"))
            .unwrap();
        let paid = fx.service.get(item.id, Some(&fx.reader), None).unwrap();
        assert_eq!(paid.access, AccessBasis::Paid);
        assert_eq!(paid.item.body.len(), 1000);
    }

    #[test]
    fn list_always_previews_but_reports_unlocked() {
        let fx = fixture();
        let paid = fx.service.create(&fx.author, draft("Paid", 10)).unwrap();
        fx.service.create(&fx.author, draft("Free", 0)).unwrap();

        let page = fx.service.list(ListParams::default(), Some(&fx.author)).unwrap();
        assert_eq!(page.len(), 2);
        for entry in &page {
            assert_eq!(entry.item.body.chars().count(), 300);
            assert!(entry.unlocked);
        }

        let page = fx.service.list(ListParams::default(), Some(&fx.reader)).unwrap();
        let paid_entry = page.iter().find(|e| e.item.id == paid.id).unwrap();
        assert!(!paid_entry.unlocked);
    }

    #[test]
    fn list_filters_by_author_wallet_and_search() {
        let fx = fixture();
        fx.service.create(&fx.author, draft("Rust weekly", 0)).unwrap();
        fx.service.create(&fx.reader, draft("Gardening", 0)).unwrap();

        let by_author = fx
            .service
            .list(
                ListParams {
                    author: Some(fx.author.wallet),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].item.title, "Rust weekly");

        let searched = fx
            .service
            .list(
                ListParams {
                    search: Some("GARDEN".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(searched.len(), 1);

        let unknown = fx
            .service
            .list(
                ListParams {
                    author: Some(Address::new([99u8; 32])),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn only_owner_or_staff_update() {
        let fx = fixture();
        let item = fx.service.create(&fx.author, draft("Original", 10)).unwrap();
        let edit = ContentUpdate {
            title: Some("Edited".into()),
            ..Default::default()
        };

        let err = fx.service.update(item.id, &fx.reader, edit.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let updated = fx.service.update(item.id, &fx.author, edit.clone()).unwrap();
        assert_eq!(updated.title, "Edited");
        fx.service.update(item.id, &fx.moderator, edit).unwrap();
    }

    #[test]
    fn missing_item_is_not_found_before_forbidden() {
        let fx = fixture();
        let err = fx.service.pin(Uuid::new_v4(), &fx.reader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn deleted_items_disappear() {
        let fx = fixture();
        let item = fx.service.create(&fx.author, draft("Gone soon", 10)).unwrap();
        assert_eq!(fx.service.delete(item.id, &fx.reader).unwrap_err().kind(), ErrorKind::Forbidden);

        fx.service.delete(item.id, &fx.author).unwrap();
        assert_eq!(fx.service.get(item.id, None, None).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(fx.service.list(ListParams::default(), None).unwrap().is_empty());
        assert!(fx.store.find_content(item.id).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn edits_after_a_delete_do_not_resurrect() {
        let fx = fixture();
        let item = fx.service.create(&fx.author, draft("Retracted", 10)).unwrap();
        fx.service.delete(item.id, &fx.moderator).unwrap();

        let edit = ContentUpdate {
            title: Some("Unretracted".into()),
            ..Default::default()
        };
        assert_eq!(
            fx.service.update(item.id, &fx.author, edit).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(fx.service.pin(item.id, &fx.moderator).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(fx.service.delete(item.id, &fx.author).unwrap_err().kind(), ErrorKind::NotFound);

        let stored = fx.store.find_content(item.id).unwrap().unwrap();
        assert!(stored.is_deleted());
        assert_eq!(stored.title, "Retracted");
        assert!(stored.pinned_at.is_none());
    }

    #[test]
    fn racing_edits_and_delete_leave_the_item_deleted() {
        let fx = fixture();
        let item = fx.service.create(&fx.author, draft("Contested", 10)).unwrap();

        std::thread::scope(|scope| {
            for n in 0..4u64 {
                let (service, author) = (&fx.service, &fx.author);
                scope.spawn(move || {
                    for price in 0..25 {
                        let edit = ContentUpdate {
                            price_amount: Some(n * 100 + price),
                            ..Default::default()
                        };
                        let _ = service.update(item.id, author, edit);
                    }
                });
            }
            let (service, moderator) = (&fx.service, &fx.moderator);
            scope.spawn(move || service.delete(item.id, moderator).unwrap());
        });

        assert!(fx.store.find_content(item.id).unwrap().unwrap().is_deleted());
        assert!(fx.service.list(ListParams::default(), None).unwrap().is_empty());
    }

    #[test]
    fn pinning_is_for_staff_and_reorders_the_listing() {
        let fx = fixture();
        let older = fx.service.create(&fx.author, draft("Older", 0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        fx.service.create(&fx.author, draft("Newer", 0)).unwrap();

        assert_eq!(fx.service.pin(older.id, &fx.author).unwrap_err().kind(), ErrorKind::Forbidden);
        let pinned = fx.service.pin(older.id, &fx.moderator).unwrap();
        assert!(pinned.pinned_at.is_some());

        let page = fx.service.list(ListParams::default(), None).unwrap();
        assert_eq!(page[0].item.title, "Older");

        fx.service.unpin(older.id, &fx.moderator).unwrap();
        let page = fx.service.list(ListParams::default(), None).unwrap();
        assert_eq!(page[0].item.title, "Newer");
    }
}
