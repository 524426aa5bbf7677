//! # AccessPolicy
//!
//! Who may do what to a content item.
//!
//! | Action          | Allowed for                         |
//! |-----------------|-------------------------------------|
//! | create          | any signed-in identity              |
//! | update, delete  | the owner, moderators and admins    |
//! | pin, unpin      | moderators and admins only          |

use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{ContentItem, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
    Pin,
    Unpin,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Pin => "pin",
            Action::Unpin => "unpin",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `actor` holding `role` may perform `action` on `item`.
///
/// `item` is `None` only for [`Action::Create`]; any other action without an
/// item is denied.
pub fn can_perform(action: Action, role: Role, actor: Uuid, item: Option<&ContentItem>) -> bool {
    match (action, item) {
        (Action::Create, _) => true,
        (Action::Update | Action::Delete, Some(item)) => item.is_owned_by(actor) || role.is_staff(),
        (Action::Pin | Action::Unpin, Some(_)) => role.is_staff(),
        (_, None) => false,
    }
}

/// [`can_perform`], as a `Forbidden` error when the answer is no.
pub fn authorize(action: Action, role: Role, actor: Uuid, item: Option<&ContentItem>) -> Result<()> {
    if can_perform(action, role, actor, item) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "You are not allowed to {action} this content"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewContentItem;

    fn item(owner: Uuid) -> ContentItem {
        ContentItem::new(
            owner,
            NewContentItem {
                title: "t".into(),
                body: "b".into(),
                image_url: None,
                price_amount: 1,
            },
        )
    }

    #[test]
    fn anyone_signed_in_can_create() {
        for role in [Role::Reader, Role::Journalist, Role::Moderator, Role::Admin] {
            assert!(can_perform(Action::Create, role, Uuid::new_v4(), None));
        }
    }

    #[test]
    fn owners_edit_their_own_content() {
        let owner = Uuid::new_v4();
        let item = item(owner);
        assert!(can_perform(Action::Update, Role::Reader, owner, Some(&item)));
        assert!(can_perform(Action::Delete, Role::Journalist, owner, Some(&item)));
        assert!(!can_perform(Action::Update, Role::Journalist, Uuid::new_v4(), Some(&item)));
    }

    #[test]
    fn staff_edit_anything() {
        let item = item(Uuid::new_v4());
        for role in [Role::Moderator, Role::Admin] {
            assert!(can_perform(Action::Update, role, Uuid::new_v4(), Some(&item)));
            assert!(can_perform(Action::Delete, role, Uuid::new_v4(), Some(&item)));
        }
    }

    #[test]
    fn only_staff_pin() {
        let owner = Uuid::new_v4();
        let item = item(owner);
        assert!(!can_perform(Action::Pin, Role::Journalist, owner, Some(&item)));
        assert!(!can_perform(Action::Unpin, Role::Reader, owner, Some(&item)));
        assert!(can_perform(Action::Pin, Role::Moderator, Uuid::new_v4(), Some(&item)));
        assert!(can_perform(Action::Unpin, Role::Admin, Uuid::new_v4(), Some(&item)));
    }

    #[test]
    fn item_actions_without_an_item_are_denied() {
        assert!(!can_perform(Action::Delete, Role::Admin, Uuid::new_v4(), None));
    }

    #[test]
    fn authorize_names_the_action() {
        let item = item(Uuid::new_v4());
        let err = authorize(Action::Pin, Role::Reader, Uuid::new_v4(), Some(&item)).unwrap_err();
        assert_eq!(err, Error::forbidden("You are not allowed to pin this content"));
    }
}
