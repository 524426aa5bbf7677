//! Content items: the things readers pay for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};

/// A piece of written content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    /// Owning identity. Content can outlive its author's account.
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    /// Price in base units of the payment asset. Zero means free.
    pub price_amount: u64,
    pub pinned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Payment records keep pointing at deleted items.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(owner_id: Uuid, draft: NewContentItem) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: Some(owner_id),
            title: draft.title.trim().to_string(),
            body: draft.body,
            image_url: draft.image_url,
            price_amount: draft.price_amount,
            pinned_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.price_amount == 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, identity_id: Uuid) -> bool {
        self.owner_id == Some(identity_id)
    }
}

/// What an author submits to create content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContentItem {
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, alias = "price")]
    pub price_amount: u64,
}

/// A partial edit. Missing fields stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
    pub title: Option<String>,
    #[serde(alias = "content")]
    pub body: Option<String>,
    pub image_url: Option<String>,
    #[serde(alias = "price")]
    pub price_amount: Option<u64>,
}

impl ContentUpdate {
    pub fn apply(self, item: &mut ContentItem) {
        if let Some(title) = self.title {
            item.title = title.trim().to_string();
        }
        if let Some(body) = self.body {
            item.body = body;
        }
        if let Some(image_url) = self.image_url {
            item.image_url = (!image_url.is_empty()).then_some(image_url);
        }
        if let Some(price) = self.price_amount {
            item.price_amount = price;
        }
        item.updated_at = Utc::now();
    }
}

/// A resolved listing query as the store sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    /// Case-insensitive substring match over title and body.
    pub search: Option<String>,
    pub owner_id: Option<Uuid>,
    pub limit: usize,
    pub offset: usize,
}

impl ContentQuery {
    /// Clamp caller-supplied paging to sane bounds.
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            search: None,
            owner_id: None,
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        if item.is_deleted() {
            return false;
        }
        if let Some(owner) = self.owner_id {
            if item.owner_id != Some(owner) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                item.title.to_lowercase().contains(&needle)
                    || item.body.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self::new(None, None)
    }
}
