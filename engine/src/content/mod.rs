//! # Content
//!
//! ```text
//! gate.rs   : ContentGate: full body or preview, per requester
//! service.rs: ContentService: create, read, list, edit, delete, pin
//! ```

pub mod gate;
pub mod service;

pub use gate::{preview, AccessBasis, ContentGate};
pub use service::{AuthorSummary, ContentService, GatedContent, ListParams};
