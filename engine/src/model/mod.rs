//! # Domain Records
//!
//! The four records the engine reasons about, plus the request-shaped
//! structs that create or change them. Everything here is plain data:
//! behaviour lives in the components that own each record.
//!
//! All records serialize with camelCase field names for the HTTP layer and
//! with bincode for storage, so none of them use serde attributes that
//! bincode can't honor (`skip_serializing_if`, internal tagging).

pub mod content;
pub mod identity;
pub mod payment;
pub mod share;

pub use content::{ContentItem, ContentQuery, ContentUpdate, NewContentItem};
pub use identity::{Challenge, Identity, ProfileUpdate, Role};
pub use payment::PaymentRecord;
pub use share::ShareGrant;
