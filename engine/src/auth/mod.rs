//! # Authentication
//!
//! ```text
//! nonce.rs  : NonceAuthenticator: wallet challenge/response sign-in
//! session.rs: SessionIssuer: stateless HS256 session credentials
//! ```

pub mod nonce;
pub mod session;

pub use nonce::NonceAuthenticator;
pub use session::{Session, SessionClaims, SessionGrant, SessionIssuer};
