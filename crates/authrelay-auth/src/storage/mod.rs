//! Storage traits consumed by the handshake.
//!
//! The handshake treats both stores as opaque collaborators: sessions are a
//! per-user key-value record with atomic updates, users are a lookup/upsert
//! interface keyed by the provider-issued subject. Backends implement these
//! traits in sibling crates (e.g., `authrelay-auth-memory`).

pub mod session;
pub mod user;

pub use session::SessionStorage;
pub use user::{User, UserStorage};
