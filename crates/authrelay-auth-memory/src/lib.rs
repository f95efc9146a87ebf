//! # authrelay-auth-memory
//!
//! In-memory implementations of the `authrelay-auth` storage traits,
//! suitable for tests, demos, and single-process deployments. Data does
//! not survive a restart; use a persistent backend in production.

pub mod session;
pub mod user;

pub use session::MemorySessionStorage;
pub use user::MemoryUserStorage;
