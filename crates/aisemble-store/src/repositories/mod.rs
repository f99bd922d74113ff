//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! parameter; callers own connection checkout and transaction scope.

pub mod message;
pub mod session;
pub mod transcript;
