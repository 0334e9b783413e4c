//! # Liaison Storage
//!
//! Directory store abstraction for Liaison.
//!
//! The authentication core only sees users and groups through a
//! [`DirectoryStore`], and every read or write happens inside a
//! [`UnitOfWork`] that either commits in full or leaves no trace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;

pub use backend::{DirectoryStore, UnitOfWork};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use model::{GroupId, LocalGroup, LocalUser, UserId};
