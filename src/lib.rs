#![warn(rust_2018_idioms)]

//! A reactive, in-memory, keyed observable cache.
//!
//! An [`cache::ObservableCache`] holds a set of key/value pairs behind a
//! single writer lock and publishes every edit as a [`changeset::ChangeSet`]
//! — the minimal set of [`change::Change`]s (add, update, remove, refresh,
//! move) a subscriber needs to bring its own downstream view up to date.
//! The [`operators`] module is a composable algebra over that stream:
//! filtering, sorting, paging, virtualizing, grouping, joining,
//! transforming, expiring, and combining one or more changeset streams
//! into another, each operator stateful only in the bookkeeping it needs
//! to emit a correct diff rather than a full reload.
//!
//! ```
//! use reactive_cache::cache::ObservableCache;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Trade {
//!     id: u32,
//!     price: f64,
//! }
//!
//! let cache = ObservableCache::new(|trade: &Trade| trade.id);
//! cache.edit(|updater| {
//!     updater.add_or_update(Trade { id: 1, price: 101.5 });
//! });
//! assert_eq!(cache.lookup(&1).map(|t| t.price), Some(101.5));
//! ```

pub mod cache;
pub mod change;
pub mod changeset;
pub mod error;
pub mod key_value_collection;
pub mod operators;
pub mod revision;
pub mod subject;

pub use crate::cache::ObservableCache;
pub use crate::change::{Change, ChangeReason};
pub use crate::changeset::ChangeSet;
pub use crate::error::CacheError;
pub use crate::revision::Revision;
pub use crate::subject::{Notification, Subject};
