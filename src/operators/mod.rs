//! The operator algebra: stateful, per-subscription transforms of one
//! changeset stream into another. Each operator is self-contained —
//! given the previous upstream changeset(s) (and, for some, an external
//! signal from `controllers`), it returns the downstream changeset —
//! and carries no knowledge of how it is wired into a subscription.

pub mod batch_if;
pub mod bind;
pub mod combine;
pub mod controllers;
pub mod defer_until_loaded;
pub mod distinct;
pub mod expire;
pub mod filter;
pub mod group;
pub mod join;
pub mod merge_many;
pub mod page;
pub mod query_when_changed;
pub mod refcount;
pub mod sort;
pub mod switch;
pub mod transform;
pub mod tree;
pub mod virtualise;

pub use batch_if::{Batch, BatchIf};
pub use bind::{Bind, Bindable, VecTarget};
pub use combine::{CombineOp, Combiner};
pub use controllers::{Controller, PageController, SignalController, VirtualController};
pub use defer_until_loaded::DeferUntilLoaded;
pub use distinct::DistinctValues;
pub use expire::{SizeExpirer, TimeExpirer};
pub use filter::{DynamicFilter, Predicate, StaticFilter};
pub use group::{GroupOn, GroupOnImmutable, GroupSnapshot};
pub use join::{Join, JoinKey, JoinKind, JoinRow};
pub use merge_many::MergeMany;
pub use page::{Page, PageRequest, PageResponse};
pub use query_when_changed::QueryWhenChanged;
pub use refcount::{RefCount, RefCountGuard};
pub use sort::{Comparer, Sort};
pub use switch::Switch;
pub use transform::{BoxFuture, Transform, TransformAsync, TransformMany};
pub use tree::{Node, TreeBuilder};
pub use virtualise::{Virtualise, VirtualRequest, VirtualResponse};
