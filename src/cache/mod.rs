//! The keyed, observable, mutable store at the center of the crate,
//! and the thin handles built around it.

pub(crate) mod change_aware_cache;
mod edit;
mod intermediate_cache;
mod observable_cache;
mod reader_writer;
mod source_cache;

pub use edit::Updater;
pub use intermediate_cache::IntermediateCache;
pub use observable_cache::{ConnectStream, CountChanged, ObservableCache, Watch};
pub use source_cache::SourceCache;
