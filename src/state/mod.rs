//! Local persistence of created templates.
//!
//! A template created on the provider is recorded here keyed by its logical
//! name and spec hash, so later runs reuse it without any provider call.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalTemplateStore;
pub use lock::{LOCK_TTL_SECS, LockRecord, current_holder};
pub use store::TemplateStore;
pub use types::{RECORD_VERSION, StoredTemplate};
