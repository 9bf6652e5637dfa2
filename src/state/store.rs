//! Template store trait definition.

use async_trait::async_trait;

use super::types::StoredTemplate;
use crate::error::Result;

/// Trait for template storage backends.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Loads the record for a name and spec hash.
    ///
    /// Returns `None` if no such template was recorded.
    async fn load(&self, name: &str, spec_hash: &str) -> Result<Option<StoredTemplate>>;

    /// Saves a record, replacing any previous one for the same key.
    async fn save(&self, record: &StoredTemplate) -> Result<()>;

    /// Lists all records in a deterministic order.
    async fn list(&self) -> Result<Vec<StoredTemplate>>;

    /// Removes every record pointing at a provider template ID.
    ///
    /// Returns the number of records removed.
    async fn remove_by_template_id(&self, template_id: &str) -> Result<usize>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
