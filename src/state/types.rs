//! Records kept in the local template store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runpod::PodTemplate;

/// Current version of the record format.
pub const RECORD_VERSION: &str = "1.0";

/// A template created (or adopted) on the provider, keyed by name and spec hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredTemplate {
    /// Record format version.
    pub version: String,
    /// Logical template name from the configuration.
    pub name: String,
    /// Hash of the creation spec.
    pub spec_hash: String,
    /// Full provider record.
    pub template: PodTemplate,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

impl StoredTemplate {
    /// Creates a new record for a provider template.
    #[must_use]
    pub fn new(name: &str, spec_hash: &str, template: PodTemplate) -> Self {
        Self {
            version: String::from(RECORD_VERSION),
            name: name.to_string(),
            spec_hash: spec_hash.to_string(),
            template,
            saved_at: Utc::now(),
        }
    }

    /// Returns the provider template ID.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template.id
    }
}
