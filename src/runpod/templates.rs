//! Template reuse-or-create logic.
//!
//! A template is reused only when both its logical name and its spec hash
//! match. The provider-side name carries a hash suffix, so a changed spec
//! produces a distinctly named template instead of silently reusing the old
//! one.

use tracing::{debug, info};

use crate::config::{SpecHasher, TemplateSpec};
use crate::error::{LifecycleError, PodrunError, Result, RunPodError};
use crate::state::{StoredTemplate, TemplateStore};

use super::api::RunPodApi;
use super::types::PodTemplate;

/// How a template was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Found in the local store; no provider call was made.
    Stored,
    /// Found on the provider and recorded locally.
    Adopted,
    /// Created on the provider and recorded locally.
    Created,
}

/// A resolved template.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// Provider record.
    pub template: PodTemplate,
    /// Hash of the spec it was resolved for.
    pub spec_hash: String,
    /// How it was obtained.
    pub resolution: Resolution,
}

/// Resolves template specs to provider template IDs.
pub struct TemplateResolver<'a, A: RunPodApi + ?Sized, S: TemplateStore + ?Sized> {
    /// Provider API.
    api: &'a A,
    /// Local record store.
    store: &'a S,
    /// Spec hasher.
    hasher: SpecHasher,
}

impl ResolvedTemplate {
    /// Returns the provider template ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.template.id
    }
}

impl<'a, A: RunPodApi + ?Sized, S: TemplateStore + ?Sized> TemplateResolver<'a, A, S> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(api: &'a A, store: &'a S) -> Self {
        Self {
            api,
            store,
            hasher: SpecHasher::new(),
        }
    }

    /// Returns the ID of a template matching `spec`, creating one if needed.
    ///
    /// # Errors
    ///
    /// Returns `TemplateCreation` if the provider rejects the creation
    /// request, or any store or transport error.
    pub async fn resolve_template(&self, spec: &TemplateSpec) -> Result<ResolvedTemplate> {
        let spec_hash = self.hasher.hash_template(spec);
        let short = self.hasher.short_hash(&spec_hash);

        if let Some(record) = self.store.load(&spec.name, &spec_hash).await? {
            info!(
                "Using stored template '{}' ({short}): {}",
                spec.name,
                record.template_id()
            );
            return Ok(ResolvedTemplate {
                template: record.template,
                spec_hash,
                resolution: Resolution::Stored,
            });
        }

        let qualified = self.hasher.qualified_name(spec);
        debug!("No stored template for '{}', checking provider for '{qualified}'", spec.name);

        let existing = self
            .api
            .list_templates()
            .await?
            .into_iter()
            .find(|t| t.name == qualified);

        let (template, resolution) = if let Some(template) = existing {
            info!("Template '{qualified}' already exists: {}", template.id);
            (template, Resolution::Adopted)
        } else {
            info!("Creating template '{qualified}' from image {}", spec.image);
            let template = self
                .api
                .create_template(&qualified, spec)
                .await
                .map_err(|e| creation_error(&qualified, e))?;
            info!("Template created: {}", template.id);
            (template, Resolution::Created)
        };

        let record = StoredTemplate::new(&spec.name, &spec_hash, template);
        self.store.save(&record).await?;

        Ok(ResolvedTemplate {
            template: record.template,
            spec_hash,
            resolution,
        })
    }

    /// Lists the templates owned by the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_remote(&self) -> Result<Vec<PodTemplate>> {
        self.api.list_templates().await
    }

    /// Deletes a template on the provider and forgets any local record of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refuses the deletion or the store
    /// cannot be updated.
    pub async fn delete(&self, template_id: &str) -> Result<()> {
        self.api.delete_template(template_id).await?;
        info!("Template deleted: {template_id}");

        let removed = self.store.remove_by_template_id(template_id).await?;
        debug!("Removed {removed} local record(s) for {template_id}");
        Ok(())
    }
}

/// Turns a provider rejection into a `TemplateCreation` error.
fn creation_error(name: &str, error: PodrunError) -> PodrunError {
    match error {
        PodrunError::RunPod(
            RunPodError::ApiRequestFailed { message, .. } | RunPodError::InvalidResponse { message },
        ) => {
            PodrunError::Lifecycle(LifecycleError::TemplateCreation {
                name: name.to_string(),
                message,
            })
        }
        other => other,
    }
}
