//! API credential handling.
//!
//! The key is read once and handed to the client by value; nothing is kept
//! in process-wide state.

use crate::error::{ConfigError, PodrunError, Result};

/// Environment variable holding the `RunPod` API key.
pub const API_KEY_VAR: &str = "RUNPOD_API_KEY";

/// Credentials for authenticating against `RunPod`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token.
    api_key: String,
}

impl Credentials {
    /// Creates credentials from an explicit key.
    ///
    /// # Errors
    ///
    /// Returns a missing-credential error if the key is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PodrunError::Config(ConfigError::MissingCredential {
                name: String::from(API_KEY_VAR),
            }));
        }
        Ok(Self { api_key })
    }

    /// Reads credentials from `RUNPOD_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns a missing-credential error if the variable is unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a missing-credential error if the lookup yields nothing usable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR).ok_or_else(|| {
            PodrunError::Config(ConfigError::MissingCredential {
                name: String::from(API_KEY_VAR),
            })
        })?;
        Self::new(api_key)
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
