//! Template spec hashing.
//!
//! Reuse of a stored or remote template is only granted when the spec hash
//! matches, so two specs sharing a logical name never alias each other.

use sha2::{Digest, Sha256};

use super::spec::TemplateSpec;

/// Number of hash characters appended to provider-side template names.
const NAME_SUFFIX_LEN: usize = 8;

/// Hasher for template creation specs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new spec hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hex SHA-256 of every creation-time field.
    ///
    /// Ports are hashed in declared order since the provider keeps them as
    /// an ordered string.
    #[must_use]
    pub fn hash_template(&self, spec: &TemplateSpec) -> String {
        let mut hasher = Sha256::new();

        // Length prefixes keep "ab"+"c" distinct from "a"+"bc"
        for field in [&spec.name, &spec.image, &spec.volume_mount_path] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(spec.container_disk_gb.to_be_bytes());
        hasher.update(spec.volume_gb.to_be_bytes());

        hasher.update((spec.ports.len() as u64).to_be_bytes());
        for port in &spec.ports {
            hasher.update((port.len() as u64).to_be_bytes());
            hasher.update(port.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display and naming.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(NAME_SUFFIX_LEN).collect()
    }

    /// Returns the name under which the spec is registered on the provider.
    #[must_use]
    pub fn qualified_name(&self, spec: &TemplateSpec) -> String {
        let hash = self.hash_template(spec);
        format!("{}-{}", spec.name, self.short_hash(&hash))
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let hasher = SpecHasher::new();
        let spec = TemplateSpec::default();

        assert_eq!(hasher.hash_template(&spec), hasher.hash_template(&spec));
        assert_eq!(hasher.hash_template(&spec).len(), 64);
    }

    #[test]
    fn test_any_field_changes_hash() {
        let hasher = SpecHasher::new();
        let base = TemplateSpec::default();
        let base_hash = hasher.hash_template(&base);

        let mut image = base.clone();
        image.image = String::from("runpod/pytorch:2.4.0");
        assert_ne!(hasher.hash_template(&image), base_hash);

        let mut disk = base.clone();
        disk.container_disk_gb += 1;
        assert_ne!(hasher.hash_template(&disk), base_hash);

        let mut ports = base.clone();
        ports.ports.reverse();
        assert_ne!(hasher.hash_template(&ports), base_hash);

        let mut mount = base;
        mount.volume_mount_path = String::from("/data");
        assert_ne!(hasher.hash_template(&mount), base_hash);
    }

    #[test]
    fn test_qualified_name() {
        let hasher = SpecHasher::new();
        let spec = TemplateSpec::default();
        let hash = hasher.hash_template(&spec);

        let name = hasher.qualified_name(&spec);
        assert_eq!(name, format!("comic-gen-template-{}", &hash[..8]));
    }

    #[test]
    fn test_hashes_match() {
        assert!(SpecHasher::hashes_match("abc123", "abc123"));
        assert!(!SpecHasher::hashes_match("abc123", "abc124"));
        assert!(!SpecHasher::hashes_match("abc123", "abc12"));
    }
}
