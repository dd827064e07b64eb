use serde::Deserialize;

/// What to do when a single field cannot be read or assigned: a failed
/// accessor, or a stored value that does not fit the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Abort the conversion with the field's error.
    #[default]
    Strict,
    /// Log a warning and skip the field.
    Lenient,
}

/// How record entries sharing a name are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateEntryPolicy {
    #[default]
    FirstWins,
    /// Fail with `MapError::DuplicateEntry`.
    Reject,
}

/// Mapper configuration
///
/// Can be embedded in a host application's settings:
///
/// ```
/// use recordmap::{AccessPolicy, MapperConfig};
///
/// let config: MapperConfig = serde_json::from_str(r#"{"access_policy": "lenient"}"#).unwrap();
/// assert_eq!(config.access_policy, AccessPolicy::Lenient);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Accessor failure handling
    pub access_policy: AccessPolicy,

    /// Duplicate entry handling when reading records
    pub duplicate_entries: DuplicateEntryPolicy,

    /// Number of compiled LIKE patterns kept by the in-memory template
    pub like_cache_capacity: usize,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self {
            access_policy: AccessPolicy::Strict,
            duplicate_entries: DuplicateEntryPolicy::FirstWins,
            like_cache_capacity: 200,
        }
    }

    /// Set the accessor failure policy
    pub fn access_policy(mut self, policy: AccessPolicy) -> Self {
        self.access_policy = policy;
        self
    }

    /// Set the duplicate entry policy
    pub fn duplicate_entries(mut self, policy: DuplicateEntryPolicy) -> Self {
        self.duplicate_entries = policy;
        self
    }

    /// Set the LIKE pattern cache capacity
    pub fn like_cache_capacity(mut self, capacity: usize) -> Self {
        self.like_cache_capacity = capacity;
        self
    }

    pub fn is_lenient(&self) -> bool {
        self.access_policy == AccessPolicy::Lenient
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = MapperConfig::new()
            .access_policy(AccessPolicy::Lenient)
            .duplicate_entries(DuplicateEntryPolicy::Reject)
            .like_cache_capacity(16);

        assert!(config.is_lenient());
        assert_eq!(config.duplicate_entries, DuplicateEntryPolicy::Reject);
        assert_eq!(config.like_cache_capacity, 16);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: MapperConfig = serde_json::from_str(r#"{"duplicate_entries": "reject"}"#).unwrap();
        assert_eq!(config.access_policy, AccessPolicy::Strict);
        assert_eq!(config.duplicate_entries, DuplicateEntryPolicy::Reject);
        assert_eq!(config.like_cache_capacity, 200);
    }
}
