//! Feature flag management for runtime configuration

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Feature flags for enabling/disabling behavior at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Clear every store (and its cache file) when the user signs out
    pub reset_stores_on_sign_out: bool,

    /// Fetch the lexicon from the remote instead of using the bundled list
    pub remote_lexicon: bool,

    /// Custom feature flags (key-value pairs)
    pub custom: HashMap<String, bool>,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            reset_stores_on_sign_out: false,
            remote_lexicon: true,
            custom: HashMap::new(),
        }
    }
}

/// Thread-safe feature flag manager
#[derive(Debug, Clone)]
pub struct FeatureManager {
    flags: Arc<RwLock<FeatureFlags>>,
}

impl FeatureManager {
    /// Create a new feature manager with default flags
    pub fn new() -> Self {
        Self::with_flags(FeatureFlags::default())
    }

    /// Create a new feature manager with custom flags
    pub fn with_flags(flags: FeatureFlags) -> Self {
        Self {
            flags: Arc::new(RwLock::new(flags)),
        }
    }

    pub fn is_reset_on_sign_out_enabled(&self) -> bool {
        self.flags.read().reset_stores_on_sign_out
    }

    pub fn is_remote_lexicon_enabled(&self) -> bool {
        self.flags.read().remote_lexicon
    }

    /// Check a feature flag by name
    pub fn is_enabled(&self, feature: &str) -> bool {
        let flags = self.flags.read();
        match feature {
            "reset_stores_on_sign_out" => flags.reset_stores_on_sign_out,
            "remote_lexicon" => flags.remote_lexicon,
            _ => flags.custom.get(feature).copied().unwrap_or(false),
        }
    }

    /// Enable a feature flag
    pub fn enable(&self, feature: &str) {
        self.set(feature, true);
    }

    /// Disable a feature flag
    pub fn disable(&self, feature: &str) {
        self.set(feature, false);
    }

    /// Get all current flags
    pub fn get_flags(&self) -> FeatureFlags {
        self.flags.read().clone()
    }

    fn set(&self, feature: &str, value: bool) {
        let mut flags = self.flags.write();
        match feature {
            "reset_stores_on_sign_out" => flags.reset_stores_on_sign_out = value,
            "remote_lexicon" => flags.remote_lexicon = value,
            _ => {
                flags.custom.insert(feature.to_string(), value);
            }
        }
    }
}

impl Default for FeatureManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = FeatureFlags::default();
        assert!(!flags.reset_stores_on_sign_out);
        assert!(flags.remote_lexicon);
    }

    #[test]
    fn test_feature_manager() {
        let manager = FeatureManager::new();

        assert!(!manager.is_reset_on_sign_out_enabled());

        manager.enable("reset_stores_on_sign_out");
        assert!(manager.is_reset_on_sign_out_enabled());
        assert!(manager.is_enabled("reset_stores_on_sign_out"));

        manager.disable("reset_stores_on_sign_out");
        assert!(!manager.is_reset_on_sign_out_enabled());
        assert_eq!(manager.get_flags(), FeatureFlags::default());
    }

    #[test]
    fn test_custom_flags() {
        let manager = FeatureManager::new();

        assert!(!manager.is_enabled("custom_feature"));

        manager.enable("custom_feature");
        assert!(manager.is_enabled("custom_feature"));

        manager.disable("custom_feature");
        assert!(!manager.is_enabled("custom_feature"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let flags: FeatureFlags = toml::from_str("reset_stores_on_sign_out = true").unwrap();
        assert!(flags.reset_stores_on_sign_out);
        assert!(flags.remote_lexicon);
    }
}
