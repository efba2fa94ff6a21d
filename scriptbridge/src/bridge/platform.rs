//! Host platform descriptor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Describes the host platform a module runs on.
///
/// Provided by the host and read-only for loaded modules, which see it
/// through `host.platform_json()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Script language served by the platform.
    #[serde(default = "default_language")]
    pub language: String,
    /// Free-form host properties.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, serde_json::Value>,
}

fn default_language() -> String {
    "lua".to_string()
}

impl PlatformDescriptor {
    /// Creates a descriptor with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            language: default_language(),
            properties: HashMap::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Serializes the descriptor to JSON.
    #[must_use]
    pub fn json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_string_skips_empty_fields() {
        let platform = PlatformDescriptor::new("lua-local");
        let json: serde_json::Value = serde_json::from_str(&platform.json_string()).unwrap();

        assert_eq!(json["id"], "lua-local");
        assert_eq!(json["language"], "lua");
        assert!(json.get("name").is_none());
        assert!(json.get("properties").is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let platform: PlatformDescriptor =
            serde_json::from_str(r#"{"id": "p1", "properties": {"gpu": true}}"#).unwrap();

        assert_eq!(platform.language, "lua");
        assert_eq!(platform.properties.get("gpu"), Some(&serde_json::json!(true)));
    }
}
