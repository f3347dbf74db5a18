//! Resource descriptor attached to exported batches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute key holding the logical service name.
pub const SERVICE_NAME: &str = "service.name";

/// Describes the entity producing telemetry.
///
/// # Example
///
/// ```
/// use shared::models::Resource;
///
/// let resource = Resource::new("checkout").with_attribute("deployment.environment", "prod");
/// assert_eq!(resource.service_name(), Some("checkout"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    attributes: BTreeMap<String, String>,
}

impl Resource {
    /// Creates a resource with the given service name.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            attributes: BTreeMap::from([(SERVICE_NAME.to_string(), service_name.into())]),
        }
    }

    /// Adds a resource attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The service name, if set.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.attributes.get(SERVICE_NAME).map(String::as_str)
    }

    /// All resource attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self::new("unknown_service")
    }
}
