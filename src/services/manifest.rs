//! Manifest view over a container chain.

use std::any::TypeId;
use std::fmt;
use std::sync::Weak;

use super::container::ServiceContainer;

/// Identity of a contract type as seen at the manifest boundary.
///
/// `TypeId` alone is opaque outside the process, so the type name captured
/// at registration rides along for display and transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    /// The key under which `T` is registered and resolved.
    pub fn of<T: 'static>() -> Self {
        ServiceKey {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The underlying type token.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The contract type's name, as captured at registration.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Read-only view of the publicly listed contract types of a container
/// chain.
///
/// Every container can resolve its own manifest; the manifest itself never
/// appears in the listing, and neither does the container.
pub struct ServiceManifest {
    container: Weak<ServiceContainer>,
}

impl ServiceManifest {
    pub(crate) fn new(container: Weak<ServiceContainer>) -> Self {
        ServiceManifest { container }
    }

    /// Listed contract types: fallback chain first, then the owning
    /// container's own listed types, de-duplicated by first occurrence.
    pub fn services(&self) -> Vec<ServiceKey> {
        match self.container.upgrade() {
            Some(container) => container.manifest(),
            None => Vec::new(),
        }
    }
}
