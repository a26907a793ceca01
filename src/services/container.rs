//! Type-keyed singleton registry with an optional fallback chain.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::RwLock;

use crate::errors::{HostError, HostResult};

use super::manifest::{ServiceKey, ServiceManifest};

/// How a registered instance is produced at resolution time.
enum Provider {
    /// An owned capability instance.
    Shared(Arc<dyn Any + Send + Sync>),
    /// The container itself; held weakly so the registry does not own a
    /// cycle through its own table.
    Container(Weak<ServiceContainer>),
}

impl Provider {
    fn get(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        match self {
            Provider::Shared(instance) => Some(instance.clone()),
            Provider::Container(weak) => weak
                .upgrade()
                .map(|container| container as Arc<dyn Any + Send + Sync>),
        }
    }
}

/// One registration: the instance plus its manifest visibility.
struct ServiceEntry {
    key: ServiceKey,
    provider: Provider,
    listed: bool,
}

#[derive(Default)]
struct Entries {
    by_type: HashMap<TypeId, ServiceEntry>,
    /// First-registration order; drives manifest ordering. Overwriting a
    /// key keeps its original position.
    order: Vec<TypeId>,
}

impl Entries {
    fn insert(&mut self, entry: ServiceEntry) {
        let id = entry.key.type_id();
        if self.by_type.insert(id, entry).is_none() {
            self.order.push(id);
        }
    }
}

/// Type-keyed registry of singleton capability instances.
///
/// One active implementation per contract type: re-registering a type
/// overwrites the prior instance. Resolution is local-first; a miss is
/// delegated to the fallback container, transitively through the whole
/// chain. Containers are explicit, owned objects scoped to one compilation
/// or session, never process-wide globals, so isolated sessions can
/// coexist in one process.
///
/// Registration is a setup-phase operation: callers must finish registering
/// before concurrent resolution begins. Resolution itself is read-only and
/// safe for unlimited concurrent callers.
pub struct ServiceContainer {
    entries: RwLock<Entries>,
    fallback: Option<Arc<ServiceContainer>>,
}

impl ServiceContainer {
    /// A root container with no fallback.
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// A container that delegates misses to `fallback`.
    pub fn with_fallback(fallback: Arc<ServiceContainer>) -> Arc<Self> {
        Self::build(Some(fallback))
    }

    fn build(fallback: Option<Arc<ServiceContainer>>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ServiceContainer>| {
            let mut entries = Entries::default();
            // The container and its manifest view are always resolvable
            // and never listed.
            entries.insert(ServiceEntry {
                key: ServiceKey::of::<ServiceContainer>(),
                provider: Provider::Container(weak.clone()),
                listed: false,
            });
            entries.insert(ServiceEntry {
                key: ServiceKey::of::<ServiceManifest>(),
                provider: Provider::Shared(Arc::new(ServiceManifest::new(weak.clone()))),
                listed: false,
            });
            ServiceContainer {
                entries: RwLock::new(entries),
                fallback,
            }
        })
    }

    /// Associate `instance` with `T` in this container. Last write wins.
    /// `listed` controls whether `T` appears in the manifest.
    pub fn register<T: Send + Sync + 'static>(&self, instance: Arc<T>, listed: bool) {
        let key = ServiceKey::of::<T>();
        debug!("registering service {key} (listed: {listed})");
        self.entries.write().insert(ServiceEntry {
            key,
            provider: Provider::Shared(instance),
            listed,
        });
    }

    /// Resolve the active implementation of `T`.
    ///
    /// Local registrations win; on a miss the fallback chain is consulted
    /// transitively. `None` means no registration anywhere in the chain;
    /// the container never infers a capability that was not explicitly
    /// registered.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        if let Some(local) = self.resolve_local::<T>() {
            return Some(local);
        }
        self.fallback.as_ref().and_then(|f| f.resolve::<T>())
    }

    /// Resolve `T`, treating absence anywhere in the chain as an error.
    pub fn require<T: Send + Sync + 'static>(&self) -> HostResult<Arc<T>> {
        self.resolve::<T>().ok_or(HostError::NotFound {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Resolve the "sequence of `T`" query.
    ///
    /// The first chain link with a local registration answers with exactly
    /// one element; links are never merged into a combined sequence. An
    /// empty vec means no link had a local registration. This is a
    /// single-registration model, not multi-binding.
    pub fn resolve_seq<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        if let Some(local) = self.resolve_local::<T>() {
            return vec![local];
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve_seq::<T>(),
            None => Vec::new(),
        }
    }

    /// True if `T` is registered in this container (the fallback chain is
    /// not consulted).
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.entries.read().by_type.contains_key(&TypeId::of::<T>())
    }

    /// Snapshot of the publicly listed contract types: fallback chain
    /// first, then this container's own listed types, de-duplicated by
    /// first occurrence.
    pub fn manifest(&self) -> Vec<ServiceKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        self.collect_manifest(&mut seen, &mut keys);
        keys
    }

    fn collect_manifest(&self, seen: &mut HashSet<TypeId>, out: &mut Vec<ServiceKey>) {
        if let Some(fallback) = &self.fallback {
            fallback.collect_manifest(seen, out);
        }
        let entries = self.entries.read();
        for id in &entries.order {
            let entry = &entries.by_type[id];
            if entry.listed && seen.insert(*id) {
                out.push(entry.key.clone());
            }
        }
    }

    fn resolve_local<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.by_type.get(&TypeId::of::<T>())?;
        let resolved = entry.provider.get()?.downcast::<T>().ok();
        if resolved.is_some() {
            trace!("resolved {} locally", entry.key);
        }
        resolved
    }
}
