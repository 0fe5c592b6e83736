//! Resource boundary. Components refer to external resources (meshes,
//! textures, sounds, ...) through opaque handles and ask a provider for their
//! state; nothing here ever waits for a load.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque reference to an externally managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Loading,
    Ready,
    Missing,
}

/// Answers "is this resource usable right now". Implemented by whatever owns
/// resource loading.
pub trait ResourceProvider {
    fn state(&self, handle: ResourceHandle) -> ResourceState;
}

impl ResourceProvider for HashMap<ResourceHandle, ResourceState> {
    fn state(&self, handle: ResourceHandle) -> ResourceState {
        self.get(&handle).copied().unwrap_or(ResourceState::Missing)
    }
}

/// A resource reference with an optional stand-in used while the primary
/// resource is loading or missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBinding {
    pub handle: ResourceHandle,
    pub fallback: Option<ResourceHandle>,
}

impl ResourceBinding {
    pub fn new(handle: ResourceHandle) -> Self {
        Self {
            handle,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: ResourceHandle) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The handle to use this frame: the primary resource if ready, else the
    /// fallback if ready, else nothing.
    pub fn resolve(&self, provider: &dyn ResourceProvider) -> Option<ResourceHandle> {
        if provider.state(self.handle) == ResourceState::Ready {
            return Some(self.handle);
        }
        self.fallback
            .filter(|fallback| provider.state(*fallback) == ResourceState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> HashMap<ResourceHandle, ResourceState> {
        HashMap::from([
            (ResourceHandle(1), ResourceState::Ready),
            (ResourceHandle(2), ResourceState::Loading),
            (ResourceHandle(9), ResourceState::Ready),
        ])
    }

    #[test]
    fn ready_resource_resolves_to_itself() {
        let binding = ResourceBinding::new(ResourceHandle(1)).with_fallback(ResourceHandle(9));
        assert_eq!(binding.resolve(&provider()), Some(ResourceHandle(1)));
    }

    #[test]
    fn loading_resource_uses_fallback() {
        let binding = ResourceBinding::new(ResourceHandle(2)).with_fallback(ResourceHandle(9));
        assert_eq!(binding.resolve(&provider()), Some(ResourceHandle(9)));
    }

    #[test]
    fn missing_without_fallback_resolves_to_nothing() {
        let binding = ResourceBinding::new(ResourceHandle(3));
        assert_eq!(binding.resolve(&provider()), None);
    }
}
